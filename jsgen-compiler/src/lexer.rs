// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tokenizer for annotated C headers.
//!
//! The lexer matches a single lexeme at a time from the current offset,
//! which makes lookahead and rewinding a matter of saving the offset.
//! Annotation markers and field attributes have dedicated rules, so the
//! model builder never has to reassemble them from raw tokens.

use crate::ast::Directions;
use pest::iterators::Pair;
use pest::Parser;
use std::ops::Range;

#[derive(pest_derive::Parser)]
#[grammar_inline = r###"
WHITESPACE = _{ " " | "\t" | "\r" | "\n" | "\u{0B}" | "\u{0C}" | "\\" ~ NEWLINE }
COMMENT = _{ block_comment | line_comment | directive }

block_comment = _{ "/*" ~ (!"*/" ~ ANY)* ~ "*/" }
line_comment = _{ "//" ~ ("\\" ~ NEWLINE | !NEWLINE ~ ANY)* }
directive = _{ "#" ~ ("\\" ~ NEWLINE | string_literal | char_literal | block_comment | !NEWLINE ~ ANY)* }

ident_start = _{ ASCII_ALPHA | "_" | "$" }
ident_char = _{ ASCII_ALPHANUMERIC | "_" | "$" }
encoding_prefix = _{ "u8" | "u" | "U" | "L" }

identifier = @{ ident_start ~ ident_char* }
number = @{ "."? ~ ASCII_DIGIT ~ (("e" | "E" | "p" | "P") ~ ("+" | "-") | ident_char | "." | "'")* }
string_literal = @{ encoding_prefix? ~ "\"" ~ ("\\" ~ ANY | !("\"" | "\\" | NEWLINE) ~ ANY)* ~ "\"" }
char_literal = @{ encoding_prefix? ~ "'" ~ ("\\" ~ ANY | !("'" | "\\" | NEWLINE) ~ ANY)* ~ "'" }
punct = @{
    "..." | "<<=" | ">>=" | "->" | "++" | "--" | "<<" | ">>" | "<=" | ">=" | "==" | "!=" |
    "&&" | "||" | "*=" | "/=" | "%=" | "+=" | "-=" | "&=" | "^=" | "|=" | "##" |
    "[" | "]" | "(" | ")" | "{" | "}" | "." | "&" | "*" | "+" | "-" | "~" | "!" |
    "/" | "%" | "<" | ">" | "^" | "|" | "?" | ":" | ";" | "=" | "," | "#"
}

marker = @{
    ("JSGEN_JSONS" | "JSGEN_JSONP" | "JSGEN_JSON" | "JSONS" | "JSONP" | "JSON") ~ !ident_char
}

attribute_argument = _{ string_literal | identifier }
alias_keyword = @{ ("jsgen_alias" | "alias") ~ !ident_char }
sized_by_keyword = @{ ("jsgen_sized_by" | "sized_by") ~ !ident_char }
ignore_keyword = @{ ("jsgen_ignore" | "ignore") ~ !ident_char }
json_literal_keyword = @{ ("jsgen_json_literal" | "json_literal") ~ !ident_char }

alias_attribute = { alias_keyword ~ "(" ~ attribute_argument ~ ")" }
sized_by_attribute = { sized_by_keyword ~ "(" ~ attribute_argument ~ ")" }
ignore_attribute = { ignore_keyword ~ "(" ~ ")" }
json_literal_attribute = { json_literal_keyword ~ "(" ~ ")" | json_literal_keyword }
attribute = _{ alias_attribute | sized_by_attribute | ignore_attribute | json_literal_attribute }

token = _{
    marker |
    attribute |
    string_literal |
    char_literal |
    number |
    identifier |
    !"/*" ~ punct
}

lexeme = _{ SOI ~ (token | EOI) }
"###]
struct HeaderLexer;

/// Field attribute, attached to the declarator it follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Alias(String),
    SizedBy(String),
    Ignore,
    JsonLiteral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Marker(Directions),
    Attribute(Attribute),
    Identifier,
    StringLiteral,
    CharLiteral,
    Number,
    Punct,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub text: &'s str,
    /// Byte range in the source text.
    pub span: Range<usize>,
}

/// Failure to recognize a lexeme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    pub offset: usize,
    pub message: String,
}

/// Incremental tokenizer over one source text.
pub struct Lexer<'s> {
    source: &'s str,
    offset: usize,
}

impl<'s> Token<'s> {
    pub fn is_identifier(&self, text: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == text
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }
}

fn marker_directions(text: &str) -> Directions {
    match text.trim_start_matches("JSGEN_") {
        "JSONP" => Directions::PARSE,
        "JSONS" => Directions::STRINGIFY,
        _ => Directions::BOTH,
    }
}

/// Extract the argument of an attribute call. String arguments lose
/// their quotes, escapes are kept verbatim.
fn attribute_argument(pair: Pair<'_, Rule>) -> String {
    match pair.into_inner().find(|p| matches!(p.as_rule(), Rule::string_literal | Rule::identifier))
    {
        Some(arg) if arg.as_rule() == Rule::string_literal => {
            let text = arg.as_str();
            let start = text.find('"').map_or(0, |i| i + 1);
            text[start..text.len() - 1].to_owned()
        }
        Some(arg) => arg.as_str().to_owned(),
        None => String::new(),
    }
}

fn token_kind(pair: Pair<'_, Rule>) -> TokenKind {
    match pair.as_rule() {
        Rule::marker => TokenKind::Marker(marker_directions(pair.as_str())),
        Rule::alias_attribute => TokenKind::Attribute(Attribute::Alias(attribute_argument(pair))),
        Rule::sized_by_attribute => {
            TokenKind::Attribute(Attribute::SizedBy(attribute_argument(pair)))
        }
        Rule::ignore_attribute => TokenKind::Attribute(Attribute::Ignore),
        Rule::json_literal_attribute => TokenKind::Attribute(Attribute::JsonLiteral),
        Rule::string_literal => TokenKind::StringLiteral,
        Rule::char_literal => TokenKind::CharLiteral,
        Rule::number => TokenKind::Number,
        Rule::identifier => TokenKind::Identifier,
        Rule::punct => TokenKind::Punct,
        _ => TokenKind::Eof,
    }
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Lexer<'s> {
        Lexer { source, offset: 0 }
    }

    /// Current position, to be restored with [`Lexer::rewind`].
    pub fn checkpoint(&self) -> usize {
        self.offset
    }

    pub fn rewind(&mut self, checkpoint: usize) {
        self.offset = checkpoint;
    }

    /// Return the next token and advance past it.
    /// The end of input is returned as an [`TokenKind::Eof`] token,
    /// as many times as requested.
    pub fn next_token(&mut self) -> Result<Token<'s>, LexicalError> {
        let rest = &self.source[self.offset..];
        let mut pairs = HeaderLexer::parse(Rule::lexeme, rest).map_err(|err| {
            let position = match err.location {
                pest::error::InputLocation::Pos(pos) => pos,
                pest::error::InputLocation::Span((start, _)) => start,
            };
            let offset = self.offset + skip_trivia(rest, position);
            LexicalError {
                offset,
                message: format!("unrecognized input {:?}", next_char(self.source, offset)),
            }
        })?;
        let Some(pair) = pairs.next() else {
            return Ok(self.eof());
        };

        let span = pair.as_span();
        let start = self.offset + span.start();
        let end = self.offset + span.end();
        let text = &self.source[start..end];
        let kind = token_kind(pair);
        self.offset = if kind == TokenKind::Eof { self.source.len() } else { end };
        Ok(Token { kind, text, span: start..end })
    }

    /// Return the next token without consuming it.
    pub fn peek(&mut self) -> Result<Token<'s>, LexicalError> {
        let checkpoint = self.checkpoint();
        let token = self.next_token();
        self.rewind(checkpoint);
        token
    }

    fn eof(&mut self) -> Token<'s> {
        self.offset = self.source.len();
        Token { kind: TokenKind::Eof, text: "", span: self.source.len()..self.source.len() }
    }
}

/// pest reports the failure position before implicit whitespace;
/// advance to the first significant character for the diagnostic.
fn skip_trivia(rest: &str, position: usize) -> usize {
    let trimmed = rest[position..].trim_start();
    rest.len() - trimmed.len()
}

fn next_char(source: &str, offset: usize) -> String {
    source[offset..].chars().next().map_or_else(|| "<eof>".to_owned(), |c| c.to_string())
}

/// Tokenize a complete source text, excluding the end of input.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexicalError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = vec![];
    loop {
        let token = lexer.next_token()?;
        if token.kind == TokenKind::Eof {
            return Ok(tokens);
        }
        tokens.push(token);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn texts(source: &str) -> Vec<&str> {
        tokenize(source).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_punctuation_and_identifiers() {
        assert_eq!(texts("struct a { int *b[4]; };"), vec![
            "struct", "a", "{", "int", "*", "b", "[", "4", "]", ";", "}", ";"
        ]);
        assert_eq!(texts("a->b <<= c..."), vec!["a", "->", "b", "<<=", "c", "..."]);
    }

    #[test]
    fn test_comments_and_directives_are_skipped() {
        let source = r#"
            #include <stdio.h>
            #define LONG_MACRO(x) \
                do { x; } while (0)
            /* block
               comment */ int a; // trailing
        "#;
        assert_eq!(texts(source), vec!["int", "a", ";"]);
    }

    #[test]
    fn test_directive_literals_do_not_open_comments() {
        let source = "#define OPEN \"/*\"\n#define STAR '*'\nint a;\n/* note */ int b;";
        assert_eq!(texts(source), vec!["int", "a", ";", "int", "b", ";"]);
    }

    #[test]
    fn test_markers() {
        assert_eq!(kinds("JSON JSONP JSGEN_JSONS JSGEN_JSON JSONX"), vec![
            TokenKind::Marker(Directions::BOTH),
            TokenKind::Marker(Directions::PARSE),
            TokenKind::Marker(Directions::STRINGIFY),
            TokenKind::Marker(Directions::BOTH),
            TokenKind::Identifier,
        ]);
    }

    #[test]
    fn test_attributes() {
        assert_eq!(
            kinds(r#"alias("active") jsgen_sized_by(count) ignore() json_literal jsgen_json_literal()"#),
            vec![
                TokenKind::Attribute(Attribute::Alias("active".to_owned())),
                TokenKind::Attribute(Attribute::SizedBy("count".to_owned())),
                TokenKind::Attribute(Attribute::Ignore),
                TokenKind::Attribute(Attribute::JsonLiteral),
                TokenKind::Attribute(Attribute::JsonLiteral),
            ]
        );
    }

    #[test]
    fn test_attribute_spelling_without_call_is_an_identifier() {
        assert_eq!(kinds("int alias; ignore aliases"), vec![
            TokenKind::Identifier,
            TokenKind::Identifier,
            TokenKind::Punct,
            TokenKind::Identifier,
            TokenKind::Identifier,
        ]);
        // Malformed calls leave the keyword as a plain identifier.
        assert_eq!(texts("alias(1)"), vec!["alias", "(", "1", ")"]);
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#"extern "C" 'x' L"wide" 0x1fUL 1.5e-3"#),
            vec![
                TokenKind::Identifier,
                TokenKind::StringLiteral,
                TokenKind::CharLiteral,
                TokenKind::StringLiteral,
                TokenKind::Number,
                TokenKind::Number,
            ]
        );
    }

    #[test]
    fn test_lexical_errors() {
        let err = tokenize("int a;\n  @").unwrap_err();
        assert_eq!(err.offset, 9);
        let err = tokenize("char *s = \"unterminated\n;").unwrap_err();
        assert_eq!(err.offset, 10);
        assert!(tokenize("int a; /* unterminated").is_err());
    }

    #[test]
    fn test_peek_and_rewind() {
        let mut lexer = Lexer::new("a [ b");
        assert_eq!(lexer.next_token().unwrap().text, "a");
        let checkpoint = lexer.checkpoint();
        assert!(lexer.peek().unwrap().is_punct("["));
        assert!(lexer.next_token().unwrap().is_punct("["));
        assert!(lexer.next_token().unwrap().is_identifier("b"));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
        lexer.rewind(checkpoint);
        assert!(lexer.next_token().unwrap().is_punct("["));
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("  JSON struct").unwrap();
        assert_eq!(tokens[0].span, 2..6);
        assert_eq!(tokens[1].span, 7..13);
    }
}
