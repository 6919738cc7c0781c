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

//! Model builder.
//!
//! Scans the token stream of a C header for annotated `struct`
//! declarations and collects them as [`ast::Model`] records.
//! Unannotated code is skipped without validation.

use crate::analyzer::{self, Diagnostics, ErrorCode};
use crate::ast;
use crate::lexer::{Attribute, Lexer, Token, TokenKind};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files;
use std::ops::Range;

/// Type qualifiers and storage classes skipped in field declarations.
const QUALIFIERS: &[&str] =
    &["const", "volatile", "restrict", "__restrict", "register", "static", "extern", "_Atomic"];

/// Identifiers spelling a field attribute, when the grammar could not
/// match the attribute call.
const ATTRIBUTE_KEYWORDS: &[&str] = &[
    "alias",
    "jsgen_alias",
    "sized_by",
    "jsgen_sized_by",
    "ignore",
    "jsgen_ignore",
    "json_literal",
    "jsgen_json_literal",
];

struct Context<'a> {
    file: ast::FileId,
    source: &'a str,
    line_starts: &'a [usize],
}

impl<'a> Context<'a> {
    fn loc(&self, span: Range<usize>) -> ast::SourceRange {
        ast::SourceRange {
            file: self.file,
            start: ast::SourceLocation::new(span.start, self.line_starts),
            end: ast::SourceLocation::new(span.end, self.line_starts),
        }
    }
}

/// Model under construction.
#[derive(Debug)]
struct Draft {
    start: usize,
    directions: ast::Directions,
    typedef: bool,
    tag: Option<String>,
    alias: Option<String>,
    fields: Vec<ast::Field>,
}

/// Builder state. Each variant carries only the data valid in it.
#[derive(Debug)]
enum State<'s> {
    /// Outside of any annotated declaration.
    Idle,
    /// After an annotation marker, before `struct`.
    Marked { start: usize, directions: ast::Directions, typedef: bool },
    /// After `struct`, before the opening brace.
    Head(Draft),
    /// Inside the declaration body. `declaration` holds the tokens of
    /// the current member declaration at depth 1.
    Body { draft: Draft, depth: usize, declaration: Vec<Token<'s>>, nested: bool },
    /// After the closing brace, before the terminating semicolon.
    Tail { draft: Draft, pointer_declarator: bool },
}

struct ModelBuilder<'a, 's> {
    context: &'a Context<'a>,
    state: State<'s>,
    models: Vec<ast::Model>,
    diagnostics: Diagnostics,
}

fn declaration_span(tokens: &[Token<'_>]) -> Range<usize> {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => first.span.start..last.span.end,
        _ => 0..0,
    }
}

fn is_attribute_keyword(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Identifier && ATTRIBUTE_KEYWORDS.contains(&token.text)
}

impl<'a, 's> ModelBuilder<'a, 's> {
    fn new(context: &'a Context<'a>) -> Self {
        ModelBuilder {
            context,
            state: State::Idle,
            models: vec![],
            diagnostics: Default::default(),
        }
    }

    fn warn(&mut self, code: ErrorCode, message: String, span: Range<usize>) {
        self.diagnostics.push(
            Diagnostic::warning()
                .with_code(code)
                .with_message(message)
                .with_labels(vec![self.context.loc(span).primary()]),
        )
    }

    /// Advance the state machine by one token.
    fn feed(&mut self, token: Token<'s>) {
        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = match state {
            State::Idle => match token.kind {
                TokenKind::Marker(directions) => {
                    State::Marked { start: token.span.start, directions, typedef: false }
                }
                _ => State::Idle,
            },
            State::Marked { start, directions, typedef } => {
                self.feed_marked(token, start, directions, typedef)
            }
            State::Head(draft) => self.feed_head(token, draft),
            State::Body { draft, depth, declaration, nested } => {
                self.feed_body(token, draft, depth, declaration, nested)
            }
            State::Tail { draft, pointer_declarator } => {
                self.feed_tail(token, draft, pointer_declarator)
            }
        }
    }

    fn feed_marked(
        &mut self,
        token: Token<'s>,
        start: usize,
        directions: ast::Directions,
        typedef: bool,
    ) -> State<'s> {
        match token.kind {
            TokenKind::Marker(directions) => State::Marked { start, directions, typedef },
            TokenKind::Identifier if token.text == "typedef" => {
                State::Marked { start, directions, typedef: true }
            }
            TokenKind::Identifier if token.text == "struct" => State::Head(Draft {
                start,
                directions,
                typedef,
                tag: None,
                alias: None,
                fields: vec![],
            }),
            TokenKind::Identifier if QUALIFIERS.contains(&token.text) => {
                State::Marked { start, directions, typedef }
            }
            TokenKind::Identifier if token.text == "union" || token.text == "enum" => {
                self.warn(
                    ErrorCode::InvalidAnnotationTarget,
                    format!("`{}` declarations cannot be annotated", token.text),
                    start..token.span.end,
                );
                State::Idle
            }
            _ => {
                self.warn(
                    ErrorCode::InvalidAnnotationTarget,
                    format!(
                        "expected `struct` or `typedef` after annotation marker, found `{}`",
                        token.text
                    ),
                    start..token.span.end,
                );
                State::Idle
            }
        }
    }

    fn feed_head(&mut self, token: Token<'s>, mut draft: Draft) -> State<'s> {
        match token.kind {
            TokenKind::Identifier if draft.tag.is_none() => {
                draft.tag = Some(token.text.to_owned());
                State::Head(draft)
            }
            TokenKind::Punct if token.text == "{" => {
                State::Body { draft, depth: 1, declaration: vec![], nested: false }
            }
            TokenKind::Punct if token.text == ";" => {
                self.warn(
                    ErrorCode::InvalidAnnotationTarget,
                    "annotated forward declaration has no body".to_owned(),
                    draft.start..token.span.end,
                );
                State::Idle
            }
            _ => {
                self.warn(
                    ErrorCode::InvalidAnnotationTarget,
                    format!("expected struct body, found `{}`", token.text),
                    draft.start..token.span.end,
                );
                State::Idle
            }
        }
    }

    fn feed_body(
        &mut self,
        token: Token<'s>,
        mut draft: Draft,
        depth: usize,
        mut declaration: Vec<Token<'s>>,
        nested: bool,
    ) -> State<'s> {
        match token.kind {
            TokenKind::Punct if token.text == "{" => {
                State::Body { draft, depth: depth + 1, declaration, nested: true }
            }
            TokenKind::Punct if token.text == "}" && depth == 1 => {
                if !declaration.is_empty() {
                    self.warn(
                        ErrorCode::UnterminatedDeclaration,
                        "expected `;` after field declaration".to_owned(),
                        declaration_span(&declaration),
                    );
                }
                State::Tail { draft, pointer_declarator: false }
            }
            TokenKind::Punct if token.text == "}" => {
                State::Body { draft, depth: depth - 1, declaration, nested }
            }
            _ if depth > 1 => State::Body { draft, depth, declaration, nested },
            TokenKind::Punct if token.text == ";" => {
                if nested {
                    self.warn(
                        ErrorCode::UnsupportedDeclaration,
                        "nested aggregate declarations are not supported".to_owned(),
                        declaration_span(&declaration),
                    );
                } else {
                    let fields = self.parse_declaration(&declaration);
                    draft.fields.extend(fields);
                }
                State::Body { draft, depth, declaration: vec![], nested: false }
            }
            TokenKind::Marker(_) => {
                self.warn(
                    ErrorCode::InvalidAnnotationTarget,
                    "annotation marker inside a struct body is ignored".to_owned(),
                    token.span,
                );
                State::Body { draft, depth, declaration, nested }
            }
            _ => {
                declaration.push(token);
                State::Body { draft, depth, declaration, nested }
            }
        }
    }

    fn feed_tail(
        &mut self,
        token: Token<'s>,
        mut draft: Draft,
        pointer_declarator: bool,
    ) -> State<'s> {
        match token.kind {
            TokenKind::Punct if token.text == ";" => {
                self.finalize(draft, token.span.end);
                State::Idle
            }
            TokenKind::Punct if token.text == "*" => {
                State::Tail { draft, pointer_declarator: true }
            }
            TokenKind::Punct if token.text == "," => {
                State::Tail { draft, pointer_declarator: false }
            }
            // Identifiers after the body are typedef names in typedef
            // context, and variable declarators otherwise.
            TokenKind::Identifier if draft.typedef && !pointer_declarator => {
                draft.alias = Some(token.text.to_owned());
                State::Tail { draft, pointer_declarator }
            }
            _ => State::Tail { draft, pointer_declarator },
        }
    }

    /// Complete the working model and append it to the collection.
    fn finalize(&mut self, draft: Draft, end: usize) {
        let span = draft.start..end;
        let (id, name) = match (draft.typedef, &draft.alias, &draft.tag) {
            (true, Some(alias), _) => (alias.clone(), alias.clone()),
            (_, _, Some(tag)) => (format!("struct {tag}"), tag.clone()),
            _ => {
                self.warn(
                    ErrorCode::InvalidAnnotationTarget,
                    "anonymous struct declarations cannot be annotated".to_owned(),
                    span,
                );
                return;
            }
        };

        let mut model = ast::Model {
            loc: self.context.loc(span),
            id,
            name,
            tag: draft.tag,
            parse: draft.directions.parse,
            stringify: draft.directions.stringify,
            fields: draft.fields,
        };
        analyzer::resolve_counters(&mut model, &mut self.diagnostics);
        analyzer::check_json_literals(&mut model, &mut self.diagnostics);
        tracing::debug!(model = %model.id, fields = model.fields.len(), "declared model");
        self.models.push(model);
    }

    /// Build the fields of one member declaration, e.g.
    /// `const char *name alias("n"), *nick;`.
    fn parse_declaration(&mut self, tokens: &[Token<'s>]) -> Vec<ast::Field> {
        if tokens.is_empty() {
            return vec![];
        }

        if let Some(index) = tokens.iter().position(|t| t.is_punct("(")) {
            let malformed = index > 0
                && (is_attribute_keyword(&tokens[index - 1])
                    || matches!(tokens[index - 1].kind, TokenKind::Attribute(_)));
            if malformed {
                self.warn(
                    ErrorCode::MalformedAnnotation,
                    format!("malformed `{}` annotation", tokens[index - 1].text),
                    declaration_span(tokens),
                );
            } else {
                self.warn(
                    ErrorCode::UnsupportedDeclaration,
                    "function pointer fields are not supported".to_owned(),
                    declaration_span(tokens),
                );
            }
            return vec![];
        }

        // Type specifiers.
        let mut units: Vec<(String, Range<usize>)> = vec![];
        let mut index = 0;
        while let Some(token) = tokens.get(index) {
            if token.kind != TokenKind::Identifier {
                break;
            }
            index += 1;
            match token.text {
                text if QUALIFIERS.contains(&text) => (),
                "union" => {
                    self.warn(
                        ErrorCode::UnsupportedDeclaration,
                        "union fields are not supported".to_owned(),
                        declaration_span(tokens),
                    );
                    return vec![];
                }
                keyword @ ("struct" | "enum") => match tokens.get(index) {
                    Some(tag) if tag.kind == TokenKind::Identifier => {
                        units.push((format!("{keyword} {}", tag.text), tag.span.clone()));
                        index += 1;
                    }
                    _ => {
                        self.warn(
                            ErrorCode::UnsupportedDeclaration,
                            format!("expected a tag name after `{keyword}`"),
                            declaration_span(tokens),
                        );
                        return vec![];
                    }
                },
                text => units.push((text.to_owned(), token.span.clone())),
            }
        }

        // The last specifier is the first declarator name, unless the
        // declarator starts with a pointer.
        let mut name = None;
        if !tokens.get(index).is_some_and(|t| t.is_punct("*")) {
            match units.pop() {
                Some((text, span)) if units.is_empty() || text.contains(' ') => {
                    units.push((text, span));
                }
                Some(unit) => name = Some(unit),
                None => (),
            }
            if name.is_none() {
                if tokens.iter().any(|t| matches!(t.kind, TokenKind::Attribute(_))) {
                    self.warn(
                        ErrorCode::MalformedAnnotation,
                        "annotation does not follow a field name".to_owned(),
                        declaration_span(tokens),
                    );
                }
                return vec![];
            }
        }
        let leaf = units.into_iter().map(|(text, _)| text).collect::<Vec<_>>().join(" ");

        let mut fields = vec![];
        loop {
            let mut pointers = 0;
            if name.is_none() {
                while let Some(token) = tokens.get(index) {
                    if token.is_punct("*") {
                        pointers += 1;
                    } else if !(token.kind == TokenKind::Identifier
                        && QUALIFIERS.contains(&token.text))
                    {
                        break;
                    }
                    index += 1;
                }
                match tokens.get(index) {
                    Some(token) if token.kind == TokenKind::Identifier => {
                        name = Some((token.text.to_owned(), token.span.clone()));
                        index += 1;
                    }
                    Some(token) if matches!(token.kind, TokenKind::Attribute(_)) => {
                        self.warn(
                            ErrorCode::MalformedAnnotation,
                            "annotation does not follow a field name".to_owned(),
                            token.span.clone(),
                        );
                        return fields;
                    }
                    _ => {
                        self.warn(
                            ErrorCode::UnsupportedDeclaration,
                            "expected a field name".to_owned(),
                            declaration_span(tokens),
                        );
                        return fields;
                    }
                }
            }
            let Some((id, span)) = name.take() else {
                return fields;
            };

            // Array declarators; bounds are kept as written.
            let mut dimensions = 0;
            let mut array_size = None;
            while tokens.get(index).is_some_and(|t| t.is_punct("[")) {
                let open = index;
                let mut depth = 0;
                while let Some(token) = tokens.get(index) {
                    index += 1;
                    if token.is_punct("[") {
                        depth += 1;
                    } else if token.is_punct("]") {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                }
                if depth != 0 {
                    self.warn(
                        ErrorCode::UnsupportedDeclaration,
                        "unterminated array declarator".to_owned(),
                        declaration_span(tokens),
                    );
                    return fields;
                }
                dimensions += 1;
                if dimensions == 1 {
                    let bound = tokens[open].span.end..tokens[index - 1].span.start;
                    array_size = Some(self.context.source[bound].trim().to_owned());
                }
            }

            // Bit-field width.
            if tokens.get(index).is_some_and(|t| t.is_punct(":")) {
                while tokens
                    .get(index)
                    .is_some_and(|t| !t.is_punct(",") && !matches!(t.kind, TokenKind::Attribute(_)))
                {
                    index += 1;
                }
            }

            let mut field = ast::Field {
                loc: self.context.loc(span),
                id,
                alias: None,
                leaf: leaf.clone(),
                pointers,
                array_size,
                dimensions,
                counter: None,
                is_counter: false,
                json_literal: false,
            };
            let mut ignored = false;
            while let Some(TokenKind::Attribute(attribute)) = tokens.get(index).map(|t| &t.kind) {
                match attribute {
                    Attribute::Alias(alias) => field.alias = Some(alias.clone()),
                    Attribute::SizedBy(counter) => field.counter = Some(counter.clone()),
                    Attribute::Ignore => ignored = true,
                    Attribute::JsonLiteral => field.json_literal = true,
                }
                index += 1;
            }
            if ignored {
                tracing::debug!(field = %field.id, "ignored field");
            } else {
                fields.push(field);
            }

            match tokens.get(index) {
                None => return fields,
                Some(token) if token.is_punct(",") => index += 1,
                Some(token) => {
                    self.warn(
                        ErrorCode::UnsupportedDeclaration,
                        format!("unexpected `{}` in field declaration", token.text),
                        token.span.clone(),
                    );
                    return fields;
                }
            }
        }
    }

    /// Report a declaration left open at the end of input.
    fn finish(&mut self, end: usize) {
        let start = match &self.state {
            State::Idle => return,
            State::Marked { start, .. } => *start,
            State::Head(draft) | State::Body { draft, .. } | State::Tail { draft, .. } => {
                draft.start
            }
        };
        self.warn(
            ErrorCode::UnterminatedDeclaration,
            "unexpected end of input in annotated declaration".to_owned(),
            start..end,
        );
        self.state = State::Idle;
    }
}

/// Parse a header from a string.
///
/// The source is added to the compilation database. Returns the models
/// completed before the end of input, or before the first lexical error,
/// together with the diagnostics raised while scanning.
pub fn parse_inline(
    sources: &mut ast::SourceDatabase,
    name: &str,
    source: String,
) -> (ast::File, Diagnostics) {
    let line_starts: Vec<_> = files::line_starts(&source).collect();
    let file = sources.add(name.to_owned(), source.clone());
    let context = Context { file, source: &source, line_starts: &line_starts };
    let mut builder = ModelBuilder::new(&context);
    let mut lexer = Lexer::new(&source);

    loop {
        match lexer.next_token() {
            Ok(token) if token.kind == TokenKind::Eof => {
                builder.finish(source.len());
                break;
            }
            Ok(token) => builder.feed(token),
            Err(err) => {
                let end = (err.offset + 1).min(source.len());
                builder.diagnostics.push(
                    Diagnostic::error()
                        .with_code(ErrorCode::LexicalError)
                        .with_message(format!("failed to tokenize '{}': {}", name, err.message))
                        .with_labels(vec![context.loc(err.offset..end).primary()]),
                );
                break;
            }
        }
    }

    tracing::debug!(file = name, models = builder.models.len(), "parsed header");
    (ast::File { file, models: builder.models }, builder.diagnostics)
}

/// Parse a new header file.
///
/// The header is fully read and added to the compilation database.
/// Returns an error only when the file cannot be read.
pub fn parse_file(
    sources: &mut ast::SourceDatabase,
    name: &str,
) -> Result<(ast::File, Diagnostics), Diagnostic<ast::FileId>> {
    let source = std::fs::read_to_string(name).map_err(|e| {
        Diagnostic::error().with_message(format!("failed to read input file '{}': {}", name, e))
    })?;
    Ok(parse_inline(sources, name, source))
}
