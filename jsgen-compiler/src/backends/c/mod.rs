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

//! C compiler backend.
//!
//! Generates one header with the parse and stringify routines of all
//! the collected models, written against the `jsp` decoder and `jsb`
//! builder runtime libraries.

use crate::analyzer::Scope;
use crate::ast;
use heck::ToShoutySnakeCase;
use std::path::Path;

mod decoder;
mod encoder;
mod preamble;

pub use preamble::annotations_header;

fn indent(s: &str, level: usize) -> String {
    let prefix = "    ".repeat(level);
    s.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("{prefix}{line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Return the simple name of the model referenced by a type name,
/// used to call its generated routines. Unknown references fall back
/// to the bare type name.
fn model_name(scope: &Scope<'_>, type_id: &str) -> String {
    match scope.get(type_id) {
        Some(model) => model.name.clone(),
        None => type_id.strip_prefix("struct ").unwrap_or(type_id).trim().to_owned(),
    }
}

/// Derive the include guard macro from the output file name,
/// e.g. `out/models.g.h` becomes `MODELS_G_H`.
fn include_guard(output_name: &str) -> String {
    let file_name =
        Path::new(output_name).file_name().and_then(|name| name.to_str()).unwrap_or(output_name);
    let guard = file_name.to_shouty_snake_case();
    match guard.chars().next() {
        None => "JSGEN_MODELS_H".to_owned(),
        Some(c) if c.is_ascii_digit() => format!("JSGEN_{guard}"),
        Some(_) => guard,
    }
}

/// Generate the C header for the selected models.
///
/// Models are emitted in discovery order; the forward declarations
/// make references between models independent of that order.
pub fn generate(models: &[ast::Model], output_name: &str) -> String {
    let scope = Scope::new(models);
    let guard = include_guard(output_name);
    let mut code = preamble::generate(output_name, &guard);

    code.push_str("\n// Forward declarations\n");
    for model in models {
        if model.parse {
            code.push_str(&decoder::declarations(model));
        }
        if model.stringify {
            code.push_str(&encoder::declarations(model));
        }
    }

    for model in models {
        tracing::debug!(
            model = %model.id,
            parse = model.parse,
            stringify = model.stringify,
            "generating routines"
        );
        if model.parse {
            code.push_str(&decoder::generate(&scope, model));
        }
        if model.stringify {
            code.push_str(&encoder::generate(&scope, model));
        }
    }

    code.push_str(&format!("\n#endif // {guard}\n"));
    code
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::assert_contains;
    use crate::{analyzer, parser};

    fn generate_header(text: &str) -> String {
        let mut db = ast::SourceDatabase::new();
        let (file, diagnostics) = parser::parse_inline(&mut db, "stdin", text.to_owned());
        assert!(!diagnostics.has_errors());
        analyzer::analyze(&file.models).unwrap();
        generate(&file.models, "models.g.h")
    }

    #[test]
    fn test_include_guard() {
        assert_eq!(include_guard("models.g.h"), "MODELS_G_H");
        assert_eq!(include_guard("build/out/api-models.h"), "API_MODELS_H");
        assert_eq!(include_guard("1.h"), "JSGEN_1_H");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\n\nb", 1), "    a\n\n    b");
        assert_eq!(indent("a", 2), "        a");
    }

    #[test]
    fn test_directions() {
        let code = generate_header(
            r#"
            JSON struct both { int a; };
            JSONP struct parse_only { int b; };
            JSONS struct stringify_only { int c; };
            "#,
        );
        assert_contains(&code, "JSGEN_DEF int _parse_both(Jsp *jsp, struct both *out, JsGenAllocator *a) {");
        assert_contains(&code, "JSGEN_DEF int _stringify_both(Jsb *jsb, const struct both *in) {");
        assert_contains(&code, "JSGEN_DEF int parse_parse_only_list(");
        assert!(!code.contains("_stringify_parse_only"));
        assert_contains(&code, "#define stringify_stringify_only(in)");
        assert!(!code.contains("_parse_stringify_only"));
    }

    #[test]
    fn test_layout() {
        let code = generate_header(
            r#"
            JSON typedef struct {
                struct role *role;
            } User;
            JSON struct role { int id; };
            "#,
        );
        let forward = code.find("// Forward declarations").unwrap();
        let prototype = code.find("JSGEN_DEF int _parse_role(Jsp *jsp, struct role *out, JsGenAllocator *a);").unwrap();
        let user = code.find("JSGEN_DEF int _parse_User(Jsp *jsp, User *out, JsGenAllocator *a) {").unwrap();
        let role = code.find("JSGEN_DEF int _parse_role(Jsp *jsp, struct role *out, JsGenAllocator *a) {").unwrap();
        assert!(forward < prototype && prototype < user && user < role);
        assert!(code.starts_with("// @generated"));
        assert!(code.ends_with("\n#endif // MODELS_G_H\n"));
    }

    #[test]
    fn test_model_name_resolution() {
        let code = generate_header(
            r#"
            JSON typedef struct role { int id; } Role;
            JSON struct user { struct role *role; Role main; };
            "#,
        );
        assert_contains(&code, "err = _parse_Role(jsp, out->role, a);");
        assert_contains(&code, "err = _parse_Role(jsp, &out->main, a);");
        assert_contains(&code, "if (_stringify_Role(jsb, in->role)) return -1;");
    }
}
