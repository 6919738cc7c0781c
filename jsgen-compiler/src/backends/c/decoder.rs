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

//! Generation of the parse routines.

use super::{indent, model_name};
use crate::analyzer::Scope;
use crate::ast;
use crate::types::{self, Decode, Element, Scalar, Shape, Storage};

/// Collects the key dispatch branches of a parse routine,
/// one per dispatchable field.
pub struct FieldParser<'a> {
    scope: &'a Scope<'a>,
    model: &'a ast::Model,
    branches: Vec<(String, String)>,
}

/// Conversion of the current decoded value to a scalar leaf type.
fn scalar_value(scalar: Scalar, leaf: &str) -> String {
    match Decode::from(scalar) {
        Decode::Boolean => "jsp->boolean".to_owned(),
        decode => format!("({leaf})jsp->{}", decode.accessor()),
    }
}

fn check(call: &str) -> String {
    format!("err = {call};\nif (err) return err;")
}

fn allocate(target: &str, size: &str) -> String {
    format!("{target} = jsgen_malloc(a, {size});\nif ({target} == NULL) return JSGEN_ERR_ALLOC;")
}

impl<'a> FieldParser<'a> {
    pub fn new(scope: &'a Scope<'a>, model: &'a ast::Model) -> FieldParser<'a> {
        FieldParser { scope, model, branches: vec![] }
    }

    /// Add the dispatch branch of a field. Counter fields and
    /// unsupported fields get no branch; their keys are skipped.
    pub fn add(&mut self, field: &ast::Field) {
        if field.is_counter {
            return;
        }
        if let Some(body) = self.parse_field(field) {
            self.branches.push((field.key().to_owned(), body));
        }
    }

    fn counter_assignment(&self, field: &ast::Field, value: &str) -> String {
        match self.model.counter_of(field) {
            Some(counter) => format!("\nout->{} = {value};", counter.id),
            None => String::new(),
        }
    }

    fn parse_field(&self, field: &ast::Field) -> Option<String> {
        let target = format!("out->{}", field.id);
        let shape = Shape::of(field);

        if field.json_literal && shape == Shape::String {
            return Some(self.parse_literal(&target));
        }

        Some(match shape {
            Shape::Scalar(scalar) => {
                let decode = types::decode(&field.type_text())?;
                let value = match decode {
                    Decode::Boolean => scalar_value(scalar, &field.leaf),
                    _ => format!("({})jsp->{}", field.leaf, decode.accessor()),
                };
                format!("{}\n{target} = {value};", check("jsp_value(jsp)"))
            }
            Shape::OptionalScalar(scalar) => format!(
                "{}
if (jsp->type == JSP_TYPE_NULL) {{
    {target} = NULL;
}} else {{
{}
    *{target} = {};
}}",
                check("jsp_value(jsp)"),
                indent(&allocate(&target, &format!("sizeof(*{target})")), 1),
                scalar_value(scalar, &field.leaf),
            ),
            Shape::String => format!(
                "{}
size_t len = jsp->string ? strlen(jsp->string) : 0;{}
if (len > 0) {{
{}
    memcpy({target}, jsp->string, len + 1);
}} else {{
    {target} = NULL;
}}",
                check("jsp_value(jsp)"),
                self.counter_assignment(field, "len"),
                indent(&allocate(&target, "len + 1"), 1),
            ),
            Shape::StringBuffer => format!(
                "{}
memset({target}, 0, sizeof({target}));
if (jsp->string) strncpy({target}, jsp->string, sizeof({target}) - 1);{}",
                check("jsp_value(jsp)"),
                self.counter_assignment(field, &format!("strlen({target})")),
            ),
            Shape::Array { element, storage } => self.parse_array(field, element, storage)?,
            Shape::ModelPointer(id) => self.parse_model_pointer(id, &target),
            Shape::ModelValue(id) => {
                check(&format!("_parse_{}(jsp, &{target}, a)", model_name(self.scope, id)))
            }
            Shape::Unsupported(_) => return None,
        })
    }

    /// Copy the raw text of an object or array value, or store NULL
    /// for any other value.
    fn parse_literal(&self, target: &str) -> String {
        format!(
            r#"{}
if (jsp->type == JSP_TYPE_OBJECT || jsp->type == JSP_TYPE_ARRAY) {{
    size_t start = jsp->offset - 1;
    int depth = 1;
    bool in_string = false;
    while (jsp->offset < jsp->length && depth > 0) {{
        char c = jsp->buffer[jsp->offset++];
        if (in_string) {{
            if (c == '\\' && jsp->offset < jsp->length) jsp->offset++;
            else if (c == '"') in_string = false;
        }} else if (c == '"') {{
            in_string = true;
        }} else if (c == '{{' || c == '[') {{
            depth++;
        }} else if (c == '}}' || c == ']') {{
            depth--;
        }}
    }}
    if (depth != 0) return JSGEN_ERR_SYNTAX;
    size_t len = jsp->offset - start;
{}
    memcpy({target}, &jsp->buffer[start], len);
    {target}[len] = '\0';
{}
}} else {{
    {target} = NULL;
}}"#,
            check("jsp_value(jsp)"),
            indent(&allocate(target, "len + 1"), 1),
            indent(&check("jsp_skip_end(jsp)"), 1),
        )
    }

    fn parse_model_pointer(&self, id: &str, target: &str) -> String {
        format!(
            "{}
if (jsp->type == JSP_TYPE_NULL) {{
    {target} = NULL;
}} else {{
{}
{}
}}",
            check("jsp_value(jsp)"),
            indent(&allocate(target, &format!("sizeof(*{target})")), 1),
            indent(&check(&format!("_parse_{}(jsp, {target}, a)", model_name(self.scope, id))), 1),
        )
    }

    fn parse_element(&self, element: Element<'_>, leaf: &str, target: &str) -> String {
        match element {
            Element::Scalar(scalar) => {
                format!("{}\n{target} = {};", check("jsp_value(jsp)"), scalar_value(scalar, leaf))
            }
            Element::String => format!(
                "{}
if (jsp->string) {{
    size_t n = strlen(jsp->string);
{}
    memcpy({target}, jsp->string, n + 1);
}} else {{
    {target} = NULL;
}}",
                check("jsp_value(jsp)"),
                indent(&allocate(target, "n + 1"), 1),
            ),
            Element::Model(id) => {
                check(&format!("_parse_{}(jsp, &{target}, a)", model_name(self.scope, id)))
            }
            Element::ModelPointer(id) => self.parse_model_pointer(id, target),
        }
    }

    fn parse_array(
        &self,
        field: &ast::Field,
        element: Element<'_>,
        storage: Storage,
    ) -> Option<String> {
        let target = format!("out->{}", field.id);
        let counter = self.model.counter_of(field);
        Some(match (storage, counter) {
            (Storage::Allocated, Some(_)) => format!(
                "{}
size_t len = jsp_array_length(jsp);{}
{}
memset({target}, 0, sizeof(*{target}) * len);
for (size_t i = 0; i < len; i++) {{
{}
}}
{}",
                check("jsp_begin_array(jsp)"),
                self.counter_assignment(field, "len"),
                allocate(&target, &format!("sizeof(*{target}) * len")),
                indent(&self.parse_element(element, &field.leaf, &format!("{target}[i]")), 1),
                check("jsp_end_array(jsp)"),
            ),
            // Without a known length the storage cannot be sized.
            (Storage::Allocated, None) => check("jsp_skip(jsp)"),
            (Storage::Fixed, _) => format!(
                "{}
size_t count = 0;
while (!jsgen__jsp_array_done(jsp)) {{
    if (count < sizeof({target}) / sizeof({target}[0])) {{
{}
        count++;
    }} else {{
{}
    }}
}}{}
{}",
                check("jsp_begin_array(jsp)"),
                indent(&self.parse_element(element, &field.leaf, &format!("{target}[count]")), 2),
                indent(&check("jsp_skip(jsp)"), 2),
                self.counter_assignment(field, "count"),
                check("jsp_end_array(jsp)"),
            ),
        })
    }

    /// Generate the `_parse_<Name>` routine.
    pub fn done(self) -> String {
        let name = &self.model.name;
        let ty = &self.model.id;
        let skip = check("jsp_skip(jsp)");
        let dispatch = if self.branches.is_empty() {
            skip
        } else {
            let mut cascade = String::new();
            for (key, body) in &self.branches {
                cascade.push_str(&format!(
                    "if (strcmp(jsp->string, \"{key}\") == 0) {{\n{}\n}} else ",
                    indent(body, 1)
                ));
            }
            cascade.push_str(&format!("{{\n{}\n}}", indent(&skip, 1)));
            cascade
        };

        format!(
            "JSGEN_DEF int _parse_{name}(Jsp *jsp, {ty} *out, JsGenAllocator *a) {{
    int err;
    (void)a;
    memset(out, 0, sizeof(*out));
    err = jsp_begin_object(jsp);
    if (err) return err;
    while (jsp_key(jsp) == 0) {{
{}
    }}
    return jsp_end_object(jsp);
}}
",
            indent(&dispatch, 2)
        )
    }
}

/// Prototypes of the parse routines of a model.
pub fn declarations(model: &ast::Model) -> String {
    let name = &model.name;
    let ty = &model.id;
    format!(
        "JSGEN_DEF int _parse_{name}(Jsp *jsp, {ty} *out, JsGenAllocator *a);
JSGEN_DEF int parse_{name}(const char *json, {ty} *out, JsGenAllocator *a);
JSGEN_DEF int _parse_{name}_list(Jsp *jsp, {ty} **out, size_t *out_count, JsGenAllocator *a);
JSGEN_DEF int parse_{name}_list(const char *json, {ty} **out, size_t *out_count, JsGenAllocator *a);
"
    )
}

fn generate_entry_points(model: &ast::Model) -> String {
    let name = &model.name;
    let ty = &model.id;
    format!(
        "JSGEN_DEF int parse_{name}(const char *json, {ty} *out, JsGenAllocator *a) {{
    Jsp jsp = {{0}};
    int err = jsp_init(&jsp, json, strlen(json));
    if (err) return err;
    err = _parse_{name}(&jsp, out, a);
    jsp_free(&jsp);
    return err;
}}

JSGEN_DEF int _parse_{name}_list(Jsp *jsp, {ty} **out, size_t *out_count, JsGenAllocator *a) {{
    int err;
    *out = NULL;
    *out_count = 0;
    err = jsp_begin_array(jsp);
    if (err) return err;
    size_t len = jsp_array_length(jsp);
    {ty} *items = jsgen_malloc(a, sizeof(*items) * len);
    if (items == NULL) return JSGEN_ERR_ALLOC;
    for (size_t i = 0; i < len; i++) {{
        err = _parse_{name}(jsp, &items[i], a);
        if (err) return err;
    }}
    err = jsp_end_array(jsp);
    if (err) return err;
    *out = items;
    *out_count = len;
    return 0;
}}

JSGEN_DEF int parse_{name}_list(const char *json, {ty} **out, size_t *out_count, JsGenAllocator *a) {{
    Jsp jsp = {{0}};
    int err = jsp_init(&jsp, json, strlen(json));
    if (err) return err;
    err = _parse_{name}_list(&jsp, out, out_count, a);
    jsp_free(&jsp);
    return err;
}}
"
    )
}

/// Generate the parse unit of a model.
pub fn generate(scope: &Scope<'_>, model: &ast::Model) -> String {
    let mut parser = FieldParser::new(scope, model);
    for field in &model.fields {
        parser.add(field);
    }
    format!("\n{}\n{}", parser.done(), generate_entry_points(model))
}
