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

//! Generation of the stringify routines.

use super::{indent, model_name};
use crate::analyzer::Scope;
use crate::ast;
use crate::types::{self, Element, Encode, Shape, Storage};

/// Collects the statements emitting each field of a model.
pub struct FieldSerializer<'a> {
    scope: &'a Scope<'a>,
    model: &'a ast::Model,
    code: Vec<String>,
}

fn encode_value(encode: Encode, value: &str) -> String {
    let call = match encode {
        Encode::Int => format!("jsb_int(jsb, {value})"),
        Encode::Number { precision } => format!("jsb_number(jsb, {value}, {precision})"),
        Encode::Bool => format!("jsb_bool(jsb, {value})"),
        Encode::String => format!("jsb_string(jsb, {value})"),
    };
    format!("if ({call}) return -1;")
}

/// Emit `null` for NULL pointers, or the pointed value.
fn nullable(value: &str, call: &str) -> String {
    format!(
        "if ({value} == NULL) {{
    if (jsb_null(jsb)) return -1;
}} else if ({call}) {{
    return -1;
}}"
    )
}

impl<'a> FieldSerializer<'a> {
    pub fn new(scope: &'a Scope<'a>, model: &'a ast::Model) -> FieldSerializer<'a> {
        FieldSerializer { scope, model, code: vec![] }
    }

    /// Add the statements emitting a field. Counter fields and
    /// unsupported fields are omitted from the output.
    pub fn add(&mut self, field: &ast::Field) {
        if field.is_counter {
            return;
        }
        if let Some(code) = self.serialize_field(field) {
            self.code.push(code);
        }
    }

    fn serialize_field(&self, field: &ast::Field) -> Option<String> {
        let value = format!("in->{}", field.id);
        let key = format!("if (jsb_key(jsb, \"{}\")) return -1;", field.key());
        let shape = Shape::of(field);

        if field.json_literal && shape == Shape::String {
            return Some(format!(
                "{key}
if ({value} != NULL && {value}[0] != '\\0') {{
    if (jsgen__jsb_raw(jsb, {value}, strlen({value}))) return -1;
}} else {{
    if (jsb_null(jsb)) return -1;
}}"
            ));
        }

        let (guarded, code) = match shape {
            Shape::Scalar(_) => (false, encode_value(types::encode(&field.type_text())?, &value)),
            Shape::OptionalScalar(_) => (
                true,
                encode_value(types::encode(&field.type_text())?, &format!("*{value}")),
            ),
            Shape::String => (true, encode_value(Encode::String, &value)),
            Shape::StringBuffer => (false, encode_value(Encode::String, &value)),
            Shape::Array { element, storage } => {
                (storage == Storage::Allocated, self.serialize_array(field, element, storage))
            }
            Shape::ModelPointer(id) => (
                true,
                format!("if (_stringify_{}(jsb, {value})) return -1;", model_name(self.scope, id)),
            ),
            Shape::ModelValue(id) => (
                false,
                format!("if (_stringify_{}(jsb, &{value})) return -1;", model_name(self.scope, id)),
            ),
            Shape::Unsupported(_) => return None,
        };

        let code = format!("{key}\n{code}");
        Some(if guarded {
            format!("if ({value} != NULL) {{\n{}\n}}", indent(&code, 1))
        } else {
            code
        })
    }

    fn serialize_element(&self, element: Element<'_>, value: &str) -> String {
        match element {
            Element::Scalar(scalar) => encode_value(types::encode_scalar(scalar), value),
            Element::String => nullable(value, &format!("jsb_string(jsb, {value})")),
            Element::Model(id) => {
                format!("if (_stringify_{}(jsb, &{value})) return -1;", model_name(self.scope, id))
            }
            Element::ModelPointer(id) => nullable(
                value,
                &format!("_stringify_{}(jsb, {value})", model_name(self.scope, id)),
            ),
        }
    }

    fn serialize_array(
        &self,
        field: &ast::Field,
        element: Element<'_>,
        storage: Storage,
    ) -> String {
        let value = format!("in->{}", field.id);
        let bound = match (self.model.counter_of(field), storage) {
            (Some(counter), Storage::Allocated) => format!("i < (size_t)in->{}", counter.id),
            (Some(counter), Storage::Fixed) => format!(
                "i < (size_t)in->{} && i < sizeof({value}) / sizeof({value}[0])",
                counter.id
            ),
            // The number of elements is unknown.
            (None, _) => {
                return "if (jsb_begin_array(jsb)) return -1;\nif (jsb_end_array(jsb)) return -1;"
                    .to_owned()
            }
        };
        format!(
            "if (jsb_begin_array(jsb)) return -1;
for (size_t i = 0; {bound}; i++) {{
{}
}}
if (jsb_end_array(jsb)) return -1;",
            indent(&self.serialize_element(element, &format!("{value}[i]")), 1)
        )
    }

    /// Generate the `_stringify_<Name>` routine.
    pub fn done(self) -> String {
        let name = &self.model.name;
        let ty = &self.model.id;
        let fields =
            if self.code.is_empty() { "(void)in;".to_owned() } else { self.code.join("\n") };
        format!(
            "JSGEN_DEF int _stringify_{name}(Jsb *jsb, const {ty} *in) {{
    if (jsb_begin_object(jsb)) return -1;
{}
    return jsb_end_object(jsb);
}}
",
            indent(&fields, 1)
        )
    }
}

/// Prototypes and convenience macros of the stringify routines.
pub fn declarations(model: &ast::Model) -> String {
    let name = &model.name;
    let ty = &model.id;
    format!(
        "JSGEN_DEF int _stringify_{name}(Jsb *jsb, const {ty} *in);
JSGEN_DEF char *stringify_{name}_indent(const {ty} *in, int indent);
JSGEN_DEF char *stringify_{name}_list_indent(const {ty} *in, size_t count, int indent);
#define stringify_{name}(in) stringify_{name}_indent((in), 0)
#define stringify_{name}_list(in, count) stringify_{name}_list_indent((in), (count), 0)
"
    )
}

fn generate_entry_points(model: &ast::Model) -> String {
    let name = &model.name;
    let ty = &model.id;
    format!(
        "JSGEN_DEF char *stringify_{name}_indent(const {ty} *in, int indent) {{
    Jsb jsb = {{0}};
    jsb.pp = indent;
    if (_stringify_{name}(&jsb, in)) {{
        jsb_free(&jsb);
        return NULL;
    }}
    return jsb_get(&jsb);
}}

JSGEN_DEF char *stringify_{name}_list_indent(const {ty} *in, size_t count, int indent) {{
    Jsb jsb = {{0}};
    jsb.pp = indent;
    int err = jsb_begin_array(&jsb);
    for (size_t i = 0; !err && i < count; i++) {{
        err = _stringify_{name}(&jsb, &in[i]);
    }}
    if (!err) err = jsb_end_array(&jsb);
    if (err) {{
        jsb_free(&jsb);
        return NULL;
    }}
    return jsb_get(&jsb);
}}
"
    )
}

/// Generate the stringify unit of a model.
pub fn generate(scope: &Scope<'_>, model: &ast::Model) -> String {
    let mut serializer = FieldSerializer::new(scope, model);
    for field in &model.fields {
        serializer.add(field);
    }
    format!("\n{}\n{}", serializer.done(), generate_entry_points(model))
}
