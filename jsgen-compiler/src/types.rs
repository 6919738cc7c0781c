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

//! Classification of C types into JSON primitives.

use crate::ast;

/// Fixed number of fractional digits used to encode floating point values.
pub const FLOAT_PRECISION: usize = 5;

/// Scalar category of a leaf type name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Scalar {
    Integer,
    Float,
    Boolean,
}

/// Decode accessor of the JSON decoding facility.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decode {
    Number,
    Boolean,
    String,
}

/// Encode primitive of the JSON construction facility.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Encode {
    Int,
    Number { precision: usize },
    Bool,
    String,
}

/// Element type of an array field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Element<'a> {
    Scalar(Scalar),
    String,
    /// Model stored by value.
    Model(&'a str),
    /// Pointer to a model, may be NULL.
    ModelPointer(&'a str),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Pointer to storage obtained from the allocator.
    Allocated,
    /// Fixed size array declared with a bracket bound.
    Fixed,
}

/// Generation strategy for a field, derived from its declaration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape<'a> {
    Scalar(Scalar),
    /// Pointer to a single scalar, NULL when absent.
    OptionalScalar(Scalar),
    /// `char *` string.
    String,
    /// `char name[N]` string stored in place.
    StringBuffer,
    Array { element: Element<'a>, storage: Storage },
    ModelPointer(&'a str),
    ModelValue(&'a str),
    Unsupported(&'static str),
}

const INTEGER_WORDS: &[&str] = &["signed", "unsigned", "short", "long", "int", "char"];

const INTEGER_TYPEDEFS: &[&str] = &[
    "size_t",
    "ssize_t",
    "ptrdiff_t",
    "intptr_t",
    "uintptr_t",
    "intmax_t",
    "uintmax_t",
    "int8_t",
    "int16_t",
    "int32_t",
    "int64_t",
    "uint8_t",
    "uint16_t",
    "uint32_t",
    "uint64_t",
];

/// Classify a leaf type name, e.g. `unsigned long` or `enum color`.
/// Returns `None` for names referring to other models.
pub fn scalar(leaf: &str) -> Option<Scalar> {
    let words: Vec<&str> = leaf.split_whitespace().collect();
    match words.as_slice() {
        ["bool"] | ["_Bool"] => Some(Scalar::Boolean),
        ["float"] | ["double"] | ["long", "double"] => Some(Scalar::Float),
        ["enum", _] => Some(Scalar::Integer),
        [name] if INTEGER_TYPEDEFS.contains(name) => Some(Scalar::Integer),
        [] => None,
        words if words.iter().all(|w| INTEGER_WORDS.contains(w)) => Some(Scalar::Integer),
        _ => None,
    }
}

/// Split a type text into its leaf name and pointer depth.
fn split_pointers(type_text: &str) -> (String, usize) {
    let mut text = type_text.trim();
    let mut pointers = 0;
    while let Some(rest) = text.strip_suffix('*') {
        text = rest.trim_end();
        pointers += 1;
    }
    (text.split_whitespace().collect::<Vec<_>>().join(" "), pointers)
}

fn is_char(leaf: &str) -> bool {
    matches!(leaf, "char" | "signed char" | "unsigned char")
}

/// Decode table lookup over a type text such as `char *` or `int`.
/// Character pointers decode as strings, pointer markers are otherwise
/// stripped until the leaf is found.
pub fn decode(type_text: &str) -> Option<Decode> {
    let (leaf, pointers) = split_pointers(type_text);
    if is_char(&leaf) && pointers > 0 {
        return Some(Decode::String);
    }
    match scalar(&leaf)? {
        Scalar::Integer | Scalar::Float => Some(Decode::Number),
        Scalar::Boolean => Some(Decode::Boolean),
    }
}

/// Encode table lookup, following the same stripping rules as [`decode`].
pub fn encode(type_text: &str) -> Option<Encode> {
    let (leaf, pointers) = split_pointers(type_text);
    if is_char(&leaf) && pointers > 0 {
        return Some(Encode::String);
    }
    scalar(&leaf).map(encode_scalar)
}

pub fn encode_scalar(scalar: Scalar) -> Encode {
    match scalar {
        Scalar::Integer => Encode::Int,
        Scalar::Float => Encode::Number { precision: FLOAT_PRECISION },
        Scalar::Boolean => Encode::Bool,
    }
}

impl Decode {
    /// Name of the decoded value member of the decoding context.
    pub fn accessor(&self) -> &'static str {
        match self {
            Decode::Number => "number",
            Decode::Boolean => "boolean",
            Decode::String => "string",
        }
    }
}

impl From<Scalar> for Decode {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Integer | Scalar::Float => Decode::Number,
            Scalar::Boolean => Decode::Boolean,
        }
    }
}

/// Classify the element of an array, given the pointer depth left
/// once the array level is removed.
fn element(leaf: &str, pointers: usize) -> Result<Element<'_>, &'static str> {
    match (scalar(leaf), pointers) {
        (_, 1) if is_char(leaf) => Ok(Element::String),
        (Some(scalar), 0) => Ok(Element::Scalar(scalar)),
        (Some(_), _) => Err("arrays of scalar pointers are not supported"),
        (None, 0) => Ok(Element::Model(leaf)),
        (None, 1) => Ok(Element::ModelPointer(leaf)),
        (None, _) => Err("too many levels of indirection"),
    }
}

impl<'a> Shape<'a> {
    /// Derive the shape of a field from its declaration.
    pub fn of(field: &'a ast::Field) -> Shape<'a> {
        let leaf = field.leaf.as_str();
        let pointers = field.pointers;

        if field.dimensions > 1 {
            return Shape::Unsupported("multi-dimensional arrays are not supported");
        }

        if field.dimensions == 1 {
            if is_char(leaf) && pointers == 0 {
                return Shape::StringBuffer;
            }
            return match element(leaf, pointers) {
                Ok(element) => Shape::Array { element, storage: Storage::Fixed },
                Err(reason) => Shape::Unsupported(reason),
            };
        }

        if is_char(leaf) && pointers == 1 {
            return Shape::String;
        }

        if field.counter.is_some() {
            if pointers == 0 {
                return Shape::Unsupported("`sized_by` requires a pointer field");
            }
            return match element(leaf, pointers - 1) {
                Ok(element) => Shape::Array { element, storage: Storage::Allocated },
                Err(reason) => Shape::Unsupported(reason),
            };
        }

        match (scalar(leaf), pointers) {
            (Some(scalar), 0) => Shape::Scalar(scalar),
            (Some(scalar), 1) => Shape::OptionalScalar(scalar),
            (None, 0) => Shape::ModelValue(leaf),
            (None, 1) => Shape::ModelPointer(leaf),
            (_, _) => Shape::Unsupported("multiple levels of indirection require `sized_by`"),
        }
    }

    /// Name of the referenced model type, if any.
    pub fn model(&self) -> Option<&'a str> {
        match *self {
            Shape::ModelPointer(id)
            | Shape::ModelValue(id)
            | Shape::Array { element: Element::Model(id) | Element::ModelPointer(id), .. } => {
                Some(id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn field(leaf: &str, pointers: usize) -> ast::Field {
        ast::Field {
            loc: ast::SourceRange::default(),
            id: "f".to_owned(),
            alias: None,
            leaf: leaf.to_owned(),
            pointers,
            array_size: None,
            dimensions: 0,
            counter: None,
            is_counter: false,
            json_literal: false,
        }
    }

    #[test]
    fn test_decode_table() {
        assert_eq!(decode("int"), Some(Decode::Number));
        assert_eq!(decode("size_t"), Some(Decode::Number));
        assert_eq!(decode("unsigned long long"), Some(Decode::Number));
        assert_eq!(decode("double"), Some(Decode::Number));
        assert_eq!(decode("bool"), Some(Decode::Boolean));
        assert_eq!(decode("char*"), Some(Decode::String));
        assert_eq!(decode("char *"), Some(Decode::String));
        assert_eq!(decode("char **"), Some(Decode::String));
        assert_eq!(decode("int *"), Some(Decode::Number));
        assert_eq!(decode("Role"), None);
        assert_eq!(decode("struct role *"), None);
    }

    #[test]
    fn test_encode_table() {
        assert_eq!(encode("int"), Some(Encode::Int));
        assert_eq!(encode("long"), Some(Encode::Int));
        assert_eq!(encode("uint8_t"), Some(Encode::Int));
        assert_eq!(encode("enum color"), Some(Encode::Int));
        assert_eq!(encode("float"), Some(Encode::Number { precision: 5 }));
        assert_eq!(encode("double *"), Some(Encode::Number { precision: 5 }));
        assert_eq!(encode("bool"), Some(Encode::Bool));
        assert_eq!(encode("char *"), Some(Encode::String));
        assert_eq!(encode("User"), None);
    }

    #[test]
    fn test_scalar_shapes() {
        assert_eq!(Shape::of(&field("int", 0)), Shape::Scalar(Scalar::Integer));
        assert_eq!(Shape::of(&field("char", 0)), Shape::Scalar(Scalar::Integer));
        assert_eq!(Shape::of(&field("double", 1)), Shape::OptionalScalar(Scalar::Float));
        assert_eq!(Shape::of(&field("char", 1)), Shape::String);
    }

    #[test]
    fn test_model_shapes() {
        assert_eq!(Shape::of(&field("Role", 0)), Shape::ModelValue("Role"));
        assert_eq!(Shape::of(&field("struct role", 1)), Shape::ModelPointer("struct role"));
        assert_eq!(Shape::of(&field("struct role", 1)).model(), Some("struct role"));
        assert!(matches!(Shape::of(&field("Role", 2)), Shape::Unsupported(_)));
    }

    #[test]
    fn test_array_shapes() {
        let mut values = field("float", 1);
        values.counter = Some("count".to_owned());
        assert_eq!(
            Shape::of(&values),
            Shape::Array { element: Element::Scalar(Scalar::Float), storage: Storage::Allocated }
        );

        let mut tags = field("char", 2);
        tags.counter = Some("count".to_owned());
        assert_eq!(
            Shape::of(&tags),
            Shape::Array { element: Element::String, storage: Storage::Allocated }
        );

        let mut roles = field("Role", 1);
        roles.counter = Some("count".to_owned());
        assert_eq!(
            Shape::of(&roles),
            Shape::Array { element: Element::Model("Role"), storage: Storage::Allocated }
        );

        let mut scores = field("int", 0);
        scores.dimensions = 1;
        scores.array_size = Some("8".to_owned());
        assert_eq!(
            Shape::of(&scores),
            Shape::Array { element: Element::Scalar(Scalar::Integer), storage: Storage::Fixed }
        );

        let mut name = field("char", 0);
        name.dimensions = 1;
        assert_eq!(Shape::of(&name), Shape::StringBuffer);
    }

    #[test]
    fn test_unsupported_shapes() {
        let mut counted_scalar = field("int", 0);
        counted_scalar.counter = Some("count".to_owned());
        assert!(matches!(Shape::of(&counted_scalar), Shape::Unsupported(_)));

        let mut matrix = field("int", 0);
        matrix.dimensions = 2;
        assert!(matches!(Shape::of(&matrix), Shape::Unsupported(_)));

        assert!(matches!(Shape::of(&field("int", 2)), Shape::Unsupported(_)));
    }
}
