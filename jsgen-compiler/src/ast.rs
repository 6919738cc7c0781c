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

use codespan_reporting::diagnostic;
use codespan_reporting::files;
use serde::Serialize;
use std::fmt;

/// File identifier.
/// References a source file in the source database.
pub type FileId = usize;

/// Source database.
/// Stores the source file contents for reference.
pub type SourceDatabase = files::SimpleFiles<String, String>;

#[derive(Debug, Default, Copy, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    /// Byte offset into the file (counted from zero).
    pub offset: usize,
    /// Line number (counted from zero).
    pub line: usize,
    /// Column number (counted from zero)
    pub column: usize,
}

#[derive(Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRange {
    pub file: FileId,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

/// Generation directions selected by an annotation marker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Directions {
    pub parse: bool,
    pub stringify: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename = "field")]
pub struct Field {
    pub loc: SourceRange,
    /// Declared member name.
    pub id: String,
    /// JSON key overriding the declared name.
    pub alias: Option<String>,
    /// Base type without pointer or array declarators,
    /// e.g. `unsigned int`, `struct role`, `enum color`.
    pub leaf: String,
    /// Levels of pointer indirection.
    pub pointers: usize,
    /// Bound of the first bracket declarator, kept verbatim.
    pub array_size: Option<String>,
    /// Number of bracket declarators.
    pub dimensions: usize,
    /// Name of the sibling field holding the element count.
    pub counter: Option<String>,
    /// Set when a sibling array names this field as its counter.
    pub is_counter: bool,
    pub json_literal: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename = "model")]
pub struct Model {
    pub loc: SourceRange,
    /// Declared type name: the typedef name, or `struct <tag>`.
    pub id: String,
    /// Bare name used to build the generated identifiers.
    pub name: String,
    pub tag: Option<String>,
    pub parse: bool,
    pub stringify: bool,
    pub fields: Vec<Field>,
}

#[derive(Debug, Serialize, Clone)]
pub struct File {
    pub file: FileId,
    pub models: Vec<Model>,
}

impl SourceLocation {
    /// Construct a new source location.
    ///
    /// The `line_starts` indicates the byte offsets where new lines
    /// start in the file. The first element should thus be `0` since
    /// every file has at least one line starting at offset `0`.
    pub fn new(offset: usize, line_starts: &[usize]) -> SourceLocation {
        let mut loc = SourceLocation { offset, line: 0, column: offset };
        for (line, start) in line_starts.iter().enumerate() {
            if *start > offset {
                break;
            }
            loc = SourceLocation { offset, line, column: offset - start };
        }
        loc
    }
}

impl SourceRange {
    pub fn primary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::primary(self.file, self.start.offset..self.end.offset)
    }
    pub fn secondary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::secondary(self.file, self.start.offset..self.end.offset)
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}:{}-{}", self.start.line, self.start.column, self.end.column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRange").finish_non_exhaustive()
    }
}

impl Directions {
    pub const BOTH: Directions = Directions { parse: true, stringify: true };
    pub const PARSE: Directions = Directions { parse: true, stringify: false };
    pub const STRINGIFY: Directions = Directions { parse: false, stringify: true };
}

impl Field {
    /// JSON key of the field: the alias if present, else the declared name.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }

    /// Full type text, e.g. `char *` or `struct role **`.
    pub fn type_text(&self) -> String {
        if self.pointers == 0 {
            self.leaf.clone()
        } else {
            format!("{} {}", self.leaf, "*".repeat(self.pointers))
        }
    }

    /// Pointer fields include fixed-size arrays, which decay to pointers.
    pub fn is_pointer(&self) -> bool {
        self.pointers > 0 || self.dimensions > 0
    }
}

impl Model {
    /// Return the counter field of the selected field, if it was resolved.
    pub fn counter_of(&self, field: &Field) -> Option<&Field> {
        let counter = field.counter.as_deref()?;
        self.fields.iter().find(|f| f.id == counter && f.is_counter && f.id != field.id)
    }

    /// Iterate over the fields present in the JSON representation,
    /// i.e. all fields except counters.
    pub fn json_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_counter)
    }
}
