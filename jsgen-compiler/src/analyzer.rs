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

use codespan_reporting::diagnostic::{Diagnostic, Severity};
use codespan_reporting::files;
use codespan_reporting::term;
use codespan_reporting::term::termcolor;
use std::collections::HashMap;
use std::fmt;

use crate::ast::*;
use crate::types::{self, Shape};

/// List of unique errors reported as analyzer diagnostics.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    DuplicateModelIdentifier = 1,
    UndeclaredTypeIdentifier = 2,
    MissingDirection = 3,
    UndeclaredCounterIdentifier = 4,
    InvalidCounterIdentifier = 5,
    InvalidJsonLiteral = 6,
    UnsupportedField = 7,
    DuplicateFieldKey = 8,
    InvalidAnnotationTarget = 9,
    MalformedAnnotation = 10,
    UnsupportedDeclaration = 11,
    UnterminatedDeclaration = 12,
    LexicalError = 13,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        format!("{}", code)
    }
}

/// Aggregate analyzer diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic<FileId>>,
}

/// Gather information about the accumulated models.
#[derive(Debug)]
pub struct Scope<'d> {
    /// Models indexed by declared name, simple name, and
    /// `struct <tag>` form. The first declaration wins.
    pub typedef: HashMap<String, &'d Model>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn push(&mut self, diagnostic: Diagnostic<FileId>) {
        self.diagnostics.push(diagnostic)
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.diagnostics.extend(other.diagnostics)
    }

    /// Test if any of the diagnostics is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity >= Severity::Error)
    }

    fn err_or_warnings(self) -> Result<Diagnostics, Diagnostics> {
        if self.has_errors() {
            Err(self)
        } else {
            Ok(self)
        }
    }

    pub fn emit(
        &self,
        sources: &SourceDatabase,
        writer: &mut dyn termcolor::WriteColor,
    ) -> Result<(), files::Error> {
        let config = term::Config::default();
        for d in self.diagnostics.iter() {
            term::emit_to_write_style(writer, &config, sources, d)?;
        }
        Ok(())
    }
}

impl<'d> Scope<'d> {
    pub fn new(models: &'d [Model]) -> Scope<'d> {
        let mut scope = Scope { typedef: Default::default() };
        for model in models {
            let tag = model.tag.as_ref().map(|tag| format!("struct {tag}"));
            for key in [Some(model.id.clone()), Some(model.name.clone()), tag].into_iter().flatten()
            {
                scope.typedef.entry(key).or_insert(model);
            }
        }
        scope
    }

    /// Return the model declaration for the selected type name.
    /// A `struct <name>` reference falls back to the simple name.
    pub fn get(&self, type_id: &str) -> Option<&'d Model> {
        self.typedef.get(type_id).copied().or_else(|| {
            type_id
                .strip_prefix("struct ")
                .and_then(|name| self.typedef.get(name.trim()).copied())
        })
    }
}

/// Link `sized_by` arrays to their counter fields.
///
/// Counter names are resolved within the same model only; the first
/// field with a matching declared name is marked as a counter, unless
/// it is a pointer.
pub fn resolve_counters(model: &mut Model, diagnostics: &mut Diagnostics) {
    for index in 0..model.fields.len() {
        let Some(counter) = model.fields[index].counter.clone() else {
            continue;
        };
        let field = &model.fields[index];
        match model.fields.iter().position(|f| f.id == counter) {
            None => diagnostics.push(
                Diagnostic::warning()
                    .with_code(ErrorCode::UndeclaredCounterIdentifier)
                    .with_message(format!(
                        "undeclared counter identifier `{}` in `{}`",
                        counter, model.id
                    ))
                    .with_labels(vec![field.loc.primary()])
                    .with_notes(vec![format!(
                        "note: `{}` is generated without a known length",
                        field.id
                    )]),
            ),
            Some(position) if position == index => diagnostics.push(
                Diagnostic::warning()
                    .with_code(ErrorCode::InvalidCounterIdentifier)
                    .with_message(format!("field `{}` cannot count its own elements", field.id))
                    .with_labels(vec![field.loc.primary()]),
            ),
            Some(position) if model.fields[position].is_pointer() => {
                let target = &model.fields[position];
                diagnostics.push(
                    Diagnostic::warning()
                        .with_code(ErrorCode::InvalidCounterIdentifier)
                        .with_message(format!(
                            "counter `{}` of `{}` is a pointer field",
                            counter, field.id
                        ))
                        .with_labels(vec![
                            field.loc.primary(),
                            target.loc.secondary().with_message(format!(
                                "`{}` is declared here with type `{}`",
                                target.id,
                                target.type_text()
                            )),
                        ])
                        .with_notes(vec![format!(
                            "note: `{}` is generated without a known length",
                            field.id
                        )]),
                )
            }
            Some(position) => {
                let target = &model.fields[position];
                if types::scalar(&target.leaf) != Some(types::Scalar::Integer) {
                    diagnostics.push(
                        Diagnostic::warning()
                            .with_code(ErrorCode::InvalidCounterIdentifier)
                            .with_message(format!(
                                "counter `{}` of `{}` is not an integer field",
                                counter, field.id
                            ))
                            .with_labels(vec![
                                field.loc.primary(),
                                target.loc.secondary().with_message(format!(
                                    "`{}` is declared here with type `{}`",
                                    target.id,
                                    target.type_text()
                                )),
                            ]),
                    )
                }
                model.fields[position].is_counter = true;
            }
        }
    }
}

/// Drop the `json_literal` flag from fields which are not `char *`.
pub fn check_json_literals(model: &mut Model, diagnostics: &mut Diagnostics) {
    for field in model.fields.iter_mut().filter(|f| f.json_literal) {
        if Shape::of(field) != Shape::String {
            diagnostics.push(
                Diagnostic::warning()
                    .with_code(ErrorCode::InvalidJsonLiteral)
                    .with_message(format!(
                        "`json_literal` field `{}` must have type `char *`, found `{}`",
                        field.id,
                        field.type_text()
                    ))
                    .with_labels(vec![field.loc.primary()]),
            );
            field.json_literal = false;
        }
    }
}

/// Check for models generating the same identifiers.
fn check_model_identifiers(models: &[Model], diagnostics: &mut Diagnostics) {
    let mut names: HashMap<&str, &Model> = HashMap::new();
    let mut ids: HashMap<&str, &Model> = HashMap::new();
    for model in models {
        let prev = names.insert(&model.name, model);
        let prev = ids.insert(&model.id, model).or(prev);
        if let Some(prev) = prev {
            diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::DuplicateModelIdentifier)
                    .with_message(format!("redeclaration of model `{}`", model.name))
                    .with_labels(vec![
                        model.loc.primary(),
                        prev.loc
                            .secondary()
                            .with_message(format!("`{}` is first declared here", prev.id)),
                    ]),
            )
        }
    }
}

/// Check field types and references to other models.
fn check_field_types(models: &[Model], scope: &Scope, diagnostics: &mut Diagnostics) {
    for model in models {
        for field in model.json_fields() {
            let shape = Shape::of(field);
            if let Shape::Unsupported(reason) = shape {
                diagnostics.push(
                    Diagnostic::warning()
                        .with_code(ErrorCode::UnsupportedField)
                        .with_message(format!(
                            "field `{}` of type `{}` is skipped: {}",
                            field.id,
                            field.type_text(),
                            reason
                        ))
                        .with_labels(vec![field.loc.primary()]),
                );
                continue;
            }

            let Some(type_id) = shape.model() else {
                continue;
            };
            let Some(target) = scope.get(type_id) else {
                diagnostics.push(
                    Diagnostic::warning()
                        .with_code(ErrorCode::UndeclaredTypeIdentifier)
                        .with_message(format!(
                            "undeclared type `{}` for field `{}`",
                            type_id, field.id
                        ))
                        .with_labels(vec![field.loc.primary()])
                        .with_notes(vec![format!(
                            "note: `{type_id}` must be declared with a JSON annotation"
                        )]),
                );
                continue;
            };

            for (required, provided, direction) in [
                (model.parse, target.parse, "parse"),
                (model.stringify, target.stringify, "stringify"),
            ] {
                if required && !provided {
                    diagnostics.push(
                        Diagnostic::warning()
                            .with_code(ErrorCode::MissingDirection)
                            .with_message(format!(
                                "`{}` does not generate {} routines required by `{}`",
                                target.id, direction, model.id
                            ))
                            .with_labels(vec![
                                field.loc.primary(),
                                target.loc
                                    .secondary()
                                    .with_message(format!("`{}` is declared here", target.id)),
                            ]),
                    );
                }
            }
        }
    }
}

/// Check that JSON keys are unique within each model.
fn check_field_keys(models: &[Model], diagnostics: &mut Diagnostics) {
    for model in models {
        let mut keys: HashMap<&str, &Field> = HashMap::new();
        for field in model.json_fields() {
            if matches!(Shape::of(field), Shape::Unsupported(_)) {
                continue;
            }
            if let Some(prev) = keys.insert(field.key(), field) {
                diagnostics.push(
                    Diagnostic::warning()
                        .with_code(ErrorCode::DuplicateFieldKey)
                        .with_message(format!(
                            "duplicate JSON key `{}` in `{}`",
                            field.key(),
                            model.id
                        ))
                        .with_labels(vec![
                            field.loc.primary(),
                            prev.loc
                                .secondary()
                                .with_message(format!("`{}` is first used here", prev.key())),
                        ]),
                )
            }
        }
    }
}

/// Analyzer entry point, checks the accumulated models before code
/// generation. Returns the warnings on success, or all diagnostics when
/// at least one error is raised.
pub fn analyze(models: &[Model]) -> Result<Diagnostics, Diagnostics> {
    let mut diagnostics = Diagnostics::default();
    let scope = Scope::new(models);
    check_model_identifiers(models, &mut diagnostics);
    check_field_types(models, &scope, &mut diagnostics);
    check_field_keys(models, &mut diagnostics);
    diagnostics.err_or_warnings()
}
