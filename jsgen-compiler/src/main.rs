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

//! JSON routine generator for annotated C structures.

use argh::FromArgs;
use codespan_reporting::term::{self, termcolor};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use jsgen_compiler::{analyzer, ast, backends, parser};

#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    C,
    JSON,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "c" => Ok(Self::C),
            "json" => Ok(Self::JSON),
            _ => Err(format!("could not parse {input:?}, valid option are 'c', 'json'.")),
        }
    }
}

#[derive(FromArgs, Debug)]
/// JSON parse and stringify routine generator for annotated C structures.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(option, default = "OutputFormat::C")]
    /// generate output in this format ("c", "json").
    /// The "json" format dumps the collected models.
    output_format: OutputFormat,

    #[argh(option, short = 'o', default = "String::from(\"models.g.h\")")]
    /// path of the generated file, "models.g.h" by default.
    output: String,

    #[argh(option)]
    /// write the header defining the annotation macros to this path.
    annotations_header: Option<String>,

    #[argh(switch, short = 'v')]
    /// log progress to stderr.
    verbose: bool,

    #[argh(positional)]
    /// input header files, or directories containing header files.
    inputs: Vec<String>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// List the `.h` files of a directory, non recursively, in sorted order.
fn directory_headers(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut headers = vec![];
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension().is_some_and(|ext| ext == "h") {
            headers.push(path);
        }
    }
    headers.sort();
    Ok(headers)
}

fn emit_diagnostics(
    sources: &ast::SourceDatabase,
    diagnostics: &analyzer::Diagnostics,
) -> Result<(), String> {
    let writer = termcolor::StandardStream::stderr(termcolor::ColorChoice::Auto);
    let mut lock = writer.lock();
    diagnostics
        .emit(sources, &mut lock)
        .map_err(|err| format!("could not print diagnostics: {err}"))
}

/// Parse all inputs, collecting the declared models in discovery
/// order. Returns the models and whether any input failed.
fn parse_inputs(
    sources: &mut ast::SourceDatabase,
    inputs: &[String],
) -> Result<(Vec<ast::Model>, bool), String> {
    let mut models = vec![];
    let mut failed = false;

    let mut files = vec![];
    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            match directory_headers(path) {
                Ok(headers) => files.extend(headers),
                Err(err) => {
                    warn!(directory = %input, "could not list directory: {err}");
                    failed = true;
                }
            }
        } else {
            files.push(path.to_path_buf());
        }
    }

    for file in files {
        let name = file.to_string_lossy();
        debug!(file = %name, "parsing");
        match parser::parse_file(sources, &name) {
            Ok((file, diagnostics)) => {
                emit_diagnostics(sources, &diagnostics)?;
                if diagnostics.has_errors() {
                    warn!(file = %name, "failed to parse file");
                    failed = true;
                }
                info!(file = %name, models = file.models.len(), "parsed file");
                models.extend(file.models);
            }
            Err(err) => {
                let writer = termcolor::StandardStream::stderr(termcolor::ColorChoice::Auto);
                let mut lock = writer.lock();
                let config = term::Config::default();
                term::emit_to_write_style(&mut lock, &config, sources, &err)
                    .map_err(|err| format!("could not print error: {err}"))?;
                failed = true;
            }
        }
    }

    Ok((models, failed))
}

fn main() -> Result<(), String> {
    let opt: Opt = argh::from_env();

    if opt.version {
        println!("jsgen {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logging(opt.verbose);

    if let Some(path) = opt.annotations_header.as_ref() {
        std::fs::write(path, backends::c::annotations_header())
            .map_err(|err| format!("could not write '{path}': {err}"))?;
        info!(path = %path, "wrote annotations header");
        if opt.inputs.is_empty() {
            return Ok(());
        }
    }

    if opt.inputs.is_empty() {
        return Err("No input file is specified".to_owned());
    }

    let mut sources = ast::SourceDatabase::new();
    let (models, failed) = parse_inputs(&mut sources, &opt.inputs)?;

    match analyzer::analyze(&models) {
        Ok(warnings) => emit_diagnostics(&sources, &warnings)?,
        Err(diagnostics) => {
            emit_diagnostics(&sources, &diagnostics)?;
            return Err(String::from("Analysis failed"));
        }
    }

    let code = match opt.output_format {
        OutputFormat::C => backends::c::generate(&models, &opt.output),
        OutputFormat::JSON => backends::json::generate(&models)?,
    };
    std::fs::write(&opt.output, code)
        .map_err(|err| format!("could not write '{}': {}", opt.output, err))?;
    info!(output = %opt.output, models = models.len(), "generated output");

    if failed {
        Err(String::from("Error while parsing input"))
    } else {
        Ok(())
    }
}
