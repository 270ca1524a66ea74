pub mod builder;
pub mod classify;
pub mod cli;
pub mod data;
pub mod dataset;
pub mod error;
pub mod io_utils;
pub mod schema;
pub mod validate;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, error, info, warn};

use crate::{
    cli::{Cli, Commands},
    schema::{DATATYPES_FILE_NAME, PARAMETERS_FILE_NAME},
    validate::{DocumentKind, Violation, validate_raw},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_schemagen", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Infer(args) => handle_infer(&args),
        Commands::Validate(args) => handle_validate(&args),
    }
}

fn handle_infer(args: &cli::InferArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let dataset = io_utils::read_dataset(&args.input, delimiter, encoding)?;
    info!(
        "Read {} row(s) across {} column(s)",
        dataset.row_count(),
        dataset.column_count()
    );

    let (schema, datatypes) = builder::build_schema(&dataset, &args.options())
        .with_context(|| format!("Inferring schema from {:?}", args.input))?;

    let parameters_path = args.output_dir.join(PARAMETERS_FILE_NAME);
    schema
        .save(&parameters_path)
        .with_context(|| format!("Writing parameters to {parameters_path:?}"))?;
    let datatypes_path = args.output_dir.join(DATATYPES_FILE_NAME);
    datatypes
        .save(&datatypes_path)
        .with_context(|| format!("Writing column datatypes to {datatypes_path:?}"))?;

    info!("Done generating schema. Validating output files...");
    review_written_file(&parameters_path, DocumentKind::Schema);
    review_written_file(&datatypes_path, DocumentKind::Datatype);

    info!(
        "Schema for {} column(s) written to {:?} and {:?}",
        schema.schema.len(),
        parameters_path,
        datatypes_path
    );
    Ok(())
}

/// Re-reads a generated file and warns about anything that fails validation;
/// the files are already written, so problems are reported but not fatal.
fn review_written_file(path: &Path, kind: DocumentKind) {
    match load_violations(path, kind) {
        Ok(violations) if violations.is_empty() => {}
        Ok(violations) => {
            for violation in &violations {
                warn!("{path:?}: {violation}");
            }
            warn!("{path:?} should be reviewed to ensure it is complete");
        }
        Err(err) => {
            warn!("Unable to validate {path:?}: {err:#}");
            warn!("{path:?} should be reviewed to ensure it is complete");
        }
    }
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let kind = if args.parameters {
        DocumentKind::Schema
    } else {
        DocumentKind::Datatype
    };
    let violations = load_violations(&args.input, kind)?;
    if violations.is_empty() {
        info!("File {:?} was successfully validated", args.input);
        return Ok(());
    }
    for violation in &violations {
        error!("{violation}");
    }
    Err(anyhow!(
        "{:?} is not a valid {kind} document ({} violation(s))",
        args.input,
        violations.len()
    ))
}

fn load_violations(path: &Path, kind: DocumentKind) -> Result<Vec<Violation>> {
    let document = schema::read_raw(path, kind)?;
    Ok(validate_raw(&document, kind))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
