use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::builder::{DEFAULT_MAX_CATEGORICAL, InferenceOptions};

#[derive(Debug, Parser)]
#[command(author, version, about = "Infer column schemas from CSV files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer parameters.json and column_datatypes.json from a CSV file
    Infer(InferArgs),
    /// Validate a parameters.json or column_datatypes.json file
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct InferArgs {
    /// Input CSV file to inspect ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Directory that receives the generated schema files
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,
    /// Columns with at most this many distinct values are treated as categorical
    #[arg(
        long = "max-categorical",
        default_value_t = DEFAULT_MAX_CATEGORICAL,
        value_parser = parse_max_categorical
    )]
    pub max_categorical: usize,
    /// Record missing values as a category of their own
    #[arg(long = "include-na")]
    pub include_na: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl InferArgs {
    pub fn options(&self) -> InferenceOptions {
        InferenceOptions {
            max_categorical: self.max_categorical,
            include_na: self.include_na,
        }
    }
}

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("document")
        .required(true)
        .args(["parameters", "datatypes"])
))]
pub struct ValidateArgs {
    /// Schema file to validate
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// The file is a parameters.json schema document
    #[arg(short = 'p', long = "parameters")]
    pub parameters: bool,
    /// The file is a column_datatypes.json document
    #[arg(short = 'd', long = "datatypes")]
    pub datatypes: bool,
}

pub fn parse_max_categorical(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("max-categorical must be at least 1".to_string()),
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(format!("'{value}' is not a positive integer")),
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
