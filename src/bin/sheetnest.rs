//! sheetnest CLI - convert spreadsheet tables with typed headers into JSON

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use sheetnest::batch::convert_dir;
use sheetnest::batch::FileReport;
use sheetnest::logging;
use sheetnest::validate_file;
use sheetnest::ConvertOptions;
use sheetnest::Criteria;
use sheetnest::KeyMode;
use sheetnest::ParseOptions;
use sheetnest::TableError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sheetnest")]
#[command(version)]
#[command(about = "Convert Excel tables with nested header declarations to JSON", long_about = None)]
struct Cli {
    /// Subcommand to run; converts the input directory when omitted
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input directory containing Excel files
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Output directory for JSON files
    #[arg(short, long, default_value = "json/")]
    output: PathBuf,

    /// Print every error of a failing file
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Top-level field used as the key (defaults to the first field)
    #[arg(long, global = true)]
    key_field: Option<String>,

    /// How rows with an empty key cell are attributed
    #[arg(long, value_enum, default_value_t = KeyModeArg::Inherit, global = true)]
    key_mode: KeyModeArg,

    /// Sheet name glob pattern, repeatable (defaults to the active sheet)
    #[arg(long = "sheet", value_name = "PATTERN", global = true)]
    sheets: Vec<String>,

    /// JSON indentation in spaces, 0 for compact output
    #[arg(long, default_value_t = sheetnest::DEFAULT_INDENT)]
    indent: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Check workbooks without writing any JSON
    Validate {
        /// Workbook files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum KeyModeArg {
    /// An empty key cell continues the key above it
    Inherit,
    /// Every row repeats its key
    Repeat,
}

impl From<KeyModeArg> for KeyMode {
    fn from(mode: KeyModeArg) -> Self {
        match mode {
            KeyModeArg::Inherit => KeyMode::Inherit,
            KeyModeArg::Repeat => KeyMode::Repeat,
        }
    }
}

impl TryFrom<&Cli> for ConvertOptions {
    type Error = anyhow::Error;

    fn try_from(cli: &Cli) -> Result<Self> {
        let criteria = Criteria::with_patterns(&cli.sheets).context("Invalid --sheet pattern")?;
        Ok(ConvertOptions {
            parse: ParseOptions {
                key_field: cli.key_field.clone(),
                key_mode: cli.key_mode.into(),
            },
            criteria,
            indent: cli.indent,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("Fatal error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every file succeeded.
fn run(cli: &Cli) -> Result<bool> {
    logging::init(cli.verbose)?;
    let options = ConvertOptions::try_from(cli)?;

    match &cli.command {
        Some(Commands::Validate { files }) => Ok(validate(files, &options, cli.verbose)),
        None => convert(cli, &options),
    }
}

fn convert(cli: &Cli, options: &ConvertOptions) -> Result<bool> {
    let report = convert_dir(&cli.dir, &cli.output, options)?;
    for file in &report.files {
        print_file(file, cli.verbose);
    }
    println!("\nProcessing complete: {} succeeded, {} failed", report.succeeded, report.failed);
    Ok(report.failed == 0)
}

fn validate(files: &[PathBuf], options: &ConvertOptions, verbose: bool) -> bool {
    let mut failed = 0usize;
    for path in files {
        let errors = validate_file(path, options);
        if errors.is_empty() {
            println!("{}:\tOK", path.display());
        } else {
            failed += 1;
            println!("{}:\t{} error(s)", path.display(), errors.len());
            print_errors(&errors, verbose);
        }
    }
    println!("\nValidation complete: {} passed, {} failed", files.len() - failed, failed);
    failed == 0
}

fn print_file(file: &FileReport, verbose: bool) {
    match file.errors.first() {
        None => println!("{}:\tSuccess!", file.name),
        Some(first) => {
            println!("{}:\tError: {first}", file.name);
            if verbose && file.errors.len() > 1 {
                print_errors(&file.errors[1..], verbose);
            }
        }
    }
}

/// Lists errors, all of them in verbose mode and only the first otherwise.
fn print_errors(errors: &[TableError], verbose: bool) {
    let shown = if verbose { errors.len() } else { 1 };
    for error in errors.iter().take(shown) {
        println!("  {error}");
    }
    if errors.len() > shown {
        println!("  ... {} more, use -v to list them all", errors.len() - shown);
    }
}
