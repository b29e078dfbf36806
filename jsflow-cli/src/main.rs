use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use jsflow_checker::{
    load_program, CheckOptions, CheckOutcome, Checker, Diagnostic, DiagnosticLevel, InputMode,
    SourceFile,
};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "jsflow",
    version,
    about = "Type-check an annotated JavaScript program.",
    long_about = "Check a parsed JavaScript program (serialized as JSON or YAML) against its JSDoc \
                  type annotations, inferring types flow-sensitively inside every function."
)]
struct Cli {
    /// Path to the serialized program.
    input: PathBuf,

    /// Serialized externs program declaring the environment's globals.
    #[arg(long, value_name = "PATH")]
    externs: Option<PathBuf>,

    /// Checker configuration file (JSON or YAML).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Accept ES6 syntax and report it as requiring transpilation.
    #[arg(long)]
    mixed: bool,

    /// Warn wherever inference falls back to the unknown type.
    #[arg(long)]
    report_unknown_types: bool,

    /// Relax arity and variance checks for already-shipped annotations.
    #[arg(long)]
    legacy: bool,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log checker progress to stderr (`RUST_LOG` takes precedence).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = resolve_options(&cli)?;
    let program = load_program(&cli.input)
        .with_context(|| format!("failed to load program {}", cli.input.display()))?;
    let externs = cli
        .externs
        .as_deref()
        .map(|path| {
            load_program(path).with_context(|| format!("failed to load externs {}", path.display()))
        })
        .transpose()?;

    tracing::info!(
        target: "cli",
        input = %cli.input.display(),
        externs = externs.is_some(),
        ?options,
        "checking"
    );
    let outcome = Checker::new(options).check(&program, externs.as_ref());

    match cli.format {
        OutputFormat::Text => print_text(&cli.input, &outcome),
        OutputFormat::Json => print_json(&outcome)?,
    }

    let errors = outcome.errors().count();
    if errors > 0 {
        bail!(
            "{} error{} found in {}",
            errors,
            if errors == 1 { "" } else { "s" },
            cli.input.display()
        );
    }
    Ok(())
}

fn resolve_options(cli: &Cli) -> Result<CheckOptions> {
    let mut options = match &cli.config {
        Some(path) => SourceFile::read(path)?.parse::<CheckOptions>()?,
        None => CheckOptions::default(),
    };
    if cli.mixed {
        options.input_mode = InputMode::Mixed;
    }
    options.report_unknown_types |= cli.report_unknown_types;
    options.legacy_compatibility |= cli.legacy;
    Ok(options)
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directive = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn print_text(input: &Path, outcome: &CheckOutcome) {
    for diagnostic in &outcome.diagnostics {
        print_diagnostic(input, diagnostic);
    }
    let warnings = outcome.warnings().count();
    let errors = outcome.errors().count();
    if errors + warnings > 0 {
        println!("{} error(s), {} warning(s)", errors, warnings);
    }
}

fn print_diagnostic(input: &Path, diagnostic: &Diagnostic) {
    let (level_label, level_marker) = match diagnostic.level {
        DiagnosticLevel::Error => ("error", "  -"),
        DiagnosticLevel::Warning => ("warning", "  ~"),
    };
    println!(
        "{} {}[{}]: {}",
        level_marker,
        level_label,
        diagnostic.kind.name(),
        diagnostic.message
    );
    if let Some(span) = diagnostic.span {
        println!("     --> {}:{}:{}", input.display(), span.line, span.column);
    }
}

fn print_json(outcome: &CheckOutcome) -> Result<()> {
    let diagnostics: Vec<_> = outcome
        .diagnostics
        .iter()
        .map(|diagnostic| {
            json!({
                "kind": diagnostic.kind.name(),
                "group": diagnostic.kind.group(),
                "level": diagnostic.level,
                "message": diagnostic.message,
                "span": diagnostic.span,
            })
        })
        .collect();
    let rendered = serde_json::to_string_pretty(&json!({ "diagnostics": diagnostics }))?;
    println!("{rendered}");
    Ok(())
}
