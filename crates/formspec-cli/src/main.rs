use clap::{Parser, Subcommand};
use formspec::{
    CompileOptions, CompiledForm, FormSpec, check_effective, compile_with, form_spec_schema,
    import_json, validate_spec,
};
use formspec_component::effective_from_compiled;
use serde::Serialize;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const OUTPUT_DIR_ENV: &str = "FORMSPEC_OUTPUT_DIR";
const LOG_ENV: &str = "FORMSPEC_LOG";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "FormSpec compiler CLI",
    long_about = "Validates and compiles FormSpec documents, evaluates conditional visibility for sample data and imports JSON Schema"
)]
struct Cli {
    /// Log engine decisions (key collisions, dropped references) to stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate then compile a FormSpec into {schema, uiSchema}.
    Compile {
        /// Path to the FormSpec JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Write the compiled artifact here instead of stdout (relative paths land under FORMSPEC_OUTPUT_DIR when set).
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Compile even when the validator reports errors.
        #[arg(long)]
        no_validate: bool,
    },
    /// Run the structural validator and print its report.
    Validate {
        /// Path to the FormSpec JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
    },
    /// Print the effective schema and uiSchema for some form data.
    Effective {
        /// Path to a compiled {schema, uiSchema} artifact.
        #[arg(long, value_name = "COMPILED")]
        compiled: PathBuf,
        /// Path to the form data JSON.
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
    },
    /// Check a submission against the effective schema.
    Check {
        /// Path to a compiled {schema, uiSchema} artifact.
        #[arg(long, value_name = "COMPILED")]
        compiled: PathBuf,
        /// Path to the submission JSON.
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
    },
    /// Import a FormSpec or JSON Schema document.
    Import {
        /// Path to the document to import.
        #[arg(long, value_name = "INPUT")]
        input: PathBuf,
        /// Write the FormSpec here instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print the JSON Schema of the FormSpec authoring document.
    Schema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(log_level(cli.verbose, env::var(LOG_ENV).ok().as_deref()));

    match cli.command {
        Command::Compile {
            spec,
            out,
            no_validate,
        } => run_compile(spec, out, no_validate),
        Command::Validate { spec } => run_validate(spec),
        Command::Effective { compiled, data } => run_effective(compiled, data),
        Command::Check { compiled, data } => run_check(compiled, data),
        Command::Import { input, out } => run_import(input, out),
        Command::Schema => print_json(&form_spec_schema()),
    }
}

/// `--verbose` wins; otherwise FORMSPEC_LOG names a level, defaulting to warn.
fn log_level(verbose: bool, configured: Option<&str>) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    configured
        .and_then(|value| Level::from_str(value.trim()).ok())
        .unwrap_or(Level::WARN)
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_json(path: &Path) -> CliResult<Value> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read '{}': {}", path.display(), err))?;
    Ok(serde_json::from_str(&contents)?)
}

fn read_spec(path: &Path) -> CliResult<FormSpec> {
    Ok(serde_json::from_value(read_json(path)?)?)
}

fn read_compiled(path: &Path) -> CliResult<CompiledForm> {
    Ok(serde_json::from_value(read_json(path)?)?)
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit(value: &impl Serialize, out: Option<PathBuf>) -> CliResult<()> {
    let Some(out) = out else {
        return print_json(value);
    };
    let target = resolve_output_path(out, env::var_os(OUTPUT_DIR_ENV).map(PathBuf::from))?;
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, serde_json::to_string_pretty(value)?)?;
    eprintln!("wrote {}", target.display());
    Ok(())
}

fn resolve_output_path(out: PathBuf, root: Option<PathBuf>) -> CliResult<PathBuf> {
    if out.as_os_str().is_empty() {
        return Err("output path cannot be empty".into());
    }
    Ok(match root {
        Some(root) if out.is_relative() && !root.as_os_str().is_empty() => root.join(out),
        _ => out,
    })
}

fn run_compile(spec_path: PathBuf, out: Option<PathBuf>, no_validate: bool) -> CliResult<()> {
    let spec = read_spec(&spec_path)?;
    let compiled = compile_with(
        &spec,
        CompileOptions {
            strict: !no_validate,
        },
    )?;
    emit(&compiled, out)
}

fn run_validate(spec_path: PathBuf) -> CliResult<()> {
    let spec = read_spec(&spec_path)?;
    let report = validate_spec(&spec);
    print_json(&report)?;
    if report.ok {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn run_effective(compiled_path: PathBuf, data_path: PathBuf) -> CliResult<()> {
    let compiled = fs::read_to_string(&compiled_path)?;
    let data = fs::read_to_string(&data_path)?;
    let response: Value = serde_json::from_str(&effective_from_compiled(&compiled, &data))?;
    if let Some(error) = response.get("error").and_then(Value::as_str) {
        return Err(error.into());
    }
    print_json(&response)
}

fn run_check(compiled_path: PathBuf, data_path: PathBuf) -> CliResult<()> {
    let compiled = read_compiled(&compiled_path)?;
    let data = read_json(&data_path)?;
    let report = check_effective(&compiled, &data)?;
    print_json(&report)?;
    if report.valid {
        Ok(())
    } else {
        Err("submission is invalid".into())
    }
}

fn run_import(input: PathBuf, out: Option<PathBuf>) -> CliResult<()> {
    let imported = import_json(&read_json(&input)?)?;
    for warning in &imported.warnings {
        eprintln!("warning: {warning}");
    }
    emit(&imported.spec, out)
}
