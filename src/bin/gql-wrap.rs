//! gql-wrap CLI
//!
//! Command-line interface for deriving gateway schemas and running queries
//! through them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use gql_wrap::{
    execute, load_config, load_document, load_json, load_schema_auto, wrap_schema,
    ExecuteOptions, LocalExecutor, Request, Schema, SubschemaConfig, Transform,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gql-wrap")]
#[command(about = "Wrap GraphQL schemas with reversible transforms")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the gateway schema as SDL
    Wrap {
        /// Schema source: SDL file path or URL (http:// or https://)
        schema: String,

        /// Transform configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run a query against the gateway, serving the original schema from a JSON fixture
    Execute {
        /// Schema source: SDL file path or URL (http:// or https://)
        schema: String,

        /// Operation document to run against the gateway schema
        #[arg(long, short)]
        query: PathBuf,

        /// JSON root value of the original service
        #[arg(long, short)]
        data: PathBuf,

        /// Transform configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON object of variable values
        #[arg(long)]
        variables: Option<PathBuf>,

        /// Name of the operation to run
        #[arg(long)]
        operation: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check that a schema (and optionally its gateway) builds
    Check {
        /// Schema source: SDL file path or URL (http:// or https://)
        schema: String,

        /// Transform configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Wrap {
            schema,
            config,
            output,
        } => run_wrap(&schema, config.as_deref(), output),

        Commands::Execute {
            schema,
            query,
            data,
            config,
            variables,
            operation,
            pretty,
        } => run_execute(ExecuteArgs {
            schema,
            query,
            data,
            config,
            variables,
            operation,
            pretty,
        }),

        Commands::Check { schema, config } => run_check(&schema, config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_transforms(config: Option<&Path>) -> Result<Vec<Arc<dyn Transform>>, u8> {
    let Some(path) = config else {
        return Ok(Vec::new());
    };
    let config = load_config(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    config.build_transforms().map_err(|e| {
        eprintln!("Error in {}: {}", path.display(), e);
        2u8
    })
}

fn load_original(schema_source: &str) -> Result<Schema, u8> {
    load_schema_auto(schema_source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn build_gateway(subschema: SubschemaConfig) -> Result<Arc<Schema>, u8> {
    wrap_schema(subschema).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn run_wrap(schema_source: &str, config: Option<&Path>, output: Option<PathBuf>) -> Result<(), u8> {
    let original = load_original(schema_source)?;
    let transforms = load_transforms(config)?;
    let subschema = SubschemaConfig::new(original, Arc::new(LocalExecutor::default()))
        .with_name(schema_source)
        .with_transforms(transforms);
    let gateway = build_gateway(subschema)?;

    let sdl = gateway.to_sdl();
    match output {
        Some(path) => {
            std::fs::write(&path, &sdl).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            print!("{}", sdl);
        }
    }

    Ok(())
}

struct ExecuteArgs {
    schema: String,
    query: PathBuf,
    data: PathBuf,
    config: Option<PathBuf>,
    variables: Option<PathBuf>,
    operation: Option<String>,
    pretty: bool,
}

fn run_execute(args: ExecuteArgs) -> Result<(), u8> {
    let ExecuteArgs {
        schema: schema_source,
        query,
        data,
        config,
        variables,
        operation,
        pretty,
    } = args;

    let original = load_original(&schema_source)?;
    let transforms = load_transforms(config.as_deref())?;
    let root_value = load_json(&data).map_err(|e| {
        eprintln!("Error loading data: {}", e);
        e.exit_code() as u8
    })?;
    let document = load_document(&query).map_err(|e| {
        eprintln!("Error loading query: {}", e);
        e.exit_code() as u8
    })?;

    let mut request = Request::new(document);
    if let Some(path) = variables {
        let value = load_json(&path).map_err(|e| {
            eprintln!("Error loading variables: {}", e);
            e.exit_code() as u8
        })?;
        match value {
            Value::Object(variables) => request = request.with_variables(variables),
            Value::Null => {}
            _ => {
                eprintln!("Error: variables in {} must be a JSON object", path.display());
                return Err(2);
            }
        }
    }
    if let Some(name) = operation {
        request = request.with_operation_name(name);
    }

    let subschema = SubschemaConfig::new(original, Arc::new(LocalExecutor::new(root_value)))
        .with_name(schema_source)
        .with_transforms(transforms);
    let gateway = build_gateway(subschema)?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        eprintln!("Error starting runtime: {}", e);
        3u8
    })?;
    let result = runtime
        .block_on(execute(&gateway, &request, &ExecuteOptions::default()))
        .map_err(|e| {
            eprintln!("Error: {}", e);
            1u8
        })?;

    let json_output = if pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", json_output);

    if result.errors.is_empty() {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_check(schema_source: &str, config: Option<&Path>) -> Result<(), u8> {
    let original = load_original(schema_source)?;
    let type_count = original.types().filter(|t| !t.is_builtin()).count();
    println!("✓ {} ({} types)", schema_source, type_count);

    if let Some(path) = config {
        let transforms = load_transforms(Some(path))?;
        let transform_count = transforms.len();
        let subschema = SubschemaConfig::new(original, Arc::new(LocalExecutor::default()))
            .with_transforms(transforms);
        let gateway = build_gateway(subschema)?;
        let type_count = gateway.types().filter(|t| !t.is_builtin()).count();
        println!(
            "✓ gateway with {} transforms ({} types)",
            transform_count, type_count
        );
    }

    Ok(())
}
