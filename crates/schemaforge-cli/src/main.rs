//! SchemaForge Command-Line Compiler
//!
//! Loads a JSON model manifest and prints the schema compiled for a class
//! and backend.

mod formatter;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use formatter::OutputFormat;
use schemaforge_core::{Backend, CompilerConfig, Manifest, Registry, SchemaArtifact, SchemaCompiler};
use thiserror::Error;

/// Target backend as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// Nested document schema
    Document,
    /// Node and relationship schema
    Graph,
    /// Table, column and relation schema
    Relational,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Document => Backend::Document,
            BackendArg::Graph => Backend::Graph,
            BackendArg::Relational => Backend::Relational,
        }
    }
}

/// SchemaForge Command-Line Compiler
#[derive(Parser, Debug)]
#[command(name = "schemaforge")]
#[command(version, about = "Compile model manifests into document, graph and relational schemas")]
pub struct Args {
    /// Model manifest (JSON)
    #[arg(short, long)]
    pub model: PathBuf,

    /// Class to compile; lists the declared classes when omitted
    #[arg(short, long)]
    pub class: Option<String>,

    /// Target backend
    #[arg(short, long, default_value = "document", value_enum)]
    pub backend: BackendArg,

    /// Deepest nesting level expanded for embedded structures
    #[arg(long, default_value_t = schemaforge_core::config::DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Compile the graph schema of every class into one model
    #[arg(long, conflicts_with = "class")]
    pub all: bool,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,
}

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Model loading or compilation failed.
    #[error(transparent)]
    Schema(#[from] schemaforge_core::Error),

    /// `--all` was combined with a backend other than graph.
    #[error("--all is only supported for the graph backend")]
    AllRequiresGraph,
}

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("schemaforge=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<String, CliError> {
    let manifest = Manifest::from_path(&args.model)?;
    let registry = Registry::new();
    manifest.apply(&registry)?;

    let formatter = formatter::create_formatter(args.format);
    let compiler = SchemaCompiler::with_config(
        &registry,
        CompilerConfig::default().with_max_depth(args.max_depth),
    );

    if args.all {
        if args.backend != BackendArg::Graph {
            return Err(CliError::AllRequiresGraph);
        }
        let model = compiler.compile_graph_model(manifest.class_names().as_slice())?;
        return Ok(formatter.format_artifact(&SchemaArtifact::Graph(model)));
    }

    match &args.class {
        Some(class) => {
            tracing::debug!(class = %class, backend = ?args.backend, "compiling");
            let artifact = compiler.compile(class, args.backend.into())?;
            Ok(formatter.format_artifact(&artifact))
        }
        None => Ok(formatter.format_classes(&registry.classes())),
    }
}
