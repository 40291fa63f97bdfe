use clap::Parser;
use std::path::PathBuf;
use std::process;

use tracing_subscriber::EnvFilter;

use codemap::config::load_config;
use codemap::{format_json, format_markdown, CodeMapper};

/// Structural outline of a multi-language codebase.
#[derive(Parser)]
#[command(
    name = "codemap",
    version,
    about = "Structural outline of a multi-language codebase"
)]
struct Cli {
    /// Directories to scan, relative to the project root (default: the root)
    dirs: Vec<PathBuf>,
    /// Project root (default: current directory)
    #[arg(short, long)]
    root: Option<String>,
    /// Output as JSON instead of Markdown
    #[arg(short, long)]
    json: bool,
    /// Never ask the generation oracle for new extractors
    #[arg(long)]
    no_synthesis: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codemap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> codemap::errors::Result<()> {
    let project_root = resolve_path(cli.root);
    let dirs = if cli.dirs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.dirs
    };

    let mut mapper = if cli.no_synthesis {
        CodeMapper::without_synthesis(&project_root, load_config(&project_root)?)
    } else {
        CodeMapper::open(&project_root)?
    };
    let map = mapper.map(&dirs)?;

    if cli.json {
        println!("{}", format_json(&map)?);
    } else {
        print!("{}", format_markdown(&map));
    }
    Ok(())
}

fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
