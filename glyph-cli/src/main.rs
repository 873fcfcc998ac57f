mod store;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use glyph_core::{
    Mode, Pipeline, RUSTC_ENV, Rustc, STACK_SIZE, SourceStore, emit_rust, test_source_id,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::store::DirectoryStore;

/// Check, run and compile Glyph sources.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        default_value = ".",
        help = "Directory holding <id>.glyph sources"
    )]
    store: PathBuf,

    #[arg(short, long, global = true, help = "Log pipeline internals to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and type-check a source.
    Check(Target),
    /// Execute a source statement by statement.
    Run(Target),
    /// Build a source through rustc and run the binary.
    Compile {
        #[command(flatten)]
        target: Target,
        #[arg(long, env = RUSTC_ENV, value_name = "PATH", help = "rustc binary to build with")]
        rustc: Option<PathBuf>,
    },
    /// Print or write the Rust program generated for a source.
    Emit {
        id: String,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// List the stored source ids.
    List,
}

#[derive(Args, Debug)]
struct Target {
    id: String,
    #[arg(long, help = "Append the <id>.test source before processing")]
    with_tests: bool,
}

static TRACING: OnceLock<()> = OnceLock::new();

fn init_tracing(verbose: bool) {
    TRACING.get_or_init(|| {
        let fallback = if verbose { "glyph_core=debug,glyph=debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init();
    });
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let store = DirectoryStore::new(&cli.store);
    debug!(root = %store.root().display(), "opened source store");

    match cli.command {
        Command::Check(target) => drive(&store, Mode::Check, &target, None),
        Command::Run(target) => drive(&store, Mode::Run, &target, None),
        Command::Compile { target, rustc } => {
            drive(&store, Mode::Compile, &target, rustc.map(Rustc::new))
        }
        Command::Emit { id, output } => {
            let source = store.require(&id)?;
            let program = emit_rust(&source).with_context(|| format!("failed to lower {id}"))?;
            match output {
                Some(path) => {
                    write_output(&path, &program.source)?;
                    info!(path = %path.display(), "wrote generated program");
                }
                None => print!("{}", program.source),
            }
            Ok(())
        }
        Command::List => {
            for id in store.ids() {
                println!("{id}");
            }
            Ok(())
        }
    }
}

fn load(store: &DirectoryStore, target: &Target) -> Result<String> {
    let mut source = store
        .require(&target.id)
        .with_context(|| format!("cannot load source from {}", store.root().display()))?;
    if target.with_tests {
        let test_id = test_source_id(&target.id);
        let tests = store
            .require(&test_id)
            .with_context(|| format!("--with-tests needs {test_id}"))?;
        if !source.ends_with('\n') {
            source.push('\n');
        }
        source.push_str(&tests);
    }
    Ok(source)
}

fn drive(store: &DirectoryStore, mode: Mode, target: &Target, rustc: Option<Rustc>) -> Result<()> {
    let source = load(store, target)?;
    let id = target.id.clone();
    // Deep Glyph recursion needs more stack than the main thread has.
    let worker = thread::Builder::new()
        .name(format!("glyph-{id}"))
        .stack_size(STACK_SIZE)
        .spawn(move || {
            let mut pipeline = Pipeline::new(mode, id, &source);
            if let Some(rustc) = rustc {
                pipeline = pipeline.with_toolchain(rustc);
            }
            for line in pipeline.by_ref() {
                println!("{line}");
            }
            pipeline.succeeded()
        })
        .context("failed to start the pipeline thread")?;
    let succeeded = worker
        .join()
        .map_err(|_| anyhow!("the pipeline thread panicked"))?;
    if !succeeded {
        bail!("{} did not finish", target.id);
    }
    Ok(())
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("failed to write output file {}", path.display()))
}
