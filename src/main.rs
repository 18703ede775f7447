//! Home compiler CLI.
//!
//! A thin `clap` shell around `homec`'s three pipeline entry points plus
//! shell-completion generation. Exit codes: `0` success, `1` the program
//! has user-visible diagnostics, `2` a fatal I/O/cache/resolve error that
//! aborted the compilation before diagnostics could even be produced.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

use homec::diagnostics::render_report;
use homec::{build, check, compile, CheckOutcome, CompilerConfig, OptimizationLevel};

#[derive(ClapParser)]
#[command(name = "homec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Home compiler - lex, parse, typecheck, and build .home programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lex and parse a .home file, reporting syntax diagnostics only
    Compile {
        /// Input .home source file
        input: PathBuf,
    },

    /// Lex, parse, typecheck, and run ownership analysis without codegen
    Check {
        /// Input .home source file
        input: PathBuf,
    },

    /// Compile a .home file to a native executable (or kernel-mode assembly)
    Build {
        /// Input .home source file
        input: PathBuf,

        /// Output path (defaults to input filename without extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit GNU-as kernel-mode assembly text instead of an ELF executable
        #[arg(long)]
        kernel: bool,

        /// Target triple (defaults to the host triple)
        #[arg(long)]
        target: Option<String>,

        /// Optimization level
        #[arg(short = 'O', long, value_enum, default_value_t = OptLevelArg::O0)]
        opt: OptLevelArg,

        /// Cache directory for compiled artifacts
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OptLevelArg {
    O0,
    O1,
    O2,
    O3,
}

impl From<OptLevelArg> for OptimizationLevel {
    fn from(level: OptLevelArg) -> Self {
        match level {
            OptLevelArg::O0 => OptimizationLevel::O0,
            OptLevelArg::O1 => OptimizationLevel::O1,
            OptLevelArg::O2 => OptimizationLevel::O2,
            OptLevelArg::O3 => OptimizationLevel::O3,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { input } => run_compile(&input),
        Commands::Check { input } => run_check(&input),
        Commands::Build {
            input,
            output,
            kernel,
            target,
            opt,
            cache_dir,
        } => run_build(&input, output, kernel, target, opt, cache_dir),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "homec", &mut io::stdout());
}

fn run_compile(input: &PathBuf) {
    match compile(input) {
        Ok(outcome) => report_and_exit(input, &outcome),
        Err(e) => fatal(e),
    }
}

fn run_check(input: &PathBuf) {
    match check(input) {
        Ok(outcome) => report_and_exit(input, &outcome),
        Err(e) => fatal(e),
    }
}

fn run_build(
    input: &PathBuf,
    output: Option<PathBuf>,
    kernel: bool,
    target: Option<String>,
    opt: OptLevelArg,
    cache_dir: Option<PathBuf>,
) {
    let output = output.unwrap_or_else(|| {
        let stem = input.file_stem().unwrap_or_default();
        let mut path = PathBuf::from(stem);
        if kernel {
            path.set_extension("s");
        }
        path
    });

    let mut config = CompilerConfig::new().with_optimization_level(opt.into());
    if let Some(target) = target {
        config = config.with_target(target);
    }
    if let Some(cache_dir) = cache_dir {
        config = config.with_cache_dir(cache_dir);
    }
    if let Ok(manifest_config) = config.clone().with_project_manifest(
        input.parent().unwrap_or_else(|| std::path::Path::new(".")),
    ) {
        config = manifest_config;
    }

    match build(input, &output, kernel, &config) {
        Ok(outcome) => report_and_exit(input, &outcome),
        Err(e) => fatal(e),
    }
}

/// Renders every diagnostic against the original source (path, line:column,
/// source line, caret, expected/found, suggestion) and exits `0` if none
/// are errors, `1` otherwise.
fn report_and_exit(input: &std::path::Path, outcome: &CheckOutcome) {
    if !outcome.diagnostics.is_empty() {
        let source = std::fs::read_to_string(input).unwrap_or_default();
        eprint!("{}", render_report(input, &source, &outcome.diagnostics));
    }
    if outcome.is_ok() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn fatal(err: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", err);
    process::exit(2);
}
