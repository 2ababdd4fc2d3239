//! Eass CLI
//!
//! Command-line front end for the eass runtime: template formatting,
//! console input, hex/binary printing, files and clocks.
//!
//! Arguments given to `format` and `print` are classified the same way a
//! line of console input is, so `42` is an Int, `2.5` a Float and anything
//! else Text.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use eass_core::{EassError, Value, string_format};
use eass_runtime::config::RuntimeConfig;
use eass_runtime::report::ReportConfig;
use eass_runtime::{file, io as console, time_ops};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "eass")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Eass - format, print and read dynamic values", long_about = None)]
struct Cli {
    /// Count every allocation with the debug allocator (EASS_DEBUG_MEMORY)
    #[arg(long, global = true)]
    debug_memory: bool,

    /// Refuse allocations past this many outstanding bytes (EASS_MEMORY_LIMIT)
    #[arg(long, global = true, value_name = "BYTES")]
    memory_limit: Option<u64>,

    /// At-exit memory report: 1, json or json:/path (EASS_REPORT)
    #[arg(long, global = true, value_name = "SPEC")]
    report: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format a template and print the result
    Format {
        /// Template with {} and {N} placeholders
        template: String,

        /// Arguments, classified as Int, Float or Text
        args: Vec<String>,
    },

    /// Stream a template straight to stdout
    Print {
        /// Template with {} and {N} placeholders
        template: String,

        /// Arguments, classified as Int, Float or Text
        args: Vec<String>,
    },

    /// Read lines from stdin and show what each one converts to
    Input {
        /// Prompt written before each read
        #[arg(short, long, default_value = "")]
        prompt: String,

        /// Number of lines to read
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Print integers in hexadecimal and binary
    Hex {
        #[arg(required = true, allow_negative_numbers = true)]
        numbers: Vec<i32>,
    },

    /// Write a file's contents to stdout
    Read {
        path: PathBuf,
    },

    /// Write text to a file, replacing its contents
    Write {
        path: PathBuf,
        content: String,
    },

    /// Print a clock reading in seconds
    Time {
        /// Seconds since first use instead of since the Unix epoch
        #[arg(long)]
        monotonic: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eass=warn".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = runtime_config(&cli);

    // The guard must drop (and report) before the process exits.
    let result = {
        let _report = config.install();
        run(cli.command)
    };

    if let Err(e) = result {
        eprintln!("Error: {} - {}", e.code(), e.message());
        process::exit(1);
    }
}

/// Environment first, then flags on top.
fn runtime_config(cli: &Cli) -> RuntimeConfig {
    let mut config = RuntimeConfig::from_env();
    if cli.debug_memory {
        config.debug_memory = true;
    }
    if let Some(limit) = cli.memory_limit {
        config.memory_limit = Some(limit);
    }
    if let Some(spec) = &cli.report {
        config.report = ReportConfig::parse(spec);
    }
    config
}

fn run(command: Commands) -> Result<(), EassError> {
    match command {
        Commands::Format { template, args } => run_format(&template, &args),
        Commands::Print { template, args } => console::print(&template, &classify(&args)),
        Commands::Input { prompt, count } => run_input(&prompt, count),
        Commands::Hex { numbers } => numbers.into_iter().try_for_each(console::printhd),
        Commands::Read { path } => run_read(&path),
        Commands::Write { path, content } => file::write_file(&path, content),
        Commands::Time { monotonic } => {
            let seconds = if monotonic {
                time_ops::monotonic_seconds()
            } else {
                time_ops::time_in_seconds()
            };
            console::print("{}", &[Value::from(seconds)])
        }
        Commands::Completions { shell } => {
            run_completions(shell);
            Ok(())
        }
    }
}

fn classify(args: &[String]) -> Vec<Value> {
    args.iter().map(|arg| console::convert_line(arg)).collect()
}

fn run_format(template: &str, args: &[String]) -> Result<(), EassError> {
    let text = string_format(template, &classify(args))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", text).map_err(|e| EassError::io(&e, "write failed in format"))
}

fn run_input(prompt: &str, count: usize) -> Result<(), EassError> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut input = stdin.lock();
    let mut out = stdout.lock();
    for _ in 0..count {
        let value = console::input_from(&mut input, &mut out, prompt)?;
        console::print_to(&mut out, "{}: {}", &[kind_name(&value), value])?;
    }
    Ok(())
}

fn kind_name(value: &Value) -> Value {
    Value::text(&format!("{:?}", value.kind()))
}

fn run_read(path: &std::path::Path) -> Result<(), EassError> {
    let bytes = file::read_file(path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(&bytes)
        .and_then(|_| out.flush())
        .map_err(|e| EassError::io(&e, "write failed in read"))
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "eass", &mut io::stdout());
}
