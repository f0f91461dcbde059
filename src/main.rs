//! pyissues CLI entry point.

use clap::Parser;
use pyissues::cli::commands;
use pyissues::cli::{Cli, Commands};
use pyissues::error::Error;
use pyissues::sync::Operation;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli, cli.json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,reqwest=info,hyper_util=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        // Sync operations
        Commands::Rebuild => commands::sync::execute(cli, Operation::Rebuild, json),
        Commands::Refetch => commands::sync::execute(cli, Operation::Refetch, json),
        Commands::Check => commands::sync::execute(cli, Operation::Check, json),
        Commands::Fix => commands::sync::execute(cli, Operation::Fix, json),
        Commands::Update => commands::sync::execute(cli, Operation::Update, json),

        // Archive
        Commands::Load => commands::archive::load(cli, json),
        Commands::Show { id } => commands::archive::show(cli, *id, json),
        Commands::Merge { inputs, output } => {
            commands::archive::merge(cli, inputs, output.as_deref(), json)
        }

        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(*shell),
    }
}
