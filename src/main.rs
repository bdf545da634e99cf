mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::commands::decrypt::DecryptArgs;
use cli::{Cli, Commands};

fn main() {
    let args = Cli::parse();

    init_logging(args.verbose);
    cli::output::set_quiet(args.quiet);
    cli::context::init(args.config.as_deref(), args.gpg.as_deref());

    let result = match &args.command {
        Commands::Decrypt {
            input,
            output,
            binary,
            no_lookup,
            delete_after,
            yes,
        } => cli::commands::decrypt::execute(DecryptArgs {
            input,
            output: output.as_deref(),
            binary: *binary,
            no_lookup: *no_lookup,
            delete_after: *delete_after,
            yes: *yes,
        }),
        Commands::Probe { input } => cli::commands::probe::execute(input),
        Commands::Log { since, last } => cli::commands::log::execute(since.as_deref(), *last),
    };

    if let Err(e) = result {
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "unveil=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
