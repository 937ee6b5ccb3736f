//! netfw - Declarative network-firewall rule groups
//!
//! This is the main entry point for the netfw CLI.

mod cli;

use clap::Parser;
use cli::commands::CommandContext;
use cli::output::OutputFormatter;
use cli::{Cli, Commands, LogFormat};
use netfw::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity())
                .error(&format!("Failed to load config: {:#}", e));
            std::process::exit(1);
        }
    };

    // Initialize logging based on verbosity
    let json_logs = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.logging.format == "json",
    };
    init_logging(cli.verbosity(), json_logs, &config.logging.level);

    if cli.verbosity() >= 2 {
        eprintln!("netfw v{}", VERSION);
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let result = match &cli.command {
        Commands::Validate(args) => args.execute(&mut ctx).await,
        Commands::Plan(args) => args.execute(&mut ctx).await,
        Commands::Apply(args) => args.execute(&mut ctx).await,
        Commands::Destroy(args) => args.execute(&mut ctx).await,
        Commands::Import(args) => args.execute(&mut ctx).await,
        Commands::Show(args) => args.execute(&mut ctx).await,
        Commands::Sweep(args) => args.execute(&mut ctx).await,
    };
    ctx.output.flush();

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            1
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, json: bool, default_level: &str) {
    let filter = match verbosity {
        0 => default_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
