mod cli;
mod commands;
mod config;
mod error;
mod output;
mod server;

use crate::{
    cli::{Args, CacheAction, Commands},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use std::process;
use std::time::Duration;
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        error!("Application error: {}", e);
        #[cfg(feature = "colored-output")]
        {
            eprintln!("{} {}", "Error:".red().bold(), e);
        }
        #[cfg(not(feature = "colored-output"))]
        {
            eprintln!("Error: {}", e);
        }
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet)?;

    // Load configuration
    let config = AppConfig::load(args.config.as_deref())?.with_overrides(
        args.timeout,
        args.proxy,
        args.proxy_username,
        args.proxy_password,
    );

    debug!("Starting strev with config: {:?}", config);

    match args.command {
        Commands::Resolve {
            episodes,
            provider,
            min_quality,
            output,
            output_file,
            no_cache,
        } => {
            CommandExecutor::new(config)?
                .resolve(
                    &episodes,
                    &provider,
                    min_quality,
                    output,
                    output_file.as_deref(),
                    !no_cache,
                )
                .await?;
        }

        Commands::Fetch {
            url,
            urls,
            method,
            body,
            output,
            output_file,
        } => {
            CommandExecutor::new(config)?
                .fetch(
                    url.as_deref(),
                    urls.as_deref(),
                    method.as_deref(),
                    body.as_deref(),
                    output,
                    output_file.as_deref(),
                )
                .await?;
        }

        Commands::Search {
            query,
            limit,
            output,
        } => {
            CommandExecutor::new(config)?
                .search(&query, limit, output)
                .await?;
        }

        Commands::Details { id, output } => {
            CommandExecutor::new(config)?.details(id, output).await?;
        }

        Commands::Providers { detailed, output } => {
            CommandExecutor::new(config)?.list_providers(detailed, output)?;
        }

        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let maintenance = Duration::from_secs(config.server.maintenance_interval_secs.max(1));
            let executor = CommandExecutor::new(config)?;
            let state = server::AppState::from_executor(&executor).await?;
            server::serve(state, &bind, maintenance).await?;
        }

        Commands::Cache {
            action: CacheAction::Clear,
        } => {
            CommandExecutor::new(config)?.clear_cache().await?;
        }

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }

        Commands::Config { show, reset } => {
            if reset {
                AppConfig::reset(args.config.as_deref())?;
                println!("✓ Configuration reset to defaults");
            } else if show {
                println!("{}", config.show()?);
            } else {
                println!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();

    Ok(())
}
