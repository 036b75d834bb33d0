mod cli;
mod commands;
mod config;
mod file_utils;
mod mapping;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Extract {
            input,
            output,
            mapping,
            codec,
        } => {
            commands::archive::extract(&input, output.as_deref(), &mapping, codec)?;
        }

        Commands::Create {
            input,
            output,
            mapping,
            codec,
        } => {
            commands::archive::create(&input, output.as_deref(), &mapping, codec)?;
        }

        Commands::Decode {
            input,
            output,
            compressed,
            mapping,
        } => {
            commands::section::decode(&input, output.as_deref(), compressed, &mapping)?;
        }

        Commands::Encode {
            input,
            output,
            compress,
            mapping,
        } => {
            commands::section::encode(&input, output.as_deref(), compress, &mapping)?;
        }

        Commands::Verify {
            input,
            mapping,
            codec,
        } => {
            commands::archive::verify(&input, &mapping, codec)?;
        }

        Commands::Inspect {
            input,
            compressed,
            preview,
        } => {
            commands::section::inspect(&input, compressed, preview)?;
        }

        Commands::Configure {
            mappings,
            game,
            region,
            font,
            show,
        } => {
            let settings = commands::configure::Settings {
                mappings,
                game,
                region,
                font,
            };
            commands::configure::handle(settings, show)?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the level picked by `-v`
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
