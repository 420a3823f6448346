// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ecocode - session-relaying gateway in front of a code-generation backend.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// ecocode - session-relaying gateway in front of a code-generation backend.
#[derive(Parser, Debug)]
#[command(name = "ecocode", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the browser-facing gateway.
    Serve,
    /// Print the resolved configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ecocode_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            ecocode_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("error: cannot render configuration: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("ecocode: use --help for available commands");
        }
    }
}
