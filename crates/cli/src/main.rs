//! Pronto CLI - catalog seeding and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Import a menu file: create products, upload and link images
//! pronto-cli seed menu menu.json
//!
//! # Import fulfillment locations
//! pronto-cli seed addresses addresses.json --default-courier 123456
//!
//! # Drop a user's cart
//! pronto-cli cart reset telegram:42
//! ```
//!
//! # Commands
//!
//! - `seed menu` - Import products from a menu JSON file
//! - `seed addresses` - Import fulfillment locations from an addresses JSON file
//! - `cart reset` - Delete one user's cart on the commerce service

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pronto-cli")]
#[command(author, version, about = "Pronto CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the commerce catalog
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Cart maintenance
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Import products from a menu JSON file
    Menu {
        /// Path to the menu JSON file
        file: String,
    },
    /// Import fulfillment locations from an addresses JSON file
    Addresses {
        /// Path to the addresses JSON file
        file: String,

        /// Courier chat id for entries that do not carry their own
        #[arg(long)]
        default_courier: Option<String>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Delete one user's cart
    Reset {
        /// Transport-prefixed user key, e.g. telegram:42
        owner: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Seed { target } => match target {
            SeedTarget::Menu { file } => commands::seed::menu(&file).await?,
            SeedTarget::Addresses {
                file,
                default_courier,
            } => commands::seed::addresses(&file, default_courier.as_deref()).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Reset { owner } => commands::cart::reset(&owner).await?,
        },
    }
    Ok(())
}
