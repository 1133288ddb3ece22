//! Bazaar CLI - Database migrations, seeding and order maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! bazaar migrate
//!
//! # Load products from a YAML file
//! bazaar seed products fixtures/products.yaml
//!
//! # Create (or update) a user
//! bazaar seed user -e buyer@example.com -n "Asha Rao"
//!
//! # Cancel pending orders older than the configured TTL
//! bazaar orders expire
//! bazaar orders expire --older-than-minutes 30
//!
//! # Show the Razorpay side of an order
//! bazaar orders gateway 42
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Order maintenance
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert or update products from a YAML file, keyed by SKU
    Products {
        /// Path to the YAML file
        file: String,
    },
    /// Create a user, or update the name of an existing one
    User {
        /// User email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Cancel pending orders that were never paid
    Expire {
        /// Age threshold; defaults to `CHECKOUT_PENDING_ORDER_TTL_MINUTES`
        #[arg(long)]
        older_than_minutes: Option<u64>,
    },
    /// Fetch an order's Razorpay order and compare it with ours
    Gateway {
        /// Bazaar order id
        order_id: i32,
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
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
            SeedTarget::User { email, name } => {
                commands::seed::user(&email, name.as_deref()).await?;
            }
        },
        Commands::Orders { action } => match action {
            OrdersAction::Expire { older_than_minutes } => {
                commands::orders::expire(older_than_minutes).await?;
            }
            OrdersAction::Gateway { order_id } => commands::orders::gateway(order_id).await?,
        },
    }
    Ok(())
}
