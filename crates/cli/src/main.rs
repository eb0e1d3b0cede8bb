//! Marketplace cart CLI - inspect and edit the locally persisted cart.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! mp-cart show
//!
//! # Add a product (or one more unit of it)
//! mp-cart add --id 1 --title "Running Shoe" --image-url https://cdn.example.com/1.png --price 199.9
//!
//! # Change quantities
//! mp-cart increment 1
//! mp-cart decrement 1
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart
//! - `add` - Add one unit of a product
//! - `increment` - Add one unit to an existing line
//! - `decrement` - Remove one unit, dropping the line at zero

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use marketplace_cart::{CartConfig, ConfigError};
use marketplace_core::{NewCartEntry, Price, ProductId};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "mp-cart")]
#[command(author, version, about = "Marketplace cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add one unit of a product
    Add {
        /// Product ID
        #[arg(long)]
        id: String,

        /// Product title
        #[arg(short, long)]
        title: String,

        /// Product image URL
        #[arg(short, long, default_value = "")]
        image_url: String,

        /// Unit price (e.g. 19.99)
        #[arg(short, long)]
        price: Price,
    },
    /// Add one unit to an existing line
    Increment {
        /// Product ID
        id: String,
    },
    /// Remove one unit from a line
    Decrement {
        /// Product ID
        id: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::debug!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init). A bad
    // value is reported once logging is up.
    let config = CartConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Logs go to stderr so stdout carries only the cart
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marketplace_cart=info,marketplace_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

#[allow(clippy::print_stdout)]
async fn run(
    cli: Cli,
    config: Result<CartConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config?;
    let session = commands::cart::CartSession::open(&config).await?;

    match cli.command {
        Commands::Show => {}
        Commands::Add {
            id,
            title,
            image_url,
            price,
        } => session.cart().add_to_cart(NewCartEntry {
            id: ProductId::new(id),
            title,
            image_url,
            price,
        }),
        Commands::Increment { id } => session.cart().increment(&ProductId::new(id))?,
        Commands::Decrement { id } => session.cart().decrement(&ProductId::new(id))?,
    }

    let products = session.close().await?;
    println!("{}", commands::cart::render(&products));
    Ok(())
}
