//! Bikeshop CLI - cart, wishlist and session from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Who is signed in (resolves the stored session)
//! bikeshop whoami
//!
//! # Sign in; the password can also come from BIKESHOP_PASSWORD
//! bikeshop login minh --password hunter2
//!
//! # Add product 7 to the cart, or remove it if present
//! bikeshop cart toggle 7
//!
//! # Browse Giant bikes under 10 million VND
//! bikeshop products --brand Giant --max-price 10000000
//!
//! # Search the catalog, loading two pages
//! bikeshop search "road bike" --pages 2
//! ```
//!
//! # Environment Variables
//!
//! See `bikeshop_storefront::config`. `RUST_LOG` overrides the default
//! `bikeshop_storefront=info` filter.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bikeshop_core::{CartLineId, DashboardSection, Price, ProductId, Quantity};
use bikeshop_storefront::api::ProductFilter;
use bikeshop_storefront::config::LogFormat;
use bikeshop_storefront::{ClientState, StorefrontConfig};

mod commands;

#[derive(Parser)]
#[command(name = "bikeshop")]
#[command(author, version, about = "Bikeshop storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the signed-in user
    Whoami,
    /// Sign in
    Login {
        username: String,

        #[arg(long, env = "BIKESHOP_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and return to the anonymous cart
    Logout,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Show one product
    Product { id: ProductId },
    /// Browse the catalog, optionally filtered
    Products {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        brand: Option<String>,

        /// Lowest price in VND
        #[arg(long)]
        min_price: Option<u64>,

        /// Highest price in VND
        #[arg(long)]
        max_price: Option<u64>,

        /// Page to show, starting at 1
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },
    /// Search the catalog
    Search {
        keyword: String,

        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Admin dashboard section preference
    Dashboard {
        #[command(subcommand)]
        action: DashboardAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines
    Show,
    /// Add a product, or remove it if already in the cart
    Toggle { product_id: ProductId },
    /// Remove a product
    Remove { product_id: ProductId },
    /// Change a line's quantity
    Update {
        line_id: CartLineId,
        quantity: Quantity,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List wishlist entries
    Show,
    /// Add a product, or remove it if already wished for
    Toggle { product_id: ProductId },
    /// Remove a product
    Remove { product_id: ProductId },
    /// Remove every entry
    Clear,
}

#[derive(Subcommand)]
enum DashboardAction {
    /// Print the active section
    Show,
    /// Set the active section
    Set { section: DashboardSection },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Text);
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    // Logs go to stderr so command output stays clean
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bikeshop_storefront=info,bikeshop=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = ClientState::new(config)?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Whoami => commands::session::whoami(&state, &mut out).await?,
        Commands::Login { username, password } => {
            let password = SecretString::from(password);
            commands::session::login(&state, &mut out, &username, &password).await?;
        }
        Commands::Logout => commands::session::logout(&state, &mut out).await?,
        Commands::Cart { action } => {
            state.resolve_session().await?;
            match action {
                CartAction::Show => {}
                CartAction::Toggle { product_id } => {
                    let product = state.product(product_id).await?;
                    state.cart().toggle(&product).await?;
                }
                CartAction::Remove { product_id } => state.cart().remove(product_id).await?,
                CartAction::Update { line_id, quantity } => {
                    state.cart().update_quantity(line_id, quantity).await?;
                }
                CartAction::Clear => state.cart().clear().await?,
            }
            commands::cart::show(state.cart(), &mut out)?;
        }
        Commands::Wishlist { action } => {
            state.resolve_session().await?;
            match action {
                WishlistAction::Show => {}
                WishlistAction::Toggle { product_id } => {
                    let product = state.product(product_id).await?;
                    state.wishlist().toggle(&product).await?;
                }
                WishlistAction::Remove { product_id } => {
                    state.wishlist().remove(product_id).await?;
                }
                WishlistAction::Clear => state.wishlist().clear().await?,
            }
            commands::wishlist::show(state.wishlist(), &mut out)?;
        }
        Commands::Product { id } => commands::catalog::product(&state, &mut out, id).await?,
        Commands::Products {
            category,
            brand,
            min_price,
            max_price,
            page,
        } => {
            let filter = ProductFilter {
                category,
                brand,
                min_price: min_price.map(Price::new),
                max_price: max_price.map(Price::new),
            };
            commands::catalog::browse(&state, &mut out, &filter, page - 1).await?;
        }
        Commands::Search { keyword, pages } => {
            commands::catalog::search(&state, &mut out, &keyword, pages).await?;
        }
        Commands::Dashboard { action } => match action {
            DashboardAction::Show => commands::dashboard::show(&state, &mut out)?,
            DashboardAction::Set { section } => {
                commands::dashboard::set(&state, &mut out, section)?;
            }
        },
    }
    Ok(())
}
