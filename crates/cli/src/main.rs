//! Hardware Storefront CLI - shop against the backend from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the session is kept in STOREFRONT_SESSION_FILE)
//! hs-cli login -e pat@example.com -p 'correct horse'
//!
//! # Browse
//! hs-cli products list --category power-tools --sort price_asc
//! hs-cli products show claw-hammer --slug
//!
//! # Cart
//! hs-cli cart add p-123 -q 2
//! hs-cli cart update item-9 3
//! hs-cli cart show
//!
//! # Checkout
//! hs-cli orders create --address "1 Main St, Springfield" --method card
//! hs-cli pay start ord-42 --method card
//! ```
//!
//! # Commands
//!
//! - `login`, `register`, `logout`, `whoami` - Account
//! - `products`, `categories` - Catalog
//! - `cart` - Cart management
//! - `orders`, `pay` - Checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use hardware_storefront::StorefrontConfig;
use hardware_storefront::error::StorefrontError;
use hardware_storefront::models::ProductSort;
use hardware_storefront_core::PaymentMethod;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "hs-cli")]
#[command(author, version, about = "Hardware Storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,

        /// Contact phone number
        #[arg(long)]
        phone: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Browse products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// List product categories
    Categories,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place and review orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Pay for orders
    Pay {
        #[command(subcommand)]
        action: PayAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List one page of products
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        limit: u32,

        /// Category slug
        #[arg(short, long)]
        category: Option<String>,

        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,

        /// Sort order (`newest`, `price_asc`, `price_desc`, `name`)
        #[arg(long)]
        sort: Option<ProductSort>,
    },
    /// Show one product
    Show {
        /// Product ID (or slug with --slug)
        id: String,

        /// Look the product up by slug
        #[arg(long)]
        slug: bool,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart and its totals
    Show,
    /// Add a product
    Add {
        product_id: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Set a line's quantity
    Update { item_id: String, quantity: i64 },
    /// Remove a line
    Remove { item_id: String },
    /// Remove every line
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List your orders
    List,
    /// Show one order
    Show { order_id: String },
    /// Place an order for the current cart
    Create {
        /// Shipping address
        #[arg(short, long)]
        address: String,

        /// Payment method (`card`, `bank_transfer`, `cash_on_delivery`)
        #[arg(short, long, default_value = "card")]
        method: PaymentMethod,

        #[arg(short, long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum PayAction {
    /// Start paying for an order
    Start {
        order_id: String,

        /// Payment method (`card`, `bank_transfer`, `cash_on_delivery`)
        #[arg(short, long, default_value = "card")]
        method: PaymentMethod,
    },
    /// Check a payment
    Status { payment_id: String },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hardware_storefront=info,hardware_storefront_cli=info".into());

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli, config).await {
        e.capture();
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), StorefrontError> {
    let ctx = Context::open(config)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::account::login(&ctx, email, password).await?;
        }
        Commands::Register {
            name,
            email,
            password,
            phone,
        } => commands::account::register(&ctx, name, email, password, phone).await?,
        Commands::Logout => commands::account::logout(&ctx).await,
        Commands::Whoami => commands::account::whoami(&ctx).await?,
        Commands::Products { action } => match action {
            ProductsAction::List {
                page,
                limit,
                category,
                search,
                sort,
            } => {
                let query = hardware_storefront::models::ProductQuery {
                    page,
                    limit,
                    category,
                    search,
                    sort,
                };
                commands::catalog::list_products(&ctx, &query).await?;
            }
            ProductsAction::Show { id, slug } => {
                commands::catalog::show_product(&ctx, &id, slug).await?;
            }
        },
        Commands::Categories => commands::catalog::list_categories(&ctx).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&ctx, &product_id, quantity).await?,
            CartAction::Update { item_id, quantity } => {
                commands::cart::update(&ctx, &item_id, quantity).await?;
            }
            CartAction::Remove { item_id } => commands::cart::remove(&ctx, &item_id).await?,
            CartAction::Clear => commands::cart::clear(&ctx).await?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List => commands::orders::list(&ctx).await?,
            OrdersAction::Show { order_id } => commands::orders::show(&ctx, &order_id).await?,
            OrdersAction::Create {
                address,
                method,
                notes,
            } => commands::orders::create(&ctx, address, method, notes).await?,
        },
        Commands::Pay { action } => match action {
            PayAction::Start { order_id, method } => {
                commands::orders::start_payment(&ctx, &order_id, method).await?;
            }
            PayAction::Status { payment_id } => {
                commands::orders::payment_status(&ctx, &payment_id).await?;
            }
        },
    }

    ctx.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cart_update() {
        let cli = Cli::try_parse_from(["hs-cli", "cart", "update", "item-9", "3"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Cart {
                action: CartAction::Update { ref item_id, quantity: 3 }
            }) if item_id == "item-9"
        ));
    }

    #[test]
    fn test_parse_payment_method() {
        let cli = Cli::try_parse_from([
            "hs-cli", "orders", "create", "--address", "1 Main St", "--method", "bank_transfer",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Orders {
                action: OrdersAction::Create {
                    method: PaymentMethod::BankTransfer,
                    ..
                }
            })
        ));
    }
}
