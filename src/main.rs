use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::error;

use uk_address_service::common::types::{AddressQuery, CancellationFlag};
use uk_address_service::config::Config;
use uk_address_service::server::AppState;
use uk_address_service::{logging, metrics, server};

#[derive(Parser)]
#[command(name = "uk_address_service")]
#[command(about = "UK address resolution and autocomplete service")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Resolve a free-text query or postcode from the command line
    Search {
        /// The query text, e.g. "10 Downing Street" or "SW1A 1AA"
        query: String,
        /// Maximum number of suggestions
        #[arg(long)]
        limit: Option<usize>,
        /// ISO-2 country hint
        #[arg(long)]
        country: Option<String>,
    },
    /// List every known address in a postcode
    Postcode {
        /// Full or partial UK postcode, e.g. "SW1A 1AA" or "G31"
        postcode: String,
        /// Maximum number of addresses
        #[arg(long)]
        limit: Option<usize>,
    },
}

async fn run_query(state: &AppState, query: AddressQuery) {
    let outcome = state
        .orchestrator
        .resolve(&query, &CancellationFlag::new())
        .await;

    let provider = outcome
        .provider_used
        .map(|p| p.as_str())
        .unwrap_or("none");
    println!("\n📊 Resolution results for \"{}\":", query.raw);
    println!("   Provider: {}", provider);
    println!("   Fallback attempted: {}", outcome.fallback_attempted);
    println!("   Suggestions: {}", outcome.candidates.len());
    for candidate in &outcome.candidates {
        println!(
            "   📍 {} [{} | priority {} | confidence {:.2}]",
            candidate.display_text, candidate.provider, candidate.priority, candidate.confidence
        );
    }
    if outcome.candidates.is_empty() {
        println!("   (no addresses found)");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default();

    match cli.command {
        Commands::Serve { port } => {
            metrics::init_metrics();
            let port = port.unwrap_or(config.server.port);
            let state = Arc::new(AppState::from_config(config)?);
            if let Err(e) = server::start_server(state, port).await {
                error!("Server failed: {e}");
                return Err(e);
            }
        }
        Commands::Search {
            query,
            limit,
            country,
        } => {
            println!("🔎 Resolving address query...");
            let state = AppState::from_config(config)?;
            let query = AddressQuery::new(&query, country.as_deref(), limit);
            run_query(&state, query).await;
        }
        Commands::Postcode { postcode, limit } => {
            println!("📮 Looking up postcode...");
            let state = AppState::from_config(config)?;
            let limit = limit.or(Some(state.config.pipeline.postcode_limit));
            let query = AddressQuery::new(&postcode, None, limit);
            if !query.classification.is_postcode_shaped() {
                println!("⚠️  \"{}\" does not look like a UK postcode", postcode);
                return Ok(());
            }
            run_query(&state, query).await;
        }
    }
    Ok(())
}
