//! Parse a single product URL and print the preview message.
//!
//! Useful when a vendor changes its markup: run against a live page and see
//! whether the parser still finds sizes, stock and prices.
//!
//! ```text
//! cargo run --bin check_product -- https://www.lamoda.ru/p/.../ --size M --size L --discount 5
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use outfit_tracker_lib::application::NotificationBuilder;
use outfit_tracker_lib::domain::{Discount, ParseParams, SizeFilter};
use outfit_tracker_lib::infrastructure::{AppConfig, HttpClient, ParserRegistry, init_logging_with_config};

#[derive(Debug, Parser)]
#[command(name = "check_product", about = "Parse one product page and print the result")]
struct Cli {
    /// Product page URL
    url: String,

    /// Requested size, repeatable; all sizes when omitted
    #[arg(short, long = "size")]
    sizes: Vec<String>,

    /// Personal discount percent
    #[arg(short, long)]
    discount: Option<i64>,

    /// Print the parsed product as JSON instead of the message text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(None).context("Failed to load configuration")?;
    init_logging_with_config(&config.logging)?;

    let http = Arc::new(HttpClient::new(config.http.clone())?);
    let registry = ParserRegistry::with_default_parsers(http)?;

    let params = ParseParams::new(&cli.url)
        .with_sizes(SizeFilter::new(cli.sizes))
        .with_discount(cli.discount.map(|percent| Discount { percent }));

    let product = registry
        .parse(&params)
        .await
        .with_context(|| format!("Failed to parse {}", cli.url))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&product)?);
    } else {
        let result = NotificationBuilder::new(0).product(product).build_product_message();
        println!("{}", result.message.text.value);
    }

    Ok(())
}
