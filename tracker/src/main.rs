use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use finance_tracker::backend::domain::calculator::get_category_sum;
use finance_tracker::backend::domain::{FinanceDataService, ResourceKind, ResourceStatus, SessionGate};
use finance_tracker::backend::storage::{build_repository, StaticToken};
use finance_tracker::config::{AppConfig, StorageMode};
use finance_tracker::{create_router, initialize_backend};

#[derive(Parser)]
#[command(name = "finance-tracker", version, about = "Track categorized balances and their history")]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print totals and per-category sums
    Summary,
    /// Record the current totals in the history
    Snapshot,
    /// Print the chart series, oldest first
    Chart,
    /// Add an item to a category
    AddItem {
        #[arg(long)]
        category: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        amount: Option<f64>,
    },
    /// Show the revision history of an item
    ItemHistory { id: String },
    /// Serve the REST API over local storage
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    env_logger::Builder::new()
        .filter_level(config.log_filter()?)
        .parse_env("RUST_LOG")
        .init();
    match AppConfig::source_path(cli.config.as_deref()) {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    run(&config, cli.command).await
}

async fn serve(config: &AppConfig, bind: Option<String>) -> Result<()> {
    let app_state = initialize_backend(config)?;
    let app = create_router(app_state);

    let address = bind.unwrap_or_else(|| config.server.bind_address.clone());
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn open_service(config: &AppConfig) -> Result<FinanceDataService> {
    let auth = Arc::new(StaticToken::new(config.storage.api_token.clone()));
    let repository = build_repository(&config.storage, auth)?;

    let service = match config.storage.mode {
        StorageMode::Local => {
            let service = FinanceDataService::new(repository, SessionGate::Always)?;
            service.load().await;
            service
        }
        StorageMode::Remote => {
            let service = FinanceDataService::new(repository, SessionGate::RequiresLogin)?;
            service.set_logged_in(config.storage.api_token.is_some()).await;
            service
        }
    };

    for kind in [ResourceKind::Items, ResourceKind::Categories, ResourceKind::History] {
        if let ResourceStatus::Errored(message) = service.status(kind) {
            bail!("Failed to load {:?}: {}", kind, message);
        }
    }
    Ok(service)
}

async fn finish(service: &FinanceDataService) -> Result<()> {
    service.settle().await;
    match service.last_error() {
        Some(message) => bail!("Write failed: {}", message),
        None => Ok(()),
    }
}

async fn run(config: &AppConfig, command: Command) -> Result<()> {
    match command {
        Command::Serve { bind } => serve(config, bind).await?,
        Command::Summary => {
            let service = open_service(config).await?;
            service.settle().await;
            let totals = service.totals();
            println!("Income:      {:>14.2}", totals.income);
            println!("Expenses:    {:>14.2}", totals.expenses);
            println!("Balance:     {:>14.2}", totals.balance);
            println!("Informative: {:>14.2}", totals.informative);
            println!();
            let items = service.items();
            for category in service.categories() {
                println!(
                    "{:<24} {:<12} {:>14.2}",
                    category.name,
                    category.effect.to_string(),
                    get_category_sum(&items, &category.id)
                );
            }
        }
        Command::Snapshot => {
            let service = open_service(config).await?;
            if !service.snapshot_history() {
                bail!("Items, categories and history must be loaded before taking a snapshot");
            }
            finish(&service).await?;
            if let Some(entry) = service.history().first() {
                println!("Recorded snapshot {} at {} (balance {:.2})", entry.id, entry.date, entry.balance);
            }
        }
        Command::Chart => {
            let service = open_service(config).await?;
            service.settle().await;
            for point in service.chart_data() {
                println!(
                    "{:<4} {:<26} balance {:>14.2}  debt {:>14.2}  retirement {:>14.2}",
                    point.label, point.date, point.balance, point.debt, point.retirement
                );
            }
        }
        Command::AddItem { category, name, amount } => {
            let service = open_service(config).await?;
            let Some(mut item) = service.add_item(&category) else {
                bail!("Items must be loaded before adding one");
            };
            if name.is_some() || amount.is_some() {
                item.name = name.unwrap_or(item.name);
                item.amount = amount.unwrap_or(item.amount);
                service.update_item(&item.id, &item.name, item.amount);
            }
            finish(&service).await?;
            println!("Added {} ({}) = {:.2} to {}", item.name, item.id, item.amount, item.category);
        }
        Command::ItemHistory { id } => {
            let service = open_service(config).await?;
            let revisions = service.get_item_history(&id).await?;
            if revisions.is_empty() {
                println!("No revisions recorded for item {}", id);
            }
            for revision in revisions {
                println!(
                    "{}  {:<6} {:<24} {:>14.2}  {}",
                    revision.timestamp,
                    format!("{:?}", revision.revision_type).to_lowercase(),
                    revision.name,
                    revision.amount,
                    revision.category
                );
            }
        }
    }
    Ok(())
}
