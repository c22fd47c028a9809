use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use client_core::{BackendClient, QuoteFormController};
use shared::{
    domain::{FormField, ProductId},
    error::QuoteError,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const ANALYTICS_QUEUE: usize = 16;
const ANALYTICS_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill in and submit the quote form for a product.
    SubmitQuote {
        #[arg(long, default_value = "1")]
        product: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Print ingested analytics events, one JSON object per line.
    ListEvents {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();
    let backend = BackendClient::new(cli.server_url);

    match cli.command {
        Command::SubmitQuote {
            product,
            name,
            email,
        } => submit_quote(&backend, &product, name, email).await,
        Command::ListEvents { page, per_page } => {
            for event in backend.list_events(page, per_page).await? {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(())
        }
    }
}

async fn submit_quote(
    backend: &BackendClient,
    product: &str,
    name: String,
    email: String,
) -> Result<()> {
    let product_id =
        ProductId::parse(product).ok_or_else(|| anyhow!("invalid product id '{product}'"))?;
    let (tracker, forwarder) = backend.spawn_tracker(ANALYTICS_QUEUE)?;

    let mut controller =
        QuoteFormController::new(product_id, Arc::new(tracker), Arc::new(backend.submitter()?));
    controller.update_field(FormField::Name, name);
    controller.update_field(FormField::Email, email);

    let result = controller
        .submit_or_cancel(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;

    // Dropping the controller releases the last tracker handle so the
    // forwarder can drain and exit.
    drop(controller);
    if tokio::time::timeout(ANALYTICS_FLUSH_TIMEOUT, forwarder)
        .await
        .is_err()
    {
        warn!("analytics events still pending; giving up");
    }

    match result {
        Ok(()) => {
            println!("Thank you! We'll be in touch soon.");
            Ok(())
        }
        Err(QuoteError::Validation(errors)) => {
            for error in &errors {
                eprintln!("{}: {}", error.field.as_str(), error.message);
            }
            bail!("quote form is invalid")
        }
        Err(QuoteError::Submission { reason, retryable }) => {
            if retryable {
                bail!("quote submission failed: {reason} (safe to retry)")
            }
            bail!("quote submission failed: {reason}")
        }
        Err(error @ QuoteError::Cancelled) => Err(error.into()),
    }
}
