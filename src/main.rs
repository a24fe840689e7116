use std::env;
use std::io;

use anyhow::{Context, bail};
use skillcoin_ledger::csv::{read_balances, read_redemptions, write_balances};
use skillcoin_ledger::{Config, CreditsAuthority, HttpAuthority, InMemoryAuthority, Ledger};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: skillcoin-ledger <redemptions.csv> [balances.csv]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(redemptions) = args.next() else {
        bail!(USAGE);
    };
    let balances = args.next();

    if !redemptions.ends_with(".csv") {
        warn!(path = %redemptions, "input file seems to not be a csv file");
    }

    let config = Config::from_env()?;

    match &config.api_base_url {
        Some(base) => {
            info!(%base, "using remote credits authority");
            let authority = HttpAuthority::new(base.clone(), &config)?;
            run(Ledger::new(authority), redemptions).await
        }
        None => {
            let Some(balances) = balances else {
                bail!("no SKILLCOIN_API_BASE_URL set and no balances file given\n{USAGE}");
            };
            let seed = read_balances(&balances)
                .with_context(|| format!("failed to load balances from {balances}"))?;
            info!(users = seed.len(), "using in-memory credits authority");
            run(Ledger::new(InMemoryAuthority::with_balances(seed)), redemptions).await
        }
    }
}

async fn run<A: CreditsAuthority>(ledger: Ledger<A>, redemptions: String) -> anyhow::Result<()> {
    let rows = read_redemptions(redemptions)?;
    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in rows {
            match result {
                Ok(command) => {
                    if command_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    ledger.run(ReceiverStream::new(command_receiver)).await;

    write_balances(&ledger.accounts(), io::stdout().lock())?;
    Ok(())
}
