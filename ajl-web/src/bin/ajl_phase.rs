//! ajl-phase: facilitator tool for reading and changing the workshop phase
//!
//! `watch` behaves like an open page: it polls the service on an interval
//! and re-reads immediately whenever a line is entered on stdin.

use ajl_common::config::DEFAULT_PORT;
use ajl_common::phase::{HttpPhaseSource, PhasePoller, PhaseSource};
use ajl_common::{Phase, PhaseStore};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "ajl-phase")]
#[command(about = "Read, set or watch the workshop phase")]
#[command(version)]
struct Args {
    /// Base URL of a running ajl-web service
    #[arg(short, long, env = "AJL_URL", default_value_t = format!("http://127.0.0.1:{}", DEFAULT_PORT))]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current phase
    Get,
    /// Move the workshop to another phase (1, 2_categories, 2_story, 3)
    Set { phase: String },
    /// Print the phase whenever it changes
    Watch {
        /// Seconds between polls
        #[arg(short, long, default_value_t = 10)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ajl_common=warn,ajl_phase=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let client = reqwest::Client::new();
    let source = HttpPhaseSource::new(client.clone(), args.url);

    match args.command {
        Command::Get => {
            let phase = source
                .fetch_phase()
                .await
                .context("Failed to read workshop phase")?;
            println!("{}", phase);
        }
        Command::Set { phase } => {
            let phase: Phase = phase.parse().context("Unknown phase")?;
            set_phase(&client, &source, phase).await?;
            println!("{}", phase);
        }
        Command::Watch { interval } => {
            if interval == 0 {
                bail!("--interval must be at least 1");
            }
            watch(source, Duration::from_secs(interval)).await?;
        }
    }
    Ok(())
}

async fn set_phase(client: &reqwest::Client, source: &HttpPhaseSource, phase: Phase) -> Result<()> {
    let response = client
        .patch(source.state_url())
        .json(&json!({ "phase": phase.as_str() }))
        .send()
        .await
        .context("Failed to reach ajl-web")?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("Service rejected phase change ({}): {}", status, body);
    }
    Ok(())
}

async fn watch(source: HttpPhaseSource, interval: Duration) -> Result<()> {
    let store = PhaseStore::default();
    let mut changes = store.subscribe();
    let (visible_tx, visible_rx) = mpsc::channel(1);
    let poller = PhasePoller::spawn(store.clone(), Arc::new(source), interval, visible_rx);

    // Each line on stdin counts as the page becoming visible again
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if visible_tx.try_send(()).is_err() {
                warn!("Refresh already queued");
            }
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let phase = *changes.borrow_and_update();
                println!("{}", phase);
            }
        }
    }

    poller.shutdown().await;
    Ok(())
}
