mod cli;
mod config;

use std::time::Duration;

use adapters::coinbase::ws::{WsRead, WsWrite};
use adapters::coinbase::{FeedClient, FeedError, ReceiveExit};
use adapters::output::open_output;
use anyhow::Context;
use clap::Parser;
use common::logger::{TraceId, child_span, init_logger, root_span, warn_if_slow};
use engine::DispatchActor;
use engine::metrics::Counters;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, warn};

use crate::cli::Cli;
use crate::config::AppConfig;

type Feed = FeedClient<WsWrite, WsRead>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (cfg, warnings) = AppConfig::resolve(&cli).context("invalid configuration")?;

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("vwap", cfg.log_level.as_directive(), cfg.json_logs || is_production);

    for warning in &warnings {
        warn!(%warning, "configuration adjusted");
    }

    let trace_id = TraceId::new();
    run(cfg).instrument(root_span("vwap", &trace_id)).await
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    info!(
        endpoint = %cfg.endpoint,
        pairs = ?cfg.trading_pairs,
        max_data_points = cfg.max_data_points,
        output = ?cfg.output_file,
        "starting"
    );

    let sink = open_output(cfg.output_file.as_deref()).await?;

    let counters = Counters::default();
    let mut actor = DispatchActor::new(sink)
        .with_span(child_span(&Span::current(), "dispatch"))
        .with_counters(counters.clone());
    for pair in &cfg.trading_pairs {
        actor
            .register(pair.clone(), cfg.max_data_points)
            .with_context(|| format!("cannot register {pair}"))?;
    }

    let root = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(cfg.channel_capacity);
    let actor = actor.spawn(events_rx, root.child_token());
    let stats = tokio::spawn(
        log_stats(counters, cfg.stats_interval, root.child_token()).instrument(Span::current()),
    );

    let mut client = match connect_and_subscribe(&cfg).await {
        Ok(client) => client,
        Err(e) => {
            if let Err(stop) = actor.shutdown().await {
                error!(error = %stop, "dispatch actor did not stop cleanly");
            }
            root.cancel();
            let _ = stats.await;
            return Err(e);
        }
    };

    let feed_cancel = root.child_token();
    let mut feed: JoinHandle<(Feed, Result<ReceiveExit, FeedError>)> = tokio::spawn(async move {
        let exit = client.receive(events_tx, feed_cancel).await;
        (client, exit)
    });

    let feed_done = tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            None
        }
        joined = &mut feed => Some(joined),
    };

    // Engine first: once this returns nothing reaches the sink anymore.
    let report = if feed_done.is_some() {
        // the feed dropped its sender, let the actor finish what is buffered
        actor.wait().await?
    } else {
        actor.shutdown().await?
    };
    root.cancel();
    let _ = stats.await;

    let joined = match feed_done {
        Some(joined) => joined,
        None => feed.await,
    };

    let mut feed_error = None;
    match joined {
        Ok((mut client, exit)) => {
            match exit {
                Ok(reason) => info!(?reason, "feed stopped"),
                Err(e) => {
                    error!(error = %e, "feed failed");
                    feed_error = Some(e);
                }
            }

            if let Err(e) = client.unsubscribe_within(cfg.unsubscribe_timeout).await {
                warn!(error = %e, "unsubscribe failed");
            }
            if let Err(e) = client.close().await {
                warn!(error = %e, "cannot close feed connection");
            }
        }
        Err(e) => error!(error = %e, "feed task failed"),
    }

    info!(exit = ?report.exit, counters = ?report.counters, "vwap stopped");

    match feed_error {
        Some(e) => Err(e).context("feed failed"),
        None => Ok(()),
    }
}

async fn connect_and_subscribe(cfg: &AppConfig) -> anyhow::Result<Feed> {
    let client = FeedClient::connect(
        &cfg.endpoint,
        cfg.trading_pairs.clone(),
        cfg.connect_timeout,
    )
    .await
    .with_context(|| format!("cannot connect to {}", cfg.endpoint))?;

    let mut client = client
        .with_handshake_timeout(cfg.handshake_timeout)
        .with_span(child_span(&Span::current(), "feed"));

    warn_if_slow("subscribe", Duration::from_secs(2), client.subscribe())
        .await
        .context("subscribe failed")?;

    Ok(client)
}

/// Log a counters snapshot every `every` until cancelled.
async fn log_stats(counters: Counters, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    // the first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snap = counters.snapshot();
                info!(
                    trades = snap.trades_accepted,
                    results = snap.results_written,
                    heartbeats = snap.heartbeats,
                    stale = snap.stale_rejected,
                    sink_failures = snap.sink_failures,
                    "engine stats"
                );
            }
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
