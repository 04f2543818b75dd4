use std::sync::Arc;

use eyre::Result;
use panel_oracle::{
    anchor::{AnchorSink, sink_from_config},
    api::{AppState, listen_app},
    config::{self, Config, SourceMode},
    contract::{
        FilterSource, ProviderHead, SubscriptionSource, panel_event_filter,
        providers::{self, ProviderPool},
    },
    logging,
    monitor::{
        Monitor, MonitorReport, MonitorSettings, MonitorStatus,
        cursor::FileCheckpoint,
    },
    panels::PanelStore,
    source::EventSource,
};
use tokio::{signal, sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

fn spawn_monitor<S>(
    source: S,
    sink: Box<dyn AnchorSink>,
    config: &Config,
    cancel: CancellationToken,
) -> (JoinHandle<MonitorReport>, watch::Receiver<MonitorStatus>)
where
    S: EventSource + 'static,
{
    let mut monitor =
        Monitor::new(source, sink, MonitorSettings::from(&config.monitor))
            .with_cancel(cancel);
    if let Some(path) = &config.monitor.checkpoint_file {
        monitor = monitor.with_checkpoint(FileCheckpoint::new(path));
    }
    let status = monitor.subscribe();
    (tokio::spawn(monitor.run()), status)
}

fn start_monitor(
    config: &Config,
    pool: &ProviderPool,
    sink: Box<dyn AnchorSink>,
    cancel: CancellationToken,
) -> (JoinHandle<MonitorReport>, watch::Receiver<MonitorStatus>) {
    let filter = panel_event_filter(config.chain.contract_address);
    let print_raw = config.flags.print_raw_logs;
    tracing::info!(
        contract = %config.chain.contract_address,
        mode = ?config.monitor.source_mode,
        "watching panel registry"
    );
    match config.monitor.source_mode {
        SourceMode::Filter => {
            let source = FilterSource::new(pool.http_reader(), filter)
                .print_raw_logs(print_raw);
            spawn_monitor(source, sink, config, cancel)
        }
        SourceMode::Subscription => {
            let source =
                SubscriptionSource::new(pool.ws_url(), pool.http_reader(), filter)
                    .print_raw_logs(print_raw);
            spawn_monitor(source, sink, config, cancel)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init();
    let config = config::init_from_env()?;
    let pool = providers::init_pool(config)?;
    let cancel = CancellationToken::new();

    let sink = sink_from_config(config)?;
    let (mut monitor, status) =
        start_monitor(config, pool, sink, cancel.child_token());

    let state = AppState {
        chain: Arc::new(ProviderHead::new(
            pool.http_reader(),
            config.monitor.rpc_timeout,
        )),
        wallet: config.chain.wallet_address,
        store: PanelStore::new(&config.api.panels_dir),
        monitor: status,
    };

    let mut monitor_done = false;
    tokio::select! {
        res = listen_app(state, config.api.bind_addr, cancel.child_token()) => {
            if let Err(e) = res {
                tracing::error!(error = ?e, "http server failed");
            }
        }
        res = &mut monitor => {
            monitor_done = true;
            match res {
                Ok(report) => tracing::warn!(?report, "monitor exited"),
                Err(e) => tracing::error!(error = %e, "monitor task panicked"),
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down");
        }
    }

    cancel.cancel();
    if !monitor_done {
        match monitor.await {
            Ok(report) => tracing::info!(
                dispatched = report.dispatched,
                failed = report.failed_dispatches,
                reconnects = report.reconnects,
                "monitor drained"
            ),
            Err(e) => tracing::error!(error = %e, "monitor task panicked"),
        }
    }
    Ok(())
}
