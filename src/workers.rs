//! Background loops: outbox dispatch, post-commit tasks, request expiry
//! and the stock monitor. Each loop swallows and logs its errors so one
//! bad pass never kills the worker.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::AppState;

/// Spawns all periodic workers for the given state.
pub fn spawn_all(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    vec![
        spawn_dispatcher(state.clone()),
        spawn_post_commit(state.clone()),
        spawn_expiry_sweep(state.clone()),
        spawn_stock_monitor(state),
    ]
}

fn spawn_dispatcher(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.dispatcher.poll_interval_secs);
    tokio::spawn(async move {
        info!("notification dispatcher worker started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = state.dispatcher.run_due(Utc::now()).await {
                error!("dispatch pass failed: {}", e);
            }
        }
    })
}

fn spawn_post_commit(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.dispatcher.poll_interval_secs);
    tokio::spawn(async move {
        info!("post-commit task worker started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = state.post_commit_tasks.run_due(Utc::now()).await {
                error!("post-commit pass failed: {}", e);
            }
        }
    })
}

fn spawn_expiry_sweep(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.stock_monitor.expiry_sweep_interval_secs);
    tokio::spawn(async move {
        info!("request expiry sweep started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = state.quotation_requests.expire_due(Utc::now()).await {
                error!("expiry sweep failed: {}", e);
            }
        }
    })
}

fn spawn_stock_monitor(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.stock_monitor.scan_interval_secs);
    tokio::spawn(async move {
        info!("stock monitor started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = state.stock_monitor.run().await {
                error!("stock monitor run failed: {}", e);
            }
        }
    })
}
