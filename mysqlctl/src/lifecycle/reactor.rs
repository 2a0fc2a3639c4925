//! Background tasks that react to lifecycle changes.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fleet::ServerFleetProvisioner;
use super::users::UserLifecycleManager;
use crate::events::LifecycleEvent;

/// Revoke users from every database that is removed, until `shutdown` fires or the bus closes.
///
/// Subscribe before spawning so no removal published in between is missed.
pub async fn run_revoke_sweeper(
    users: UserLifecycleManager,
    mut events: broadcast::Receiver<LifecycleEvent>,
    shutdown: CancellationToken,
) {
    info!("Starting revoke sweeper");
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(LifecycleEvent::DatabaseRemoved(database)) => {
                let report = users.sweep_database(&database).await;
                if report.outcomes.is_empty() {
                    debug!("No users held {}", report.database_name);
                    continue;
                }
                info!(
                    "Revoked {} of {} users from removed database {}",
                    report.succeeded(),
                    report.outcomes.len(),
                    report.database_name
                );
                for failed in report.failed() {
                    if let Err(message) = &failed.result {
                        error!("Revoke of {} from {} failed: {}", report.database_name, failed.username, message);
                    }
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                warn!("Revoke sweeper fell behind and missed {} lifecycle events", missed);
            }
            Err(RecvError::Closed) => {
                debug!("Lifecycle bus closed");
                break;
            }
        }
    }
    info!("Revoke sweeper stopped");
}

/// Poll clusters for the status of every hosted server each `interval` until `shutdown` fires.
pub async fn run_readiness_poller(fleet: ServerFleetProvisioner, interval: Duration, shutdown: CancellationToken) {
    info!("Starting readiness poller (every {:?})", interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match fleet.refresh_workloads().await {
            Ok(0) => {}
            Ok(changed) => info!("Readiness poll updated {} servers", changed),
            Err(e) => error!("Readiness poll failed: {}", e),
        }
    }
    info!("Readiness poller stopped");
}
