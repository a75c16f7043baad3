//! Reconciliation loops
//!
//! Each loop pages through one store collection, finds items still
//! `Pending` and (re)sends the request that should settle them. Results come
//! back through the router's result handlers, which record the outcome; the
//! loops themselves never resolve an item.
//!
//! Before a request goes out its `send_after` is pushed `retry_after` into
//! the future and persisted, so an unanswered item is retried at most once
//! per `retry_after`.

pub mod certificates;
pub mod settings;
pub mod triggers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::OcppVersion;
use crate::handlers::{CallMaker, CsmsRequest};
use crate::store::{Engine, StoreResult};
use crate::support::clock::Clock;
use crate::support::shutdown::ShutdownSignal;

pub use certificates::CertificatesReconciler;
pub use settings::SettingsReconciler;
pub use triggers::TriggersReconciler;

/// Timing and paging shared by all loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub run_every: Duration,
    pub retry_after: Duration,
    pub page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            run_every: Duration::from_secs(60),
            retry_after: Duration::from_secs(120),
            page_size: 50,
        }
    }
}

impl SyncConfig {
    /// The instant a request sent at `now` may be retried.
    pub fn next_attempt(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.retry_after)
            .ok()
            .and_then(|retry| now.checked_add_signed(retry))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Whether an item last scheduled for `send_after` may be sent at `now`.
pub fn is_due(send_after: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > send_after
}

/// Call makers available to the loops, by how a station is reached.
#[derive(Clone)]
pub struct SyncCallMakers {
    /// Plain 1.6 Calls.
    pub v16: Arc<dyn CallMaker>,
    /// 2.0.1 payloads tunneled to 1.6 stations through `DataTransfer`.
    pub v16_data_transfer: Arc<dyn CallMaker>,
    /// Plain 2.0.1 Calls.
    pub v201: Arc<dyn CallMaker>,
}

/// One collection the sync engine converges.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Entry: Send + Sync;

    /// Loop name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn list(&self, page_size: usize, after: &str) -> StoreResult<Vec<Self::Entry>>;

    fn charge_station_id<'a>(&self, entry: &'a Self::Entry) -> &'a str;

    fn has_pending(&self, entry: &Self::Entry) -> bool;

    /// Send whatever `entry` still needs. Failures are logged here; nothing
    /// is returned to the driver.
    async fn reconcile(&self, entry: Self::Entry, version: OcppVersion, now: DateTime<Utc>);
}

/// Collaborators of the loop driver.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn Engine>,
    pub clock: Arc<dyn Clock>,
    pub config: SyncConfig,
}

/// Process one page starting after `cursor` and return the next cursor.
///
/// A page shorter than the page size ends the cycle and the next call starts
/// from the beginning again. A failed listing keeps the cursor.
pub async fn sync_page<R: Reconciler>(reconciler: &R, context: &SyncContext, cursor: &str) -> String {
    let page_size = context.config.page_size;
    let entries = match reconciler.list(page_size, cursor).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(sync_loop = reconciler.name(), error = %e, "listing failed");
            return cursor.to_string();
        }
    };

    let next = if entries.len() < page_size {
        String::new()
    } else {
        entries
            .last()
            .map(|e| reconciler.charge_station_id(e).to_string())
            .unwrap_or_default()
    };

    debug!(
        sync_loop = reconciler.name(),
        count = entries.len(),
        cursor,
        next_cursor = next.as_str(),
        "sync page"
    );

    for entry in entries {
        if !reconciler.has_pending(&entry) {
            continue;
        }
        let charge_station_id = reconciler.charge_station_id(&entry).to_string();

        let details = match context
            .store
            .lookup_charge_station_runtime_details(&charge_station_id)
            .await
        {
            Ok(Some(details)) => details,
            Ok(None) => {
                warn!(
                    sync_loop = reconciler.name(),
                    charge_station_id = charge_station_id.as_str(),
                    "no runtime details, skipping"
                );
                continue;
            }
            Err(e) => {
                error!(
                    sync_loop = reconciler.name(),
                    charge_station_id = charge_station_id.as_str(),
                    error = %e,
                    "runtime details lookup failed"
                );
                continue;
            }
        };

        let now = context.clock.now_utc();
        reconciler.reconcile(entry, details.ocpp_version, now).await;
    }

    next
}

/// Drive `reconciler` every `run_every` until shutdown.
pub async fn run_loop<R: Reconciler>(reconciler: R, context: SyncContext, shutdown: ShutdownSignal) {
    info!(
        "🔄 {} sync started (every {:?}, retry after {:?}, page size {})",
        reconciler.name(),
        context.config.run_every,
        context.config.retry_after,
        context.config.page_size
    );

    let mut interval = tokio::time::interval(context.config.run_every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cursor = String::new();

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.notified().wait() => break,
        }
        tokio::select! {
            next = sync_page(&reconciler, &context, &cursor) => cursor = next,
            _ = shutdown.notified().wait() => break,
        }
    }

    info!("🔄 {} sync stopped", reconciler.name());
}

/// Spawn the settings, certificates and triggers loops.
pub fn spawn_all(
    context: SyncContext,
    call_makers: SyncCallMakers,
    shutdown: ShutdownSignal,
) -> Vec<JoinHandle<()>> {
    let settings = SettingsReconciler::new(context.store.clone(), call_makers.clone(), context.config);
    let certificates =
        CertificatesReconciler::new(context.store.clone(), call_makers.clone(), context.config);
    let triggers = TriggersReconciler::new(context.store.clone(), call_makers, context.config);

    vec![
        tokio::spawn(run_loop(settings, context.clone(), shutdown.clone())),
        tokio::spawn(run_loop(certificates, context.clone(), shutdown.clone())),
        tokio::spawn(run_loop(triggers, context, shutdown)),
    ]
}

/// Send one request, logging and counting the outcome.
pub(crate) async fn deliver(
    sync_loop: &'static str,
    call_maker: &dyn CallMaker,
    charge_station_id: &str,
    request: CsmsRequest,
) {
    let kind = request.kind();
    let result = call_maker.send(charge_station_id, request).await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!("csms_sync_sends_total", "loop" => sync_loop, "result" => outcome)
        .increment(1);

    if let Err(e) = result {
        error!(
            sync_loop,
            charge_station_id,
            request = ?kind,
            error = %e,
            "sending request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn due_only_strictly_after_send_after() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert!(!is_due(at, at));
        assert!(is_due(at, at + chrono::Duration::milliseconds(1)));
        assert!(is_due(DateTime::<Utc>::default(), at));
    }

    #[test]
    fn next_attempt_adds_retry_after() {
        let config = SyncConfig {
            retry_after: Duration::from_secs(120),
            ..SyncConfig::default()
        };
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(
            config.next_attempt(at),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 2, 0).unwrap()
        );
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.run_every, Duration::from_secs(60));
        assert_eq!(config.retry_after, Duration::from_secs(120));
        assert_eq!(config.page_size, 50);
    }
}
