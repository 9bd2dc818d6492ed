//! Scan-and-process pipeline.
//!
//! One pass streams every tracking (optionally one vendor's), re-parses the
//! product on the worker pool, diffs it against the stored snapshot, queues
//! an alert when a rule fires and always stores the fresh snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::notification::NotificationBuilder;
use crate::domain::diff::ProductDiff;
use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::repositories::{MessageRepository, TrackingRepository};
use crate::domain::tracking::Tracking;
use crate::domain::vendor::VendorType;
use crate::infrastructure::parsing::ParserRegistry;
use crate::infrastructure::worker_pool::{DEFAULT_WORKER_COUNT, WorkerPool};

/// What happened to a single tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingOutcome {
    /// No rule fired; only the snapshot was refreshed.
    Unchanged,
    /// A new alert was queued for delivery.
    Notified,
    /// The same alert text was already queued for this recipient.
    Duplicate,
}

/// Totals of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub notified: usize,
    pub duplicates: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct ScanCounters {
    notified: AtomicUsize,
    duplicates: AtomicUsize,
}

impl ScanCounters {
    fn record(&self, outcome: TrackingOutcome) {
        match outcome {
            TrackingOutcome::Unchanged => {}
            TrackingOutcome::Notified => {
                self.notified.fetch_add(1, Ordering::Relaxed);
            }
            TrackingOutcome::Duplicate => {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[derive(Clone)]
pub struct Tracker {
    registry: Arc<ParserRegistry>,
    trackings: Arc<dyn TrackingRepository>,
    messages: Arc<dyn MessageRepository>,
    worker_count: usize,
    cancellation: CancellationToken,
}

impl Tracker {
    pub fn new(
        registry: Arc<ParserRegistry>,
        trackings: Arc<dyn TrackingRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        Self {
            registry,
            trackings,
            messages,
            worker_count: DEFAULT_WORKER_COUNT,
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Run one pass. Fails only when the tracking scan cannot be opened;
    /// everything after that is logged and counted.
    pub async fn start(&self, vendor: Option<VendorType>) -> TrackerResult<ScanReport> {
        let started = Instant::now();
        let vendor_label = vendor.map_or("all", VendorType::as_str);
        info!(vendor = vendor_label, workers = self.worker_count, "Tracking pass started");

        let mut stream = self.trackings.scan(vendor).await?;

        let counters = Arc::new(ScanCounters::default());
        let mut pool = WorkerPool::new(self.worker_count, self.cancellation.clone());
        let mut scanned = 0;
        let mut unreadable = 0;

        while let Some(row) = stream.next().await {
            let tracking = match row {
                Ok(tracking) => tracking,
                Err(e) => {
                    unreadable += 1;
                    warn!("Skipping unreadable tracking: {e}");
                    continue;
                }
            };
            scanned += 1;

            let tracker = self.clone();
            let counters = Arc::clone(&counters);
            let pushed = pool
                .push(move || async move {
                    let outcome = tracker.handle_tracking(tracking).await?;
                    counters.record(outcome);
                    Ok(())
                })
                .await;

            match pushed {
                Ok(()) => {}
                Err(TrackerError::Cancelled) => {
                    warn!(scanned, "Tracking pass cancelled, remaining trackings skipped");
                    break;
                }
                Err(e) => {
                    pool.stop_wait().await;
                    return Err(e);
                }
            }
        }

        pool.stop_wait().await;

        let report = ScanReport {
            scanned,
            notified: counters.notified.load(Ordering::Relaxed),
            duplicates: counters.duplicates.load(Ordering::Relaxed),
            failed: pool.stats().failed() + unreadable,
        };

        info!(
            vendor = vendor_label,
            scanned = report.scanned,
            notified = report.notified,
            duplicates = report.duplicates,
            failed = report.failed,
            elapsed_ms = elapsed_millis(started.elapsed()),
            "Tracking pass finished"
        );

        Ok(report)
    }

    /// Re-parse one tracking, queue an alert if something changed and store
    /// the fresh snapshot.
    ///
    /// A failed parse leaves the tracking untouched. A failed alert insert
    /// also skips the snapshot update so the next pass diffs against the
    /// same baseline.
    pub async fn handle_tracking(&self, mut tracking: Tracking) -> TrackerResult<TrackingOutcome> {
        let params = tracking.parse_params();
        let vendor = tracking.parsed_product.vendor;

        let fresh = self.registry.parse(&params).await.inspect_err(|e| {
            warn!(chat_id = tracking.chat_id, url = %tracking.url, vendor = %vendor, "Product parse failed: {e}");
        })?;

        let diff = ProductDiff::between(&tracking.parsed_product, &fresh);
        let result = NotificationBuilder::new(tracking.chat_id)
            .tracking(tracking.clone())
            .product(fresh.clone())
            .diff(diff)
            .build_diff_message();

        let outcome = if result.is_sendable {
            let inserted = self
                .messages
                .insert_if_absent(&result.message)
                .await
                .inspect_err(|e| {
                    warn!(chat_id = tracking.chat_id, url = %tracking.url, "Alert insert failed: {e}");
                })?;

            if inserted {
                info!(chat_id = tracking.chat_id, url = %tracking.url, vendor = %vendor, "Alert queued");
                TrackingOutcome::Notified
            } else {
                debug!(chat_id = tracking.chat_id, url = %tracking.url, "Alert already queued");
                TrackingOutcome::Duplicate
            }
        } else {
            TrackingOutcome::Unchanged
        };

        tracking.mark_handled(fresh, Utc::now());
        self.trackings.upsert(&tracking).await.inspect_err(|e| {
            warn!(chat_id = tracking.chat_id, url = %tracking.url, "Tracking update failed: {e}");
        })?;

        debug!(chat_id = tracking.chat_id, url = %tracking.url, ?outcome, "Tracking handled");
        Ok(outcome)
    }
}

fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
