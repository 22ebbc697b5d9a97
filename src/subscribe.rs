//! Subscription manager: live change pipes and the bounded polling loop.
//!
//! One state machine per run: pipes are created, signups registered with
//! failure triage, a sink attached, then events are drained in bounded
//! batches until the cancellation flag is observed at an iteration
//! boundary. Events already drained when cancellation is seen are still
//! delivered.

use crate::constants::{MAX_PIPE_EVENTS, PIPE_POLL_INTERVAL};
use crate::error::Result;
use crate::historian::{Capability, DataPipe, Historian};
use crate::query::QueryExecutor;
use crate::sink::ChangeSink;
use crate::types::{PipeKind, PointId, PointSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a subscription run ended. Exhaustion and missing capability are
/// ordinary control-flow outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeOutcome {
    /// Polled until the cancellation flag was raised
    Cancelled,
    /// Every point failed signup; pipes closed and connection released
    Exhausted,
    /// The historian lacks the required pipe capability; nothing attempted
    Unsupported,
}

pub struct SubscriptionManager<'a, H: Historian> {
    conn: &'a H,
    sink: &'a dyn ChangeSink,
    cancel: Arc<AtomicBool>,
}

impl<'a, H: Historian> SubscriptionManager<'a, H> {
    pub fn new(conn: &'a H, sink: &'a dyn ChangeSink, cancel: Arc<AtomicBool>) -> Self {
        Self { conn, sink, cancel }
    }

    /// Merged time-series subscription: snapshot and archive changes on one
    /// pipe. Any signup failure removes the point from the set.
    pub async fn run_time_series(&self, set: &mut PointSet) -> Result<SubscribeOutcome> {
        if !self.conn.supports(Capability::TimeSeriesPipe) {
            error!("time-series data pipe not supported by this historian");
            return Ok(SubscribeOutcome::Unsupported);
        }

        info!("signing up for time-series events");
        let mut pipe = self.conn.open_pipe(PipeKind::TimeSeries).await?;
        let failures = pipe.add_signups(&set.ids()).await?;
        for (id, e) in &failures {
            warn!("failed time-series signup: {}, {}", set.name_of(*id), e);
            set.remove(*id);
        }

        if set.is_empty() {
            warn!("no valid points left, releasing connection");
            pipe.close().await;
            self.conn.disconnect().await;
            return Ok(SubscribeOutcome::Exhausted);
        }

        pipe.subscribe().await?;
        self.log_current_values(set).await;

        let mut pipes = vec![(PipeKind::TimeSeries, pipe)];
        self.poll_until_cancelled(&mut pipes).await;
        Ok(SubscribeOutcome::Cancelled)
    }

    /// Snapshot and/or archive subscription over independent pipes. A point
    /// is removed only when it failed signup on every active pipe; failing
    /// one of two is tolerated but logged.
    pub async fn run_dual(
        &self,
        set: &mut PointSet,
        snapshot: bool,
        archive: bool,
    ) -> Result<SubscribeOutcome> {
        let mut failure_counts: Vec<(PointId, usize)> =
            set.iter().map(|p| (p.id, 0)).collect();
        let mut pipes: Vec<(PipeKind, Box<dyn DataPipe>)> = Vec::new();

        let mut kinds = Vec::new();
        if snapshot {
            kinds.push(PipeKind::Snapshot);
        }
        if archive {
            kinds.push(PipeKind::Archive);
        }

        for kind in kinds {
            info!("signing up for {} events", kind.label());
            let mut pipe = self.conn.open_pipe(kind).await?;
            let failures = pipe.add_signups(&set.ids()).await?;
            for (id, e) in &failures {
                warn!(
                    "failed {} signup: {}, {}",
                    kind.label(),
                    set.name_of(*id),
                    e
                );
                if let Some(entry) = failure_counts.iter_mut().find(|(fid, _)| *fid == *id) {
                    entry.1 += 1;
                }
            }
            pipe.subscribe().await?;
            pipes.push((kind, pipe));
        }

        // a point stays only while at least one active pipe accepted it
        let threshold = pipes.len();
        for (id, count) in &failure_counts {
            if *count >= threshold {
                warn!("removing unsubscribable point {}", set.name_of(*id));
                set.remove(*id);
            }
        }

        if set.is_empty() {
            warn!("no valid points left, releasing connection");
            for (_, pipe) in pipes.iter_mut() {
                pipe.close().await;
            }
            self.conn.disconnect().await;
            return Ok(SubscribeOutcome::Exhausted);
        }

        self.log_current_values(set).await;
        self.poll_until_cancelled(&mut pipes).await;
        Ok(SubscribeOutcome::Cancelled)
    }

    /// Drains every active pipe once per iteration, up to the batch cap,
    /// then sleeps. Cancellation is observed at iteration boundaries only.
    async fn poll_until_cancelled(&self, pipes: &mut [(PipeKind, Box<dyn DataPipe>)]) {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            for (kind, pipe) in pipes.iter_mut() {
                match pipe.poll(MAX_PIPE_EVENTS).await {
                    Ok(events) => {
                        for event in &events {
                            self.sink.on_event(*kind, event);
                        }
                    }
                    Err(e) => self.sink.on_error(&e),
                }
            }
            tokio::time::sleep(PIPE_POLL_INTERVAL).await;
        }

        info!("cancelling signups ...");
        for (_, pipe) in pipes.iter_mut() {
            pipe.close().await;
        }
    }

    /// Logs the current value of every subscribed point once after signup
    async fn log_current_values(&self, set: &PointSet) {
        match QueryExecutor::new(self.conn).snapshot(set).await {
            Ok(outcomes) => {
                info!("subscribed points (current value):");
                for (id, outcome) in outcomes {
                    match outcome {
                        Ok(value) => {
                            info!("{:<12}, {}, {}", set.name_of(id), value.timestamp, value)
                        }
                        Err(e) => warn!("{}: {}", set.name_of(id), e),
                    }
                }
            }
            Err(e) => warn!("current value read failed: {}", e),
        }
    }
}
