//! Consumed interface of the remote historian connection.
//!
//! The core never talks a wire protocol itself; it orchestrates these
//! primitives. Bulk calls receive one page of points at a time (the
//! executors slice the point set into fixed point-count pages) and report
//! per-point outcomes so a single bad point cannot fail its page.

use crate::error::{HistorianError, Result};
use crate::types::{
    CalculationBasis, PipeEvent, PipeKind, PointId, PointOutcomes, SummaryKind, SummaryResult,
    TimeRange, Value,
};
use crate::params::{BufferMode, UpdateMode};
use async_trait::async_trait;
use std::time::Duration;

/// Boundary policy for archived reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Values inside the range only; boundary-crossing values excluded
    Inside,
    /// Values inside plus the nearest value outside each boundary
    Outside,
}

/// Optional server features probed before choosing an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    DeleteRange,
    TimeSeriesPipe,
}

#[async_trait]
pub trait Historian: Send + Sync {
    /// Current value of every point in the page
    async fn snapshot(&self, points: &[PointId]) -> Result<PointOutcomes<Value>>;

    /// Raw stored values in range; `max_count` of 0 is unbounded
    async fn recorded(
        &self,
        points: &[PointId],
        range: TimeRange,
        boundary: Boundary,
        max_count: u32,
    ) -> Result<PointOutcomes<Vec<Value>>>;

    /// Reduced value set sized for `intervals` horizontal pixel buckets
    async fn plot(
        &self,
        points: &[PointId],
        range: TimeRange,
        intervals: u32,
    ) -> Result<PointOutcomes<Vec<Value>>>;

    /// `count` evenly spaced samples across the range
    async fn interpolated_by_count(
        &self,
        points: &[PointId],
        range: TimeRange,
        count: u32,
    ) -> Result<PointOutcomes<Vec<Value>>>;

    /// Samples at a fixed interval across the range
    async fn interpolated_by_interval(
        &self,
        points: &[PointId],
        range: TimeRange,
        interval: Duration,
    ) -> Result<PointOutcomes<Vec<Value>>>;

    /// Summaries for one point over the whole range as a single interval.
    /// Single-point because the kind set differs per point kind.
    async fn summaries(
        &self,
        point: PointId,
        range: TimeRange,
        kinds: &[SummaryKind],
        basis: CalculationBasis,
    ) -> Result<SummaryResult>;

    async fn write(
        &self,
        point: PointId,
        value: Value,
        mode: UpdateMode,
        buffer: BufferMode,
    ) -> Result<()>;

    /// Bulk write on one point; returns one error per failed value
    async fn write_many(
        &self,
        point: PointId,
        values: &[Value],
        mode: UpdateMode,
        buffer: BufferMode,
    ) -> Result<Vec<HistorianError>>;

    async fn annotate(&self, point: PointId, value: Value, annotation: &str) -> Result<()>;

    /// Native range delete; returns one error per value that survived
    async fn delete_range(&self, point: PointId, range: TimeRange) -> Result<Vec<HistorianError>>;

    fn supports(&self, capability: Capability) -> bool;

    async fn open_pipe(&self, kind: PipeKind) -> Result<Box<dyn DataPipe>>;

    /// Releases the connection. Idempotent.
    async fn disconnect(&self);
}

/// Stateful subscription handle bound to one pipe kind.
///
/// Lifecycle: signups added (failures reported per point), sink attached via
/// `subscribe`, buffered events drained by `poll`, then `close` (idempotent).
#[async_trait]
pub trait DataPipe: Send {
    /// Registers points; returns the signup failures, one per failed point
    async fn add_signups(&mut self, points: &[PointId])
        -> Result<Vec<(PointId, HistorianError)>>;

    /// Starts buffering incoming remote events for later polling
    async fn subscribe(&mut self) -> Result<()>;

    /// Drains up to `max_events` buffered events in arrival order
    async fn poll(&mut self, max_events: usize) -> Result<Vec<PipeEvent>>;

    /// Releases remote resources; tolerates an already-closed pipe
    async fn close(&mut self);
}
