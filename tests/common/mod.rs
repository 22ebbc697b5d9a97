//! In-memory historian used by the integration tests.
//!
//! Stores per-point value sequences, honors update-mode semantics, and
//! serves scripted data pipes so subscription runs terminate
//! deterministically.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use histevents::{
    Boundary, CalculationBasis, Capability, DataPipe, Historian, HistorianError, PipeEvent,
    PipeKind, Point, PointId, PointKind, PointOutcomes, PointSet, Quality, Result, SummaryKind,
    SummaryResult, TimeRange, UpdateMode, Value,
};
use histevents::BufferMode;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn val(secs: i64, v: f64) -> Value {
    Value::numeric(ts(secs), v)
}

pub fn range(start: i64, end: i64) -> TimeRange {
    TimeRange::new(ts(start), ts(end))
}

pub fn numeric_point(id: u64, name: &str) -> Point {
    Point::new(id, name, PointKind::Numeric)
}

#[derive(Default)]
pub struct MockState {
    pub store: Mutex<HashMap<PointId, Vec<Value>>>,
    pub capabilities: Mutex<Vec<Capability>>,
    pub read_errors: Mutex<HashMap<PointId, String>>,
    pub write_errors: Mutex<HashMap<PointId, String>>,
    pub remove_fail_counts: Mutex<HashMap<PointId, usize>>,
    pub summary_requests: Mutex<Vec<(PointId, Vec<SummaryKind>)>>,
    pub annotations: Mutex<Vec<(PointId, DateTime<Utc>, String)>>,
    pub signup_failures: Mutex<HashMap<(PipeKind, PointId), String>>,
    pub pipe_events: Mutex<HashMap<PipeKind, VecDeque<PipeEvent>>>,
    pub cancel_when_drained: Mutex<Option<Arc<AtomicBool>>>,
    pub poll_count: AtomicUsize,
    pub closed_pipes: Mutex<Vec<PipeKind>>,
    pub opened_pipes: Mutex<Vec<PipeKind>>,
    pub page_sizes: Mutex<Vec<usize>>,
    pub connection_error: Mutex<Option<String>>,
    pub disconnected: AtomicBool,
}

#[derive(Default, Clone)]
pub struct MockHistorian {
    pub state: Arc<MockState>,
}

impl MockHistorian {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capability(self, cap: Capability) -> Self {
        self.state.capabilities.lock().push(cap);
        self
    }

    pub fn seed(&self, point: PointId, values: Vec<Value>) {
        let mut sorted = values;
        sorted.sort_by_key(|v| v.timestamp);
        self.state.store.lock().insert(point, sorted);
    }

    /// Makes every bulk snapshot call fail at the connection level
    pub fn fail_connection(&self, message: &str) {
        *self.state.connection_error.lock() = Some(message.to_string());
    }

    pub fn fail_reads(&self, point: PointId, message: &str) {
        self.state
            .read_errors
            .lock()
            .insert(point, message.to_string());
    }

    pub fn fail_writes(&self, point: PointId, message: &str) {
        self.state
            .write_errors
            .lock()
            .insert(point, message.to_string());
    }

    /// The next `count` value removals on this point fail and leave the
    /// value in place
    pub fn fail_removes(&self, point: PointId, count: usize) {
        self.state.remove_fail_counts.lock().insert(point, count);
    }

    pub fn fail_signup(&self, kind: PipeKind, point: PointId, message: &str) {
        self.state
            .signup_failures
            .lock()
            .insert((kind, point), message.to_string());
    }

    pub fn queue_event(&self, kind: PipeKind, event: PipeEvent) {
        self.state
            .pipe_events
            .lock()
            .entry(kind)
            .or_default()
            .push_back(event);
    }

    /// Raise `flag` once every queued pipe event has been drained, so the
    /// poll loop exits on its next iteration boundary
    pub fn cancel_when_drained(&self, flag: Arc<AtomicBool>) {
        *self.state.cancel_when_drained.lock() = Some(flag);
    }

    pub fn stored(&self, point: PointId) -> Vec<Value> {
        self.state
            .store
            .lock()
            .get(&point)
            .cloned()
            .unwrap_or_default()
    }

    fn read_error(&self, point: PointId) -> Option<HistorianError> {
        self.state
            .read_errors
            .lock()
            .get(&point)
            .map(|msg| HistorianError::point(point.to_string(), msg.clone()))
    }

    fn values_inside(&self, point: PointId, range: TimeRange) -> Vec<Value> {
        self.stored(point)
            .into_iter()
            .filter(|v| range.contains(v.timestamp))
            .collect()
    }

    fn step_value_at(&self, point: PointId, at: DateTime<Utc>) -> Value {
        self.stored(point)
            .into_iter()
            .filter(|v| v.timestamp <= at)
            .last()
            .map(|v| Value {
                timestamp: at,
                payload: v.payload,
                quality: v.quality,
            })
            .unwrap_or_else(|| Value::bad(at, "no data"))
    }
}

#[async_trait]
impl Historian for MockHistorian {
    async fn snapshot(&self, points: &[PointId]) -> Result<PointOutcomes<Value>> {
        if let Some(msg) = self.state.connection_error.lock().clone() {
            return Err(HistorianError::Connection(msg));
        }
        self.state.page_sizes.lock().push(points.len());
        Ok(points
            .iter()
            .map(|&p| {
                if let Some(e) = self.read_error(p) {
                    return (p, Err(e));
                }
                let outcome = self
                    .stored(p)
                    .last()
                    .cloned()
                    .ok_or_else(|| HistorianError::point(p.to_string(), "no current value".into()));
                (p, outcome)
            })
            .collect())
    }

    async fn recorded(
        &self,
        points: &[PointId],
        range: TimeRange,
        _boundary: Boundary,
        max_count: u32,
    ) -> Result<PointOutcomes<Vec<Value>>> {
        self.state.page_sizes.lock().push(points.len());
        Ok(points
            .iter()
            .map(|&p| {
                if let Some(e) = self.read_error(p) {
                    return (p, Err(e));
                }
                let mut values = self.values_inside(p, range);
                if max_count > 0 {
                    values.truncate(max_count as usize);
                }
                (p, Ok(values))
            })
            .collect())
    }

    async fn plot(
        &self,
        points: &[PointId],
        range: TimeRange,
        intervals: u32,
    ) -> Result<PointOutcomes<Vec<Value>>> {
        self.state.page_sizes.lock().push(points.len());
        Ok(points
            .iter()
            .map(|&p| {
                if let Some(e) = self.read_error(p) {
                    return (p, Err(e));
                }
                let values = self.values_inside(p, range);
                let cap = intervals as usize;
                let reduced = if values.len() > cap && cap > 0 {
                    let step = values.len() / cap;
                    values.into_iter().step_by(step.max(1)).take(cap).collect()
                } else {
                    values
                };
                (p, Ok(reduced))
            })
            .collect())
    }

    async fn interpolated_by_count(
        &self,
        points: &[PointId],
        range: TimeRange,
        count: u32,
    ) -> Result<PointOutcomes<Vec<Value>>> {
        self.state.page_sizes.lock().push(points.len());
        let span_ms = (range.end - range.start).num_milliseconds();
        Ok(points
            .iter()
            .map(|&p| {
                if let Some(e) = self.read_error(p) {
                    return (p, Err(e));
                }
                let samples = (0..count)
                    .map(|i| {
                        let offset = if count > 1 {
                            span_ms * i as i64 / (count as i64 - 1)
                        } else {
                            0
                        };
                        let at = range.start + chrono::Duration::milliseconds(offset);
                        self.step_value_at(p, at)
                    })
                    .collect();
                (p, Ok(samples))
            })
            .collect())
    }

    async fn interpolated_by_interval(
        &self,
        points: &[PointId],
        range: TimeRange,
        interval: Duration,
    ) -> Result<PointOutcomes<Vec<Value>>> {
        self.state.page_sizes.lock().push(points.len());
        let step = chrono::Duration::from_std(interval)
            .map_err(|e| HistorianError::InvalidParameter(e.to_string()))?;
        Ok(points
            .iter()
            .map(|&p| {
                if let Some(e) = self.read_error(p) {
                    return (p, Err(e));
                }
                let mut samples = Vec::new();
                let mut at = range.start;
                while at <= range.end {
                    samples.push(self.step_value_at(p, at));
                    at = at + step;
                }
                (p, Ok(samples))
            })
            .collect())
    }

    async fn summaries(
        &self,
        point: PointId,
        range: TimeRange,
        kinds: &[SummaryKind],
        _basis: CalculationBasis,
    ) -> Result<SummaryResult> {
        if range.is_reversed() {
            return Err(HistorianError::InvalidParameter(
                "summary interval end precedes start".into(),
            ));
        }
        self.state
            .summary_requests
            .lock()
            .push((point, kinds.to_vec()));
        if let Some(e) = self.read_error(point) {
            return Err(e);
        }

        let values = self.values_inside(point, range);
        let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
        let n = numbers.len() as f64;
        let sum: f64 = numbers.iter().sum();
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let at = range.start;
        Ok(kinds
            .iter()
            .map(|&kind| {
                let value = match kind {
                    SummaryKind::Count => Value::numeric(at, values.len() as f64),
                    SummaryKind::PercentGood => {
                        let good = values.iter().filter(|v| v.is_good()).count() as f64;
                        let pct = if values.is_empty() {
                            100.0
                        } else {
                            100.0 * good / values.len() as f64
                        };
                        Value::numeric(at, pct)
                    }
                    _ if numbers.is_empty() => Value::bad(at, "no numeric data in range"),
                    SummaryKind::Total => Value::numeric(at, sum),
                    SummaryKind::Average => Value::numeric(at, sum / n),
                    SummaryKind::Minimum => Value::numeric(at, min),
                    SummaryKind::Maximum => Value::numeric(at, max),
                    SummaryKind::Range => Value::numeric(at, max - min),
                    SummaryKind::StdDev => {
                        let mean = sum / n;
                        let var = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                        Value::numeric(at, var.sqrt())
                    }
                };
                (kind, value)
            })
            .collect())
    }

    async fn write(
        &self,
        point: PointId,
        value: Value,
        mode: UpdateMode,
        _buffer: BufferMode,
    ) -> Result<()> {
        if let Some(msg) = self.state.write_errors.lock().get(&point) {
            return Err(HistorianError::point(point.to_string(), msg.clone()));
        }

        let mut store = self.state.store.lock();
        let values = store.entry(point).or_default();
        let existing = values.iter().position(|v| v.timestamp == value.timestamp);

        match (mode, existing) {
            (UpdateMode::NoReplace, Some(_)) => {}
            (UpdateMode::ReplaceOnly, None) => {}
            (UpdateMode::Remove, Some(i)) => {
                values.remove(i);
            }
            (UpdateMode::Remove, None) => {}
            (UpdateMode::Insert, _) | (UpdateMode::InsertNoCompression, _) => {
                values.push(value);
                values.sort_by_key(|v| v.timestamp);
            }
            (_, Some(i)) => values[i] = value,
            (_, None) => {
                values.push(value);
                values.sort_by_key(|v| v.timestamp);
            }
        }
        Ok(())
    }

    async fn write_many(
        &self,
        point: PointId,
        values: &[Value],
        mode: UpdateMode,
        buffer: BufferMode,
    ) -> Result<Vec<HistorianError>> {
        let mut errors = Vec::new();
        for value in values {
            let fail = {
                let mut quotas = self.state.remove_fail_counts.lock();
                match quotas.get_mut(&point) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => false,
                }
            };
            if fail {
                errors.push(HistorianError::point(
                    point.to_string(),
                    format!("value at {} could not be removed", value.timestamp),
                ));
                continue;
            }
            if let Err(e) = self.write(point, value.clone(), mode, buffer).await {
                errors.push(e);
            }
        }
        Ok(errors)
    }

    async fn annotate(&self, point: PointId, value: Value, annotation: &str) -> Result<()> {
        if let Some(msg) = self.state.write_errors.lock().get(&point) {
            return Err(HistorianError::point(point.to_string(), msg.clone()));
        }
        self.state
            .annotations
            .lock()
            .push((point, value.timestamp, annotation.to_string()));
        Ok(())
    }

    async fn delete_range(&self, point: PointId, range: TimeRange) -> Result<Vec<HistorianError>> {
        if !self.supports(Capability::DeleteRange) {
            return Err(HistorianError::unsupported("range delete"));
        }
        let in_range = self.values_inside(point, range);
        let mut errors = Vec::new();
        for value in in_range {
            let fail = {
                let mut quotas = self.state.remove_fail_counts.lock();
                match quotas.get_mut(&point) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => false,
                }
            };
            if fail {
                errors.push(HistorianError::point(
                    point.to_string(),
                    format!("value at {} could not be removed", value.timestamp),
                ));
                continue;
            }
            let mut store = self.state.store.lock();
            if let Some(values) = store.get_mut(&point) {
                values.retain(|v| v.timestamp != value.timestamp);
            }
        }
        Ok(errors)
    }

    fn supports(&self, capability: Capability) -> bool {
        self.state.capabilities.lock().contains(&capability)
    }

    async fn open_pipe(&self, kind: PipeKind) -> Result<Box<dyn DataPipe>> {
        self.state.opened_pipes.lock().push(kind);
        Ok(Box::new(MockPipe {
            kind,
            state: self.state.clone(),
            signed_up: Vec::new(),
            closed: false,
        }))
    }

    async fn disconnect(&self) {
        self.state.disconnected.store(true, Ordering::SeqCst);
    }
}

pub struct MockPipe {
    kind: PipeKind,
    state: Arc<MockState>,
    signed_up: Vec<PointId>,
    closed: bool,
}

#[async_trait]
impl DataPipe for MockPipe {
    async fn add_signups(
        &mut self,
        points: &[PointId],
    ) -> Result<Vec<(PointId, HistorianError)>> {
        let failures = self.state.signup_failures.lock();
        let mut errors = Vec::new();
        for &p in points {
            if let Some(msg) = failures.get(&(self.kind, p)) {
                errors.push((p, HistorianError::point(p.to_string(), msg.clone())));
            } else {
                self.signed_up.push(p);
            }
        }
        Ok(errors)
    }

    async fn subscribe(&mut self) -> Result<()> {
        Ok(())
    }

    async fn poll(&mut self, max_events: usize) -> Result<Vec<PipeEvent>> {
        if self.closed {
            return Err(HistorianError::PipeClosed);
        }
        self.state.poll_count.fetch_add(1, Ordering::SeqCst);

        let mut queues = self.state.pipe_events.lock();
        let queue = queues.entry(self.kind).or_default();
        let take = max_events.min(queue.len());
        let events: Vec<PipeEvent> = queue.drain(..take).collect();

        let all_drained = queues.values().all(|q| q.is_empty());
        drop(queues);

        if all_drained {
            if let Some(flag) = self.state.cancel_when_drained.lock().as_ref() {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(events)
    }

    async fn close(&mut self) {
        // idempotent: a second close is a no-op
        if !self.closed {
            self.closed = true;
            self.state.closed_pipes.lock().push(self.kind);
        }
    }
}

/// Value source yielding a scripted list of entries, one per point visit
pub struct ScriptedSource {
    pub entries: VecDeque<Option<histevents::ValueEntry>>,
}

impl ScriptedSource {
    pub fn new(entries: Vec<Option<histevents::ValueEntry>>) -> Self {
        Self {
            entries: entries.into(),
        }
    }
}

#[async_trait]
impl histevents::ValueSource for ScriptedSource {
    async fn next_entry(&mut self, _point: &Point) -> Result<Option<histevents::ValueEntry>> {
        Ok(self.entries.pop_front().flatten())
    }
}

/// Builds a two-point numeric set used by most tests
pub fn two_point_set() -> PointSet {
    PointSet::new(vec![
        numeric_point(1, "sinusoid"),
        numeric_point(2, "cdt158"),
    ])
}

pub fn good(quality: &Quality) -> bool {
    matches!(quality, Quality::Good)
}
