//! Receivers of change-event notifications drained from data pipes.

use crate::error::HistorianError;
use crate::types::{PipeEvent, PipeKind, PointSet};
use chrono::Local;
use parking_lot::Mutex;

/// Pluggable receiver of pipe events. Events are consumed immediately and
/// never stored by the subscription manager.
pub trait ChangeSink: Send + Sync {
    fn on_event(&self, kind: PipeKind, event: &PipeEvent);

    fn on_error(&self, error: &HistorianError) {
        tracing::warn!("pipe error: {}", error);
    }
}

/// Default sink: one line per event with the pipe label, point, value and
/// local receive time
pub struct ConsoleSink {
    points: PointSet,
}

impl ConsoleSink {
    pub fn new(points: PointSet) -> Self {
        Self { points }
    }
}

impl ChangeSink for ConsoleSink {
    fn on_event(&self, kind: PipeKind, event: &PipeEvent) {
        let name = self.points.name_of(event.point);
        let correction = if event.supersedes { " (supersedes)" } else { "" };
        println!(
            "{}, {:<12}, {}, {}, {{{:?}{}, {}}}",
            kind.label(),
            name,
            event.value.timestamp,
            event.value,
            event.action,
            correction,
            Local::now()
        );
    }
}

/// Recording sink for tests and embedding: keeps every delivered event in
/// arrival order
#[derive(Default)]
pub struct VecSink {
    events: Mutex<Vec<(PipeKind, PipeEvent)>>,
    errors: Mutex<Vec<HistorianError>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(PipeKind, PipeEvent)> {
        self.events.lock().clone()
    }

    pub fn errors(&self) -> Vec<HistorianError> {
        self.errors.lock().clone()
    }
}

impl ChangeSink for VecSink {
    fn on_event(&self, kind: PipeKind, event: &PipeEvent) {
        self.events.lock().push((kind, event.clone()));
    }

    fn on_error(&self, error: &HistorianError) {
        self.errors.lock().push(error.clone());
    }
}
