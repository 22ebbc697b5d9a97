//! Mutation engine: value update/annotate and range delete.
//!
//! Every path keeps per-point error accounting: one failing point is
//! recorded and reported, its siblings keep going.

use crate::error::{HistorianError, Result};
use crate::historian::{Boundary, Capability, Historian};
use crate::params::{BufferMode, UpdateMode};
use crate::types::{
    CalculationBasis, Point, PointOutcomes, PointSet, SummaryKind, SummaryResult, TimeRange, Value,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write as IoWrite;
use tracing::warn;

/// One user-entered value for a point
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntry {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub annotation: Option<String>,
}

/// Input collaborator feeding the update/annotate path one entry per point.
/// `None` skips the point, matching unparsable interactive input.
#[async_trait]
pub trait ValueSource: Send {
    async fn next_entry(&mut self, point: &Point) -> Result<Option<ValueEntry>>;
}

/// Interactive source reading timestamp, value and (for annotate) the
/// annotation text from stdin
pub struct ConsoleValueSource {
    pub prompt_annotation: bool,
}

impl ConsoleValueSource {
    fn read_line(prompt: &str) -> Result<String> {
        print!("{}", prompt);
        std::io::stdout()
            .flush()
            .map_err(|e| HistorianError::Input(e.to_string()))?;
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| HistorianError::Input(e.to_string()))?;
        Ok(line.trim().to_string())
    }

    fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = raw.parse::<DateTime<Utc>>() {
            return Some(ts);
        }
        raw.parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

#[async_trait]
impl ValueSource for ConsoleValueSource {
    async fn next_entry(&mut self, _point: &Point) -> Result<Option<ValueEntry>> {
        let time = Self::read_line("Enter timestamp: ")?;
        let data = Self::read_line("Enter new data: ")?;

        let timestamp = match Self::parse_timestamp(&time) {
            Some(ts) => ts,
            None => return Ok(None),
        };
        let value = match data.parse::<f64>() {
            Ok(v) => v,
            Err(_) => return Ok(None),
        };

        let annotation = if self.prompt_annotation {
            Some(Self::read_line("Enter annotation: ")?)
        } else {
            None
        };

        Ok(Some(ValueEntry {
            timestamp,
            value,
            annotation,
        }))
    }
}

/// Result of the update path for one point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateReport {
    Written,
    /// The input source produced nothing usable for this point
    Skipped,
}

pub struct Mutator<'a, H: Historian> {
    conn: &'a H,
}

impl<'a, H: Historian> Mutator<'a, H> {
    pub fn new(conn: &'a H) -> Self {
        Self { conn }
    }

    /// Writes one entry per point with the given update and buffer modes;
    /// `annotate` additionally attaches the entry's annotation text before
    /// the write. A failed point never aborts the remaining points.
    pub async fn update(
        &self,
        set: &PointSet,
        mode: UpdateMode,
        buffer: BufferMode,
        annotate: bool,
        source: &mut dyn ValueSource,
    ) -> PointOutcomes<UpdateReport> {
        let mut outcomes = Vec::with_capacity(set.len());

        for point in set.iter() {
            let entry = match source.next_entry(point).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    outcomes.push((point.id, Ok(UpdateReport::Skipped)));
                    continue;
                }
                Err(e) => {
                    warn!("point {}: input failed: {}", point.name, e);
                    outcomes.push((point.id, Err(e)));
                    continue;
                }
            };

            let value = Value::numeric(entry.timestamp, entry.value);

            if annotate {
                let text = entry.annotation.as_deref().unwrap_or("");
                if let Err(e) = self.conn.annotate(point.id, value.clone(), text).await {
                    warn!("point {}: annotate failed: {}", point.name, e);
                    outcomes.push((point.id, Err(e)));
                    continue;
                }
            }

            match self.conn.write(point.id, value, mode, buffer).await {
                Ok(()) => outcomes.push((point.id, Ok(UpdateReport::Written))),
                Err(e) => {
                    warn!("point {}: update failed: {}", point.name, e);
                    outcomes.push((point.id, Err(e)));
                }
            }
        }

        outcomes
    }

    /// Deletes every value in range per point, reporting the net number of
    /// deleted events. Uses the native range delete when the server has it,
    /// otherwise reads the raw values back and removes them one by one
    /// through the write path.
    pub async fn delete(&self, set: &PointSet, range: TimeRange) -> PointOutcomes<u64> {
        if self.conn.supports(Capability::DeleteRange) {
            self.delete_native(set, range).await
        } else {
            self.delete_fallback(set, range).await
        }
    }

    async fn delete_native(&self, set: &PointSet, range: TimeRange) -> PointOutcomes<u64> {
        let mut outcomes = Vec::with_capacity(set.len());

        for point in set.iter() {
            // event count first: one Count summary over the range as a
            // single interval
            let summary = self
                .conn
                .summaries(
                    point.id,
                    range,
                    &[SummaryKind::Count],
                    CalculationBasis::EventWeighted,
                )
                .await;

            let mut deleted = match summary {
                Ok(result) => Self::event_count(&result),
                Err(e) => {
                    warn!("point {}: count summary failed: {}", point.name, e);
                    outcomes.push((point.id, Err(e)));
                    continue;
                }
            };

            if deleted > 0 {
                match self.conn.delete_range(point.id, range).await {
                    Ok(errors) => {
                        for e in &errors {
                            warn!("point {}: delete error: {}", point.name, e);
                        }
                        deleted = deleted.saturating_sub(errors.len() as u64);
                    }
                    Err(e) => {
                        warn!("point {}: range delete failed: {}", point.name, e);
                        outcomes.push((point.id, Err(e)));
                        continue;
                    }
                }
            }

            outcomes.push((point.id, Ok(deleted)));
        }

        outcomes
    }

    async fn delete_fallback(&self, set: &PointSet, range: TimeRange) -> PointOutcomes<u64> {
        let mut outcomes = Vec::with_capacity(set.len());

        for point in set.iter() {
            // uncapped inside-boundary read, then remove by value
            let read = self
                .conn
                .recorded(&[point.id], range, Boundary::Inside, 0)
                .await;

            let values = match read {
                Ok(mut results) => match results.pop() {
                    Some((_, Ok(values))) => values,
                    Some((_, Err(e))) => {
                        warn!("point {}: read-back failed: {}", point.name, e);
                        outcomes.push((point.id, Err(e)));
                        continue;
                    }
                    None => {
                        let e = HistorianError::point(
                            point.name.clone(),
                            "no result returned for point".to_string(),
                        );
                        outcomes.push((point.id, Err(e)));
                        continue;
                    }
                },
                Err(e) => {
                    warn!("point {}: read-back failed: {}", point.name, e);
                    outcomes.push((point.id, Err(e)));
                    continue;
                }
            };

            let mut deleted = values.len() as u64;
            if deleted > 0 {
                match self
                    .conn
                    .write_many(
                        point.id,
                        &values,
                        UpdateMode::Remove,
                        BufferMode::BufferIfPossible,
                    )
                    .await
                {
                    Ok(errors) => {
                        for e in &errors {
                            warn!("point {}: remove error: {}", point.name, e);
                        }
                        deleted = deleted.saturating_sub(errors.len() as u64);
                    }
                    Err(e) => {
                        warn!("point {}: remove failed: {}", point.name, e);
                        outcomes.push((point.id, Err(e)));
                        continue;
                    }
                }
            }

            outcomes.push((point.id, Ok(deleted)));
        }

        outcomes
    }

    /// Extracts the good Count value from a summary result; a bad or
    /// missing count reads as zero
    fn event_count(result: &SummaryResult) -> u64 {
        result
            .iter()
            .find(|(kind, value)| *kind == SummaryKind::Count && value.is_good())
            .and_then(|(_, value)| value.as_f64())
            .map(|v| v.max(0.0) as u64)
            .unwrap_or(0)
    }
}
