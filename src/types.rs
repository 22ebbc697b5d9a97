use crate::error::HistorianError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a measurement point in the historian
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub u64);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage type of a point. Only `Numeric` points support the full
/// summary-kind set; everything else gets the reduced set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    Numeric,
    Digital,
    Text,
    Blob,
    Timestamp,
    Null,
}

impl PointKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, PointKind::Numeric)
    }

    /// Summary kinds that may be requested for a point of this kind
    pub fn allowed_summaries(&self) -> &'static [SummaryKind] {
        if self.is_numeric() {
            SummaryKind::ALL
        } else {
            SummaryKind::ALL_FOR_NON_NUMERIC
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub name: String,
    pub kind: PointKind,
}

impl Point {
    pub fn new<T: Into<String>>(id: u64, name: T, kind: PointKind) -> Self {
        Self {
            id: PointId(id),
            name: name.into(),
            kind,
        }
    }
}

/// Ordered collection of unique points. Duplicates are dropped by identity
/// at construction; after that the set only ever shrinks (points whose
/// signup fails are removed, never re-added).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    pub fn new(points: Vec<Point>) -> Self {
        let mut unique: Vec<Point> = Vec::with_capacity(points.len());
        for p in points {
            if !unique.iter().any(|q| q.id == p.id) {
                unique.push(p);
            }
        }
        Self { points: unique }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn ids(&self) -> Vec<PointId> {
        self.points.iter().map(|p| p.id).collect()
    }

    pub fn get(&self, id: PointId) -> Option<&Point> {
        self.points.iter().find(|p| p.id == id)
    }

    /// Display name for error attribution; falls back to the raw id for a
    /// point already removed from the set
    pub fn name_of(&self, id: PointId) -> String {
        self.get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("#{}", id))
    }

    /// Removes a point by identity, returning true if it was present
    pub fn remove(&mut self, id: PointId) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.id != id);
        self.points.len() != before
    }
}

/// Absolute time range of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Swaps a reversed range; summaries cannot evaluate start > end
    pub fn normalized(self) -> Self {
        if self.start > self.end {
            Self {
                start: self.end,
                end: self.start,
            }
        } else {
            self
        }
    }

    pub fn is_reversed(&self) -> bool {
        self.start > self.end
    }

    /// Inside-boundary membership: [start, end)
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Typed payload of a recorded or computed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Float(f64),
    Int(i64),
    Digital(i32),
    Text(String),
    Blob(Vec<u8>),
    Time(DateTime<Utc>),
}

/// Quality marker; a bad value stands in for "this point errored at this
/// timestamp" without failing the surrounding batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Quality {
    Good,
    Bad(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub timestamp: DateTime<Utc>,
    pub payload: Payload,
    pub quality: Quality,
}

/// Bad values compare by timestamp and quality alone: their placeholder
/// payload carries no information, and the NaN it holds would never equal
/// itself under a payload comparison.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.quality == other.quality
            && (!self.is_good() || self.payload == other.payload)
    }
}

impl Value {
    pub fn numeric(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            payload: Payload::Float(value),
            quality: Quality::Good,
        }
    }

    pub fn bad<T: Into<String>>(timestamp: DateTime<Utc>, message: T) -> Self {
        Self {
            timestamp,
            payload: Payload::Float(f64::NAN),
            quality: Quality::Bad(message.into()),
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self.quality, Quality::Good)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.payload {
            Payload::Float(v) => Some(v),
            Payload::Int(v) => Some(v as f64),
            Payload::Digital(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Float(v) => write!(f, "{}", v),
            Payload::Int(v) => write!(f, "{}", v),
            Payload::Digital(state) => write!(f, "state({})", state),
            Payload::Text(s) => write!(f, "{}", s),
            Payload::Blob(b) => write!(f, "blob[{} bytes]", b.len()),
            Payload::Time(t) => write!(f, "{}", t),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.quality {
            Quality::Good => write!(f, "{}", self.payload),
            Quality::Bad(msg) => write!(f, "[bad: {}]", msg),
        }
    }
}

/// Aggregate kinds computable over one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummaryKind {
    Count,
    Total,
    Average,
    Minimum,
    Maximum,
    Range,
    StdDev,
    PercentGood,
}

impl SummaryKind {
    /// Full set, valid for numeric points only
    pub const ALL: &'static [SummaryKind] = &[
        SummaryKind::Count,
        SummaryKind::Total,
        SummaryKind::Average,
        SummaryKind::Minimum,
        SummaryKind::Maximum,
        SummaryKind::Range,
        SummaryKind::StdDev,
        SummaryKind::PercentGood,
    ];

    /// Reduced set for digital/text/blob/timestamp/null points
    pub const ALL_FOR_NON_NUMERIC: &'static [SummaryKind] =
        &[SummaryKind::Count, SummaryKind::PercentGood];

    /// True when the kind only makes sense over numeric samples
    pub fn numeric_only(&self) -> bool {
        !Self::ALL_FOR_NON_NUMERIC.contains(self)
    }
}

/// Ordered summary-kind to value mapping for one point
pub type SummaryResult = Vec<(SummaryKind, Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalculationBasis {
    EventWeighted,
    TimeWeighted,
}

impl Default for CalculationBasis {
    fn default() -> Self {
        CalculationBasis::EventWeighted
    }
}

/// Kind of change-event subscription a data pipe delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipeKind {
    Snapshot,
    Archive,
    TimeSeries,
}

impl PipeKind {
    pub fn label(&self) -> &'static str {
        match self {
            PipeKind::Snapshot => "Snapshot",
            PipeKind::Archive => "Archive",
            PipeKind::TimeSeries => "TimeSeries",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipeAction {
    Added,
    Updated,
    Removed,
    Annotated,
}

/// One change notification drained from a data pipe. Ephemeral: handed to
/// the change sink and dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeEvent {
    pub point: PointId,
    pub value: Value,
    pub action: PipeAction,
    /// Archive-correction semantics: this event supersedes a previously
    /// delivered value at the same timestamp
    pub supersedes: bool,
}

/// Per-point outcome container. One entry per requested point, in point-set
/// iteration order; errors stay attributed to their point instead of
/// aborting siblings.
pub type PointOutcomes<T> = Vec<(PointId, std::result::Result<T, HistorianError>)>;
