pub mod constants;
pub mod dispatch;
pub mod error;
pub mod historian;
pub mod mutate;
pub mod params;
pub mod query;
pub mod sink;
pub mod subscribe;
pub mod types;

pub use dispatch::{dispatch, Command, CommandOutput, SubscribeMode};
pub use error::{HistorianError, Result};
pub use historian::{Boundary, Capability, DataPipe, Historian};
pub use mutate::{ConsoleValueSource, Mutator, UpdateReport, ValueEntry, ValueSource};
pub use params::{BufferMode, InterpolationSpec, UpdateMode};
pub use query::QueryExecutor;
pub use sink::{ChangeSink, ConsoleSink, VecSink};
pub use subscribe::{SubscribeOutcome, SubscriptionManager};
pub use types::{
    CalculationBasis, Payload, PipeAction, PipeEvent, PipeKind, Point, PointId, PointKind,
    PointOutcomes, PointSet, Quality, SummaryKind, SummaryResult, TimeRange, Value,
};
