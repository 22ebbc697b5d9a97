//! Command dispatcher: one parsed command token in, exactly one downstream
//! operation out.
//!
//! Holds no state across invocations. Anything a component lets escape is
//! caught here, reported, and the connection is released before returning.

use crate::error::Result;
use crate::historian::Historian;
use crate::mutate::{Mutator, UpdateReport, ValueSource};
use crate::params::{self, BufferMode, UpdateMode};
use crate::query::QueryExecutor;
use crate::sink::ChangeSink;
use crate::subscribe::{SubscribeOutcome, SubscriptionManager};
use crate::types::{PointOutcomes, PointSet, SummaryResult, TimeRange, Value};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Live-subscription variants of the `sign,*` command family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeMode {
    TimeSeries,
    Snapshot,
    Archive,
    SnapshotAndArchive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Snapshot,
    Archived,
    Plot,
    Interpolated,
    Summaries,
    Update,
    Annotate,
    Delete,
    Subscribe(SubscribeMode),
    /// Unrecognized tokens are a no-op, not an error
    Unknown,
}

impl Command {
    pub fn parse(token: &str) -> Self {
        match token {
            "snap" => Command::Snapshot,
            "arclist" => Command::Archived,
            "plot" => Command::Plot,
            "interp" => Command::Interpolated,
            "summaries" => Command::Summaries,
            "update" => Command::Update,
            "annotate" => Command::Annotate,
            "delete" => Command::Delete,
            "sign,t" => Command::Subscribe(SubscribeMode::TimeSeries),
            _ => match token.strip_prefix("sign,") {
                Some(flags) => {
                    let snapshot = flags.contains('s');
                    let archive = flags.contains('a');
                    match (snapshot, archive) {
                        (true, true) => Command::Subscribe(SubscribeMode::SnapshotAndArchive),
                        (true, false) => Command::Subscribe(SubscribeMode::Snapshot),
                        (false, true) => Command::Subscribe(SubscribeMode::Archive),
                        (false, false) => Command::Unknown,
                    }
                }
                None => Command::Unknown,
            },
        }
    }
}

/// Plain-data result of one dispatched command, handed to the rendering
/// collaborator
#[derive(Debug, Serialize)]
pub enum CommandOutput {
    Snapshot(PointOutcomes<Value>),
    Values(PointOutcomes<Vec<Value>>),
    Summaries(PointOutcomes<SummaryResult>),
    Updated(PointOutcomes<UpdateReport>),
    Deleted(PointOutcomes<u64>),
    Subscription(SubscribeOutcome),
    /// Unexpected failure; reported and connection released
    Failed(String),
    /// Unknown command token
    Ignored,
}

impl CommandOutput {
    /// JSON rendering for embedders that forward command results over a
    /// wire instead of printing them
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .unwrap_or_else(|e| serde_json::json!({ "Failed": e.to_string() }))
    }
}

/// Routes one command to the executor, mutation engine or subscription
/// manager. `params` carries the mode-specific string parameters;
/// `default_interval` backs the interpolated interval fallback.
#[allow(clippy::too_many_arguments)]
pub async fn dispatch<H: Historian>(
    token: &str,
    set: &mut PointSet,
    range: TimeRange,
    default_interval: Duration,
    mode_params: &[String],
    conn: &H,
    sink: &dyn ChangeSink,
    cancel: Arc<AtomicBool>,
    source: &mut dyn ValueSource,
) -> CommandOutput {
    let command = Command::parse(token);
    let result = run(
        command,
        set,
        range,
        default_interval,
        mode_params,
        conn,
        sink,
        cancel,
        source,
    )
    .await;

    match result {
        Ok(output) => output,
        Err(e) => {
            error!("command {:?} failed: {}", command, e);
            conn.disconnect().await;
            CommandOutput::Failed(e.to_string())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run<H: Historian>(
    command: Command,
    set: &mut PointSet,
    range: TimeRange,
    default_interval: Duration,
    mode_params: &[String],
    conn: &H,
    sink: &dyn ChangeSink,
    cancel: Arc<AtomicBool>,
    source: &mut dyn ValueSource,
) -> Result<CommandOutput> {
    let param = mode_params.first().map(String::as_str);

    let output = match command {
        Command::Snapshot => {
            CommandOutput::Snapshot(QueryExecutor::new(conn).snapshot(set).await?)
        }
        Command::Archived => {
            CommandOutput::Values(QueryExecutor::new(conn).archived(set, range, param).await?)
        }
        Command::Plot => {
            CommandOutput::Values(QueryExecutor::new(conn).plot(set, range, param).await?)
        }
        Command::Interpolated => CommandOutput::Values(
            QueryExecutor::new(conn)
                .interpolated(set, range, param, default_interval)
                .await?,
        ),
        Command::Summaries => {
            let basis = params::parse_basis(param);
            CommandOutput::Summaries(QueryExecutor::new(conn).summaries(set, range, basis).await?)
        }
        Command::Update | Command::Annotate => {
            let mode = UpdateMode::parse(param);
            let buffer = BufferMode::parse(mode_params.get(1).map(String::as_str));
            let annotate = command == Command::Annotate;
            CommandOutput::Updated(
                Mutator::new(conn)
                    .update(set, mode, buffer, annotate, source)
                    .await,
            )
        }
        Command::Delete => CommandOutput::Deleted(Mutator::new(conn).delete(set, range).await),
        Command::Subscribe(mode) => {
            let manager = SubscriptionManager::new(conn, sink, cancel);
            let outcome = match mode {
                SubscribeMode::TimeSeries => manager.run_time_series(set).await?,
                SubscribeMode::Snapshot => manager.run_dual(set, true, false).await?,
                SubscribeMode::Archive => manager.run_dual(set, false, true).await?,
                SubscribeMode::SnapshotAndArchive => manager.run_dual(set, true, true).await?,
            };
            CommandOutput::Subscription(outcome)
        }
        Command::Unknown => CommandOutput::Ignored,
    };

    Ok(output)
}
