//! Bulk query executor: the five read modes.
//!
//! Every operation pages the point set in fixed point-count chunks, merges
//! the page results keyed by point id and re-orders them to point-set
//! iteration order. Remote page ordering is never trusted for presentation.

use crate::constants::PAGE_SIZE;
use crate::error::{HistorianError, Result};
use crate::historian::{Boundary, Historian};
use crate::params::{self, InterpolationSpec};
use crate::types::{
    CalculationBasis, PointId, PointOutcomes, PointSet, SummaryResult, TimeRange, Value,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;

pub struct QueryExecutor<'a, H: Historian> {
    conn: &'a H,
}

impl<'a, H: Historian> QueryExecutor<'a, H> {
    pub fn new(conn: &'a H) -> Self {
        Self { conn }
    }

    /// Current value of every point in one paged bulk pass
    pub async fn snapshot(&self, set: &PointSet) -> Result<PointOutcomes<Value>> {
        let ids = set.ids();
        let mut collected = HashMap::new();
        for page in ids.chunks(PAGE_SIZE) {
            for (id, outcome) in self.conn.snapshot(page).await? {
                collected.insert(id, outcome);
            }
        }
        Ok(Self::in_set_order(set, collected))
    }

    /// Raw archived values inside the range; `param` is the optional
    /// maximum-count-per-point cap (unparsable or missing means unbounded)
    pub async fn archived(
        &self,
        set: &PointSet,
        range: TimeRange,
        param: Option<&str>,
    ) -> Result<PointOutcomes<Vec<Value>>> {
        let max_count = params::parse_max_count(param);
        let ids = set.ids();
        let mut collected = HashMap::new();
        for page in ids.chunks(PAGE_SIZE) {
            let page_results = self
                .conn
                .recorded(page, range, Boundary::Inside, max_count)
                .await?;
            for (id, outcome) in page_results {
                collected.insert(id, outcome);
            }
        }
        Ok(Self::in_set_order(set, collected))
    }

    /// Visually representative reduced set sized for the target pixel-bucket
    /// count (default 640)
    pub async fn plot(
        &self,
        set: &PointSet,
        range: TimeRange,
        param: Option<&str>,
    ) -> Result<PointOutcomes<Vec<Value>>> {
        let intervals = params::parse_plot_intervals(param);
        let ids = set.ids();
        let mut collected = HashMap::new();
        for page in ids.chunks(PAGE_SIZE) {
            for (id, outcome) in self.conn.plot(page, range, intervals).await? {
                collected.insert(id, outcome);
            }
        }
        Ok(Self::in_set_order(set, collected))
    }

    /// Interpolated values, either `c=<n>` evenly spaced samples or a fixed
    /// interval parsed from `param`
    pub async fn interpolated(
        &self,
        set: &PointSet,
        range: TimeRange,
        param: Option<&str>,
        default_interval: Duration,
    ) -> Result<PointOutcomes<Vec<Value>>> {
        let spec = params::parse_interpolation(param, default_interval);
        let ids = set.ids();
        let mut collected = HashMap::new();
        for page in ids.chunks(PAGE_SIZE) {
            let page_results = match spec {
                InterpolationSpec::ByCount(count) => {
                    self.conn.interpolated_by_count(page, range, count).await?
                }
                InterpolationSpec::ByInterval(interval) => {
                    self.conn
                        .interpolated_by_interval(page, range, interval)
                        .await?
                }
            };
            for (id, outcome) in page_results {
                collected.insert(id, outcome);
            }
        }
        Ok(Self::in_set_order(set, collected))
    }

    /// Every allowed summary kind over the whole range as one interval,
    /// point by point. Points run individually because the kind set depends
    /// on the point kind; a numeric-only kind is never requested for a
    /// non-numeric point.
    pub async fn summaries(
        &self,
        set: &PointSet,
        range: TimeRange,
        basis: CalculationBasis,
    ) -> Result<PointOutcomes<SummaryResult>> {
        // summaries cannot evaluate a reversed interval
        let range = range.normalized();

        let futures = set.iter().map(|point| {
            let kinds = point.kind.allowed_summaries();
            async move {
                let outcome = self.conn.summaries(point.id, range, kinds, basis).await;
                (point.id, outcome)
            }
        });

        Ok(join_all(futures).await)
    }

    /// Re-keys merged page results into point-set iteration order; a point
    /// the remote answered for neither way is reported as its own error so
    /// no point silently vanishes
    fn in_set_order<T>(
        set: &PointSet,
        mut collected: HashMap<PointId, std::result::Result<T, HistorianError>>,
    ) -> PointOutcomes<T> {
        set.iter()
            .map(|p| {
                let outcome = collected.remove(&p.id).unwrap_or_else(|| {
                    Err(HistorianError::point(
                        p.name.clone(),
                        "no result returned for point".to_string(),
                    ))
                });
                (p.id, outcome)
            })
            .collect()
    }
}
