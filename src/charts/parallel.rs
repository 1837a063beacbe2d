use serde::Serialize;

use super::{short_label, ChartAdapter, ChartKind, RenderContext, View};
use crate::state::{Facet, StateChange};

pub const COLORSCALE: [(f64, &str); 4] = [(0.0, "#999"), (0.33, "#d32f2f"), (0.66, "#388e3c"), (1.0, "#1976d2")];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub key: String,
    pub label: String,
    pub values: Vec<f64>,
    pub range: [f64; 2],
    /// Axis matches the active dimension filter.
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParallelView {
    pub ids: Vec<String>,
    pub labels: Vec<String>,
    /// Numeric cluster id per line, 0 when unclustered.
    pub line_color: Vec<u32>,
    pub colorscale: Vec<(f64, &'static str)>,
    pub dimmed: Vec<bool>,
    pub axes: Vec<Axis>,
}

pub struct ParallelCoordinates;

impl ChartAdapter for ParallelCoordinates {
    fn kind(&self) -> ChartKind {
        ChartKind::Parallel
    }

    fn depends_on(&self, change: &StateChange) -> bool {
        change.region || change.dimension
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        let keys = model.dimension_keys();
        if model.is_empty() || keys.is_empty() {
            return None;
        }
        let ids = model.policy_ids().to_vec();
        let range = [0.0, ctx.config.radar.max];
        let filters = &ctx.snapshot.filters;

        let axes = keys
            .iter()
            .map(|&k| Axis {
                key: k.to_string(),
                label: short_label(model.dimension_label(k)).to_string(),
                values: ids.iter().map(|id| model.score(id, k)).collect(),
                range,
                highlighted: matches!(&filters.dimension, Facet::Only(d) if d == k),
            })
            .collect();

        Some(View::Parallel(ParallelView {
            labels: ids.iter().map(|id| model.label(id)).collect(),
            line_color: ids
                .iter()
                .map(|id| model.cluster_of(id).parse::<u32>().unwrap_or(0))
                .collect(),
            colorscale: COLORSCALE.to_vec(),
            dimmed: ids
                .iter()
                .map(|id| {
                    model
                        .policy(id)
                        .map(|p| !filters.region.matches(&p.region))
                        .unwrap_or(false)
                })
                .collect(),
            ids,
            axes,
        }))
    }
}
