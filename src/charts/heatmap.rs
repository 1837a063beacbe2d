use serde::Serialize;

use super::{hex_rgb, ChartAdapter, ChartEvent, ChartKind, Reaction, RenderContext, View};
use crate::models::cluster_color;
use crate::state::{Intent, StateChange};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCell {
    pub value: f64,
    pub color: String,
    /// Label color picked for contrast against `color`.
    pub text_color: &'static str,
}

/// Dashed outline around a block of index-contiguous cluster members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterOutline {
    pub cluster: String,
    pub start: usize,
    pub end: usize,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendStop {
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapView {
    pub ids: Vec<String>,
    pub labels: Vec<String>,
    pub names: Vec<String>,
    pub cells: Vec<Vec<HeatCell>>,
    pub outlines: Vec<ClusterOutline>,
    pub selected: Option<[usize; 2]>,
    pub legend: Vec<LegendStop>,
}

/// White to yellow to red over `[min, max]`; values outside clamp.
pub fn heatmap_rgb(value: f64, min: f64, max: f64) -> (u8, u8, u8) {
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    let (r, g, b) = if t < 0.33 {
        let s = t / 0.33;
        (255.0, 255.0 - 42.0 * s, 255.0 - 176.0 * s)
    } else if t < 0.66 {
        let s = (t - 0.33) / 0.33;
        (255.0, 213.0 - 100.0 * s, 79.0 - 42.0 * s)
    } else {
        let s = (t - 0.66) / 0.34;
        (255.0 - 72.0 * s, 113.0 - 85.0 * s, 37.0 - 9.0 * s)
    };
    (r.round() as u8, g.round() as u8, b.round() as u8)
}

pub fn heatmap_color(value: f64, min: f64, max: f64) -> String {
    let (r, g, b) = heatmap_rgb(value, min, max);
    hex_rgb(r, g, b)
}

fn text_color((r, g, b): (u8, u8, u8)) -> &'static str {
    let lum = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    if lum < 160.0 {
        "#fff"
    } else {
        "#1a1a1a"
    }
}

pub struct Heatmap;

impl ChartAdapter for Heatmap {
    fn kind(&self) -> ChartKind {
        ChartKind::Heatmap
    }

    fn depends_on(&self, change: &StateChange) -> bool {
        change.selection
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        if model.is_empty() {
            return None;
        }
        let (min, max) = (ctx.config.heatmap.domain_min, ctx.config.heatmap.domain_max);
        let ids = model.policy_ids().to_vec();

        let cells = model
            .matrix()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&v| {
                        let rgb = heatmap_rgb(v, min, max);
                        HeatCell {
                            value: v,
                            color: hex_rgb(rgb.0, rgb.1, rgb.2),
                            text_color: text_color(rgb),
                        }
                    })
                    .collect()
            })
            .collect();

        let mut outlines = Vec::new();
        for (cluster, members) in model.dataset().clusters.iter() {
            let mut idx: Vec<usize> = members.iter().filter_map(|m| model.index_of(m)).collect();
            idx.sort_unstable();
            idx.dedup();
            let (Some(&start), Some(&end)) = (idx.first(), idx.last()) else {
                continue;
            };
            if idx.len() >= 2 && end - start + 1 == idx.len() {
                outlines.push(ClusterOutline {
                    cluster: cluster.to_string(),
                    start,
                    end,
                    color: cluster_color(cluster),
                });
            }
        }

        let selected = ctx
            .snapshot
            .pair()
            .and_then(|(a, b)| Some([model.index_of(a)?, model.index_of(b)?]));

        let mid = (min + max) / 2.0;
        let legend = [min, mid, max]
            .iter()
            .map(|&value| LegendStop {
                value,
                color: heatmap_color(value, min, max),
            })
            .collect();

        Some(View::Heatmap(HeatmapView {
            labels: ids.iter().map(|id| model.label(id)).collect(),
            names: ids
                .iter()
                .map(|id| model.policy(id).map(|p| p.country.clone()).unwrap_or_else(|| id.clone()))
                .collect(),
            ids,
            cells,
            outlines,
            selected,
            legend,
        }))
    }

    fn on_event(&self, event: &ChartEvent, ctx: &RenderContext<'_>) -> Reaction {
        let ChartEvent::CellClick { row, col } = *event else {
            return Reaction::Ignore;
        };
        let ids = ctx.model.policy_ids();
        match (ids.get(row), ids.get(col)) {
            (Some(a), Some(b)) if row != col => Reaction::Apply(Intent::SelectPair(a.clone(), b.clone())),
            _ => Reaction::Ignore,
        }
    }
}
