use serde::Serialize;

use super::{ChartAdapter, ChartKind, RenderContext, View};
use crate::similarity::SimilarityStats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lo: f64,
    pub hi: f64,
    pub label: String,
    pub count: usize,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramView {
    pub bins: Vec<Bin>,
    pub stats: SimilarityStats,
    /// Pairs below the first bin.
    pub below_range: usize,
}

/// Count `values` into `bins` equal-width bins over `[min, max]`. The last
/// bin is closed and also takes anything above `max`; values below `min`
/// are not counted.
pub fn bin_counts(values: &[f64], bins: usize, min: f64, max: f64) -> Vec<usize> {
    if bins == 0 || max <= min {
        return Vec::new();
    }
    let width = (max - min) / bins as f64;
    let mut counts = vec![0; bins];
    for &v in values {
        if v < min {
            continue;
        }
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}

pub struct Histogram;

impl ChartAdapter for Histogram {
    fn kind(&self) -> ChartKind {
        ChartKind::Histogram
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let values: Vec<f64> = ctx.model.all_pairs_sorted().iter().map(|p| p.value).collect();
        if values.is_empty() {
            return None;
        }
        let cfg = &ctx.config.histogram;
        if cfg.bins == 0 || cfg.max <= cfg.min {
            return None;
        }
        let counts = bin_counts(&values, cfg.bins, cfg.min, cfg.max);
        let width = (cfg.max - cfg.min) / cfg.bins as f64;
        let last = (cfg.bins - 1).max(1) as f64;

        let bins = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let lo = cfg.min + i as f64 * width;
                let t = i as f64 / last;
                Bin {
                    lo,
                    hi: lo + width,
                    label: format!("{:.2}–{:.2}", lo, lo + width),
                    count,
                    color: format!(
                        "rgba({}, {}, {}, 0.8)",
                        (255.0 * (1.0 - t * 0.3)).round(),
                        (213.0 - t * 160.0).round(),
                        (79.0 - t * 30.0).round()
                    ),
                }
            })
            .collect();

        Some(View::Histogram(HistogramView {
            bins,
            stats: SimilarityStats::of(&values),
            below_range: values.iter().filter(|v| **v < cfg.min).count(),
        }))
    }
}
