use serde::Serialize;

use super::{ChartAdapter, ChartKind, RenderContext, View};
use crate::similarity::PairEntry;

pub const EXTREME_PAIRS: usize = 10;
const GLOWING_ROWS: usize = 3;
const BAR_FLOOR: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairBar {
    pub id_a: String,
    pub id_b: String,
    pub label_a: String,
    pub label_b: String,
    pub color_a: String,
    pub color_b: String,
    pub value: f64,
    /// Bar width in percent, scaled from 0.4 to 1.0.
    pub pct: f64,
    pub glow: Option<&'static str>,
    pub star: bool,
    pub bar_color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairExtremesView {
    pub top: Vec<PairBar>,
    pub bottom: Vec<PairBar>,
}

fn bars(entries: &[PairEntry], bar_color: &'static str, glow: &'static str) -> Vec<PairBar> {
    entries
        .iter()
        .enumerate()
        .map(|(i, p)| PairBar {
            id_a: p.id_a.clone(),
            id_b: p.id_b.clone(),
            label_a: p.label_a.clone(),
            label_b: p.label_b.clone(),
            color_a: p.color_a.clone(),
            color_b: p.color_b.clone(),
            value: p.value,
            pct: ((p.value - BAR_FLOOR) / (1.0 - BAR_FLOOR) * 100.0).clamp(0.0, 100.0),
            glow: (i < GLOWING_ROWS).then_some(glow),
            star: i == 0,
            bar_color,
        })
        .collect()
}

pub struct PairExtremes;

impl ChartAdapter for PairExtremes {
    fn kind(&self) -> ChartKind {
        ChartKind::PairExtremes
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let (top, bottom) = ctx.model.pair_extremes(EXTREME_PAIRS);
        if top.is_empty() {
            return None;
        }
        Some(View::PairExtremes(PairExtremesView {
            top: bars(&top, "var(--yellow)", "glow-yellow"),
            bottom: bars(&bottom, "rgba(255,255,255,0.3)", "glow-red"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::testing::render_with;
    use crate::fixtures;
    use crate::state::Snapshot;
    use approx::assert_relative_eq;

    #[test]
    fn top_and_bottom_lists() {
        let model = fixtures::sample_model();
        let Some(View::PairExtremes(v)) = render_with(&PairExtremes, &model, &Snapshot::default()) else {
            panic!("expected pair extremes");
        };
        assert_eq!(v.top.len(), 10);
        assert_eq!(v.bottom.len(), 10);
        assert_eq!((v.top[0].id_a.as_str(), v.top[0].id_b.as_str()), ("p1", "p2"));
        assert_relative_eq!(v.top[0].pct, (0.92 - 0.4) / 0.6 * 100.0);
        assert!(v.top[0].star && !v.top[1].star);
        assert_eq!(v.top[2].glow, Some("glow-yellow"));
        assert_eq!(v.top[3].glow, None);
        assert_eq!((v.bottom[0].id_a.as_str(), v.bottom[0].id_b.as_str()), ("p2", "p6"));
        assert_eq!(v.bottom[0].glow, Some("glow-red"));
    }

    #[test]
    fn single_policy_has_no_pairs() {
        let model = fixtures::model_from_matrix(&["solo"], vec![vec![1.0]]);
        assert!(render_with(&PairExtremes, &model, &Snapshot::default()).is_none());
    }
}
