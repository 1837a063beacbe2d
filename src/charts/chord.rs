use serde::Serialize;
use std::cell::Cell;
use std::f64::consts::TAU;

use super::{ChartAdapter, ChartEvent, ChartKind, Reaction, RenderContext, View};
use crate::similarity::SimilarityModel;
use crate::state::{Intent, Snapshot, StateChange};

pub const PAD_ANGLE: f64 = 0.04;
pub const DEFAULT_OPACITY: f64 = 0.65;
pub const HOVER_CONNECTED: f64 = 0.85;
pub const HOVER_FADED: f64 = 0.05;
pub const SELECTED_OPACITY: f64 = 0.95;
pub const UNSELECTED_OPACITY: f64 = 0.3;

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 550.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChordEnd {
    pub index: usize,
    pub start_angle: f64,
    pub end_angle: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordGroup {
    pub index: usize,
    pub id: String,
    pub label: String,
    pub color: String,
    pub start_angle: f64,
    pub end_angle: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ribbon {
    pub source: ChordEnd,
    pub target: ChordEnd,
    pub similarity: f64,
    pub color: String,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordView {
    pub width: f64,
    pub height: f64,
    pub outer_radius: f64,
    pub inner_radius: f64,
    pub threshold: f64,
    pub hovered: Option<usize>,
    pub groups: Vec<ChordGroup>,
    pub ribbons: Vec<Ribbon>,
}

/// Similarity matrix with the diagonal and every value below `threshold`
/// set to zero.
pub fn chord_matrix(model: &SimilarityModel, threshold: f64) -> Vec<Vec<f64>> {
    model
        .matrix()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(|(j, &v)| if i != j && v >= threshold { v } else { 0.0 })
                .collect()
        })
        .collect()
}

/// Circular chord layout: group arcs sized by row sums, subgroups sorted
/// by descending value, one chord per non-zero unordered pair.
pub fn chord_layout(matrix: &[Vec<f64>], pad_angle: f64) -> (Vec<ChordEnd>, Vec<(ChordEnd, ChordEnd)>) {
    let n = matrix.len();
    let total: f64 = matrix.iter().flatten().sum();
    let dx = if total > 0.0 {
        (TAU - pad_angle * n as f64).max(0.0) / total
    } else {
        0.0
    };

    let mut subgroups = vec![
        ChordEnd {
            index: 0,
            start_angle: 0.0,
            end_angle: 0.0,
            value: 0.0
        };
        n * n
    ];
    let mut groups = Vec::with_capacity(n);
    let mut x = 0.0;
    for (i, row) in matrix.iter().enumerate() {
        let x0 = x;
        let mut order: Vec<usize> = (0..n).collect();
        // stable: equal values keep column order
        order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
        for j in order {
            let v = row[j];
            let start = x;
            x += v * dx;
            subgroups[i * n + j] = ChordEnd {
                index: i,
                start_angle: start,
                end_angle: x,
                value: v,
            };
        }
        groups.push(ChordEnd {
            index: i,
            start_angle: x0,
            end_angle: x,
            value: row.iter().sum(),
        });
        x += pad_angle;
    }

    let mut chords = Vec::new();
    for i in 0..n {
        for j in i..n {
            let source = subgroups[j * n + i];
            let target = subgroups[i * n + j];
            if source.value != 0.0 || target.value != 0.0 {
                chords.push(if source.value < target.value {
                    (target, source)
                } else {
                    (source, target)
                });
            }
        }
    }
    (groups, chords)
}

/// Ribbon opacity. Hover wins over the selected-pair highlight.
pub fn ribbon_opacity(source: usize, target: usize, hovered: Option<usize>, selected: &[usize]) -> f64 {
    if let Some(h) = hovered {
        return if source == h || target == h {
            HOVER_CONNECTED
        } else {
            HOVER_FADED
        };
    }
    if selected.len() == 2 {
        return if selected.contains(&source) && selected.contains(&target) {
            SELECTED_OPACITY
        } else {
            UNSELECTED_OPACITY
        };
    }
    DEFAULT_OPACITY
}

fn selected_indices(model: &SimilarityModel, snapshot: &Snapshot) -> Vec<usize> {
    match snapshot.pair() {
        Some((a, b)) => [a, b].iter().filter_map(|id| model.index_of(id)).collect(),
        None => Vec::new(),
    }
}

#[derive(Default)]
pub struct ChordChart {
    hovered: Cell<Option<usize>>,
}

impl ChartAdapter for ChordChart {
    fn kind(&self) -> ChartKind {
        ChartKind::Chord
    }

    fn depends_on(&self, change: &StateChange) -> bool {
        change.threshold || change.selection
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        if model.is_empty() {
            return None;
        }
        let threshold = ctx.snapshot.filters.threshold;
        let matrix = chord_matrix(model, threshold);
        let (groups, chords) = chord_layout(&matrix, PAD_ANGLE);
        let ids = model.policy_ids();
        let hovered = self.hovered.get();
        let selected = selected_indices(model, ctx.snapshot);

        let groups = groups
            .into_iter()
            .map(|g| ChordGroup {
                index: g.index,
                id: ids[g.index].clone(),
                label: model.label(&ids[g.index]),
                color: model.color(&ids[g.index]),
                start_angle: g.start_angle,
                end_angle: g.end_angle,
                value: g.value,
            })
            .collect();

        let ribbons = chords
            .into_iter()
            .map(|(source, target)| Ribbon {
                similarity: model.matrix()[source.index][target.index],
                color: model.color(&ids[source.index]),
                opacity: ribbon_opacity(source.index, target.index, hovered, &selected),
                source,
                target,
            })
            .collect();

        let outer_radius = WIDTH.min(HEIGHT) / 2.0 - 40.0;
        Some(View::Chord(ChordView {
            width: WIDTH,
            height: HEIGHT,
            outer_radius,
            inner_radius: outer_radius - 22.0,
            threshold,
            hovered,
            groups,
            ribbons,
        }))
    }

    fn on_event(&self, event: &ChartEvent, ctx: &RenderContext<'_>) -> Reaction {
        let ids = ctx.model.policy_ids();
        match *event {
            ChartEvent::Hover { index } => {
                self.hovered.set(index.filter(|i| *i < ids.len()));
                Reaction::Redraw
            }
            ChartEvent::ArcClick { index } => match ids.get(index) {
                Some(id) => Reaction::Apply(Intent::Toggle(id.clone())),
                None => Reaction::Ignore,
            },
            ChartEvent::RibbonClick { source, target } if source != target => {
                match (ids.get(source), ids.get(target)) {
                    (Some(a), Some(b)) => Reaction::Apply(Intent::SelectPair(a.clone(), b.clone())),
                    _ => Reaction::Ignore,
                }
            }
            _ => Reaction::Ignore,
        }
    }
}
