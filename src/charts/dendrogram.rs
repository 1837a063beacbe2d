use serde::Serialize;
use tracing::warn;

use super::{ChartAdapter, ChartKind, RenderContext, View};
use crate::models::{cluster_color, LinkageRow};
use crate::similarity::{SimilarityModel, UNCLUSTERED};

const MARGIN_TOP: f64 = 30.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 90.0;
const MARGIN_LEFT: f64 = 30.0;
const MIN_WIDTH: f64 = 600.0;
const LEAF_NAME_CHARS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DendroNode {
    pub id: Option<String>,
    pub label: String,
    /// Full country name under leaf labels, truncated.
    pub caption: Option<String>,
    pub leaf: bool,
    pub distance: f64,
    pub x: f64,
    pub y: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DendroLink {
    pub source: usize,
    pub target: usize,
    /// Elbow path, vertical then horizontal.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutLine {
    pub clusters: usize,
    pub distance: f64,
    pub y: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DendrogramView {
    pub width: f64,
    pub height: f64,
    pub margin: [f64; 4],
    pub max_distance: f64,
    pub nodes: Vec<DendroNode>,
    pub links: Vec<DendroLink>,
    pub cut: Option<CutLine>,
}

/// Merge distance separating `k` clusters: halfway between the (k-1)-th
/// and k-th largest merges. Needs at least `k` merges and `k >= 2`.
pub fn cut_distance(rows: &[LinkageRow], k: usize) -> Option<f64> {
    if k < 2 || rows.len() < k {
        return None;
    }
    let mut d: Vec<f64> = rows.iter().map(|r| r.distance).collect();
    d.sort_by(|a, b| b.total_cmp(a));
    Some((d[k - 2] + d[k - 1]) / 2.0)
}

struct Tree {
    children: Vec<Option<[usize; 2]>>,
    parent: Vec<Option<usize>>,
    root: usize,
}

fn build_tree(rows: &[LinkageRow], leaves: usize) -> Option<Tree> {
    if leaves == 0 || rows.len() + 1 != leaves {
        return None;
    }
    let total = leaves + rows.len();
    let mut children = vec![None; total];
    let mut parent = vec![None; total];
    for (i, row) in rows.iter().enumerate() {
        let node = leaves + i;
        for c in [row.a, row.b] {
            // children must exist already and be merged only once
            if c >= node || parent[c].is_some() {
                return None;
            }
            parent[c] = Some(node);
        }
        children[node] = Some([row.a, row.b]);
    }
    Some(Tree {
        children,
        parent,
        root: total - 1,
    })
}

/// Cluster layout: leaves in traversal order with sibling spacing 1 and
/// cousin spacing 2, parents centered over their children, x normalized
/// to `[0, width]`.
fn cluster_x(tree: &Tree, width: f64) -> Vec<f64> {
    let mut x = vec![0.0; tree.children.len()];
    let mut post = Vec::with_capacity(x.len());
    let mut stack = vec![(tree.root, false)];
    while let Some((node, expanded)) = stack.pop() {
        match (tree.children[node], expanded) {
            (Some([a, b]), false) => {
                stack.push((node, true));
                stack.push((b, false));
                stack.push((a, false));
            }
            _ => post.push(node),
        }
    }

    let separation = |a: usize, b: usize| if tree.parent[a] == tree.parent[b] { 1.0 } else { 2.0 };
    let mut previous: Option<usize> = None;
    let mut cursor = 0.0;
    let mut first_leaf = None;
    for &node in &post {
        match tree.children[node] {
            Some([a, b]) => x[node] = (x[a] + x[b]) / 2.0,
            None => {
                if let Some(p) = previous {
                    cursor += separation(node, p);
                }
                x[node] = cursor;
                first_leaf.get_or_insert(node);
                previous = Some(node);
            }
        }
    }

    if let (Some(left), Some(right)) = (first_leaf, previous) {
        let x0 = x[left] - separation(left, right) / 2.0;
        let x1 = x[right] + separation(right, left) / 2.0;
        for v in &mut x {
            *v = (*v - x0) / (x1 - x0) * width;
        }
    }
    x
}

fn layout(
    model: &SimilarityModel,
    rows: &[LinkageRow],
    labels: &[String],
    cluster_count: usize,
    width: f64,
    height: f64,
) -> Option<DendrogramView> {
    let leaves = labels.len();
    let tree = build_tree(rows, leaves)?;
    let inner_w = width - MARGIN_LEFT - MARGIN_RIGHT;
    let inner_h = height - MARGIN_TOP - MARGIN_BOTTOM;
    let xs = cluster_x(&tree, inner_w);

    let max_distance = rows.iter().map(|r| r.distance).fold(0.0, f64::max);
    let domain = max_distance * 1.05;
    let y_of = |d: f64| {
        if domain > 0.0 {
            inner_h - d / domain * inner_h
        } else {
            inner_h
        }
    };

    let mut nodes = Vec::with_capacity(xs.len());
    for (i, &x) in xs.iter().enumerate() {
        if i < leaves {
            let id = &labels[i];
            let color = match model.cluster_of(id) {
                UNCLUSTERED => "#555".to_string(),
                cid => cluster_color(cid).to_string(),
            };
            nodes.push(DendroNode {
                id: Some(id.clone()),
                label: model.label(id),
                caption: model.policy(id).map(|p| {
                    if p.country.chars().count() > LEAF_NAME_CHARS {
                        format!("{}…", p.country.chars().take(LEAF_NAME_CHARS).collect::<String>())
                    } else {
                        p.country.clone()
                    }
                }),
                leaf: true,
                distance: 0.0,
                x,
                y: inner_h,
                color,
            });
        } else {
            let d = rows[i - leaves].distance;
            nodes.push(DendroNode {
                id: None,
                label: format!("merge_{}", i - leaves),
                caption: None,
                leaf: false,
                distance: d,
                x,
                y: y_of(d),
                color: "#666".to_string(),
            });
        }
    }

    let links = tree
        .children
        .iter()
        .enumerate()
        .filter_map(|(parent, c)| c.map(|pair| (parent, pair)))
        .flat_map(|(parent, pair)| pair.into_iter().map(move |child| (parent, child)))
        .map(|(s, t)| DendroLink {
            source: s,
            target: t,
            path: format!("M{},{}V{}H{}", nodes[s].x, nodes[s].y, nodes[t].y, nodes[t].x),
        })
        .collect();

    let cut = cut_distance(rows, cluster_count).map(|distance| CutLine {
        clusters: cluster_count,
        distance,
        y: y_of(distance),
        label: format!("Umbral {} clusters", cluster_count),
    });

    Some(DendrogramView {
        width,
        height,
        margin: [MARGIN_TOP, MARGIN_RIGHT, MARGIN_BOTTOM, MARGIN_LEFT],
        max_distance,
        nodes,
        links,
        cut,
    })
}

pub struct DendrogramChart;

impl ChartAdapter for DendrogramChart {
    fn kind(&self) -> ChartKind {
        ChartKind::Dendrogram
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let data = ctx.model.dataset().dendrogram.as_ref()?;
        if data.linkage_matrix.is_empty() || data.labels.is_empty() {
            return None;
        }
        let rows = match data.rows() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("dendrogram skipped - {}", e);
                return None;
            }
        };
        let cfg = &ctx.config.dendrogram;
        let view = layout(
            ctx.model,
            &rows,
            &data.labels,
            cfg.cluster_count,
            cfg.width.max(MIN_WIDTH),
            cfg.height,
        );
        if view.is_none() {
            warn!("dendrogram skipped - linkage does not form a tree");
        }
        view.map(View::Dendrogram)
    }
}
