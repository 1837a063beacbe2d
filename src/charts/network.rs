use serde::Serialize;
use std::f64::consts::PI;

use super::{ChartAdapter, ChartEvent, ChartKind, Reaction, RenderContext, View};
use crate::config::NetworkConfig;
use crate::models::known_cluster_color;
use crate::similarity::{SimilarityModel, UNCLUSTERED};
use crate::state::{Intent, Snapshot, StateChange};

const MARGIN: f64 = 20.0;
const ALPHA_MIN: f64 = 0.001;
const VELOCITY_DECAY: f64 = 0.4;
const JIGGLE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetNode {
    pub id: String,
    pub label: String,
    pub name: String,
    pub cluster: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub selected: bool,
    /// Outside the active region filter.
    pub dimmed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub stroke_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkView {
    pub width: f64,
    pub height: f64,
    pub threshold: f64,
    pub nodes: Vec<NetNode>,
    pub edges: Vec<NetEdge>,
}

/// Index pairs whose similarity is at least `threshold`, upper triangle
/// order.
pub fn threshold_edges(model: &SimilarityModel, threshold: f64) -> Vec<(usize, usize, f64)> {
    let matrix = model.matrix();
    let n = model.len();
    let mut out = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if matrix[i][j] >= threshold {
                out.push((i, j, matrix[i][j]));
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

fn nonzero(v: f64) -> f64 {
    if v == 0.0 {
        JIGGLE
    } else {
        v
    }
}

/// Deterministic force-directed layout.
///
/// Bodies start on a phyllotaxis spiral and settle under link springs
/// (rest length shrinks as similarity grows), pairwise charge, centering
/// and collision. Positions are kept inside the drawing area on every tick.
pub fn force_layout(n: usize, links: &[(usize, usize, f64)], cfg: &NetworkConfig) -> Vec<[f64; 2]> {
    let golden = PI * (3.0 - 5f64.sqrt());
    let mut bodies: Vec<Body> = (0..n)
        .map(|i| {
            let r = 10.0 * (0.5 + i as f64).sqrt();
            let a = i as f64 * golden;
            Body {
                x: r * a.cos(),
                y: r * a.sin(),
                ..Default::default()
            }
        })
        .collect();
    if n == 0 {
        return Vec::new();
    }

    let mut degree = vec![0usize; n];
    for &(s, t, _) in links {
        degree[s] += 1;
        degree[t] += 1;
    }

    let (cx, cy) = (cfg.width / 2.0, cfg.height / 2.0);
    let radius = cfg.collision_radius;
    let alpha_decay = 1.0 - ALPHA_MIN.powf(1.0 / cfg.iterations.max(1) as f64);
    let mut alpha = 1.0;

    for _ in 0..cfg.iterations {
        alpha += -alpha * alpha_decay;

        for &(s, t, w) in links {
            let strength = 1.0 / degree[s].min(degree[t]) as f64;
            let bias = degree[s] as f64 / (degree[s] + degree[t]) as f64;
            let distance = (1.0 - w) * cfg.distance_scale;
            let (src, tgt) = (bodies[s], bodies[t]);
            let dx = nonzero(tgt.x + tgt.vx - src.x - src.vx);
            let dy = nonzero(tgt.y + tgt.vy - src.y - src.vy);
            let l = (dx * dx + dy * dy).sqrt();
            let k = (l - distance) / l * alpha * strength;
            let (fx, fy) = (dx * k, dy * k);
            bodies[t].vx -= fx * bias;
            bodies[t].vy -= fy * bias;
            bodies[s].vx += fx * (1.0 - bias);
            bodies[s].vy += fy * (1.0 - bias);
        }

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let dx = nonzero(bodies[j].x - bodies[i].x);
                let dy = bodies[j].y - bodies[i].y;
                let mut l = dx * dx + dy * dy;
                if l < 1.0 {
                    l = l.sqrt();
                }
                let w = cfg.charge * alpha / l;
                bodies[i].vx += dx * w;
                bodies[i].vy += dy * w;
            }
        }

        let (sx, sy) = bodies
            .iter()
            .fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
        let (shift_x, shift_y) = (sx / n as f64 - cx, sy / n as f64 - cy);
        for b in &mut bodies {
            b.x -= shift_x;
            b.y -= shift_y;
        }

        let min_dist = radius * 2.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = nonzero(bodies[i].x + bodies[i].vx - bodies[j].x - bodies[j].vx);
                let dy = bodies[i].y + bodies[i].vy - bodies[j].y - bodies[j].vy;
                let l2 = dx * dx + dy * dy;
                if l2 < min_dist * min_dist {
                    let l = l2.sqrt();
                    let k = (min_dist - l) / l * 0.5;
                    bodies[i].vx += dx * k;
                    bodies[i].vy += dy * k;
                    bodies[j].vx -= dx * k;
                    bodies[j].vy -= dy * k;
                }
            }
        }

        for b in &mut bodies {
            b.vx *= 1.0 - VELOCITY_DECAY;
            b.vy *= 1.0 - VELOCITY_DECAY;
            b.x = (b.x + b.vx).clamp(MARGIN, (cfg.width - MARGIN).max(MARGIN));
            b.y = (b.y + b.vy).clamp(MARGIN, (cfg.height - MARGIN).max(MARGIN));
        }
    }

    bodies.iter().map(|b| [b.x, b.y]).collect()
}

/// Node click: toggle while fewer than two are selected (or the node is
/// already selected); otherwise pair the newest selection with the node.
pub fn click_intent(snapshot: &Snapshot, id: &str) -> Intent {
    let sel = &snapshot.selection;
    if sel.len() < 2 || snapshot.is_selected(id) {
        Intent::Toggle(id.to_string())
    } else {
        Intent::SelectPair(sel[1].clone(), id.to_string())
    }
}

pub struct NetworkGraph;

impl ChartAdapter for NetworkGraph {
    fn kind(&self) -> ChartKind {
        ChartKind::Network
    }

    fn depends_on(&self, change: &StateChange) -> bool {
        change.threshold || change.selection || change.region
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        if model.is_empty() {
            return None;
        }
        let cfg = &ctx.config.network;
        let threshold = ctx.snapshot.filters.threshold;
        let links = threshold_edges(model, threshold);
        let positions = force_layout(model.len(), &links, cfg);
        let ids = model.policy_ids();

        let nodes = ids
            .iter()
            .zip(positions.iter())
            .map(|(id, pos)| {
                let policy = model.policy(id);
                let cluster = model.cluster_of(id).to_string();
                let region_color = model.color(id);
                NetNode {
                    label: model.label(id),
                    name: policy.map(|p| p.country.clone()).unwrap_or_else(|| id.clone()),
                    color: known_cluster_color(&cluster)
                        .map(str::to_string)
                        .unwrap_or(region_color),
                    cluster: if cluster == UNCLUSTERED { "0".to_string() } else { cluster },
                    x: pos[0],
                    y: pos[1],
                    selected: ctx.snapshot.is_selected(id),
                    dimmed: !policy
                        .map(|p| ctx.snapshot.filters.region.matches(&p.region))
                        .unwrap_or(true),
                    id: id.clone(),
                }
            })
            .collect();

        let edges = links
            .iter()
            .map(|&(i, j, w)| NetEdge {
                source: ids[i].clone(),
                target: ids[j].clone(),
                weight: w,
                stroke_width: 1.0 + (w - 0.5) * 6.0,
            })
            .collect();

        Some(View::Network(NetworkView {
            width: cfg.width,
            height: cfg.height,
            threshold,
            nodes,
            edges,
        }))
    }

    fn on_event(&self, event: &ChartEvent, ctx: &RenderContext<'_>) -> Reaction {
        match event {
            ChartEvent::NodeClick { id } if ctx.model.index_of(id).is_some() => {
                Reaction::Apply(click_intent(ctx.snapshot, id))
            }
            _ => Reaction::Ignore,
        }
    }
}
