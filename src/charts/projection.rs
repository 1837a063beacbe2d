use serde::Serialize;
use tracing::warn;

use super::{ChartAdapter, ChartEvent, ChartKind, Reaction, RenderContext, View};
use crate::models::{cluster_color, cluster_name, Point2};
use crate::similarity::UNCLUSTERED;
use crate::state::{Intent, StateChange};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub id: String,
    pub label: String,
    pub hover: String,
    pub x: f64,
    pub y: f64,
    pub selected: bool,
    pub dimmed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionGroup {
    pub cluster: String,
    pub name: String,
    pub color: String,
    pub points: Vec<ProjectionPoint>,
    pub hull: Option<Vec<Point2>>,
    pub hull_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionView {
    /// `"umap"` or `"tsne"`.
    pub source: &'static str,
    pub groups: Vec<ProjectionGroup>,
}

fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Monotone-chain convex hull in counter-clockwise order. Points on an edge
/// are dropped. Fewer than three points come back unchanged.
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));

    let mut lower: Vec<Point2> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point2> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Whether `p` lies inside or on a counter-clockwise hull.
pub fn hull_contains(hull: &[Point2], p: Point2) -> bool {
    if hull.len() < 3 {
        return false;
    }
    let eps = 1e-9;
    (0..hull.len()).all(|i| cross(hull[i], hull[(i + 1) % hull.len()], p) >= -eps)
}

fn svg_path(hull: &[Point2]) -> String {
    let body: Vec<String> = hull.iter().map(|p| format!("{},{}", p[0], p[1])).collect();
    format!("M{}Z", body.join("L"))
}

pub struct ProjectionScatter;

impl ChartAdapter for ProjectionScatter {
    fn kind(&self) -> ChartKind {
        ChartKind::Projection
    }

    fn depends_on(&self, change: &StateChange) -> bool {
        change.selection || change.region
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        let data = model.dataset();
        let coords = data.projection()?;
        let source = match &data.umap {
            Some(u) if !u.is_empty() => "umap",
            _ => "tsne",
        };
        if coords.len() != model.len() {
            warn!(
                "projection has {} points for {} policies; extra entries ignored",
                coords.len(),
                model.len()
            );
        }

        let mut groups: Vec<ProjectionGroup> = Vec::new();
        for (id, xy) in model.policy_ids().iter().zip(coords.iter()) {
            let cluster = match model.cluster_of(id) {
                UNCLUSTERED => "0",
                c => c,
            };
            let policy = model.policy(id);
            let point = ProjectionPoint {
                id: id.clone(),
                label: model.label(id),
                hover: policy
                    .map(|p| format!("{}<br>{} ({})", p.country, p.title, p.year))
                    .unwrap_or_else(|| id.clone()),
                x: xy[0],
                y: xy[1],
                selected: ctx.snapshot.is_selected(id),
                dimmed: !policy
                    .map(|p| ctx.snapshot.filters.region.matches(&p.region))
                    .unwrap_or(true),
            };
            match groups.iter_mut().find(|g| g.cluster == cluster) {
                Some(g) => g.points.push(point),
                None => groups.push(ProjectionGroup {
                    cluster: cluster.to_string(),
                    name: format!("Cluster {}: {}", cluster, cluster_name(cluster).unwrap_or(cluster)),
                    color: cluster_color(cluster).to_string(),
                    points: vec![point],
                    hull: None,
                    hull_path: None,
                }),
            }
        }
        if groups.is_empty() {
            return None;
        }

        for g in &mut groups {
            if g.points.len() < 3 {
                continue;
            }
            let pts: Vec<Point2> = g.points.iter().map(|p| [p.x, p.y]).collect();
            let hull = convex_hull(&pts);
            if hull.len() >= 3 {
                g.hull_path = Some(svg_path(&hull));
                g.hull = Some(hull);
            }
        }

        Some(View::Projection(ProjectionView { source, groups }))
    }

    fn on_event(&self, event: &ChartEvent, ctx: &RenderContext<'_>) -> Reaction {
        match *event {
            ChartEvent::PointClick { index } => match ctx.model.policy_ids().get(index) {
                Some(id) => Reaction::Apply(Intent::Toggle(id.clone())),
                None => Reaction::Ignore,
            },
            _ => Reaction::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::testing::render_with;
    use crate::fixtures;
    use crate::state::Snapshot;

    #[test]
    fn hull_drops_interior_and_collinear_points() {
        let pts = [[0.0, 0.0], [2.0, 0.0], [1.0, 0.0], [2.0, 2.0], [0.0, 2.0], [1.0, 1.0]];
        let hull = convex_hull(&pts);
        assert_eq!(hull, vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]);
        assert!(pts.iter().all(|p| hull_contains(&hull, *p)));
        assert!(!hull_contains(&hull, [3.0, 1.0]));
    }

    #[test]
    fn collinear_cluster_has_no_hull() {
        let hull = convex_hull(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]);
        assert!(hull.len() < 3);
    }

    #[test]
    fn groups_by_cluster_with_hulls() {
        let model = fixtures::sample_model();
        let Some(View::Projection(v)) = render_with(&ProjectionScatter, &model, &Snapshot::default()) else {
            panic!("expected projection");
        };
        assert_eq!(v.source, "umap");
        assert_eq!(v.groups.len(), 2);
        assert_eq!(v.groups[0].name, "Cluster 1: Tecnológico");
        assert_eq!(v.groups[0].hull.as_ref().map(Vec::len), Some(3));
        assert!(v.groups[1].hull_path.as_ref().unwrap().starts_with("M10,10L"));
    }

    #[test]
    fn falls_back_to_tsne_and_skips_when_absent() {
        let mut data = fixtures::sample_dataset();
        data.tsne = data.umap.take();
        let model = crate::SimilarityModel::from_dataset(data);
        let Some(View::Projection(v)) = render_with(&ProjectionScatter, &model, &Snapshot::default()) else {
            panic!("expected projection");
        };
        assert_eq!(v.source, "tsne");

        let model = fixtures::abc_model();
        assert!(render_with(&ProjectionScatter, &model, &Snapshot::default()).is_none());
    }
}
