use serde::Serialize;

use super::findings::{policy_bar, Bar};
use super::radar::{global_average_series, policy_series, RadarSeries};
use super::{short_label, ChartAdapter, ChartKind, RenderContext, View};
use crate::models::{cluster_name, Policy};
use crate::similarity::{Neighbor, SimilarityModel, UNCLUSTERED};
use crate::state::StateChange;

const FALLBACK_COLORS: [&str; 2] = ["#1976d2", "#d32f2f"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocSummary {
    pub id: String,
    pub abbr: String,
    pub country: String,
    pub title: String,
    pub year: i32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionRow {
    pub key: String,
    pub label: String,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub title: String,
    pub similarity: f64,
    pub a: DocSummary,
    pub b: DocSummary,
    pub dimensions: Vec<DimensionRow>,
    /// Both documents plus the global average.
    pub radar: Vec<RadarSeries>,
}

fn summary(policy: &Policy, slot: usize) -> DocSummary {
    let color = if policy.region_color.is_empty() {
        FALLBACK_COLORS[slot].to_string()
    } else {
        policy.region_color.clone()
    };
    DocSummary {
        id: policy.id.clone(),
        abbr: policy.abbr(),
        country: policy.country.clone(),
        title: policy.title.clone(),
        year: policy.year,
        color,
    }
}

pub struct DetailPanel;

impl ChartAdapter for DetailPanel {
    fn kind(&self) -> ChartKind {
        ChartKind::Detail
    }

    fn depends_on(&self, change: &StateChange) -> bool {
        change.selection
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        let (id_a, id_b) = ctx.snapshot.pair()?;
        let (pa, pb) = (model.policy(id_a)?, model.policy(id_b)?);
        let similarity = model.pair_similarity(id_a, id_b).ok()?;
        let (a, b) = (summary(pa, 0), summary(pb, 1));

        let dimensions = model
            .dimension_keys()
            .into_iter()
            .map(|k| DimensionRow {
                key: k.to_string(),
                label: short_label(model.dimension_label(k)).to_string(),
                a: model.score(id_a, k),
                b: model.score(id_b, k),
            })
            .collect();

        let mut radar = Vec::with_capacity(3);
        for (slot, doc) in [&a, &b].into_iter().enumerate() {
            let mut series = policy_series(model, &doc.id, slot);
            series.label = doc.abbr.clone();
            series.border = doc.color.clone();
            series.color = format!("{}33", doc.color);
            radar.push(series);
        }
        radar.push(global_average_series(model));

        Some(View::Detail(DetailView {
            title: format!("{} vs {}", a.abbr, b.abbr),
            similarity,
            a,
            b,
            dimensions,
            radar,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborLine {
    pub id: String,
    pub country: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub doc: DocSummary,
    pub region: String,
    pub average: f64,
    pub most_similar: Option<NeighborLine>,
    pub least_similar: Option<NeighborLine>,
    /// `"Cluster 2 (Humanista)"`, or a dash when unclustered.
    pub cluster: String,
    pub dimension_labels: Vec<String>,
    pub radar_max: f64,
    pub radar: RadarSeries,
    /// Every other policy, most similar first.
    pub similarities: Vec<Bar>,
}

fn neighbor_line(model: &SimilarityModel, n: Neighbor) -> NeighborLine {
    NeighborLine {
        country: model
            .policy(&n.id)
            .map(|p| p.country.clone())
            .unwrap_or_else(|| n.id.clone()),
        id: n.id,
        value: n.value,
    }
}

/// Profile of the most recently selected policy.
pub struct ProfileCard;

impl ChartAdapter for ProfileCard {
    fn kind(&self) -> ChartKind {
        ChartKind::Profile
    }

    fn depends_on(&self, change: &StateChange) -> bool {
        change.selection
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        let id = ctx.snapshot.selection.last()?;
        let policy = model.policy(id)?;
        let profile = model.profile(id)?;
        let cluster = match profile.cluster.as_str() {
            UNCLUSTERED => "—".to_string(),
            cid => match cluster_name(cid) {
                Some(name) => format!("Cluster {} ({})", cid, name),
                None => format!("Cluster {}", cid),
            },
        };
        let doc = summary(policy, 0);
        let mut radar = policy_series(model, id, 0);
        radar.border = doc.color.clone();
        radar.color = format!("{}22", doc.color);
        let similarities = model
            .neighbors_of(id)
            .into_iter()
            .map(|n| policy_bar(model, &n.id, n.value))
            .collect();

        Some(View::Profile(ProfileView {
            doc,
            region: policy.region.clone(),
            average: profile.average,
            most_similar: profile.most_similar.map(|n| neighbor_line(model, n)),
            least_similar: profile.least_similar.map(|n| neighbor_line(model, n)),
            cluster,
            dimension_labels: model
                .dimension_keys()
                .into_iter()
                .map(|k| short_label(model.dimension_label(k)).to_string())
                .collect(),
            radar_max: ctx.config.radar.max,
            radar,
            similarities,
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

    fn selected(ids: &[&str]) -> Snapshot {
        Snapshot {
            selection: ids.iter().map(|s| s.to_string()).collect(),
            ..Snapshot::default()
        }
    }

    #[test]
    fn detail_needs_a_full_pair() {
        let model = fixtures::sample_model();
        assert!(render_with(&DetailPanel, &model, &selected(&[])).is_none());
        assert!(render_with(&DetailPanel, &model, &selected(&["p1"])).is_none());
        assert!(render_with(&DetailPanel, &model, &selected(&["p1", "ghost"])).is_none());
    }

    #[test]
    fn detail_compares_both_documents() {
        let model = fixtures::sample_model();
        let Some(View::Detail(v)) = render_with(&DetailPanel, &model, &selected(&["p3", "p4"])) else {
            panic!("expected detail view");
        };
        assert_eq!(v.title, format!("{} vs {}", v.a.abbr, v.b.abbr));
        assert_relative_eq!(v.similarity, 0.88);
        assert_eq!(v.dimensions.len(), 7);
        assert_eq!(v.dimensions[0].label, "Gobernanza");
        assert_relative_eq!(v.dimensions[0].a, 0.2);
        assert_relative_eq!(v.dimensions[0].b, 0.25);
        assert_eq!(v.radar.len(), 3);
        assert_eq!(v.radar[0].border, "#388e3c");
        assert!(v.radar[2].dashed);
    }

    #[test]
    fn profile_follows_latest_selection() {
        let model = fixtures::sample_model();
        let Some(View::Profile(v)) = render_with(&ProfileCard, &model, &selected(&["p4", "p1"])) else {
            panic!("expected profile view");
        };
        assert_eq!(v.doc.id, "p1");
        assert_relative_eq!(v.average, (0.92 + 0.71 + 0.69 + 0.55 + 0.52) / 5.0);
        let most = v.most_similar.unwrap();
        assert_eq!((most.id.as_str(), most.country.as_str()), ("p2", "Country p2"));
        assert_eq!(v.least_similar.unwrap().id, "p6");
        assert!(v.cluster.starts_with("Cluster 1"));
    }

    #[test]
    fn profile_carries_radar_and_similarity_bars() {
        let model = fixtures::sample_model();
        let Some(View::Profile(v)) = render_with(&ProfileCard, &model, &selected(&["p3"])) else {
            panic!("expected profile view");
        };
        assert_eq!(v.dimension_labels.len(), 7);
        assert_eq!(v.dimension_labels[2], "Formación");
        assert_eq!(v.radar_max, 0.8);
        assert_eq!(v.radar.values.len(), 7);
        assert_relative_eq!(v.radar.values[0], model.score("p3", "gobernanza"));
        assert_eq!(v.radar.border, "#388e3c");
        assert_eq!(v.radar.color, "#388e3c22");

        let order: Vec<&str> = v.similarities.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(order, vec!["p4", "p2", "p1", "p5", "p6"]);
        assert_relative_eq!(v.similarities[0].value, 0.88);
        assert_eq!(v.similarities[0].border, "#388e3c");
        assert!(v.similarities.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn unclustered_profile_shows_dash() {
        let model = fixtures::abc_model();
        let Some(View::Profile(v)) = render_with(&ProfileCard, &model, &selected(&["C"])) else {
            panic!("expected profile view");
        };
        assert_eq!(v.cluster, "—");
        assert!(render_with(&ProfileCard, &model, &selected(&[])).is_none());
    }
}
