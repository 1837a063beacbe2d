//! Findings bar charts and the dimension explainer.

use serde::Serialize;

use super::{short_label, ChartAdapter, ChartKind, RenderContext, View};
use crate::similarity::SimilarityModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub id: String,
    pub label: String,
    pub value: f64,
    pub color: String,
    pub border: String,
}

/// Bar for one policy, tinted with its region color.
pub fn policy_bar(model: &SimilarityModel, id: &str, value: f64) -> Bar {
    let border = model.color(id);
    Bar {
        id: id.to_string(),
        label: model.label(id),
        value,
        color: format!("{}99", border),
        border,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    /// Each member's mean similarity to the rest of its cluster.
    ClusterCohesion,
    DimensionRanking,
    /// One policy against all others, least similar first.
    Outlier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingView {
    pub finding: Finding,
    pub title: String,
    pub horizontal: bool,
    pub min: f64,
    pub max: Option<f64>,
    pub bars: Vec<Bar>,
}

pub struct FindingChart {
    finding: Finding,
}

impl FindingChart {
    pub fn new(finding: Finding) -> Self {
        FindingChart { finding }
    }
}

fn cluster_cohesion(model: &SimilarityModel, cluster: &str) -> Vec<Bar> {
    let members: Vec<&str> = model
        .dataset()
        .clusters
        .get(cluster)
        .map(|ids| ids.iter().map(String::as_str).filter(|id| model.index_of(id).is_some()).collect())
        .unwrap_or_default();
    members
        .iter()
        .filter_map(|&id| {
            let sims: Vec<f64> = members
                .iter()
                .filter(|&&other| other != id)
                .filter_map(|other| model.pair_similarity(id, other).ok())
                .collect();
            if sims.is_empty() {
                return None;
            }
            let mean = sims.iter().sum::<f64>() / sims.len() as f64;
            Some(policy_bar(model, id, mean))
        })
        .collect()
}

fn dimension_ranking(model: &SimilarityModel, dimension: &str) -> Vec<Bar> {
    let mut bars: Vec<Bar> = model
        .dataset()
        .policies
        .iter()
        .map(|p| policy_bar(model, &p.id, model.score(&p.id, dimension)))
        .collect();
    bars.sort_by(|a, b| b.value.total_cmp(&a.value));
    bars
}

fn outlier(model: &SimilarityModel, target: &str) -> Vec<Bar> {
    let mut bars: Vec<Bar> = model
        .dataset()
        .policies
        .iter()
        .filter(|p| p.id != target)
        .filter_map(|p| {
            let value = model.pair_similarity(target, &p.id).ok()?;
            Some(policy_bar(model, &p.id, value))
        })
        .collect();
    bars.sort_by(|a, b| a.value.total_cmp(&b.value));
    bars
}

impl ChartAdapter for FindingChart {
    fn kind(&self) -> ChartKind {
        ChartKind::Finding
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        let cfg = &ctx.config.findings;
        let (title, horizontal, min, max, bars) = match self.finding {
            Finding::ClusterCohesion => (
                "Similitud promedio intra-cluster".to_string(),
                false,
                0.6,
                None,
                cluster_cohesion(model, &cfg.cluster),
            ),
            Finding::DimensionRanking => {
                if !model.dimension_keys().contains(&cfg.dimension.as_str()) {
                    return None;
                }
                (
                    format!("Puntaje: {}", model.dimension_label(&cfg.dimension)),
                    true,
                    0.0,
                    Some(0.7),
                    dimension_ranking(model, &cfg.dimension),
                )
            }
            Finding::Outlier => {
                model.index_of(&cfg.outlier)?;
                (
                    format!("Similitud con {}", model.label(&cfg.outlier)),
                    true,
                    0.3,
                    Some(0.7),
                    outlier(model, &cfg.outlier),
                )
            }
        };
        if bars.is_empty() {
            return None;
        }
        Some(View::Finding(FindingView {
            finding: self.finding,
            title,
            horizontal,
            min,
            max,
            bars,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionBar {
    pub key: String,
    pub label: String,
    pub average: f64,
    /// Bar length as a fraction of the radar scale.
    pub fill: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainerView {
    pub bars: Vec<DimensionBar>,
    pub scale_max: f64,
    pub caption: String,
}

/// Mean positive score per dimension across the corpus.
pub struct ExplainerChart;

impl ChartAdapter for ExplainerChart {
    fn kind(&self) -> ChartKind {
        ChartKind::Explainer
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        let keys = model.dimension_keys();
        if model.is_empty() || keys.is_empty() {
            return None;
        }
        let scale_max = ctx.config.radar.max;
        let bars = keys
            .into_iter()
            .map(|k| {
                // unscored dimensions stay out of the mean regardless of config
                let scores: Vec<f64> = model
                    .dataset()
                    .policies
                    .iter()
                    .map(|p| model.score(&p.id, k))
                    .filter(|v| *v > 0.0)
                    .collect();
                let average = if scores.is_empty() {
                    0.0
                } else {
                    scores.iter().sum::<f64>() / scores.len() as f64
                };
                let fill = average / scale_max;
                DimensionBar {
                    key: k.to_string(),
                    label: short_label(model.dimension_label(k)).to_string(),
                    average,
                    fill,
                    opacity: 0.15 + fill * 0.7,
                }
            })
            .collect();
        Some(View::Explainer(ExplainerView {
            bars,
            scale_max,
            caption: format!("Promedio por dimensión ({} políticas)", model.len()),
        }))
    }
}
