use serde::Serialize;
use std::cell::RefCell;

use super::{ChartAdapter, ChartEvent, ChartKind, Reaction, RenderContext, View};
use crate::models::{cluster_color, cluster_name};
use crate::similarity::{SimilarityModel, UNCLUSTERED};

const FILL_COLORS: [&str; 3] = ["#1976d2", "#d32f2f", "#FFD54F"];
const BORDER_COLORS: [&str; 3] = ["#1976d2", "#d32f2f", "#b8960a"];
const EXTRA_COLOR: &str = "#7b1fa2";
pub const MAX_SERIES: usize = 3;
pub const DEFAULT_PRESET: &str = "iberoamerica";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarSeries {
    pub id: Option<String>,
    pub label: String,
    pub values: Vec<f64>,
    pub color: String,
    pub border: String,
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarView {
    pub keys: Vec<String>,
    pub labels: Vec<String>,
    pub max: f64,
    pub preset: Option<String>,
    pub series: Vec<RadarSeries>,
    pub cluster_averages: Vec<RadarSeries>,
    pub global_average: RadarSeries,
}

#[derive(Debug, Clone, PartialEq)]
enum RadarSource {
    Preset(String),
    Custom(Vec<String>),
}

/// Dimension profile of up to three policies, picked by preset or by hand.
pub struct RadarChart {
    source: RefCell<RadarSource>,
}

impl Default for RadarChart {
    fn default() -> Self {
        Self::with_preset(DEFAULT_PRESET)
    }
}

impl RadarChart {
    pub fn with_preset(name: &str) -> Self {
        RadarChart {
            source: RefCell::new(RadarSource::Preset(name.to_string())),
        }
    }
}

/// Scores of `id` in dimension order; missing scores read as 0.
pub fn policy_series(model: &SimilarityModel, id: &str, slot: usize) -> RadarSeries {
    RadarSeries {
        id: Some(id.to_string()),
        label: model
            .policy(id)
            .map(|p| p.country.clone())
            .unwrap_or_else(|| id.to_string()),
        values: model.scores_for(id).into_iter().map(|(_, v)| v).collect(),
        color: FILL_COLORS.get(slot).copied().unwrap_or(EXTRA_COLOR).to_string(),
        border: BORDER_COLORS.get(slot).copied().unwrap_or(EXTRA_COLOR).to_string(),
        dashed: false,
    }
}

pub fn global_average_series(model: &SimilarityModel) -> RadarSeries {
    RadarSeries {
        id: None,
        label: "Promedio global".to_string(),
        values: model
            .dimension_keys()
            .into_iter()
            .map(|k| model.dimension_average(k, None))
            .collect(),
        color: "transparent".to_string(),
        border: "rgba(0,0,0,0.15)".to_string(),
        dashed: true,
    }
}

fn cluster_average_series(model: &SimilarityModel) -> Vec<RadarSeries> {
    model
        .cluster_members()
        .into_iter()
        .filter(|(cid, _)| cid != UNCLUSTERED)
        .map(|(cid, members)| {
            let values = model
                .dimension_keys()
                .into_iter()
                .map(|k| model.dimension_average(k, Some(&members)))
                .collect();
            let label = match cluster_name(&cid) {
                Some(name) => format!("Cluster {}: {}", cid, name),
                None => format!("Cluster {}", cid),
            };
            RadarSeries {
                id: None,
                label,
                values,
                color: "rgba(255, 213, 79, 0.15)".to_string(),
                border: cluster_color(&cid).to_string(),
                dashed: false,
            }
        })
        .collect()
}

impl ChartAdapter for RadarChart {
    fn kind(&self) -> ChartKind {
        ChartKind::Radar
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let model = ctx.model;
        if model.is_empty() || model.dimension_keys().is_empty() {
            return None;
        }
        let source = self.source.borrow();
        let (preset, ids): (Option<String>, Vec<String>) = match &*source {
            RadarSource::Preset(name) => (
                Some(name.clone()),
                ctx.config
                    .radar_preset(name)
                    .map(|p| p.policies.clone())
                    .unwrap_or_default(),
            ),
            RadarSource::Custom(ids) => (None, ids.clone()),
        };

        let series = ids
            .iter()
            .filter(|id| model.index_of(id).is_some())
            .take(MAX_SERIES)
            .enumerate()
            .map(|(slot, id)| policy_series(model, id, slot))
            .collect();

        Some(View::Radar(RadarView {
            keys: model.dimension_keys().iter().map(|k| k.to_string()).collect(),
            labels: model
                .dimension_keys()
                .into_iter()
                .map(|k| model.dimension_label(k).to_string())
                .collect(),
            max: ctx.config.radar.max,
            preset,
            series,
            cluster_averages: cluster_average_series(model),
            global_average: global_average_series(model),
        }))
    }

    fn on_event(&self, event: &ChartEvent, ctx: &RenderContext<'_>) -> Reaction {
        match event {
            ChartEvent::Preset { name } if ctx.config.radar_preset(name).is_some() => {
                *self.source.borrow_mut() = RadarSource::Preset(name.clone());
                Reaction::Redraw
            }
            ChartEvent::Choose { ids } if (1..=MAX_SERIES).contains(&ids.len()) => {
                *self.source.borrow_mut() = RadarSource::Custom(ids.clone());
                Reaction::Redraw
            }
            _ => Reaction::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::testing::render_with;
    use crate::config::AtlasConfig;
    use crate::fixtures;
    use crate::state::Snapshot;

    fn radar(chart: &RadarChart, model: &SimilarityModel) -> RadarView {
        match render_with(chart, model, &Snapshot::default()) {
            Some(View::Radar(v)) => v,
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn custom_choice_drives_series() {
        let model = fixtures::sample_model();
        let chart = RadarChart::default();
        // default preset ids are not in the sample corpus
        assert!(radar(&chart, &model).series.is_empty());

        let snapshot = Snapshot::default();
        let config = AtlasConfig::default();
        let ctx = RenderContext {
            model: &model,
            snapshot: &snapshot,
            config: &config,
        };
        let choose = ChartEvent::Choose {
            ids: vec!["p1".into(), "p4".into(), "p6".into()],
        };
        assert_eq!(chart.on_event(&choose, &ctx), Reaction::Redraw);
        let view = radar(&chart, &model);
        assert_eq!(view.series.len(), 3);
        assert_eq!(view.series[2].color, "#FFD54F");
        assert_eq!(view.series[0].values.len(), 7);
        assert_eq!(view.max, 0.8);
        assert_eq!(view.preset, None);

        let single = ChartEvent::Choose { ids: vec!["p5".into()] };
        assert_eq!(chart.on_event(&single, &ctx), Reaction::Redraw);
        let view = radar(&chart, &model);
        assert_eq!(view.series.len(), 1);
        assert_eq!(view.series[0].id.as_deref(), Some("p5"));

        let none = ChartEvent::Choose { ids: vec![] };
        assert_eq!(chart.on_event(&none, &ctx), Reaction::Ignore);
        let four = ChartEvent::Choose {
            ids: vec!["p1".into(), "p2".into(), "p3".into(), "p4".into()],
        };
        assert_eq!(chart.on_event(&four, &ctx), Reaction::Ignore);
        let unknown = ChartEvent::Preset { name: "nope".into() };
        assert_eq!(chart.on_event(&unknown, &ctx), Reaction::Ignore);
    }

    #[test]
    fn averages_skip_missing_scores() {
        let model = fixtures::sample_model();
        let view = radar(&RadarChart::default(), &model);
        assert_eq!(view.cluster_averages.len(), 2);
        assert!(view.cluster_averages[0].label.starts_with("Cluster 1"));
        // p6 has a zero teacher-training score that must not drag the mean
        let d = 2;
        let present = vec!["p4".to_string(), "p5".to_string()];
        let expected = model.dimension_average("formacion_docente", Some(&present));
        assert!((view.cluster_averages[1].values[d] - expected).abs() < 1e-12);
        assert!(view.global_average.dashed);
    }
}
