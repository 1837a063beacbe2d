use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::AtlasError;

/// Dashboard tuning knobs. Every field has a default so a partial TOML file
/// (or none at all) is valid.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AtlasConfig {
    /// Initial similarity threshold for graph-style views.
    pub threshold: f64,
    /// Fraction of a container that must be on screen before it renders.
    pub visibility_threshold: f64,
    pub chunk: ChunkConfig,
    pub dendrogram: DendrogramConfig,
    pub scores: ScoreConfig,
    pub heatmap: HeatmapConfig,
    pub histogram: HistogramConfig,
    pub radar: RadarConfig,
    pub network: NetworkConfig,
    pub findings: FindingsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkConfig {
    pub window: usize,
    pub overlap: usize,
    pub max_display: usize,
    pub preview_chars: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DendrogramConfig {
    /// Number of clusters the cut line should separate.
    pub cluster_count: usize,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScoreConfig {
    /// Treat a 0 dimension score as "no score" and leave it out of averages.
    pub zero_is_missing: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HeatmapConfig {
    pub domain_min: f64,
    pub domain_max: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HistogramConfig {
    pub bins: usize,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RadarConfig {
    pub max: f64,
    pub presets: Vec<RadarPreset>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RadarPreset {
    pub name: String,
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub width: f64,
    pub height: f64,
    /// Edge rest length is `(1 - similarity) * distance_scale`.
    pub distance_scale: f64,
    pub charge: f64,
    pub collision_radius: f64,
    pub iterations: usize,
}

/// Subjects of the findings charts.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FindingsConfig {
    pub cluster: String,
    pub dimension: String,
    pub outlier: String,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            threshold: 0.70,
            visibility_threshold: 0.15,
            chunk: ChunkConfig::default(),
            dendrogram: DendrogramConfig::default(),
            scores: ScoreConfig::default(),
            heatmap: HeatmapConfig::default(),
            histogram: HistogramConfig::default(),
            radar: RadarConfig::default(),
            network: NetworkConfig::default(),
            findings: FindingsConfig::default(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window: 800,
            overlap: 200,
            max_display: 150,
            preview_chars: 300,
        }
    }
}

impl Default for DendrogramConfig {
    fn default() -> Self {
        Self {
            cluster_count: 3,
            width: 600.0,
            height: 500.0,
        }
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self { zero_is_missing: true }
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            domain_min: 0.4,
            domain_max: 1.0,
        }
    }
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins: 10,
            min: 0.4,
            max: 1.0,
        }
    }
}

impl Default for RadarConfig {
    fn default() -> Self {
        let preset = |name: &str, ids: &[&str]| RadarPreset {
            name: name.to_string(),
            policies: ids.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            max: 0.8,
            presets: vec![
                preset(
                    "iberoamerica",
                    &["espana_enia_2020", "brasil_ebia_2021", "colombia_conpes_3975_2019"],
                ),
                preset(
                    "asia-tech",
                    &["japon_ai_strategy_2019", "corea_ai_strategy_2019", "singapur_nais_2019"],
                ),
                preset(
                    "edu-vs-reg",
                    &["unesco_genai_guidance_2023", "eu_ai_act_2024", "india_nep_2020"],
                ),
            ],
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 450.0,
            distance_scale: 250.0,
            charge: -180.0,
            collision_radius: 25.0,
            iterations: 300,
        }
    }
}

impl Default for FindingsConfig {
    fn default() -> Self {
        Self {
            cluster: "1".to_string(),
            dimension: "formacion_docente".to_string(),
            outlier: "eu_ai_act_2024".to_string(),
        }
    }
}

impl AtlasConfig {
    pub fn validate(&self) -> Result<(), AtlasError> {
        if self.chunk.window == 0 {
            return Err(AtlasError::Config("chunk.window must be > 0".into()));
        }
        if self.chunk.overlap == 0 {
            return Err(AtlasError::Config("chunk.overlap must be > 0".into()));
        }
        if self.chunk.overlap >= self.chunk.window {
            return Err(AtlasError::Config(format!(
                "chunk.overlap must be below {} (got {})",
                self.chunk.window, self.chunk.overlap
            )));
        }
        if self.dendrogram.cluster_count == 0 {
            return Err(AtlasError::Config("dendrogram.cluster_count must be > 0".into()));
        }
        if self.histogram.bins == 0 || self.histogram.max <= self.histogram.min {
            return Err(AtlasError::Config("histogram needs bins > 0 and max > min".into()));
        }
        if self.heatmap.domain_max <= self.heatmap.domain_min {
            return Err(AtlasError::Config("heatmap domain is empty".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(AtlasError::Config(format!(
                "threshold must be in [0, 1] (got {})",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(AtlasError::Config("visibility_threshold must be in [0, 1]".into()));
        }
        Ok(())
    }

    pub fn radar_preset(&self, name: &str) -> Option<&RadarPreset> {
        self.radar.presets.iter().find(|p| p.name == name)
    }
}

/// Load and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<AtlasConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<AtlasConfig> {
    let cfg: AtlasConfig = toml::from_str(content).context("Failed to parse TOML")?;
    cfg.validate()?;
    Ok(cfg)
}
