use anyhow::Result;
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::AtlasConfig;
use crate::dashboard::{containers, Dashboard};
use crate::export::{write_views, ExportIndex, JsonSurfaces};
use crate::fetch::{load_chunk_pairs, load_dataset, Source};
use crate::state::{Facet, FilterUpdate};
use crate::text::{compare, TextStore};

/// Everything one headless run needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data: Source,
    pub chunks: Option<Source>,
    pub text_base: Option<Source>,
    pub config: AtlasConfig,
    pub output_dir: PathBuf,
    /// Policies toggled in order.
    pub select: Vec<String>,
    pub pair: Option<(String, String)>,
    pub region: Option<String>,
    pub dimension: Option<String>,
    pub threshold: Option<f64>,
    /// Containers scrolled into view; the overview section when empty.
    pub visible: Vec<String>,
    pub tabs: Vec<String>,
    pub all: bool,
}

/// Containers on screen when nothing else is requested.
pub const OVERVIEW: [&str; 4] = ["sidebar", "heatmap", "histogram", "pair_extremes"];

impl RunOptions {
    pub fn new(data: Source, output_dir: impl Into<PathBuf>) -> Self {
        RunOptions {
            data,
            chunks: None,
            text_base: None,
            config: AtlasConfig::default(),
            output_dir: output_dir.into(),
            select: Vec::new(),
            pair: None,
            region: None,
            dimension: None,
            threshold: None,
            visible: Vec::new(),
            tabs: Vec::new(),
            all: false,
        }
    }

    fn filter_update(&self) -> FilterUpdate {
        let mut update = FilterUpdate::new();
        if let Some(region) = &self.region {
            update = update.region(Facet::parse(region));
        }
        if let Some(dimension) = &self.dimension {
            update = update.dimension(Facet::parse(dimension));
        }
        if let Some(threshold) = self.threshold {
            update = update.threshold(threshold);
        }
        update
    }
}

/// Load, wire, interact, render, export.
pub async fn run_export(opts: RunOptions) -> Result<ExportIndex> {
    let pipeline_start = std::time::Instant::now();
    info!(
        "Export started - data={}, output_dir={}",
        opts.data,
        opts.output_dir.display()
    );
    let client = Client::builder().build()?;

    // 1) documents; a missing dataset degrades to the placeholder
    let zero_is_missing = opts.config.scores.zero_is_missing;
    let model = load_dataset(&client, &opts.data, zero_is_missing).await;
    let chunk_pairs = match &opts.chunks {
        Some(source) => load_chunk_pairs(&client, source).await,
        None => None,
    };

    // 2) wire every chart against JSON surfaces
    let chunk_cfg = opts.config.chunk.clone();
    let mut dashboard = Dashboard::new(model, opts.config.clone(), JsonSurfaces::new(containers()))?;

    // 3) scroll the requested containers into view with the initial state
    if opts.all {
        dashboard.show_all();
    } else {
        let visible: Vec<&str> = if opts.visible.is_empty() {
            OVERVIEW.to_vec()
        } else {
            opts.visible.iter().map(String::as_str).collect()
        };
        for container in visible {
            if dashboard.visible(container, 1.0) == 0 {
                debug!("nothing to draw for container={}", container);
            }
        }
    }

    // 4) state changes, redrawing whatever is already on screen
    let update = opts.filter_update();
    if !update.is_empty() {
        dashboard.coordinator().set_filter(update);
    }
    for id in &opts.select {
        if dashboard.model().index_of(id).is_none() {
            warn!("Unknown policy selected - id={}", id);
        }
        dashboard.coordinator().toggle_select(id.as_str());
    }
    if let Some((a, b)) = &opts.pair {
        dashboard.coordinator().select_pair(a.as_str(), b.as_str());
    }

    // 5) tabs render against the final state
    for tab in &opts.tabs {
        if dashboard.activate_tab(tab) == 0 {
            warn!("Tab has no pending charts - tab={}", tab);
        }
    }

    // 6) text comparison for a selected pair
    let snapshot = dashboard.coordinator().snapshot();
    let comparison = match (snapshot.pair(), &opts.text_base) {
        (Some((a, b)), Some(base)) => {
            let store = TextStore::new(client.clone(), base.clone());
            Some(compare(&store, dashboard.model(), chunk_pairs.as_ref(), a, b, &chunk_cfg).await)
        }
        (Some(_), None) => {
            debug!("Text comparison skipped - no text base");
            None
        }
        _ => None,
    };

    // 7) files
    let index = {
        let surfaces = dashboard.provider();
        write_views(
            &opts.output_dir,
            &surfaces,
            dashboard.model(),
            &snapshot,
            comparison.as_ref(),
        )?
    };
    dashboard.teardown();

    info!(
        "Export completed - duration={:.2}s, files={}",
        pipeline_start.elapsed().as_secs_f32(),
        index.files.len()
    );
    Ok(index)
}
