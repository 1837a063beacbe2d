//! Chart adapters.
//!
//! An adapter turns the similarity model plus the current state snapshot
//! into a [`View`]: a plain, serializable description of what to draw. The
//! drawing itself belongs to an opaque [`Surface`]. Interactions come back
//! in as [`ChartEvent`]s and leave as [`Reaction`]s; adapters never mutate
//! the shared state directly.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::config::AtlasConfig;
use crate::similarity::SimilarityModel;
use crate::state::{Intent, Snapshot, StateChange};

pub mod chord;
pub mod dendrogram;
pub mod detail;
pub mod findings;
pub mod heatmap;
pub mod histogram;
pub mod network;
pub mod pairs;
pub mod parallel;
pub mod projection;
pub mod radar;
pub mod sankey;
pub mod sidebar;

pub use chord::ChordChart;
pub use dendrogram::DendrogramChart;
pub use detail::{DetailPanel, ProfileCard};
pub use findings::{ExplainerChart, Finding, FindingChart};
pub use heatmap::Heatmap;
pub use histogram::Histogram;
pub use network::NetworkGraph;
pub use pairs::PairExtremes;
pub use parallel::ParallelCoordinates;
pub use projection::ProjectionScatter;
pub use radar::RadarChart;
pub use sankey::SankeyChart;
pub use sidebar::Sidebar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Heatmap,
    Radar,
    Histogram,
    Network,
    Chord,
    Dendrogram,
    Projection,
    Parallel,
    Sankey,
    PairExtremes,
    Sidebar,
    Detail,
    Profile,
    Finding,
    Explainer,
}

impl ChartKind {
    pub const ALL: [ChartKind; 15] = [
        ChartKind::Heatmap,
        ChartKind::Radar,
        ChartKind::Histogram,
        ChartKind::Network,
        ChartKind::Chord,
        ChartKind::Dendrogram,
        ChartKind::Projection,
        ChartKind::Parallel,
        ChartKind::Sankey,
        ChartKind::PairExtremes,
        ChartKind::Sidebar,
        ChartKind::Detail,
        ChartKind::Profile,
        ChartKind::Finding,
        ChartKind::Explainer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Heatmap => "heatmap",
            ChartKind::Radar => "radar",
            ChartKind::Histogram => "histogram",
            ChartKind::Network => "network",
            ChartKind::Chord => "chord",
            ChartKind::Dendrogram => "dendrogram",
            ChartKind::Projection => "projection",
            ChartKind::Parallel => "parallel",
            ChartKind::Sankey => "sankey",
            ChartKind::PairExtremes => "pair_extremes",
            ChartKind::Sidebar => "sidebar",
            ChartKind::Detail => "detail",
            ChartKind::Profile => "profile",
            ChartKind::Finding => "finding",
            ChartKind::Explainer => "explainer",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    Heatmap(heatmap::HeatmapView),
    Radar(radar::RadarView),
    Histogram(histogram::HistogramView),
    Network(network::NetworkView),
    Chord(chord::ChordView),
    Dendrogram(dendrogram::DendrogramView),
    Projection(projection::ProjectionView),
    Parallel(parallel::ParallelView),
    Sankey(sankey::SankeyView),
    PairExtremes(pairs::PairExtremesView),
    Sidebar(sidebar::SidebarView),
    Detail(detail::DetailView),
    Profile(detail::ProfileView),
    Finding(findings::FindingView),
    Explainer(findings::ExplainerView),
}

impl View {
    pub fn kind(&self) -> ChartKind {
        match self {
            View::Heatmap(_) => ChartKind::Heatmap,
            View::Radar(_) => ChartKind::Radar,
            View::Histogram(_) => ChartKind::Histogram,
            View::Network(_) => ChartKind::Network,
            View::Chord(_) => ChartKind::Chord,
            View::Dendrogram(_) => ChartKind::Dendrogram,
            View::Projection(_) => ChartKind::Projection,
            View::Parallel(_) => ChartKind::Parallel,
            View::Sankey(_) => ChartKind::Sankey,
            View::PairExtremes(_) => ChartKind::PairExtremes,
            View::Sidebar(_) => ChartKind::Sidebar,
            View::Detail(_) => ChartKind::Detail,
            View::Profile(_) => ChartKind::Profile,
            View::Finding(_) => ChartKind::Finding,
            View::Explainer(_) => ChartKind::Explainer,
        }
    }
}

/// An opaque renderer bound to one container.
pub trait Surface {
    /// Whether this surface has a drawing backend for `kind`.
    fn supports(&self, kind: ChartKind) -> bool;
    fn draw(&mut self, view: View);
}

/// Resolves container ids to surfaces. A missing container is `None`.
pub trait SurfaceProvider {
    fn surface(&mut self, container: &str) -> Option<&mut dyn Surface>;
}

/// Everything an adapter may read while rendering.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub model: &'a SimilarityModel,
    pub snapshot: &'a Snapshot,
    pub config: &'a AtlasConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingSurface,
    UnsupportedSurface,
    EmptyData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderOutcome {
    Rendered,
    Skipped(SkipReason),
}

impl RenderOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered)
    }
}

/// User input routed to a chart, in the chart's own coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartEvent {
    CellClick { row: usize, col: usize },
    NodeClick { id: String },
    /// Chord arc under the pointer, `None` when the pointer leaves.
    Hover { index: Option<usize> },
    ArcClick { index: usize },
    RibbonClick { source: usize, target: usize },
    /// Projection point by policy index.
    PointClick { index: usize },
    Preset { name: String },
    Choose { ids: Vec<String> },
}

/// What the scheduler should do after an adapter handled an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    Ignore,
    /// Local view state changed; draw the chart again.
    Redraw,
    /// Forward a mutation to the coordinator.
    Apply(Intent),
}

pub trait ChartAdapter {
    fn kind(&self) -> ChartKind;

    /// Whether an already drawn chart must be redrawn after `change`.
    fn depends_on(&self, change: &StateChange) -> bool {
        let _ = change;
        false
    }

    /// Compute the view, or `None` when the required data is absent.
    fn build(&self, ctx: &RenderContext<'_>) -> Option<View>;

    fn render(&self, ctx: &RenderContext<'_>, surface: Option<&mut dyn Surface>) -> RenderOutcome {
        let kind = self.kind();
        let Some(surface) = surface else {
            debug!("render skipped - chart={} reason=missing_surface", kind);
            return RenderOutcome::Skipped(SkipReason::MissingSurface);
        };
        if !surface.supports(kind) {
            debug!("render skipped - chart={} reason=unsupported_surface", kind);
            return RenderOutcome::Skipped(SkipReason::UnsupportedSurface);
        }
        match self.build(ctx) {
            Some(view) => {
                surface.draw(view);
                RenderOutcome::Rendered
            }
            None => {
                debug!("render skipped - chart={} reason=empty_data", kind);
                RenderOutcome::Skipped(SkipReason::EmptyData)
            }
        }
    }

    fn on_event(&self, event: &ChartEvent, ctx: &RenderContext<'_>) -> Reaction {
        let _ = (event, ctx);
        Reaction::Ignore
    }
}

pub(crate) fn hex_rgb(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// First word of a dimension label, used on compact axes.
pub(crate) fn short_label(label: &str) -> &str {
    label.split(' ').next().unwrap_or(label)
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSurface;
    use super::*;
    use crate::fixtures;

    #[test]
    fn render_degrades_without_surface_or_data() {
        let model = fixtures::abc_model();
        let snapshot = Snapshot::default();
        let config = AtlasConfig::default();
        let ctx = RenderContext {
            model: &model,
            snapshot: &snapshot,
            config: &config,
        };
        let heatmap = Heatmap;
        assert_eq!(
            heatmap.render(&ctx, None),
            RenderOutcome::Skipped(SkipReason::MissingSurface)
        );

        let mut surface = RecordingSurface {
            unsupported: vec![ChartKind::Heatmap],
            ..Default::default()
        };
        assert_eq!(
            heatmap.render(&ctx, Some(&mut surface)),
            RenderOutcome::Skipped(SkipReason::UnsupportedSurface)
        );

        // no pair selected, so the detail panel has nothing to show
        let mut surface = RecordingSurface::default();
        assert_eq!(
            DetailPanel.render(&ctx, Some(&mut surface)),
            RenderOutcome::Skipped(SkipReason::EmptyData)
        );
        assert!(surface.views.is_empty());

        assert!(heatmap.render(&ctx, Some(&mut surface)).is_rendered());
        assert_eq!(surface.views[0].kind(), ChartKind::Heatmap);
    }

    #[test]
    fn views_serialize_with_kind_tag() {
        let model = fixtures::abc_model();
        let view = testing::render_with(&Histogram, &model, &Snapshot::default()).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["kind"], "histogram");
    }
}
