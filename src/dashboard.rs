//! The dashboard: one coordinator, one scheduler, every chart wired in.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use tracing::{info, warn};

use crate::charts::{
    ChartAdapter, ChartEvent, ChordChart, DendrogramChart, DetailPanel, ExplainerChart, Finding, FindingChart,
    Heatmap, Histogram, NetworkGraph, PairExtremes, ParallelCoordinates, ProfileCard, ProjectionScatter,
    RadarChart, SankeyChart, Sidebar, SurfaceProvider,
};
use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::scheduler::{RenderScheduler, Trigger};
use crate::similarity::SimilarityModel;
use crate::state::{Coordinator, Filters, Subscription};

/// Containers rendered when scrolled into view.
pub const SCROLL_CONTAINERS: [&str; 11] = [
    "sidebar",
    "heatmap",
    "histogram",
    "pair_extremes",
    "finding_cluster",
    "finding_teacher",
    "finding_outlier",
    "radar",
    "projection",
    "detail",
    "profile",
];

/// Containers rendered when their tab is opened. Each sits in a tab of the
/// same name.
pub const TAB_CONTAINERS: [&str; 6] = ["network", "chord", "dendrogram", "sankey", "parallel", "dimensions"];

pub fn containers() -> impl Iterator<Item = &'static str> {
    SCROLL_CONTAINERS.into_iter().chain(TAB_CONTAINERS)
}

fn adapter_for(name: &str, config: &AtlasConfig) -> Option<Box<dyn ChartAdapter>> {
    let adapter: Box<dyn ChartAdapter> = match name {
        "sidebar" => Box::new(Sidebar),
        "heatmap" => Box::new(Heatmap),
        "histogram" => Box::new(Histogram),
        "pair_extremes" => Box::new(PairExtremes),
        "finding_cluster" => Box::new(FindingChart::new(Finding::ClusterCohesion)),
        "finding_teacher" => Box::new(FindingChart::new(Finding::DimensionRanking)),
        "finding_outlier" => Box::new(FindingChart::new(Finding::Outlier)),
        "radar" => match config.radar.presets.first() {
            Some(preset) => Box::new(RadarChart::with_preset(&preset.name)),
            None => Box::new(RadarChart::default()),
        },
        "projection" => Box::new(ProjectionScatter),
        "detail" => Box::new(DetailPanel),
        "profile" => Box::new(ProfileCard),
        "network" => Box::new(NetworkGraph),
        "chord" => Box::new(ChordChart::default()),
        "dendrogram" => Box::new(DendrogramChart),
        "sankey" => Box::new(SankeyChart),
        "parallel" => Box::new(ParallelCoordinates),
        "dimensions" => Box::new(ExplainerChart),
        _ => return None,
    };
    Some(adapter)
}

pub struct Dashboard<P: SurfaceProvider + 'static> {
    model: Rc<SimilarityModel>,
    coordinator: Coordinator,
    scheduler: Rc<RefCell<RenderScheduler<P>>>,
    subscription: Option<Subscription>,
}

impl<P: SurfaceProvider + 'static> Dashboard<P> {
    /// Wire the default layout: every chart registered under its container
    /// name, scroll charts on the configured visibility threshold, the rest
    /// on their tab.
    pub fn new(model: SimilarityModel, config: AtlasConfig, provider: P) -> Result<Self, AtlasError> {
        config.validate()?;
        let model = Rc::new(model);
        let config = Rc::new(config);

        let coordinator = Coordinator::with_filters(Filters {
            threshold: config.threshold.clamp(0.0, 1.0),
            ..Filters::default()
        });
        let mut scheduler = RenderScheduler::new(model.clone(), config.clone(), provider);
        scheduler.set_snapshot(coordinator.snapshot());

        for name in SCROLL_CONTAINERS {
            let trigger = Trigger::Visible {
                threshold: config.visibility_threshold,
            };
            if let Some(adapter) = adapter_for(name, &config) {
                scheduler.register(name, name, trigger, adapter)?;
            }
        }
        for name in TAB_CONTAINERS {
            if let Some(adapter) = adapter_for(name, &config) {
                scheduler.register(name, name, Trigger::Tab(name.to_string()), adapter)?;
            }
        }

        let scheduler = Rc::new(RefCell::new(scheduler));
        let weak = Rc::downgrade(&scheduler);
        let subscription = coordinator.subscribe(move |snapshot, change| {
            let Some(scheduler) = weak.upgrade() else {
                return;
            };
            match scheduler.try_borrow_mut() {
                Ok(mut s) => {
                    s.on_state_change(snapshot, change);
                }
                Err(_) => warn!("state change dropped - scheduler busy, version={}", snapshot.version),
            };
        });

        info!(
            "Dashboard ready - dataset={}, policies={}, charts={}",
            model.id(),
            model.len(),
            SCROLL_CONTAINERS.len() + TAB_CONTAINERS.len()
        );
        Ok(Dashboard {
            model,
            coordinator,
            scheduler,
            subscription: Some(subscription),
        })
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn model(&self) -> &SimilarityModel {
        &self.model
    }

    pub fn scheduler(&self) -> Ref<'_, RenderScheduler<P>> {
        self.scheduler.borrow()
    }

    pub fn provider(&self) -> Ref<'_, P> {
        Ref::map(self.scheduler.borrow(), |s| s.provider())
    }

    /// Route a user interaction to `chart`. Any resulting mutation goes to
    /// the coordinator once the scheduler is released, so the redraws it
    /// triggers can borrow the scheduler again.
    pub fn interact(&self, chart: &str, event: ChartEvent) -> Result<(), AtlasError> {
        let intent = self.scheduler.borrow_mut().handle_event(chart, &event)?;
        if let Some(intent) = intent {
            self.coordinator.apply(intent);
        }
        Ok(())
    }

    pub fn visible(&self, container: &str, fraction: f64) -> usize {
        self.scheduler.borrow_mut().on_visibility(container, fraction)
    }

    pub fn activate_tab(&self, tab: &str) -> usize {
        self.scheduler.borrow_mut().on_tab_activated(tab)
    }

    /// Bring every chart on screen: all pending containers fully visible and
    /// every tab opened.
    pub fn show_all(&self) -> usize {
        let (containers, tabs): (Vec<String>, Vec<String>) = {
            let s = self.scheduler.borrow();
            (
                s.pending_containers().into_iter().map(str::to_string).collect(),
                s.pending_tabs().into_iter().map(str::to_string).collect(),
            )
        };
        let drawn = containers.iter().map(|c| self.visible(c, 1.0)).sum::<usize>()
            + tabs.iter().map(|t| self.activate_tab(t)).sum::<usize>();
        info!("All charts shown - drawn={}", drawn);
        drawn
    }

    /// Stop listening to the coordinator and drop every registration.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.scheduler.borrow_mut().teardown();
    }
}

impl<P: SurfaceProvider + 'static> Drop for Dashboard<P> {
    fn drop(&mut self) {
        if self.subscription.is_some() {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::View;
    use crate::export::JsonSurfaces;
    use crate::fixtures;
    use crate::state::{Facet, FilterUpdate};

    fn dashboard() -> Dashboard<JsonSurfaces> {
        Dashboard::new(
            fixtures::sample_model(),
            AtlasConfig::default(),
            JsonSurfaces::new(containers()),
        )
        .unwrap()
    }

    #[test]
    fn charts_render_lazily() {
        let d = dashboard();
        assert_eq!(d.provider().rendered().count(), 0);
        assert_eq!(d.visible("heatmap", 0.1), 0);
        assert_eq!(d.visible("heatmap", 0.2), 1);
        assert_eq!(d.activate_tab("network"), 1);
        assert_eq!(d.provider().draws("heatmap"), 1);
        assert!(d.provider().view("chord").is_none());
    }

    #[test]
    fn heatmap_click_updates_dependent_charts() {
        let d = dashboard();
        d.visible("heatmap", 1.0);
        d.visible("detail", 1.0);
        d.visible("histogram", 1.0);
        assert!(d.provider().view("detail").is_none());

        d.interact("heatmap", ChartEvent::CellClick { row: 2, col: 3 }).unwrap();
        assert_eq!(d.coordinator().snapshot().selection, vec!["p3", "p4"]);
        assert_eq!(d.provider().draws("heatmap"), 2);
        assert_eq!(d.provider().draws("histogram"), 1);
        match d.provider().view("detail") {
            Some(View::Detail(v)) => assert_eq!(v.b.id, "p4"),
            other => panic!("unexpected view {:?}", other),
        };
    }

    #[test]
    fn sidebar_and_network_follow_filters() {
        let d = dashboard();
        d.visible("sidebar", 1.0);
        d.activate_tab("network");
        d.coordinator()
            .set_filter(FilterUpdate::new().region(Facet::parse("asia_pacifico")).threshold(0.9));

        match d.provider().view("sidebar") {
            Some(View::Sidebar(v)) => assert_eq!(v.visible_count, 2),
            other => panic!("unexpected view {:?}", other),
        }
        match d.provider().view("network") {
            Some(View::Network(v)) => assert_eq!(v.edges.len(), 1),
            other => panic!("unexpected view {:?}", other),
        }
        d.interact("sidebar", ChartEvent::NodeClick { id: "p5".into() }).unwrap();
        assert_eq!(d.coordinator().snapshot().selection, vec!["p5"]);
    }

    #[test]
    fn show_all_and_teardown() {
        let mut d = dashboard();
        // nothing selected, so detail and profile draw nothing but still count;
        // the outlier finding targets a policy the sample lacks
        assert_eq!(d.show_all(), 17);
        assert_eq!(d.provider().rendered().count(), 14);
        assert!(d.provider().view("finding_outlier").is_none());
        assert!(matches!(d.provider().view("dimensions"), Some(View::Explainer(_))));
        assert_eq!(d.show_all(), 0);
        assert_eq!(d.interact("radar", ChartEvent::Preset { name: "asia-tech".into() }), Ok(()));

        d.teardown();
        assert_eq!(d.coordinator().listener_count(), 0);
        assert_eq!(
            d.interact("radar", ChartEvent::Preset { name: "x".into() }),
            Err(AtlasError::UnknownChart("radar".into()))
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = AtlasConfig::default();
        config.chunk.overlap = config.chunk.window;
        assert!(Dashboard::new(fixtures::sample_model(), config, JsonSurfaces::default()).is_err());

        let mut config = AtlasConfig::default();
        config.threshold = f64::NAN;
        assert!(Dashboard::new(fixtures::sample_model(), config, JsonSurfaces::default()).is_err());
    }

    #[test]
    fn profile_follows_sidebar_clicks() {
        let d = dashboard();
        d.visible("profile", 1.0);
        d.interact("sidebar", ChartEvent::NodeClick { id: "p2".into() }).unwrap();
        match d.provider().view("profile") {
            Some(View::Profile(v)) => {
                assert_eq!(v.doc.id, "p2");
                assert_eq!(v.similarities.len(), 5);
                assert_eq!(v.similarities[0].id, "p1");
            }
            other => panic!("unexpected view {:?}", other),
        };
    }
}
