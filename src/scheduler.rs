//! Lazy render scheduler.
//!
//! Charts are registered under a logical name with the container they draw
//! into and the trigger that first brings them on screen. Each registration
//! renders exactly once for its first qualifying trigger; afterwards it is
//! only redrawn when a state change it depends on arrives.

use itertools::Itertools;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info};

use crate::charts::{ChartAdapter, ChartEvent, Reaction, RenderContext, RenderOutcome, SurfaceProvider};
use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::similarity::SimilarityModel;
use crate::state::{Intent, Snapshot, StateChange};

/// What first brings a chart on screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Container becomes at least `threshold` visible.
    Visible { threshold: f64 },
    /// Named tab is activated.
    Tab(String),
}

/// Host-side viewport observation.
pub trait VisibilityObserver {
    fn observe(&mut self, container: &str, threshold: f64);
    fn unobserve(&mut self, container: &str);
}

/// Observer that only remembers what is being watched.
#[derive(Debug, Default)]
pub struct TrackingObserver {
    observed: BTreeMap<String, f64>,
}

impl TrackingObserver {
    pub fn is_observing(&self, container: &str) -> bool {
        self.observed.contains_key(container)
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }
}

impl VisibilityObserver for TrackingObserver {
    fn observe(&mut self, container: &str, threshold: f64) {
        self.observed.insert(container.to_string(), threshold);
    }

    fn unobserve(&mut self, container: &str) {
        self.observed.remove(container);
    }
}

struct Registration {
    name: String,
    container: String,
    trigger: Trigger,
    adapter: Box<dyn ChartAdapter>,
    rendered: bool,
    last: Option<RenderOutcome>,
}

impl Registration {
    fn observed(&self) -> bool {
        !self.rendered && matches!(self.trigger, Trigger::Visible { .. })
    }
}

fn draw<P: SurfaceProvider>(reg: &mut Registration, ctx: &RenderContext<'_>, provider: &mut P) -> RenderOutcome {
    let outcome = reg.adapter.render(ctx, provider.surface(&reg.container));
    debug!(
        "chart drawn - name={} container={} outcome={:?}",
        reg.name, reg.container, outcome
    );
    reg.rendered = true;
    reg.last = Some(outcome);
    outcome
}

pub struct RenderScheduler<P: SurfaceProvider, O: VisibilityObserver = TrackingObserver> {
    model: Rc<SimilarityModel>,
    config: Rc<AtlasConfig>,
    snapshot: Snapshot,
    provider: P,
    observer: O,
    registrations: Vec<Registration>,
}

impl<P: SurfaceProvider> RenderScheduler<P, TrackingObserver> {
    pub fn new(model: Rc<SimilarityModel>, config: Rc<AtlasConfig>, provider: P) -> Self {
        Self::with_observer(model, config, provider, TrackingObserver::default())
    }
}

impl<P: SurfaceProvider, O: VisibilityObserver> RenderScheduler<P, O> {
    pub fn with_observer(model: Rc<SimilarityModel>, config: Rc<AtlasConfig>, provider: P, observer: O) -> Self {
        RenderScheduler {
            model,
            config,
            snapshot: Snapshot::default(),
            provider,
            observer,
            registrations: Vec::new(),
        }
    }

    /// Seed the snapshot charts render against before the first state change.
    pub fn set_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        container: impl Into<String>,
        trigger: Trigger,
        adapter: Box<dyn ChartAdapter>,
    ) -> Result<(), AtlasError> {
        let name = name.into();
        if self.registrations.iter().any(|r| r.name == name) {
            return Err(AtlasError::DuplicateRegistration(name));
        }
        let container = container.into();
        if let Trigger::Visible { threshold } = trigger {
            self.observer.observe(&container, threshold);
        }
        debug!(
            "chart registered - name={} container={} kind={} trigger={:?}",
            name,
            container,
            adapter.kind(),
            trigger
        );
        self.registrations.push(Registration {
            name,
            container,
            trigger,
            adapter,
            rendered: false,
            last: None,
        });
        Ok(())
    }

    /// Visibility callback for `container`. Renders every pending chart in it
    /// whose threshold is met; observation ends with the last one. Returns
    /// the number drawn.
    pub fn on_visibility(&mut self, container: &str, fraction: f64) -> usize {
        let ctx = RenderContext {
            model: &self.model,
            snapshot: &self.snapshot,
            config: &self.config,
        };
        let mut drawn = 0;
        for reg in self.registrations.iter_mut() {
            let Trigger::Visible { threshold } = reg.trigger else {
                continue;
            };
            if reg.rendered || reg.container != container || fraction < threshold {
                continue;
            }
            draw(reg, &ctx, &mut self.provider);
            drawn += 1;
        }
        if drawn > 0 {
            self.release(container);
        }
        drawn
    }

    /// Stop observing `container` once nothing in it waits for visibility.
    fn release(&mut self, container: &str) {
        let waiting = self
            .registrations
            .iter()
            .any(|r| r.observed() && r.container == container);
        if !waiting {
            self.observer.unobserve(container);
        }
    }

    /// Render every pending chart bound to `tab`. Returns the number drawn.
    pub fn on_tab_activated(&mut self, tab: &str) -> usize {
        let ctx = RenderContext {
            model: &self.model,
            snapshot: &self.snapshot,
            config: &self.config,
        };
        let mut drawn = 0;
        for reg in self.registrations.iter_mut() {
            let bound = matches!(&reg.trigger, Trigger::Tab(t) if t == tab);
            if bound && !reg.rendered {
                draw(reg, &ctx, &mut self.provider);
                drawn += 1;
            }
        }
        if drawn > 0 {
            info!("tab activated - tab={} charts={}", tab, drawn);
        }
        drawn
    }

    /// Record the new snapshot and redraw rendered charts that depend on
    /// `change`. Charts not yet on screen pick the snapshot up when they
    /// first render.
    pub fn on_state_change(&mut self, snapshot: &Snapshot, change: StateChange) -> usize {
        self.snapshot = snapshot.clone();
        if !change.any() {
            return 0;
        }
        let ctx = RenderContext {
            model: &self.model,
            snapshot: &self.snapshot,
            config: &self.config,
        };
        let mut drawn = 0;
        for reg in self.registrations.iter_mut() {
            if reg.rendered && reg.adapter.depends_on(&change) {
                draw(reg, &ctx, &mut self.provider);
                drawn += 1;
            }
        }
        debug!("state change applied - version={} redrawn={}", snapshot.version, drawn);
        drawn
    }

    /// Route an interaction to the chart registered as `name`. Local redraws
    /// happen here; state mutations are handed back to the caller.
    pub fn handle_event(&mut self, name: &str, event: &ChartEvent) -> Result<Option<Intent>, AtlasError> {
        let reg = self
            .registrations
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| AtlasError::UnknownChart(name.to_string()))?;
        let ctx = RenderContext {
            model: &self.model,
            snapshot: &self.snapshot,
            config: &self.config,
        };
        match reg.adapter.on_event(event, &ctx) {
            Reaction::Ignore => Ok(None),
            Reaction::Redraw => {
                if reg.rendered {
                    draw(reg, &ctx, &mut self.provider);
                }
                Ok(None)
            }
            Reaction::Apply(intent) => {
                debug!("chart event - name={} intent={:?}", name, intent);
                Ok(Some(intent))
            }
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(pos) = self.registrations.iter().position(|r| r.name == name) else {
            return false;
        };
        let reg = self.registrations.remove(pos);
        if matches!(reg.trigger, Trigger::Visible { .. }) {
            self.release(&reg.container);
        }
        true
    }

    /// Drop every registration and detach all observation.
    pub fn teardown(&mut self) -> usize {
        let count = self.registrations.len();
        for reg in self.registrations.drain(..) {
            if matches!(reg.trigger, Trigger::Visible { .. }) {
                self.observer.unobserve(&reg.container);
            }
        }
        info!("scheduler torn down - charts={}", count);
        count
    }

    pub fn is_rendered(&self, name: &str) -> Option<bool> {
        self.registrations.iter().find(|r| r.name == name).map(|r| r.rendered)
    }

    pub fn last_outcome(&self, name: &str) -> Option<RenderOutcome> {
        self.registrations.iter().find(|r| r.name == name).and_then(|r| r.last)
    }

    /// Containers still waiting for their first visibility callback.
    pub fn pending_containers(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .filter(|r| r.observed())
            .map(|r| r.container.as_str())
            .unique()
            .collect()
    }

    /// Tabs with at least one chart not yet rendered.
    pub fn pending_tabs(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .filter_map(|r| match &r.trigger {
                Trigger::Tab(t) if !r.rendered => Some(t.as_str()),
                _ => None,
            })
            .unique()
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.name.as_str())
    }

    pub fn model(&self) -> &SimilarityModel {
        &self.model
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}
