//! Selection and filter state, owned by a single coordinator.
//!
//! Every chart reads state through immutable [`Snapshot`]s delivered to
//! subscribers, and writes it back through the coordinator's mutation
//! methods. Mutations issued while listeners are being notified are queued
//! and applied once the current pass finishes, so interacting charts never
//! recurse into each other.

use serde::{Serialize, Serializer};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Maximum number of simultaneously selected policies.
pub const SELECTION_CAPACITY: usize = 2;
pub const DEFAULT_THRESHOLD: f64 = 0.70;

/// A filter that is either off ("all") or pinned to one value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Facet {
    #[default]
    All,
    Only(String),
}

impl Facet {
    /// `"all"` (any case) or an empty string means no filter.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            Facet::All
        } else {
            Facet::Only(raw.to_string())
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Facet::All => true,
            Facet::Only(v) => v == value,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Facet::All => "all",
            Facet::Only(v) => v,
        }
    }
}

impl Serialize for Facet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filters {
    pub region: Facet,
    pub dimension: Facet,
    pub threshold: f64,
}

impl Default for Filters {
    fn default() -> Self {
        Filters {
            region: Facet::All,
            dimension: Facet::All,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Partial filter update; unset fields keep their current value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterUpdate {
    pub region: Option<Facet>,
    pub dimension: Option<Facet>,
    pub threshold: Option<f64>,
}

impl FilterUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, region: Facet) -> Self {
        self.region = Some(region);
        self
    }

    pub fn dimension(mut self, dimension: Facet) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.dimension.is_none() && self.threshold.is_none()
    }
}

/// Immutable copy of the coordinator state at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub selection: Vec<String>,
    pub filters: Filters,
    /// Incremented by every mutation.
    pub version: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            selection: Vec::new(),
            filters: Filters::default(),
            version: 0,
        }
    }
}

impl Snapshot {
    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|s| s == id)
    }

    /// The selected pair, when exactly two policies are selected.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match self.selection.as_slice() {
            [a, b] => Some((a.as_str(), b.as_str())),
            _ => None,
        }
    }

    pub fn change_from(&self, previous: &Snapshot) -> StateChange {
        StateChange {
            selection: self.selection != previous.selection,
            region: self.filters.region != previous.filters.region,
            dimension: self.filters.dimension != previous.filters.dimension,
            threshold: self.filters.threshold != previous.filters.threshold,
        }
    }
}

/// Which parts of the state a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StateChange {
    pub selection: bool,
    pub region: bool,
    pub dimension: bool,
    pub threshold: bool,
}

impl StateChange {
    pub const ALL: StateChange = StateChange {
        selection: true,
        region: true,
        dimension: true,
        threshold: true,
    };

    pub fn any(&self) -> bool {
        self.selection || self.region || self.dimension || self.threshold
    }

    pub fn filters(&self) -> bool {
        self.region || self.dimension || self.threshold
    }
}

/// A state mutation, as requested by a chart interaction or a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Toggle(String),
    SelectPair(String, String),
    Clear,
    SetFilter(FilterUpdate),
}

type Listener = Box<dyn FnMut(&Snapshot, StateChange)>;

struct ListenerSlot {
    id: u64,
    active: Cell<bool>,
    callback: RefCell<Listener>,
}

struct Inner {
    state: RefCell<Snapshot>,
    listeners: RefCell<Vec<Rc<ListenerSlot>>>,
    queue: RefCell<VecDeque<Intent>>,
    flushing: Cell<bool>,
    next_listener: Cell<u64>,
}

/// Resets the flushing flag even if a listener panics.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Owner of the selection and filter state. Cloning yields another handle
/// to the same state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Rc<Inner>,
}

/// Non-owning handle, for listeners that need to write back without
/// keeping the coordinator alive.
#[derive(Clone)]
pub struct WeakCoordinator {
    inner: Weak<Inner>,
}

impl WeakCoordinator {
    pub fn upgrade(&self) -> Option<Coordinator> {
        self.inner.upgrade().map(|inner| Coordinator { inner })
    }
}

/// Returned by [`Coordinator::subscribe`].
pub struct Subscription {
    id: u64,
    coordinator: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Detach the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.coordinator.upgrade() {
            Some(inner) => Coordinator { inner }.unsubscribe(self.id),
            None => false,
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &*self.inner.state.borrow())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self::with_filters(Filters::default())
    }

    pub fn with_filters(filters: Filters) -> Self {
        Coordinator {
            inner: Rc::new(Inner {
                state: RefCell::new(Snapshot {
                    selection: Vec::new(),
                    filters,
                    version: 0,
                }),
                listeners: RefCell::new(Vec::new()),
                queue: RefCell::new(VecDeque::new()),
                flushing: Cell::new(false),
                next_listener: Cell::new(1),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakCoordinator {
        WeakCoordinator {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.borrow().clone()
    }

    pub fn toggle_select(&self, id: impl Into<String>) {
        self.apply(Intent::Toggle(id.into()));
    }

    pub fn select_pair(&self, id_a: impl Into<String>, id_b: impl Into<String>) {
        self.apply(Intent::SelectPair(id_a.into(), id_b.into()));
    }

    pub fn clear(&self) {
        self.apply(Intent::Clear);
    }

    pub fn set_filter(&self, update: FilterUpdate) {
        self.apply(Intent::SetFilter(update));
    }

    /// Register a listener, called after every mutation in registration order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&Snapshot, StateChange) + 'static,
    {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner.listeners.borrow_mut().push(Rc::new(ListenerSlot {
            id,
            active: Cell::new(true),
            callback: RefCell::new(Box::new(listener)),
        }));
        debug!("listener subscribed - id={}", id);
        Subscription {
            id,
            coordinator: Rc::downgrade(&self.inner),
        }
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        match listeners.iter().position(|l| l.id == id) {
            Some(pos) => {
                // a pass already in progress must skip it too
                listeners[pos].active.set(false);
                listeners.remove(pos);
                debug!("listener unsubscribed - id={}", id);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Apply a mutation now, or queue it if a notification pass is running.
    pub fn apply(&self, intent: Intent) {
        self.inner.queue.borrow_mut().push_back(intent);
        if self.inner.flushing.get() {
            debug!("mutation queued during notification");
            return;
        }
        self.inner.flushing.set(true);
        let _guard = FlushGuard(&self.inner.flushing);
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(intent) = next else { break };
            let (snapshot, change) = self.mutate(intent);
            self.notify(&snapshot, change);
        }
    }

    fn mutate(&self, intent: Intent) -> (Snapshot, StateChange) {
        let mut state = self.inner.state.borrow_mut();
        let previous = state.clone();
        match intent {
            Intent::Toggle(id) => {
                if let Some(pos) = state.selection.iter().position(|s| *s == id) {
                    state.selection.remove(pos);
                } else {
                    if state.selection.len() >= SELECTION_CAPACITY {
                        state.selection.remove(0);
                    }
                    state.selection.push(id);
                }
            }
            Intent::SelectPair(a, b) => {
                state.selection = vec![a, b];
            }
            Intent::Clear => state.selection.clear(),
            Intent::SetFilter(update) => {
                if let Some(region) = update.region {
                    state.filters.region = region;
                }
                if let Some(dimension) = update.dimension {
                    state.filters.dimension = dimension;
                }
                if let Some(t) = update.threshold.filter(|t| !t.is_nan()) {
                    state.filters.threshold = t.clamp(0.0, 1.0);
                }
            }
        }
        state.version += 1;
        let change = state.change_from(&previous);
        debug!(
            "state v{} - selection={:?} region={} dimension={} threshold={:.2}",
            state.version,
            state.selection,
            state.filters.region,
            state.filters.dimension,
            state.filters.threshold
        );
        (state.clone(), change)
    }

    fn notify(&self, snapshot: &Snapshot, change: StateChange) {
        let listeners: Vec<Rc<ListenerSlot>> = self.inner.listeners.borrow().clone();
        for slot in listeners {
            if !slot.active.get() {
                continue;
            }
            (slot.callback.borrow_mut())(snapshot, change);
        }
    }
}
