use serde::Serialize;

use super::{ChartAdapter, ChartEvent, ChartKind, Reaction, RenderContext, View};
use crate::state::{Intent, StateChange};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyCard {
    pub id: String,
    pub abbr: String,
    pub country: String,
    pub year: i32,
    pub region: String,
    pub region_color: String,
    pub selected: bool,
    pub filtered_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidebarView {
    pub cards: Vec<PolicyCard>,
    pub visible_count: usize,
    pub total: usize,
}

pub struct Sidebar;

impl ChartAdapter for Sidebar {
    fn kind(&self) -> ChartKind {
        ChartKind::Sidebar
    }

    fn depends_on(&self, change: &StateChange) -> bool {
        change.selection || change.region
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let policies = &ctx.model.dataset().policies;
        if policies.is_empty() {
            return None;
        }
        let region = &ctx.snapshot.filters.region;
        let cards: Vec<PolicyCard> = policies
            .iter()
            .map(|p| PolicyCard {
                id: p.id.clone(),
                abbr: p.abbr(),
                country: p.country.clone(),
                year: p.year,
                region: p.region.clone(),
                region_color: p.region_color.clone(),
                selected: ctx.snapshot.is_selected(&p.id),
                filtered_out: !region.matches(&p.region),
            })
            .collect();
        Some(View::Sidebar(SidebarView {
            visible_count: cards.iter().filter(|c| !c.filtered_out).count(),
            total: cards.len(),
            cards,
        }))
    }

    fn on_event(&self, event: &ChartEvent, ctx: &RenderContext<'_>) -> Reaction {
        match event {
            ChartEvent::NodeClick { id } if ctx.model.policy(id).is_some() => {
                Reaction::Apply(Intent::Toggle(id.clone()))
            }
            _ => Reaction::Ignore,
        }
    }
}
