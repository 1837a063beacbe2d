use serde::Serialize;
use tracing::warn;

use super::{ChartAdapter, ChartKind, RenderContext, View};
use crate::models::known_cluster_color;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: String,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    /// Policies carried by the flow, comma separated.
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyView {
    pub nodes: Vec<FlowNode>,
    pub links: Vec<FlowLink>,
}

pub struct SankeyChart;

impl ChartAdapter for SankeyChart {
    fn kind(&self) -> ChartKind {
        ChartKind::Sankey
    }

    fn build(&self, ctx: &RenderContext<'_>) -> Option<View> {
        let data = ctx.model.dataset();
        let sankey = data.sankey.as_ref()?;
        if sankey.nodes.is_empty() || sankey.links.is_empty() {
            return None;
        }
        let region_color = |id: &str| data.region_colors.get(id).cloned();

        let nodes: Vec<FlowNode> = sankey
            .nodes
            .iter()
            .map(|n| FlowNode {
                id: n.id.clone(),
                label: n.label.clone(),
                color: region_color(&n.id)
                    .or_else(|| known_cluster_color(&n.id).map(str::to_string))
                    .unwrap_or_else(|| "#999".to_string()),
            })
            .collect();
        let position = |id: &str| nodes.iter().position(|n| n.id == id);

        let mut links = Vec::with_capacity(sankey.links.len());
        for l in &sankey.links {
            let (Some(source), Some(target)) = (position(&l.source), position(&l.target)) else {
                warn!("sankey link {} -> {} references an unknown node", l.source, l.target);
                continue;
            };
            links.push(FlowLink {
                source,
                target,
                value: l.value,
                label: l.policies.join(", "),
                color: format!("{}55", region_color(&l.source).unwrap_or_else(|| "#999".to_string())),
            });
        }

        Some(View::Sankey(SankeyView { nodes, links }))
    }
}
