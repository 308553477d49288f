//! Local graph view of a person's family neighborhood.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Person,
    Placeholder,
    Box,
    Center,
    Circle,
}

impl NodeKind {
    /// Classify a node by its primary label.
    pub fn from_label(label: &str, synthetic: bool) -> Self {
        match label {
            "Box" => Self::Box,
            "Center" => Self::Center,
            "Circle" => Self::Circle,
            _ if synthetic => Self::Placeholder,
            _ => Self::Person,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Person => "#4f8bc9",
            Self::Placeholder => "#b0b0b0",
            Self::Box => "#e07b39",
            Self::Center => "#8c6bb1",
            Self::Circle => "#3d9970",
        }
    }
}

/// A node endpoint as returned by the family-graph query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    pub label: String,
    /// Identity key for persons, name for locations.
    pub key: Option<String>,
    pub name: Option<String>,
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEdgeRow {
    pub from: RawNode,
    pub to: RawNode,
    pub rel_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub color: &'static str,
    pub is_seed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ViewEdge {
    pub from: String,
    pub to: String,
    pub rel_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

impl GraphView {
    /// Build a deduplicated view. Nodes keep first-seen order; the node whose
    /// key equals `seed_key` is flagged.
    pub fn build(seed_key: &str, rows: Vec<RawEdgeRow>) -> Self {
        let mut view = GraphView::default();
        let mut node_index: HashMap<String, usize> = HashMap::new();
        let mut seen_edges: HashSet<ViewEdge> = HashSet::new();

        for row in rows {
            let edge = ViewEdge {
                from: row.from.id.clone(),
                to: row.to.id.clone(),
                rel_type: row.rel_type,
            };
            for node in [row.from, row.to] {
                if node_index.contains_key(&node.id) {
                    continue;
                }
                node_index.insert(node.id.clone(), view.nodes.len());
                view.nodes.push(view_node(node, seed_key));
            }
            if seen_edges.insert(edge.clone()) {
                view.edges.push(edge);
            }
        }

        view
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn view_node(node: RawNode, seed_key: &str) -> ViewNode {
    let kind = NodeKind::from_label(&node.label, node.synthetic);
    let is_seed = matches!(kind, NodeKind::Person | NodeKind::Placeholder)
        && node.key.as_deref() == Some(seed_key);
    let label = match kind {
        NodeKind::Placeholder => node.key,
        NodeKind::Box => node.name.map(|n| format!("Box {}", n)),
        _ => node.name.or(node.key),
    }
    .unwrap_or_else(|| node.id.clone());

    ViewNode {
        color: kind.color(),
        id: node.id,
        kind,
        label,
        is_seed,
    }
}
