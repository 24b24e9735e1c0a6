//! Maps catalog nodes to the presentation attributes a tree view needs.

use super::{Decoration, EntityGroup, EntityNode, NodeKind};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Collapsible {
    None,
    Collapsed,
    Expanded,
}

/// Colour bucket for a property's type text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeCategory {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Other,
}

impl TypeCategory {
    /// First match wins, so `Array<string>` is a string
    pub fn of(type_text: &str) -> Self {
        if type_text.contains("string") {
            TypeCategory::String
        } else if type_text.contains("number") {
            TypeCategory::Number
        } else if type_text.contains("boolean") {
            TypeCategory::Boolean
        } else if type_text.contains("Date") {
            TypeCategory::Date
        } else if type_text.contains("Array") || type_text.ends_with("[]") {
            TypeCategory::Array
        } else {
            TypeCategory::Other
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            TypeCategory::String => "🟦",
            TypeCategory::Number => "🟨",
            TypeCategory::Boolean => "🟩",
            TypeCategory::Date => "🟧",
            TypeCategory::Array => "🟣",
            TypeCategory::Other => "⚪",
        }
    }
}

/// One rendered row of the tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeItem {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub icon: &'static str,
    pub collapsible: Collapsible,
    pub context_value: &'static str,
    /// Symbol name to navigate to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_category: Option<TypeCategory>,
    pub child_count: usize,
}

/// Node ids are index paths into the root list, e.g. `2/0/1`
pub fn format_node_id(path: &[usize]) -> String {
    path.iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

pub fn parse_node_id(id: &str) -> Option<Vec<usize>> {
    if id.is_empty() {
        return Some(Vec::new());
    }
    id.split('/').map(|part| part.parse().ok()).collect()
}

pub fn render(node: &EntityNode, path: &[usize]) -> TreeItem {
    let type_category = match node.kind() {
        NodeKind::PropertyLeaf => Some(TypeCategory::of(property_type(node.label().as_str()))),
        _ => None,
    };

    TreeItem {
        id: format_node_id(path),
        label: display_label(node, type_category),
        kind: node.kind(),
        icon: icon(node),
        collapsible: collapsible(node),
        context_value: context_value(node.kind()),
        source_name: node.source_name().map(str::to_string),
        type_category,
        child_count: node.children().len(),
    }
}

/// Render `nodes`, which sit under `parent`
pub fn render_all(nodes: &[EntityNode], parent: &[usize]) -> Vec<TreeItem> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let mut path = parent.to_vec();
            path.push(index);
            render(node, &path)
        })
        .collect()
}

fn property_type(label: &str) -> &str {
    label.split_once(": ").map(|(_, ty)| ty).unwrap_or("")
}

fn display_label(node: &EntityNode, type_category: Option<TypeCategory>) -> String {
    let label = node.label().as_str();

    if let Some(category) = type_category {
        if let Some((name, ty)) = label.split_once(": ") {
            return format!("🔹 {name}: {} {ty}", category.marker());
        }
    }

    match (node.kind(), node.decoration()) {
        (_, Decoration::Group(group)) => format!("{} {label}", group_icon(group)),
        (_, Decoration::Pinned) => format!("📌 {label}"),
        (NodeKind::CompareResult, Decoration::Compare) => format!("🔍 {label}"),
        (_, Decoration::Compare) => format!("⚖️ {label}"),
        (NodeKind::Class, _) => format!("📦 {label}"),
        (NodeKind::EnumMemberLeaf, _) => format!("🔸 {label}"),
        (NodeKind::Info, _) => format!("ℹ️ {label}"),
        _ => label.to_string(),
    }
}

fn group_icon(group: EntityGroup) -> &'static str {
    match group {
        EntityGroup::Entity => "🏛️",
        EntityGroup::Dto => "📨",
        EntityGroup::Type => "🔷",
        EntityGroup::Enum => "🔢",
        EntityGroup::Other => "📁",
    }
}

/// Resource file stem under `resources/`
fn icon(node: &EntityNode) -> &'static str {
    match node.kind() {
        NodeKind::Class => "class",
        NodeKind::Group => "group",
        NodeKind::Pinned => "pinned",
        NodeKind::Compare | NodeKind::CompareResult => "compare",
        NodeKind::PropertyLeaf | NodeKind::EnumMemberLeaf => "property",
        NodeKind::Info => "info",
    }
}

fn collapsible(node: &EntityNode) -> Collapsible {
    if node.children().is_empty() {
        return Collapsible::None;
    }
    match node.kind() {
        NodeKind::Group | NodeKind::CompareResult => Collapsible::Expanded,
        _ => Collapsible::Collapsed,
    }
}

fn context_value(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Class => "entity",
        NodeKind::Group => "group",
        NodeKind::Pinned => "pinnedEntity",
        NodeKind::Compare => "compareSelection",
        NodeKind::CompareResult => "compareResult",
        NodeKind::PropertyLeaf => "property",
        NodeKind::EnumMemberLeaf => "enumMember",
        NodeKind::Info => "info",
    }
}
