//! In-memory model of extracted symbols and the state machines operating on it.
//!
//! ```text
//! StructureView (facade)
//!   ├── PinRegistry        - pinned nodes, survive rebuilds
//!   ├── EntityCatalog      - grouped + filtered views
//!   ├── ComparisonEngine   - two-selection member diff
//!   └── SearchNavigator    - per-name occurrence cursors
//! ```

pub mod compare;
pub mod entities;
pub mod facade;
pub mod navigator;
pub mod pins;
pub mod render;

use crate::parser::{DescriptorKind, SymbolDescriptor};
use serde::Serialize;
use std::fmt;

/// Plain display text of a node. Decoration is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Label {
    text: String,
}

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Label {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Label {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Class,
    Group,
    Pinned,
    Compare,
    CompareResult,
    PropertyLeaf,
    EnumMemberLeaf,
    Info,
}

impl NodeKind {
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeKind::PropertyLeaf | NodeKind::EnumMemberLeaf)
    }

    /// Kinds standing for a whole symbol, valid targets for pinning and comparison
    pub fn is_entity(&self) -> bool {
        matches!(self, NodeKind::Class | NodeKind::Pinned)
    }
}

/// Naming-suffix bucket a symbol is grouped under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityGroup {
    Entity,
    Dto,
    Type,
    Enum,
    Other,
}

impl EntityGroup {
    /// Emission order, and the order suffixes are tested in
    pub const ORDER: [EntityGroup; 5] = [
        EntityGroup::Entity,
        EntityGroup::Dto,
        EntityGroup::Type,
        EntityGroup::Enum,
        EntityGroup::Other,
    ];

    pub fn classify(name: &str) -> Self {
        Self::ORDER
            .into_iter()
            .find(|group| *group != EntityGroup::Other && name.ends_with(group.as_str()))
            .unwrap_or(EntityGroup::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityGroup::Entity => "Entity",
            EntityGroup::Dto => "Dto",
            EntityGroup::Type => "Type",
            EntityGroup::Enum => "Enum",
            EntityGroup::Other => "Other",
        }
    }

    fn index(&self) -> usize {
        match self {
            EntityGroup::Entity => 0,
            EntityGroup::Dto => 1,
            EntityGroup::Type => 2,
            EntityGroup::Enum => 3,
            EntityGroup::Other => 4,
        }
    }
}

/// Presentation marker carried next to the label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decoration {
    #[default]
    None,
    Group(EntityGroup),
    Pinned,
    Compare,
}

/// Unit of the catalog tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNode {
    label: Label,
    kind: NodeKind,
    decoration: Decoration,
    children: Vec<EntityNode>,
    source_name: Option<String>,
}

impl EntityNode {
    fn new(label: impl Into<Label>, kind: NodeKind, children: Vec<EntityNode>) -> Self {
        Self {
            label: label.into(),
            kind,
            decoration: Decoration::None,
            children,
            source_name: None,
        }
    }

    /// Node for one class or enum, one leaf per member
    pub fn from_descriptor(descriptor: &SymbolDescriptor) -> Self {
        let children = descriptor
            .members
            .iter()
            .map(|member| match descriptor.kind {
                DescriptorKind::Class => EntityNode::property(&member.name, &member.display_label),
                DescriptorKind::Enum => EntityNode::enum_member(&member.name, &member.display_label),
            })
            .collect();

        Self::entity(&descriptor.name, children)
    }

    pub fn entity(name: &str, children: Vec<EntityNode>) -> Self {
        Self {
            source_name: Some(name.to_string()),
            ..Self::new(name, NodeKind::Class, children)
        }
    }

    pub fn property(name: &str, label: &str) -> Self {
        Self {
            source_name: Some(name.to_string()),
            ..Self::new(label, NodeKind::PropertyLeaf, Vec::new())
        }
    }

    pub fn enum_member(name: &str, label: &str) -> Self {
        Self {
            source_name: Some(name.to_string()),
            ..Self::new(label, NodeKind::EnumMemberLeaf, Vec::new())
        }
    }

    /// Group node, `None` when there is nothing to put in it
    pub fn group(group: EntityGroup, children: Vec<EntityNode>) -> Option<Self> {
        if children.is_empty() {
            return None;
        }
        Some(Self {
            decoration: Decoration::Group(group),
            ..Self::new(group.as_str(), NodeKind::Group, children)
        })
    }

    pub fn info(text: &str) -> Self {
        Self::new(text, NodeKind::Info, Vec::new())
    }

    pub fn pinned(entity: &EntityNode) -> Self {
        Self {
            kind: NodeKind::Pinned,
            decoration: Decoration::Pinned,
            ..entity.clone()
        }
    }

    /// A pending comparison selection as shown in the tree
    pub fn compare_selection(entity: &EntityNode) -> Self {
        Self {
            kind: NodeKind::Compare,
            decoration: Decoration::Compare,
            ..entity.clone()
        }
    }

    pub fn compare_section(label: String, children: Vec<EntityNode>) -> Self {
        Self::new(label, NodeKind::Compare, children)
    }

    pub fn compare_result(label: String, sections: Vec<EntityNode>) -> Self {
        Self {
            decoration: Decoration::Compare,
            ..Self::new(label, NodeKind::CompareResult, sections)
        }
    }

    /// Same node with a narrowed child list
    pub fn with_children(&self, children: Vec<EntityNode>) -> Self {
        Self {
            label: self.label.clone(),
            kind: self.kind,
            decoration: self.decoration,
            children,
            source_name: self.source_name.clone(),
        }
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Identity used by the pin registry and the comparison engine
    pub fn key(&self) -> &str {
        self.label.as_str()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn decoration(&self) -> Decoration {
        self.decoration
    }

    pub fn children(&self) -> &[EntityNode] {
        &self.children
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// Number of leaves below this node
    pub fn member_count(&self) -> usize {
        if self.kind.is_leaf() {
            return 1;
        }
        self.children.iter().map(EntityNode::member_count).sum()
    }
}
