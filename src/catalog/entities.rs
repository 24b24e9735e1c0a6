use super::{Decoration, EntityGroup, EntityNode};
use crate::parser::SymbolDescriptor;

/// Grouped view of the symbols of the active document
#[derive(Debug, Default)]
pub struct EntityCatalog {
    /// `None` until the first build
    unfiltered: Option<Vec<EntityNode>>,
    filtered: Vec<EntityNode>,
    query: Option<String>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group descriptors by naming suffix and cache the result as the unfiltered view.
    /// An active filter is re-applied to the new groups.
    pub fn build(&mut self, descriptors: &[SymbolDescriptor]) -> Vec<EntityNode> {
        let mut buckets: [Vec<EntityNode>; 5] = Default::default();

        for descriptor in descriptors {
            if descriptor.members.is_empty() {
                tracing::debug!("Skipping {}: no members", descriptor.name);
                continue;
            }
            let group = EntityGroup::classify(&descriptor.name);
            buckets[group.index()].push(EntityNode::from_descriptor(descriptor));
        }

        let groups: Vec<EntityNode> = EntityGroup::ORDER
            .into_iter()
            .zip(buckets)
            .filter_map(|(group, children)| EntityNode::group(group, children))
            .collect();

        if let Some(query) = &self.query {
            self.filtered = filter_groups(&groups, query);
        }
        self.unfiltered = Some(groups.clone());

        groups
    }

    /// Narrow the cached groups to entities or members whose label contains `query`,
    /// ignoring case. An empty query restores the unfiltered view.
    pub fn filter(&mut self, query: &str) -> Vec<EntityNode> {
        if query.is_empty() {
            return self.clear_filter();
        }

        let needle = query.to_lowercase();
        self.filtered = match &self.unfiltered {
            Some(groups) => filter_groups(groups, &needle),
            None => Vec::new(),
        };
        self.query = Some(needle);

        self.filtered.clone()
    }

    pub fn clear_filter(&mut self) -> Vec<EntityNode> {
        self.query = None;
        self.filtered.clear();
        self.unfiltered.clone().unwrap_or_default()
    }

    /// Filtered view while a filter is active, unfiltered otherwise
    pub fn view(&self) -> &[EntityNode] {
        match (&self.query, &self.unfiltered) {
            (Some(_), _) => &self.filtered,
            (None, Some(groups)) => groups,
            (None, None) => &[],
        }
    }

    /// Unfiltered entity named `name`, whatever the active filter shows of it
    pub fn entity(&self, name: &str) -> Option<&EntityNode> {
        self.unfiltered
            .as_deref()?
            .iter()
            .flat_map(EntityNode::children)
            .find(|entity| entity.key() == name)
    }

    /// Active filter, lowercased
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn filter_groups(groups: &[EntityNode], needle: &str) -> Vec<EntityNode> {
    groups
        .iter()
        .filter_map(|group| {
            let Decoration::Group(bucket) = group.decoration() else {
                return None;
            };
            let children = group
                .children()
                .iter()
                .filter_map(|entity| filter_entity(entity, needle))
                .collect();
            EntityNode::group(bucket, children)
        })
        .collect()
}

/// Whole entity when its own label matches, else only its matching members
fn filter_entity(entity: &EntityNode, needle: &str) -> Option<EntityNode> {
    if matches_label(entity, needle) {
        return Some(entity.clone());
    }

    let members: Vec<EntityNode> = entity
        .children()
        .iter()
        .filter(|member| matches_label(member, needle))
        .cloned()
        .collect();

    if members.is_empty() {
        None
    } else {
        Some(entity.with_children(members))
    }
}

fn matches_label(node: &EntityNode, needle: &str) -> bool {
    node.label().as_str().to_lowercase().contains(needle)
}
