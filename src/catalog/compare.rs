use super::EntityNode;
use indexmap::IndexMap;

#[derive(Debug, Default)]
enum ComparisonState {
    #[default]
    Empty,
    Pending(Vec<EntityNode>),
    Result(Box<EntityNode>),
}

/// Member-set difference between two entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDiff {
    pub common: Vec<EntityNode>,
    pub only_left: Vec<EntityNode>,
    pub only_right: Vec<EntityNode>,
}

impl MemberDiff {
    /// Set semantics over direct children labels, duplicates collapse to the first
    pub fn between(left: &EntityNode, right: &EntityNode) -> Self {
        let left_members = member_set(left);
        let right_members = member_set(right);

        let (common, only_left) = left_members
            .iter()
            .partition::<Vec<_>, _>(|(label, _)| right_members.contains_key(*label));

        let only_right = right_members
            .iter()
            .filter(|(label, _)| !left_members.contains_key(*label))
            .map(|(_, node)| (*node).clone())
            .collect();

        Self {
            common: common.into_iter().map(|(_, node)| (*node).clone()).collect(),
            only_left: only_left.into_iter().map(|(_, node)| (*node).clone()).collect(),
            only_right,
        }
    }
}

fn member_set(entity: &EntityNode) -> IndexMap<&str, &EntityNode> {
    let mut members = IndexMap::new();
    for child in entity.children() {
        members.entry(child.key()).or_insert(child);
    }
    members
}

/// Build the result node for `left` against `right`
pub fn compare(left: &EntityNode, right: &EntityNode) -> EntityNode {
    let diff = MemberDiff::between(left, right);

    let sections = vec![
        EntityNode::compare_section(
            format!("Common Properties ({})", diff.common.len()),
            diff.common,
        ),
        EntityNode::compare_section(
            format!("{} ({})", left.label(), diff.only_left.len()),
            diff.only_left,
        ),
        EntityNode::compare_section(
            format!("{} ({})", right.label(), diff.only_right.len()),
            diff.only_right,
        ),
    ];

    EntityNode::compare_result(format!("{} ↔ {}", left.label(), right.label()), sections)
}

/// Two-selection comparison state machine
#[derive(Debug, Default)]
pub struct ComparisonEngine {
    state: ComparisonState,
}

impl ComparisonEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the state changed.
    ///
    /// Selecting while a result is shown starts a new comparison with this entity.
    pub fn select(&mut self, entity: &EntityNode) -> bool {
        if entity.label().is_empty() || !entity.kind().is_entity() {
            return false;
        }
        if let ComparisonState::Pending(pending) = &self.state {
            if pending.iter().any(|selected| selected.key() == entity.key()) {
                return false;
            }
        }

        let mut pending = match std::mem::take(&mut self.state) {
            ComparisonState::Pending(pending) if pending.len() < 2 => pending,
            _ => Vec::new(),
        };
        pending.push(entity.clone());

        self.state = if pending.len() == 2 {
            tracing::debug!("Comparing {} with {}", pending[0].key(), pending[1].key());
            ComparisonState::Result(Box::new(compare(&pending[0], &pending[1])))
        } else {
            ComparisonState::Pending(pending)
        };
        true
    }

    /// Returns `true` when there was anything to clear
    pub fn clear(&mut self) -> bool {
        let active = self.is_active();
        self.state = ComparisonState::Empty;
        active
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, ComparisonState::Empty)
    }

    #[cfg(test)]
    pub fn pending(&self) -> &[EntityNode] {
        match &self.state {
            ComparisonState::Pending(pending) => pending.as_slice(),
            _ => &[],
        }
    }

    #[cfg(test)]
    pub fn result(&self) -> Option<&EntityNode> {
        match &self.state {
            ComparisonState::Result(node) => Some(&**node),
            _ => None,
        }
    }

    /// Nodes contributed to the tree: pending selections or the result
    pub fn current_nodes(&self) -> Vec<EntityNode> {
        match &self.state {
            ComparisonState::Empty => Vec::new(),
            ComparisonState::Pending(pending) => {
                pending.iter().map(EntityNode::compare_selection).collect()
            }
            ComparisonState::Result(node) => vec![(**node).clone()],
        }
    }
}
