use super::compare::ComparisonEngine;
use super::entities::EntityCatalog;
use super::navigator::{Position, SearchNavigator};
use super::pins::PinRegistry;
use super::{EntityNode, NodeKind};
use crate::parser::{SymbolDescriptor, SymbolSource};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

const NO_DOCUMENT: &str = "Open a TypeScript file to see its structure";

/// Document the catalog is currently built from
#[derive(Debug, Clone)]
pub struct ActiveDocument {
    pub path: PathBuf,
    pub text: String,
}

/// Outcome of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reveal {
    pub position: Position,
    pub index: usize,
    pub occurrences: usize,
}

/// Composes pins, the catalog view and the comparison into one tree.
///
/// Every state change bumps a revision published on a watch channel, which is
/// the change notification hosts subscribe to.
pub struct StructureView {
    source: Arc<dyn SymbolSource>,
    include_imports: bool,
    document: Option<ActiveDocument>,
    catalog: EntityCatalog,
    pins: PinRegistry,
    comparison: ComparisonEngine,
    navigator: SearchNavigator,
    changes: watch::Sender<u64>,
}

impl StructureView {
    pub fn new(source: Arc<dyn SymbolSource>, include_imports: bool) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            source,
            include_imports,
            document: None,
            catalog: EntityCatalog::new(),
            pins: PinRegistry::new(),
            comparison: ComparisonEngine::new(),
            navigator: SearchNavigator::new(),
            changes,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }

    /// Activate a document and rebuild the catalog from it
    pub fn open_document(&mut self, path: PathBuf, text: String) {
        tracing::info!("Opening {}", path.display());
        self.document = Some(ActiveDocument { path, text });
        self.rebuild();
        self.notify();
    }

    /// Replace the active document's text; `false` when no document is open
    pub fn update_document(&mut self, text: String) -> bool {
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        document.text = text;
        self.rebuild();
        self.notify();
        true
    }

    /// Drop the document and every piece of state built on it, pins included
    pub fn close_document(&mut self) {
        self.document = None;
        self.catalog.reset();
        self.pins.clear();
        self.comparison.clear();
        self.navigator.reset();
        self.notify();
    }

    fn rebuild(&mut self) {
        let descriptors = match &self.document {
            Some(document) => self.collect_descriptors(&document.path, &document.text),
            None => Vec::new(),
        };
        let groups = self.catalog.build(&descriptors);
        tracing::debug!(
            "Catalog rebuilt: {} symbols, {} members in {} groups",
            descriptors.len(),
            groups.iter().map(EntityNode::member_count).sum::<usize>(),
            groups.len()
        );
    }

    /// Declared symbols, then the declarations behind named imports
    fn collect_descriptors(&self, path: &Path, text: &str) -> Vec<SymbolDescriptor> {
        let symbols = match self.source.symbols_of_document(path, text) {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::warn!("Failed to extract symbols from {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut descriptors: Vec<SymbolDescriptor> = symbols
            .declared
            .into_iter()
            .filter(|symbol| seen.insert(symbol.name.clone()))
            .collect();

        if !self.include_imports {
            return descriptors;
        }

        for import in symbols.imports {
            if seen.contains(&import.name) {
                continue;
            }
            let Some(module_path) = import.resolved_path else {
                tracing::debug!("Skipping {}: {} is not a local module", import.name, import.specifier);
                continue;
            };
            match self.source.symbols_of_imported_name(&module_path, &import.name) {
                Ok(Some(symbol)) => {
                    seen.insert(symbol.name.clone());
                    descriptors.push(symbol);
                }
                Ok(None) => {
                    tracing::debug!("{} is not a class or enum in {}", import.name, module_path.display());
                }
                Err(e) => {
                    tracing::warn!("Failed to resolve import {}: {}", import.name, e);
                }
            }
        }

        descriptors
    }

    /// Top-level nodes: pins, then the catalog view, then the comparison
    pub fn roots(&self) -> Vec<EntityNode> {
        if self.document.is_none() {
            return vec![EntityNode::info(NO_DOCUMENT)];
        }

        self.pins
            .values()
            .cloned()
            .chain(self.catalog.view().iter().cloned())
            .chain(self.comparison.current_nodes())
            .collect()
    }

    /// Node at an index path into `roots()`
    pub fn node_at(&self, path: &[usize]) -> Option<EntityNode> {
        let (first, rest) = path.split_first()?;
        let roots = self.roots();
        let mut node = roots.get(*first)?;
        for index in rest {
            node = node.children().get(*index)?;
        }
        Some(node.clone())
    }

    /// Children of the node at `path`; the roots for an empty path
    pub fn children(&self, path: &[usize]) -> Vec<EntityNode> {
        if path.is_empty() {
            return self.roots();
        }
        self.node_at(path)
            .map(|node| node.children().to_vec())
            .unwrap_or_default()
    }

    pub fn pin(&mut self, entity: &EntityNode) -> bool {
        let entity = self.unfiltered(entity);
        self.changed(|view| view.pins.pin(&entity))
    }

    pub fn unpin(&mut self, entity: &EntityNode) -> bool {
        self.changed(|view| view.pins.unpin(entity))
    }

    pub fn has_pins(&self) -> bool {
        !self.pins.is_empty()
    }

    pub fn select_for_comparison(&mut self, entity: &EntityNode) -> bool {
        let entity = self.unfiltered(entity);
        self.changed(|view| view.comparison.select(&entity))
    }

    /// A catalog entity with all of its members, even when the filter narrowed it
    fn unfiltered(&self, entity: &EntityNode) -> EntityNode {
        if entity.kind() != NodeKind::Class {
            return entity.clone();
        }
        self.catalog
            .entity(entity.key())
            .cloned()
            .unwrap_or_else(|| entity.clone())
    }

    pub fn clear_comparison(&mut self) -> bool {
        self.changed(|view| view.comparison.clear())
    }

    pub fn comparison_active(&self) -> bool {
        self.comparison.is_active()
    }

    /// `None` or an empty string clears the filter
    pub fn set_filter(&mut self, text: Option<&str>) -> bool {
        let text = text.unwrap_or("");
        let before = self.catalog.query().map(str::to_string);
        self.catalog.filter(text);
        let changed = before.as_deref() != self.catalog.query();
        if changed {
            self.notify();
        }
        changed
    }

    pub fn clear_filter(&mut self) -> bool {
        self.set_filter(None)
    }

    pub fn filter_query(&self) -> Option<&str> {
        self.catalog.query()
    }

    /// Next occurrence of `name` in the active document, cycling through all of them.
    /// `None` when there is no document or no occurrence.
    pub fn locate_and_reveal_next(&mut self, name: &str) -> Option<Reveal> {
        let document = self.document.as_ref()?;
        let positions = SearchNavigator::locate(name, &document.text);
        let position = self.navigator.next(name, &positions)?;
        let index = positions.iter().position(|p| *p == position).unwrap_or(0);

        tracing::debug!(
            "Revealing {} occurrence {}/{} at {}:{}",
            name,
            index + 1,
            positions.len(),
            position.line,
            position.character
        );

        Some(Reveal {
            position,
            index,
            occurrences: positions.len(),
        })
    }

    fn changed(&mut self, mutate: impl FnOnce(&mut Self) -> bool) -> bool {
        let changed = mutate(self);
        if changed {
            self.notify();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::typescript::TypeScriptSource;
    use crate::parser::{DescriptorKind, DocumentSymbols, MemberDescriptor, SourceError};
    use pretty_assertions::assert_eq;

    /// Returns fixed descriptors regardless of the document
    struct FixedSource(Vec<SymbolDescriptor>);

    impl SymbolSource for FixedSource {
        fn symbols_of_document(&self, _path: &Path, _text: &str) -> Result<DocumentSymbols, SourceError> {
            Ok(DocumentSymbols {
                declared: self.0.clone(),
                imports: Vec::new(),
            })
        }
    }

    fn class(name: &str, members: &[&str]) -> SymbolDescriptor {
        SymbolDescriptor {
            name: name.to_string(),
            kind: DescriptorKind::Class,
            members: members
                .iter()
                .map(|m| MemberDescriptor {
                    name: m.to_string(),
                    display_label: m.to_string(),
                })
                .collect(),
        }
    }

    fn view() -> StructureView {
        let source = FixedSource(vec![
            class("UserEntity", &["id", "name"]),
            class("UserDto", &["id", "email"]),
        ]);
        let mut view = StructureView::new(Arc::new(source), true);
        view.open_document(PathBuf::from("user.ts"), "UserEntity UserDto UserEntity".to_string());
        view
    }

    fn labels(nodes: &[EntityNode]) -> Vec<String> {
        nodes.iter().map(|n| n.label().to_string()).collect()
    }

    #[test]
    fn test_placeholder_without_document() {
        let view = StructureView::new(Arc::new(FixedSource(vec![])), true);
        let roots = view.roots();

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].kind(), NodeKind::Info);
    }

    #[test]
    fn test_roots_order_pins_catalog_comparison() {
        let mut view = view();
        assert_eq!(labels(&view.roots()), vec!["Entity", "Dto"]);

        let user = view.node_at(&[0, 0]).unwrap();
        let dto = view.node_at(&[1, 0]).unwrap();
        assert!(view.pin(&user));
        assert!(view.select_for_comparison(&user));
        assert!(view.select_for_comparison(&dto));

        let roots = view.roots();
        assert_eq!(
            labels(&roots),
            vec!["UserEntity", "Entity", "Dto", "UserEntity ↔ UserDto"]
        );
        assert_eq!(roots[0].kind(), NodeKind::Pinned);
        assert_eq!(roots[3].kind(), NodeKind::CompareResult);
        assert!(view.has_pins());
        assert!(view.comparison_active());
    }

    #[test]
    fn test_pins_survive_rebuild_and_reset_on_close() {
        let mut view = view();
        let user = view.node_at(&[0, 0]).unwrap();
        view.pin(&user);

        view.update_document("changed".to_string());
        assert_eq!(view.roots()[0].kind(), NodeKind::Pinned);

        view.close_document();
        assert!(!view.has_pins());
        assert_eq!(view.roots()[0].kind(), NodeKind::Info);
        assert!(!view.update_document("ignored".to_string()));
    }

    #[test]
    fn test_children_by_path() {
        let view = view();
        assert_eq!(labels(&view.children(&[0, 0])), vec!["id", "name"]);
        assert_eq!(labels(&view.children(&[])), vec!["Entity", "Dto"]);
        assert!(view.children(&[9]).is_empty());
        assert!(view.node_at(&[]).is_none());
    }

    #[test]
    fn test_filter_through_facade() {
        let mut view = view();
        assert!(view.set_filter(Some("email")));
        assert!(!view.set_filter(Some("EMAIL")));
        assert_eq!(labels(&view.roots()), vec!["Dto"]);
        assert_eq!(view.filter_query(), Some("email"));

        assert!(view.clear_filter());
        assert!(!view.clear_filter());
        assert_eq!(labels(&view.roots()), vec!["Entity", "Dto"]);
    }

    #[test]
    fn test_pin_and_compare_keep_members_hidden_by_filter() {
        let mut view = view();
        view.set_filter(Some("id"));
        let user = view.node_at(&[0, 0]).unwrap();
        let dto = view.node_at(&[1, 0]).unwrap();
        assert_eq!(labels(user.children()), vec!["id"]);

        assert!(view.pin(&user));
        assert!(view.select_for_comparison(&user));
        assert!(view.select_for_comparison(&dto));
        view.clear_filter();

        let roots = view.roots();
        assert_eq!(roots[0].kind(), NodeKind::Pinned);
        assert_eq!(labels(roots[0].children()), vec!["id", "name"]);

        let result = roots.last().unwrap();
        assert_eq!(result.kind(), NodeKind::CompareResult);
        assert_eq!(
            labels(result.children()),
            vec!["Common Properties (1)", "UserEntity (1)", "UserDto (1)"]
        );
    }

    #[test]
    fn test_revision_only_moves_on_change() {
        let mut view = view();
        let receiver = view.subscribe();
        let start = view.revision();

        let group = view.node_at(&[0]).unwrap();
        assert!(!view.pin(&group));
        assert!(!view.clear_comparison());
        assert_eq!(view.revision(), start);

        let user = view.node_at(&[0, 0]).unwrap();
        view.pin(&user);
        view.unpin(&user);
        assert_eq!(view.revision(), start + 2);
        assert!(receiver.has_changed().unwrap());
    }

    #[test]
    fn test_locate_and_reveal_next_cycles() {
        let mut view = view();

        let offsets: Vec<usize> = (0..3)
            .map(|_| view.locate_and_reveal_next("UserEntity").unwrap().position.offset)
            .collect();
        assert_eq!(offsets, vec![0, 19, 0]);

        let reveal = view.locate_and_reveal_next("UserEntity").unwrap();
        assert_eq!((reveal.index, reveal.occurrences), (1, 2));
        assert!(view.locate_and_reveal_next("Missing").is_none());
    }

    #[test]
    fn test_imports_are_added_to_catalog() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("user.entity.ts"),
            "export class UserEntity { id: number; name: string }",
        )
        .unwrap();
        let path = dir.path().join("user.service.ts");
        let text = r#"
            import { UserEntity } from "./user.entity";
            export class UserService { repo: Repository<UserEntity> }
            export enum RoleEnum { Admin, User }
        "#;

        let mut view = StructureView::new(Arc::new(TypeScriptSource::new()), true);
        view.open_document(path.clone(), text.to_string());
        assert_eq!(labels(&view.roots()), vec!["Entity", "Enum", "Other"]);
        assert_eq!(labels(&view.children(&[0, 0])), vec!["id: number", "name: string"]);

        let mut local_only = StructureView::new(Arc::new(TypeScriptSource::new()), false);
        local_only.open_document(path, text.to_string());
        assert_eq!(labels(&local_only.roots()), vec!["Enum", "Other"]);
    }

    #[test]
    fn test_source_failure_yields_empty_catalog() {
        let mut view = StructureView::new(Arc::new(TypeScriptSource::new()), true);
        view.open_document(PathBuf::from("notes.md"), "# notes".to_string());
        assert!(view.roots().is_empty());
    }
}
