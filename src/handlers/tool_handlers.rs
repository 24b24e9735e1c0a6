use crate::catalog::facade::StructureView;
use crate::catalog::navigator::Position;
use crate::catalog::render::{parse_node_id, render_all, TreeItem};
use crate::catalog::EntityNode;
use crate::mcp::types::Content;
use crate::parser::SymbolSource;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Tree payload returned by every tree-shaped tool
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    changed: Option<bool>,
    revision: u64,
    has_pins: bool,
    comparison_active: bool,
    filter: Option<&'a str>,
    items: Vec<TreeItem>,
}

#[derive(Debug, Serialize)]
struct RevealResponse<'a> {
    name: &'a str,
    position: Position,
    index: usize,
    occurrences: usize,
}

/// Tool handlers for MCP server
pub struct ToolHandlers {
    view: StructureView,
}

impl ToolHandlers {
    pub fn new(source: Arc<dyn SymbolSource>, include_imports: bool) -> Self {
        Self {
            view: StructureView::new(source, include_imports),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.view.subscribe()
    }

    /// Handle open_document tool
    pub fn handle_open_document(&mut self, args: &Value) -> Result<Vec<Content>> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .context("Missing 'path' argument")?;

        let text = match args.get("text").and_then(|v| v.as_str()) {
            Some(text) => text.to_string(),
            None => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path))?,
        };

        self.view.open_document(PathBuf::from(path), text);
        self.roots(None)
    }

    /// Handle update_document tool
    pub fn handle_update_document(&mut self, args: &Value) -> Result<Vec<Content>> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .context("Missing 'text' argument")?;

        let changed = self.view.update_document(text.to_string());
        self.roots(Some(changed))
    }

    /// Handle close_document tool
    pub fn handle_close_document(&mut self, _args: &Value) -> Result<Vec<Content>> {
        self.view.close_document();
        self.roots(None)
    }

    /// Handle get_roots tool
    pub fn handle_get_roots(&self, _args: &Value) -> Result<Vec<Content>> {
        self.roots(None)
    }

    /// Handle get_children tool
    pub fn handle_get_children(&self, args: &Value) -> Result<Vec<Content>> {
        let path = node_path(args)?;
        let items = render_all(&self.view.children(&path), &path);
        self.tree(None, items)
    }

    /// Handle pin tool
    pub fn handle_pin(&mut self, args: &Value) -> Result<Vec<Content>> {
        let changed = match self.target(args)? {
            Some(node) => self.view.pin(&node),
            None => false,
        };
        self.roots(Some(changed))
    }

    /// Handle unpin tool
    pub fn handle_unpin(&mut self, args: &Value) -> Result<Vec<Content>> {
        let changed = match self.target(args)? {
            Some(node) => self.view.unpin(&node),
            None => false,
        };
        self.roots(Some(changed))
    }

    /// Handle select_for_comparison tool
    pub fn handle_select_for_comparison(&mut self, args: &Value) -> Result<Vec<Content>> {
        let changed = match self.target(args)? {
            Some(node) => self.view.select_for_comparison(&node),
            None => false,
        };
        self.roots(Some(changed))
    }

    /// Handle clear_comparison tool
    pub fn handle_clear_comparison(&mut self, _args: &Value) -> Result<Vec<Content>> {
        let changed = self.view.clear_comparison();
        self.roots(Some(changed))
    }

    /// Handle set_filter tool, a null or missing text clears the filter
    pub fn handle_set_filter(&mut self, args: &Value) -> Result<Vec<Content>> {
        let text = match args.get("text") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_str().context("'text' must be a string or null")?),
        };

        let changed = self.view.set_filter(text);
        self.roots(Some(changed))
    }

    /// Handle clear_filter tool
    pub fn handle_clear_filter(&mut self, _args: &Value) -> Result<Vec<Content>> {
        let changed = self.view.clear_filter();
        self.roots(Some(changed))
    }

    /// Handle locate_and_reveal_next tool
    pub fn handle_locate_and_reveal_next(&mut self, args: &Value) -> Result<Vec<Content>> {
        let name = args
            .get("name")
            .and_then(|v| v.as_str())
            .context("Missing 'name' argument")?;

        let Some(reveal) = self.view.locate_and_reveal_next(name) else {
            return Ok(vec![Content::Text {
                text: format!("No occurrences of '{}' found.", name),
            }]);
        };

        let response = RevealResponse {
            name,
            position: reveal.position,
            index: reveal.index,
            occurrences: reveal.occurrences,
        };
        Ok(vec![Content::Text {
            text: serde_json::to_string_pretty(&response)?,
        }])
    }

    /// Node addressed by the `id` argument, `None` when nothing is there
    fn target(&self, args: &Value) -> Result<Option<EntityNode>> {
        let path = node_path(args)?;
        Ok(self.view.node_at(&path))
    }

    fn roots(&self, changed: Option<bool>) -> Result<Vec<Content>> {
        let items = render_all(&self.view.roots(), &[]);
        self.tree(changed, items)
    }

    fn tree(&self, changed: Option<bool>, items: Vec<TreeItem>) -> Result<Vec<Content>> {
        let response = TreeResponse {
            changed,
            revision: self.view.revision(),
            has_pins: self.view.has_pins(),
            comparison_active: self.view.comparison_active(),
            filter: self.view.filter_query(),
            items,
        };

        Ok(vec![Content::Text {
            text: serde_json::to_string_pretty(&response)?,
        }])
    }
}

fn node_path(args: &Value) -> Result<Vec<usize>> {
    let id = args
        .get("id")
        .and_then(|v| v.as_str())
        .context("Missing 'id' argument")?;
    parse_node_id(id).with_context(|| format!("Invalid node id: {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::typescript::TypeScriptSource;
    use serde_json::json;

    const DOCUMENT: &str = r#"
        export class UserEntity { id: number; name: string }
        export class UserDto { id: number; email: string }
    "#;

    fn payload(content: Vec<Content>) -> Value {
        let Content::Text { text } = &content[0];
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
    }

    fn handlers() -> ToolHandlers {
        let mut handlers = ToolHandlers::new(Arc::new(TypeScriptSource::new()), false);
        handlers
            .handle_open_document(&json!({"path": "models.ts", "text": DOCUMENT}))
            .unwrap();
        handlers
    }

    fn item_labels(value: &Value) -> Vec<String> {
        value["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["label"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_open_document_lists_groups() {
        let mut handlers = ToolHandlers::new(Arc::new(TypeScriptSource::new()), false);
        let roots = payload(
            handlers
                .handle_open_document(&json!({"path": "models.ts", "text": DOCUMENT}))
                .unwrap(),
        );

        assert_eq!(item_labels(&roots), vec!["🏛️ Entity", "📨 Dto"]);
        assert_eq!(roots["hasPins"], false);
        assert_eq!(roots["items"][0]["id"], "0");
    }

    #[test]
    fn test_get_children_by_id() {
        let handlers = handlers();
        let children = payload(handlers.handle_get_children(&json!({"id": "0/0"})).unwrap());

        assert_eq!(
            item_labels(&children),
            vec!["🔹 id: 🟨 number", "🔹 name: 🟦 string"]
        );
        assert_eq!(children["items"][1]["id"], "0/0/1");
    }

    #[test]
    fn test_pin_sets_has_pins() {
        let mut handlers = handlers();
        let roots = payload(handlers.handle_pin(&json!({"id": "0/0"})).unwrap());

        assert_eq!(roots["changed"], true);
        assert_eq!(roots["hasPins"], true);
        assert_eq!(item_labels(&roots)[0], "📌 UserEntity");

        let again = payload(handlers.handle_pin(&json!({"id": "0"})).unwrap());
        assert_eq!(again["changed"], false);

        let unpinned = payload(handlers.handle_unpin(&json!({"id": "0"})).unwrap());
        assert_eq!(unpinned["hasPins"], false);
    }

    #[test]
    fn test_compare_two_entities() {
        let mut handlers = handlers();
        handlers
            .handle_select_for_comparison(&json!({"id": "0/0"}))
            .unwrap();
        let roots = payload(
            handlers
                .handle_select_for_comparison(&json!({"id": "1/0"}))
                .unwrap(),
        );

        assert_eq!(roots["comparisonActive"], true);
        assert_eq!(item_labels(&roots)[2], "🔍 UserEntity ↔ UserDto");

        let sections = payload(handlers.handle_get_children(&json!({"id": "2"})).unwrap());
        assert_eq!(
            item_labels(&sections),
            vec!["Common Properties (1)", "UserEntity (1)", "UserDto (1)"]
        );

        let cleared = payload(handlers.handle_clear_comparison(&json!({})).unwrap());
        assert_eq!(cleared["comparisonActive"], false);
    }

    #[test]
    fn test_filter_and_clear() {
        let mut handlers = handlers();
        let filtered = payload(handlers.handle_set_filter(&json!({"text": "Email"})).unwrap());
        assert_eq!(item_labels(&filtered), vec!["📨 Dto"]);
        assert_eq!(filtered["filter"], "email");

        let cleared = payload(handlers.handle_set_filter(&json!({"text": null})).unwrap());
        assert_eq!(item_labels(&cleared), vec!["🏛️ Entity", "📨 Dto"]);
        assert!(handlers.handle_set_filter(&json!({"text": 3})).is_err());
    }

    #[test]
    fn test_locate_and_reveal_next() {
        let mut handlers = handlers();
        let first = payload(
            handlers
                .handle_locate_and_reveal_next(&json!({"name": "id"}))
                .unwrap(),
        );
        assert_eq!(first["occurrences"], 2);
        assert_eq!(first["index"], 0);
        assert_eq!(first["position"]["line"], 1);

        let missing = payload(
            handlers
                .handle_locate_and_reveal_next(&json!({"name": "OrderEntity"}))
                .unwrap(),
        );
        assert_eq!(missing, json!("No occurrences of 'OrderEntity' found."));
    }

    #[test]
    fn test_bad_arguments_are_errors() {
        let mut handlers = handlers();
        assert!(handlers.handle_pin(&json!({})).is_err());
        assert!(handlers.handle_pin(&json!({"id": "a/b"})).is_err());
        assert!(handlers.handle_open_document(&json!({})).is_err());

        // a well-formed id that points nowhere is a no-op
        let roots = payload(handlers.handle_pin(&json!({"id": "7/7"})).unwrap());
        assert_eq!(roots["changed"], false);
    }

    #[test]
    fn test_close_document_shows_placeholder() {
        let mut handlers = handlers();
        handlers.handle_pin(&json!({"id": "0/0"})).unwrap();
        let roots = payload(handlers.handle_close_document(&json!({})).unwrap());

        assert_eq!(roots["items"].as_array().unwrap().len(), 1);
        assert_eq!(roots["items"][0]["kind"], "info");
        assert_eq!(roots["hasPins"], false);
    }
}
