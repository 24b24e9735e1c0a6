use super::protocol::{error_response, success_response, Protocol};
use super::types::*;
use crate::handlers::tool_handlers::ToolHandlers;
use crate::parser::typescript::TypeScriptSource;
use crate::parser::SymbolSource;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "entity-structure-mcp";
const SERVER_VERSION: &str = "0.1.0";

const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Runtime settings, read from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Quiet period before a change notification is sent
    pub debounce: Duration,
    /// Add the declarations behind named imports to the catalog
    pub include_imports: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            include_imports: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let debounce = std::env::var("STRUCTURE_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);

        let include_imports = std::env::var("STRUCTURE_INCLUDE_IMPORTS")
            .ok()
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.include_imports);

        Self {
            debounce,
            include_imports,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Forward the newest revision once `changes` has been quiet for `quiet`.
/// Bursts collapse into one message; the last revision is always delivered.
pub fn spawn_debouncer(mut changes: watch::Receiver<u64>, quiet: Duration) -> mpsc::Receiver<u64> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(quiet) => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            let revision = *changes.borrow_and_update();
            if tx.send(revision).await.is_err() {
                break;
            }
        }
    });

    rx
}

/// Main MCP Server
pub struct McpServer<R = tokio::io::Stdin, W = tokio::io::Stdout> {
    protocol: Protocol<R, W>,
    config: ServerConfig,
    tool_handlers: ToolHandlers,
}

impl McpServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        Ok(Self::with_io(
            config,
            Arc::new(TypeScriptSource::new()),
            Protocol::stdio(),
        ))
    }

    pub async fn start(self) -> Result<()> {
        self.serve().await?;
        Ok(())
    }
}

impl<R, W> McpServer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn with_io(
        config: ServerConfig,
        source: Arc<dyn SymbolSource>,
        protocol: Protocol<R, W>,
    ) -> Self {
        let tool_handlers = ToolHandlers::new(source, config.include_imports);
        Self {
            protocol,
            config,
            tool_handlers,
        }
    }

    /// Serve until the client disconnects, then hand back the writer
    pub async fn serve(mut self) -> Result<W> {
        let mut notifications = spawn_debouncer(self.tool_handlers.subscribe(), self.config.debounce);

        tracing::info!("MCP server started, waiting for requests...");

        // Single writer: responses and notifications never interleave
        loop {
            tokio::select! {
                request = self.protocol.read_request() => match request {
                    Ok(Some(request)) => {
                        if let Some(response) = self.handle_request(request) {
                            if let Err(e) = self.protocol.send_response(response).await {
                                tracing::error!("Failed to send response: {}", e);
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Client disconnected");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read request: {}", e);
                        let response = error_response(Value::Null, JsonRpcError::parse_error());
                        let _ = self.protocol.send_response(response).await;
                    }
                },
                Some(revision) = notifications.recv() => {
                    tracing::debug!("Structure changed, revision {}", revision);
                    if let Err(e) = self
                        .protocol
                        .send_notification(STRUCTURE_CHANGED, StructureChanged { revision })
                        .await
                    {
                        tracing::error!("Failed to send notification: {}", e);
                    }
                }
            }
        }

        Ok(self.protocol.into_writer())
    }

    /// `None` for notifications, which get no response
    fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Received request: method={}, id={:?}", request.method, request.id);

        let Some(id) = request.id else {
            tracing::debug!("Notification {} ignored", request.method);
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => success_response(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params),
            _ => error_response(id, JsonRpcError::method_not_found()),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Value, params: Value) -> JsonRpcResponse {
        match serde_json::from_value::<InitializeRequest>(params) {
            Ok(req) => {
                tracing::info!(
                    "Client connected: {} v{} (protocol {})",
                    req.clientInfo.name,
                    req.clientInfo.version,
                    req.protocolVersion
                );
            }
            Err(e) => {
                return error_response(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                );
            }
        }

        let response = InitializeResponse {
            protocolVersion: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    listChanged: Some(false),
                },
            },
            serverInfo: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        success_response(id, response)
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let node_id = json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Node id as returned in tree items, e.g. \"1/0\""
                }
            },
            "required": ["id"]
        });
        let no_arguments = json!({ "type": "object", "properties": {} });

        let tools = vec![
            tool(
                "open_document",
                "Make a TypeScript file the active document and list its classes and enums grouped by naming suffix (Entity, Dto, Type, Enum, Other).",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "ABSOLUTE path of the document. Named imports are resolved relative to it."
                        },
                        "text": {
                            "type": "string",
                            "description": "Current document text. Read from disk when omitted."
                        }
                    },
                    "required": ["path"]
                }),
            ),
            tool(
                "update_document",
                "Replace the active document's text and rebuild the catalog. Pins and comparisons are kept.",
                json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": "string", "description": "New document text." }
                    },
                    "required": ["text"]
                }),
            ),
            tool(
                "close_document",
                "Close the active document and reset pins, filter and comparison.",
                no_arguments.clone(),
            ),
            tool(
                "get_roots",
                "Top-level tree items: pinned entities, then groups, then the comparison.",
                no_arguments.clone(),
            ),
            tool("get_children", "Children of a tree item.", node_id.clone()),
            tool(
                "pin",
                "Pin an entity so it stays at the top across refreshes. Pinning twice has no effect.",
                node_id.clone(),
            ),
            tool("unpin", "Remove an entity from the pinned list.", node_id.clone()),
            tool(
                "select_for_comparison",
                "Select an entity for comparison. The second selection produces a member diff; a further selection starts a new comparison.",
                node_id,
            ),
            tool(
                "clear_comparison",
                "Discard pending selections and the comparison result.",
                no_arguments.clone(),
            ),
            tool(
                "set_filter",
                "Show only entities or members whose label contains the text, ignoring case. Empty or null clears the filter.",
                json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": ["string", "null"], "description": "Substring to match." }
                    }
                }),
            ),
            tool("clear_filter", "Show the unfiltered catalog.", no_arguments),
            tool(
                "locate_and_reveal_next",
                "Position of the next occurrence of a name in the active document. Repeated calls cycle through all occurrences.",
                json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Literal text to find, case-sensitive." }
                    },
                    "required": ["name"]
                }),
            ),
        ];

        success_response(id, ListToolsResponse { tools })
    }

    fn handle_tools_call(&mut self, id: Value, params: Value) -> JsonRpcResponse {
        let call_request: CallToolRequest = match serde_json::from_value(params) {
            Ok(req) => req,
            Err(e) => {
                return error_response(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                );
            }
        };

        let handlers = &mut self.tool_handlers;
        let args = &call_request.arguments;
        let result = match call_request.name.as_str() {
            "open_document" => handlers.handle_open_document(args),
            "update_document" => handlers.handle_update_document(args),
            "close_document" => handlers.handle_close_document(args),
            "get_roots" => handlers.handle_get_roots(args),
            "get_children" => handlers.handle_get_children(args),
            "pin" => handlers.handle_pin(args),
            "unpin" => handlers.handle_unpin(args),
            "select_for_comparison" => handlers.handle_select_for_comparison(args),
            "clear_comparison" => handlers.handle_clear_comparison(args),
            "set_filter" => handlers.handle_set_filter(args),
            "clear_filter" => handlers.handle_clear_filter(args),
            "locate_and_reveal_next" => handlers.handle_locate_and_reveal_next(args),
            _ => {
                return error_response(
                    id,
                    JsonRpcError::invalid_params(format!("Unknown tool: {}", call_request.name)),
                );
            }
        };

        let response = match result {
            Ok(content) => CallToolResponse {
                content,
                isError: None,
            },
            Err(e) => {
                tracing::warn!("Tool {} failed: {:#}", call_request.name, e);
                CallToolResponse {
                    content: vec![Content::Text {
                        text: format!("Error: {:#}", e),
                    }],
                    isError: Some(true),
                }
            }
        };
        success_response(id, response)
    }
}

fn tool(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        inputSchema: input_schema,
    }
}
