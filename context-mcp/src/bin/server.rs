//! Context Fabric MCP server binary.
//!
//! Implements the Model Context Protocol's `initialize`/`tools/list`/
//! `tools/call`/`shutdown` methods over stdio. This binary is a thin
//! translator: it frames JSON-RPC traffic and hands tool calls off to
//! [`context_mcp::tools`], which is where the actual argument parsing and
//! engine dispatch lives.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use context_core::config::FabricConfig;
use context_core::engine::EngineRegistry;
use context_mcp::jsonrpc::{
    read_next_message, write_response_with_length, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
};
use context_mcp::tools::{self, ToolError};
use context_storage::LibsqlStorageFactory;

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error(transparent)]
    Engine(#[from] context_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Local persistent-memory service for AI coding assistants, exposed over
/// JSON-RPC on stdio.
#[derive(Debug, Parser)]
#[command(name = "context-fabric-mcp", version)]
struct Cli {
    /// Project root this server instance serves. Defaults to the current
    /// working directory; tools may still address another project
    /// explicitly via their `project_path` argument.
    #[arg(long)]
    project_path: Option<String>,

    /// Path to the YAML configuration file. Defaults to
    /// `<storage root>/config.yaml`.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: String,
    capabilities: Value,
    #[serde(rename = "serverInfo")]
    server_info: Value,
}

#[derive(Debug, Serialize)]
struct McpTool {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ListToolsResult {
    tools: Vec<McpTool>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    arguments: Option<Value>,
}

#[derive(Debug, Serialize)]
struct CallToolResult {
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Content {
    #[serde(rename = "text")]
    Text { text: String },
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(log_level_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_path = cli
        .project_path
        .or_else(|| {
            std::env::current_dir()
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| ".".to_string());

    info!("Starting Context Fabric MCP server for project {project_path}");

    let config = load_config(cli.config)?;
    let factory = Arc::new(LibsqlStorageFactory::new(config.clone()));
    let registry = EngineRegistry::new(config, factory).await?;
    // Warm the default project's engine so the first tool call doesn't pay
    // for lazy tier-2/code-index opening on top of the embedding model's
    // own cold start.
    registry.engine_for(&project_path).await?;

    run_jsonrpc_server(registry, project_path).await?;
    Ok(())
}

/// `LOG_LEVEL` is the variable this server recognizes; fall back to `info`
/// rather than requiring `RUST_LOG` the way `EnvFilter::from_default_env`
/// would.
fn log_level_filter() -> tracing_subscriber::EnvFilter {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::EnvFilter::try_new(&level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn load_config(explicit: Option<PathBuf>) -> Result<FabricConfig, ServerError> {
    let path = explicit.unwrap_or_else(|| {
        FabricConfig::default().storage.root_dir.join("config.yaml")
    });
    Ok(FabricConfig::load(&path)?)
}

async fn run_jsonrpc_server(
    registry: EngineRegistry,
    default_project_path: String,
) -> Result<(), ServerError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();

    loop {
        match read_next_message(&mut handle) {
            Ok(None) => {
                info!("Received EOF, shutting down");
                break;
            }
            Ok(Some((line, is_lsp))) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<JsonRpcRequest>(line) {
                    Ok(request) => {
                        if let Some(response) =
                            handle_request(request, &registry, &default_project_path).await
                        {
                            write_response(&mut stdout, &response, is_lsp)?;
                        }
                    }
                    Err(e) => {
                        error!("Failed to parse JSON-RPC request: {e}");
                        let response = JsonRpcResponse {
                            jsonrpc: "2.0".to_string(),
                            id: None,
                            result: None,
                            error: Some(JsonRpcError {
                                code: -32700,
                                message: "Parse error".to_string(),
                                data: Some(json!({"details": e.to_string()})),
                            }),
                        };
                        write_response(&mut stdout, &response, is_lsp)?;
                    }
                }
            }
            Err(e) => {
                error!("Error reading from stdin: {e}");
                break;
            }
        }
    }

    registry.shutdown().await?;
    info!("Context Fabric MCP server shutting down");
    Ok(())
}

fn write_response(
    stdout: &mut io::Stdout,
    response: &JsonRpcResponse,
    is_lsp: bool,
) -> Result<(), ServerError> {
    let body = serde_json::to_string(response).unwrap_or_else(|e| {
        json!({
            "jsonrpc": "2.0",
            "id": Value::Null,
            "error": {"code": -32603, "message": format!("response serialization failed: {e}")}
        })
        .to_string()
    });
    if is_lsp {
        write_response_with_length(stdout, &body)?;
    } else {
        writeln!(stdout, "{body}")?;
        stdout.flush()?;
    }
    Ok(())
}

async fn handle_request(
    request: JsonRpcRequest,
    registry: &EngineRegistry,
    default_project_path: &str,
) -> Option<JsonRpcResponse> {
    // Notifications (no id, or an explicit null id) must not produce a response.
    if request.id.is_none() || matches!(request.id, Some(Value::Null)) {
        return None;
    }

    match request.method.as_str() {
        "initialize" => Some(handle_initialize(request)),
        "tools/list" => Some(handle_list_tools(request)),
        "tools/call" => Some(handle_call_tool(request, registry, default_project_path).await),
        "shutdown" => Some(JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: Some(Value::Null),
            error: None,
        }),
        other => {
            warn!("Unknown method: {other}");
            Some(JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32601,
                    message: "Method not found".to_string(),
                    data: None,
                }),
            })
        }
    }
}

fn handle_initialize(request: JsonRpcRequest) -> JsonRpcResponse {
    let result = InitializeResult {
        protocol_version: "2025-06-18".to_string(),
        capabilities: json!({"tools": {"listChanged": false}}),
        server_info: json!({
            "name": "context-fabric-mcp",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    };
    ok_response(request.id, &result)
}

fn handle_list_tools(request: JsonRpcRequest) -> JsonRpcResponse {
    let tools = tools::list_tool_definitions()
        .into_iter()
        .map(|t| McpTool {
            name: t.name,
            description: t.description,
            input_schema: t.input_schema,
        })
        .collect();
    ok_response(request.id, &ListToolsResult { tools })
}

async fn handle_call_tool(
    request: JsonRpcRequest,
    registry: &EngineRegistry,
    default_project_path: &str,
) -> JsonRpcResponse {
    let params: CallToolParams = match request.params.and_then(|p| serde_json::from_value(p).ok())
    {
        Some(params) => params,
        None => {
            return JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32602,
                    message: "Invalid params".to_string(),
                    data: None,
                }),
            };
        }
    };

    info!("Handling tools/call for tool: {}", params.name);
    match tools::call_tool(registry, default_project_path, &params.name, params.arguments).await {
        Ok(value) => {
            let content = vec![Content::Text {
                text: value.to_string(),
            }];
            ok_response(request.id, &CallToolResult { content })
        }
        Err(ToolError::NotFound(name)) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: "Tool not found".to_string(),
                data: Some(json!({"tool": name})),
            }),
        },
        Err(ToolError::InvalidParams(details)) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: None,
            error: Some(JsonRpcError {
                code: -32602,
                message: "Invalid params".to_string(),
                data: Some(json!({"details": details})),
            }),
        },
        Err(ToolError::Engine(e)) => {
            error!("Tool '{}' failed: {e}", params.name);
            JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32000,
                    message: "Tool execution failed".to_string(),
                    data: Some(json!({"kind": e.kind(), "message": e.to_string()})),
                }),
            }
        }
    }
}

fn ok_response<T: Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(value),
            error: None,
        },
        Err(e) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: -32603,
                message: "Internal error".to_string(),
                data: Some(json!({"details": format!("response serialization failed: {e}")})),
            }),
        },
    }
}
