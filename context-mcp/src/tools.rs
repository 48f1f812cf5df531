//! Tool schemas and dispatch for the JSON-RPC `tools/list`/`tools/call`
//! surface. Each function here parses a tool's JSON arguments,
//! calls the matching [`ContextEngine`] operation, and serializes its
//! result back to JSON — the RPC layer (`bin/server.rs`) only frames these
//! values as JSON-RPC responses, it never touches the engine directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use context_core::api::{
    CodeSearchOptions, ContextWindowPrefs, ListOptions, RecallFilter, RecallOptions, StoreOptions,
    UpdateRequest,
};
use context_core::engine::{ContextEngine, EngineRegistry};
use context_core::error::Error;
use context_core::model::{Metadata, SymbolKind, Tier};

/// Failure to satisfy a `tools/call` request, kept distinct from
/// [`Error`] so the RPC layer can tell "no such tool" (-32601) and
/// "malformed arguments" (-32602) apart from an engine-level failure
/// (-32000), each preserving the underlying error kind name alongside a
/// human-readable message.
#[derive(Debug)]
pub enum ToolError {
    NotFound(String),
    InvalidParams(String),
    Engine(Error),
}

impl From<Error> for ToolError {
    fn from(e: Error) -> Self {
        Self::Engine(e)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "unknown tool '{name}'"),
            Self::InvalidParams(msg) => write!(f, "invalid params: {msg}"),
            Self::Engine(e) => write!(f, "{e}"),
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Engine(Error::Serialization(e)))
}

fn tier_from_u8(v: u8) -> Result<Tier, ToolError> {
    Tier::from_u8(v).ok_or_else(|| ToolError::Engine(Error::InvalidTier(v)))
}

/// One entry of the `tools/list` response: name, human description, and a
/// JSON Schema for its arguments (mirrors the MCP tool-descriptor shape).
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

fn descriptor(name: &str, description: &str, input_schema: Value) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Every tool this server exposes, with its JSON Schema.
pub fn list_tool_definitions() -> Vec<ToolDescriptor> {
    vec![
        descriptor(
            "store",
            "Store a new memory, routed to the appropriate tier",
            json!({
                "type": "object",
                "properties": {
                    "type": {"type": "string"},
                    "content": {"type": "string"},
                    "metadata": {"type": "object"},
                    "layer": {"type": "integer", "enum": [1, 2, 3]},
                    "ttl": {"type": "integer"},
                    "pinned": {"type": "boolean"},
                    "project_path": {"type": "string"}
                },
                "required": ["type", "content"]
            }),
        ),
        descriptor(
            "recall",
            "Hybrid keyword + semantic recall across all three tiers",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "session_id": {"type": "string"},
                    "limit": {"type": "integer"},
                    "threshold": {"type": "number"},
                    "mode": {"type": "string", "enum": ["hybrid", "semantic", "keyword"]},
                    "filter": {"type": "object"},
                    "project_path": {"type": "string"}
                },
                "required": ["query", "session_id"]
            }),
        ),
        descriptor(
            "get",
            "Fetch a memory by id, searching L1 then L2 then L3",
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "project_path": {"type": "string"}
                },
                "required": ["id"]
            }),
        ),
        descriptor(
            "update",
            "Apply an in-place change to a memory, optionally promoting its tier",
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "content": {"type": "string"},
                    "metadata": {"type": "object"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "weight": {"type": "integer"},
                    "pinned": {"type": "boolean"},
                    "target_tier": {"type": "integer", "enum": [1, 2, 3]},
                    "project_path": {"type": "string"}
                },
                "required": ["id"]
            }),
        ),
        descriptor(
            "delete",
            "Delete a memory by id, searching across tiers",
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "project_path": {"type": "string"}
                },
                "required": ["id"]
            }),
        ),
        descriptor(
            "list",
            "Paginated browse across tiers with optional per-tier stats",
            json!({
                "type": "object",
                "properties": {
                    "tier": {"type": "integer", "enum": [1, 2, 3]},
                    "type": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "limit": {"type": "integer"},
                    "offset": {"type": "integer"},
                    "stats": {"type": "boolean"},
                    "project_path": {"type": "string"}
                }
            }),
        ),
        descriptor(
            "promote",
            "Copy a memory up one tier and delete it from the source tier",
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "from_tier": {"type": "integer", "enum": [1, 2]},
                    "project_path": {"type": "string"}
                },
                "required": ["id", "from_tier"]
            }),
        ),
        descriptor(
            "summarize",
            "Archive a project tier (L2) or run decay and report deletions (L3)",
            json!({
                "type": "object",
                "properties": {
                    "tier": {"type": "integer", "enum": [2, 3]},
                    "older_than_days": {"type": "number"},
                    "project_path": {"type": "string"}
                },
                "required": ["tier", "older_than_days"]
            }),
        ),
        descriptor(
            "orient",
            "Report current time context, offline gap, and recent activity; triggers decay and code-index refresh",
            json!({
                "type": "object",
                "properties": {
                    "timezone": {"type": "string"},
                    "project_path": {"type": "string"},
                    "expression": {"type": "string"},
                    "also": {"type": "array", "items": {"type": "string"}}
                }
            }),
        ),
        descriptor(
            "searchCode",
            "Search the project's source tree by text, symbol name, or semantic similarity",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "mode": {"type": "string", "enum": ["text", "symbol", "semantic"]},
                    "language": {"type": "string"},
                    "file_pattern": {"type": "string"},
                    "symbol_kind": {"type": "string"},
                    "limit": {"type": "integer"},
                    "threshold": {"type": "number"},
                    "include_content": {"type": "boolean"},
                    "project_path": {"type": "string"}
                },
                "required": ["query"]
            }),
        ),
    ]
}

async fn resolve_engine(
    registry: &EngineRegistry,
    default_project_path: &str,
    explicit: Option<&str>,
) -> Result<Arc<ContextEngine>, ToolError> {
    let path = explicit.unwrap_or(default_project_path);
    registry
        .engine_for(path)
        .await
        .map_err(ToolError::Engine)
}

/// Dispatch one `tools/call` by name. Returns the tool's JSON result, ready
/// to embed in a JSON-RPC response.
pub async fn call_tool(
    registry: &EngineRegistry,
    default_project_path: &str,
    name: &str,
    arguments: Option<Value>,
) -> Result<Value, ToolError> {
    let args = arguments.unwrap_or_else(|| json!({}));
    match name {
        "store" => store(registry, default_project_path, args).await,
        "recall" => recall(registry, default_project_path, args).await,
        "get" => get(registry, default_project_path, args).await,
        "update" => update(registry, default_project_path, args).await,
        "delete" => delete(registry, default_project_path, args).await,
        "list" => list(registry, default_project_path, args).await,
        "promote" => promote(registry, default_project_path, args).await,
        "summarize" => summarize(registry, default_project_path, args).await,
        "orient" => orient(registry, default_project_path, args).await,
        "searchCode" => search_code(registry, default_project_path, args).await,
        other => Err(ToolError::NotFound(other.to_string())),
    }
}

#[derive(Deserialize)]
struct StoreArgs {
    #[serde(rename = "type")]
    memory_type: String,
    content: String,
    #[serde(default)]
    metadata: Metadata,
    layer: Option<u8>,
    ttl: Option<u64>,
    pinned: Option<bool>,
    project_path: Option<String>,
}

async fn store(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: StoreArgs = parse_args(args)?;
    let layer = parsed.layer.map(tier_from_u8).transpose()?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let opts = StoreOptions {
        metadata: parsed.metadata,
        layer,
        ttl: parsed.ttl,
        pinned: parsed.pinned,
    };
    let result = engine.store(parsed.content, &parsed.memory_type, opts).await?;
    to_json(&result)
}

#[derive(Deserialize)]
struct RecallFilterArgs {
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    tiers: Vec<u8>,
    #[serde(default)]
    tags: Vec<String>,
    project_path: Option<String>,
}

#[derive(Deserialize)]
struct RecallArgs {
    query: String,
    #[allow(dead_code)]
    session_id: String,
    #[serde(default = "default_recall_limit")]
    limit: usize,
    #[serde(default = "default_recall_threshold")]
    threshold: f64,
    #[serde(default)]
    mode: context_core::api::RecallMode,
    filter: Option<RecallFilterArgs>,
    project_path: Option<String>,
}

fn default_recall_limit() -> usize {
    10
}

fn default_recall_threshold() -> f64 {
    0.7
}

async fn recall(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: RecallArgs = parse_args(args)?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let filter = match parsed.filter {
        Some(f) => {
            let mut tiers = Vec::with_capacity(f.tiers.len());
            for t in f.tiers {
                tiers.push(tier_from_u8(t)?);
            }
            Some(RecallFilter {
                types: f.types,
                tiers,
                tags: f.tags,
                project_path: f.project_path,
            })
        }
        None => None,
    };
    let opts = RecallOptions {
        mode: parsed.mode,
        limit: parsed.limit,
        threshold: parsed.threshold,
        filter,
    };
    let result = engine.recall(&parsed.query, opts).await?;
    to_json(&result)
}

#[derive(Deserialize)]
struct IdArgs {
    id: String,
    project_path: Option<String>,
}

async fn get(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: IdArgs = parse_args(args)?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let memory = engine.get(&parsed.id).await?;
    to_json(&memory)
}

#[derive(Deserialize)]
struct UpdateArgs {
    id: String,
    content: Option<String>,
    metadata: Option<Metadata>,
    tags: Option<Vec<String>>,
    weight: Option<u8>,
    pinned: Option<bool>,
    target_tier: Option<u8>,
    project_path: Option<String>,
}

async fn update(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: UpdateArgs = parse_args(args)?;
    let target_tier = parsed.target_tier.map(tier_from_u8).transpose()?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let req = UpdateRequest {
        content: parsed.content,
        metadata: parsed.metadata,
        tags: parsed.tags,
        weight: parsed.weight,
        pinned: parsed.pinned,
        target_tier,
    };
    engine.update(&parsed.id, req).await?;
    Ok(json!({"success": true}))
}

async fn delete(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: IdArgs = parse_args(args)?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let deleted = engine.delete(&parsed.id).await?;
    Ok(json!({"success": deleted}))
}

#[derive(Deserialize)]
struct ListArgs {
    tier: Option<u8>,
    #[serde(rename = "type")]
    memory_type: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    stats: bool,
    project_path: Option<String>,
}

async fn list(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: ListArgs = parse_args(args)?;
    let tier = parsed.tier.map(tier_from_u8).transpose()?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let opts = ListOptions {
        tier,
        memory_type: parsed.memory_type,
        tags: parsed.tags,
        limit: parsed.limit,
        offset: parsed.offset,
        stats: parsed.stats,
    };
    let result = engine.list(opts).await?;
    to_json(&result)
}

#[derive(Deserialize)]
struct PromoteArgs {
    id: String,
    from_tier: u8,
    project_path: Option<String>,
}

async fn promote(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: PromoteArgs = parse_args(args)?;
    let from_tier = tier_from_u8(parsed.from_tier)?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let result = engine.promote(&parsed.id, from_tier).await?;
    to_json(&result)
}

#[derive(Deserialize)]
struct SummarizeArgs {
    tier: u8,
    older_than_days: f64,
    project_path: Option<String>,
}

async fn summarize(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: SummarizeArgs = parse_args(args)?;
    let tier = tier_from_u8(parsed.tier)?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let result = engine.summarize(tier, parsed.older_than_days).await?;
    to_json(&result)
}

/// `expression`/`also` are accepted (matching the wire contract other
/// `orient` callers expect) but not
/// acted on: natural-language date resolution and multi-timezone
/// conversion are an external collaborator's job, so
/// this server only forwards `timezone` to the engine and otherwise
/// ignores them.
#[derive(Deserialize)]
struct OrientArgs {
    timezone: Option<String>,
    project_path: Option<String>,
    #[allow(dead_code)]
    expression: Option<String>,
    #[allow(dead_code)]
    also: Option<Vec<String>>,
}

async fn orient(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: OrientArgs = parse_args(args)?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let result = engine.orient(parsed.timezone).await?;
    to_json(&result)
}

#[derive(Deserialize)]
struct SearchCodeArgs {
    query: String,
    #[serde(default)]
    mode: context_core::api::CodeSearchMode,
    language: Option<String>,
    file_pattern: Option<String>,
    symbol_kind: Option<SymbolKind>,
    #[serde(default = "default_code_limit")]
    limit: usize,
    #[serde(default = "default_code_threshold")]
    threshold: f64,
    #[serde(default = "default_include_content")]
    include_content: bool,
    project_path: Option<String>,
}

fn default_code_limit() -> usize {
    10
}

fn default_code_threshold() -> f64 {
    0.5
}

fn default_include_content() -> bool {
    true
}

async fn search_code(
    registry: &EngineRegistry,
    default_project_path: &str,
    args: Value,
) -> Result<Value, ToolError> {
    let parsed: SearchCodeArgs = parse_args(args)?;
    let engine = resolve_engine(registry, default_project_path, parsed.project_path.as_deref())
        .await?;
    let opts = CodeSearchOptions {
        mode: parsed.mode,
        language: parsed.language,
        file_pattern: parsed.file_pattern,
        symbol_kind: parsed.symbol_kind,
        limit: parsed.limit,
        threshold: parsed.threshold,
        include_content: parsed.include_content,
    };
    let result = engine.search_code(&parsed.query, opts).await?;
    to_json(&result)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use context_storage::LibsqlStorageFactory;
    use tempfile::TempDir;

    async fn test_registry() -> (EngineRegistry, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = context_core::config::FabricConfig::default();
        config.storage.root_dir = dir.path().to_path_buf();
        let factory = Arc::new(LibsqlStorageFactory::new(config.clone()));
        let registry = EngineRegistry::new(config, factory).await.unwrap();
        (registry, dir)
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let (registry, _dir) = test_registry().await;
        let err = call_tool(&registry, "/project", "no-such-tool", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "no-such-tool"));
    }

    #[tokio::test]
    async fn store_with_missing_required_field_is_invalid_params() {
        let (registry, _dir) = test_registry().await;
        let err = call_tool(&registry, "/project", "store", Some(json!({"content": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn store_with_out_of_range_layer_surfaces_invalid_tier() {
        let (registry, _dir) = test_registry().await;
        let err = call_tool(
            &registry,
            "/project",
            "store",
            Some(json!({"type": "scratchpad", "content": "x", "layer": 9})),
        )
        .await
        .unwrap_err();
        match err {
            ToolError::Engine(e) => assert_eq!(e.kind(), "InvalidTier"),
            other => panic!("expected Engine(InvalidTier), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_then_get_round_trips_through_tier1() {
        let (registry, _dir) = test_registry().await;
        let stored = call_tool(
            &registry,
            "/project",
            "store",
            Some(json!({"type": "scratchpad", "content": "working note", "layer": 1})),
        )
        .await
        .unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        let fetched = call_tool(&registry, "/project", "get", Some(json!({"id": id})))
            .await
            .unwrap();
        assert_eq!(fetched["content"], "working note");
    }

    #[tokio::test]
    async fn get_missing_id_surfaces_not_found_kind() {
        let (registry, _dir) = test_registry().await;
        let err = call_tool(
            &registry,
            "/project",
            "get",
            Some(json!({"id": "does-not-exist"})),
        )
        .await
        .unwrap_err();
        match err {
            ToolError::Engine(e) => assert_eq!(e.kind(), "NotFound"),
            other => panic!("expected Engine(NotFound), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_reports_success_false_for_unknown_id() {
        let (registry, _dir) = test_registry().await;
        let result = call_tool(
            &registry,
            "/project",
            "delete",
            Some(json!({"id": "does-not-exist"})),
        )
        .await
        .unwrap();
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn list_tool_definitions_cover_every_spec_tool() {
        let names: Vec<String> = list_tool_definitions().into_iter().map(|t| t.name).collect();
        for expected in [
            "store", "recall", "get", "update", "delete", "list", "promote", "summarize",
            "orient", "searchCode",
        ] {
            assert!(names.contains(&expected.to_string()), "missing tool {expected}");
        }
    }
}

/// Not a JSON-RPC tool (not listed in `tools/list`); used directly by
/// `bin/server.rs` if a host ever needs the assembled context window
/// outside the tool-call surface.
#[allow(dead_code)]
pub async fn context_window(
    registry: &EngineRegistry,
    default_project_path: &str,
    project_path: Option<&str>,
    prefs: ContextWindowPrefs,
) -> Result<Value, ToolError> {
    let engine = resolve_engine(registry, default_project_path, project_path).await?;
    let result = engine.get_context_window(prefs).await?;
    to_json(&result)
}
