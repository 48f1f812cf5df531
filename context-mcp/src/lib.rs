#![allow(clippy::missing_errors_doc)]

//! # Context Fabric MCP Server
//!
//! JSON-RPC stdio transport exposing the `context-core` memory engine as a
//! set of named tools. [`jsonrpc`] owns the wire framing
//! (line-delimited JSON or LSP `Content-Length` framing); [`tools`] owns
//! the tool schemas and the translation from JSON arguments to
//! `ContextEngine` calls and back. The binary entry point lives in
//! `bin/server.rs`.

pub mod jsonrpc;
pub mod tools;
