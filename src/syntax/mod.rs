//! Source parsing into the arena syntax tree.
//!
//! This module provides:
//! - `SyntaxTree`: the read-only tree the extractor walks
//! - `SourceParser` trait: abstract interface for language front ends
//! - A factory-based parser registry keyed by file extension
//! - The tree-sitter Java front end

use std::collections::HashMap;
use std::sync::RwLock;

use crate::extract::ExtractError;

mod tree;

#[cfg(feature = "tree-sitter")]
pub mod java;

pub use tree::{Comment, CommentKind, NodeId, NodeKind, Span, SyntaxNode, SyntaxTree};

/// Turns raw source bytes into a [`SyntaxTree`].
pub trait SourceParser: Send + Sync {
    /// Parse a whole compilation unit.
    ///
    /// Fails with [`ExtractError::Syntax`] when the source is malformed.
    fn parse(&self, source: &[u8]) -> Result<SyntaxTree, ExtractError>;

    /// Return the language this parser handles (e.g., "java").
    fn language(&self) -> &str;
}

/// Factory function type for creating parser instances.
pub type ParserFactory = fn() -> Box<dyn SourceParser>;

lazy_static::lazy_static! {
    /// Global parser registry mapping file extensions to parser factories.
    static ref REGISTRY: RwLock<HashMap<String, ParserFactory>> = RwLock::new(HashMap::new());
}

/// Register a parser factory for a file extension.
/// Extension should include the dot (e.g., ".java").
pub fn register(ext: &str, factory: ParserFactory) {
    let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    registry.insert(ext.to_string(), factory);
}

/// Get a parser for the given file extension.
/// Returns None if no parser is registered for the extension.
pub fn for_extension(ext: &str) -> Option<Box<dyn SourceParser>> {
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    registry.get(ext).map(|factory| factory())
}

/// Return all registered file extensions.
pub fn supported_extensions() -> Vec<String> {
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    let mut exts: Vec<String> = registry.keys().cloned().collect();
    exts.sort();
    exts
}

/// Initialize the parser registry with all available front ends.
/// Call this once at startup before using parsers.
#[cfg(feature = "tree-sitter")]
pub fn init() {
    java::register();
}

/// Initialize (no-op when tree-sitter is disabled).
#[cfg(not(feature = "tree-sitter"))]
pub fn init() {}
