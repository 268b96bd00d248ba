//! Documentation extraction: syntax tree in, Markdown out.
//!
//! The walker visits declarations in source order and emits one Markdown
//! section per documented declaration. The heading level is the number of
//! enclosing declarations plus one. Comments the parser left unattached
//! right before a declaration are folded into its section, ahead of the
//! attached comment.
//!
//! ```text
//! /** A service. */            # Service
//! class Service {              A service.
//!     /** Retry count. */      ## retries
//!     int retries;             Retry count.
//! }
//! ```
//!
//! Extraction is a pure function of the tree: no I/O, no shared state.

mod orphans;
mod render;
mod walker;

use thiserror::Error;

use crate::syntax::{NodeId, SourceParser, SyntaxTree};

pub use orphans::collect_comments;
pub use render::{RenderContext, LINE_SEPARATOR, MAX_HEADING_DEPTH};

/// Errors that abort extraction of a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The source could not be parsed.
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    /// Declarations nest deeper than Markdown headings can express.
    #[error("heading depth {depth} at `{name}` exceeds the Markdown maximum of {max}", max = MAX_HEADING_DEPTH)]
    HeadingDepthExceeded { depth: usize, name: String },
    /// A node was not found among its parent's children. Always a defect.
    #[error("node {node} is not a child of its parent")]
    NotAChild { node: NodeId },
}

impl ExtractError {
    /// Whether this error signals a bug rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(self, ExtractError::NotAChild { .. })
    }
}

/// Render the documentation of `tree` as Markdown.
///
/// Returns an empty string when nothing in the tree is documented.
pub fn extract(tree: &SyntaxTree) -> Result<String, ExtractError> {
    let mut ctx = RenderContext::new();
    walker::walk(tree, tree.root(), &mut ctx)?;
    Ok(ctx.finish())
}

/// Parse `source` with `parser` and extract its documentation.
pub fn extract_source(parser: &dyn SourceParser, source: &[u8]) -> Result<String, ExtractError> {
    let tree = parser.parse(source)?;
    extract(&tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Comment, CommentKind, NodeKind, Span};

    #[test]
    fn test_error_messages() {
        let err = ExtractError::HeadingDepthExceeded {
            depth: 7,
            name: "deep".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "heading depth 7 at `deep` exceeds the Markdown maximum of 6"
        );

        let err = ExtractError::Syntax {
            line: 3,
            column: 9,
            message: "missing `;`".to_string(),
        };
        assert_eq!(err.to_string(), "syntax error at 3:9: missing `;`");
        assert!(!err.is_defect());
    }

    struct FixedParser;

    impl SourceParser for FixedParser {
        fn parse(&self, source: &[u8]) -> Result<SyntaxTree, ExtractError> {
            if source.is_empty() {
                return Err(ExtractError::Syntax {
                    line: 1,
                    column: 1,
                    message: "empty".to_string(),
                });
            }
            let mut tree = SyntaxTree::new(Span::lines(1, 1, 5, 1));
            let root = tree.root();
            let class = tree.push_declaration(
                root,
                NodeKind::TypeDeclaration,
                "Fixed",
                Span::lines(2, 1, 4, 2),
            );
            tree.attach_comment(
                class,
                Comment::new(CommentKind::Javadoc, " Fixed doc. ", Span::lines(1, 1, 1, 17)),
            );
            Ok(tree)
        }

        fn language(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_extract_source_chains_parse_and_extract() {
        let markdown = extract_source(&FixedParser, b"class Fixed {}").unwrap();
        assert_eq!(markdown, "# Fixed\nFixed doc.\n");
    }

    #[test]
    fn test_extract_source_propagates_syntax_error() {
        let err = extract_source(&FixedParser, b"").unwrap_err();
        assert!(matches!(err, ExtractError::Syntax { .. }));
    }
}
