//! Markdown output buffer and comment rendering.

use crate::syntax::Comment;

/// Deepest heading level Markdown supports.
pub const MAX_HEADING_DEPTH: usize = 6;

/// Separator written after every emitted line.
pub const LINE_SEPARATOR: &str = "\n";

/// Mutable state threaded through one extraction.
#[derive(Debug)]
pub struct RenderContext {
    depth: usize,
    out: String,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            depth: 1,
            out: String::new(),
        }
    }

    /// Heading level for a declaration visited now.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn descend(&mut self) {
        self.depth += 1;
    }

    pub fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Write `N` hashes, a space and `name` on their own line.
    pub fn heading(&mut self, name: &str) {
        self.out.push_str(&"#".repeat(self.depth));
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str(LINE_SEPARATOR);
    }

    /// Write one comment below the current heading, if anything is left of it.
    pub fn comment(&mut self, comment: &Comment) {
        if let Some(text) = fragment(&comment.content) {
            self.out.push_str(text);
            self.out.push_str(LINE_SEPARATOR);
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop one leading `/`, trim, and discard what ends up empty.
fn fragment(content: &str) -> Option<&str> {
    let content = content.strip_prefix('/').unwrap_or(content);
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{CommentKind, Span};

    fn comment(content: &str) -> Comment {
        Comment::new(CommentKind::Block, content, Span::default())
    }

    #[test]
    fn test_fragment() {
        assert_eq!(fragment("  hello  "), Some("hello"));
        assert_eq!(fragment("/ hello"), Some("hello"));
        assert_eq!(fragment("//twice"), Some("/twice"));
        assert_eq!(fragment("/"), None);
        assert_eq!(fragment("/   \n  "), None);
        assert_eq!(fragment(""), None);
    }

    #[test]
    fn test_heading_uses_current_depth() {
        let mut ctx = RenderContext::new();
        ctx.heading("Top");
        ctx.descend();
        ctx.descend();
        ctx.heading("deep");
        ctx.ascend();
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.finish(), "# Top\n### deep\n");
    }

    #[test]
    fn test_comment_lines() {
        let mut ctx = RenderContext::new();
        ctx.heading("run");
        ctx.comment(&comment(" first "));
        ctx.comment(&comment("/"));
        ctx.comment(&comment("\n * second\n "));
        assert_eq!(ctx.finish(), "# run\nfirst\n* second\n");
    }
}
