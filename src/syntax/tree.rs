//! Arena-backed syntax tree consumed by the extractor.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. Parent
//! links exist for upward traversal only; a node is owned by the arena,
//! never by its parent.

use std::fmt;

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    #[cfg(feature = "tree-sitter")]
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }

    /// A span covering `start_line:start_col` to `end_line:end_col`, without byte offsets.
    pub fn lines(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
            ..Default::default()
        }
    }

    /// Begin position used for source-order sorting.
    pub fn begin(&self) -> (usize, usize) {
        (self.start_line, self.start_col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// Stable index of a node inside a [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node represents, as far as documentation extraction cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Class, interface, enum or record declaration.
    TypeDeclaration,
    /// Field (or interface constant) declaration.
    FieldDeclaration,
    /// Method declaration. Constructors are `Other`.
    MethodDeclaration,
    /// A comment that was not attributed to any node.
    Comment,
    Other,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::TypeDeclaration => "type",
            NodeKind::FieldDeclaration => "field",
            NodeKind::MethodDeclaration => "method",
            NodeKind::Comment => "comment",
            NodeKind::Other => "other",
        }
    }

    /// Whether the walker emits a heading for this kind.
    pub fn is_documentable(&self) -> bool {
        matches!(
            self,
            NodeKind::TypeDeclaration | NodeKind::FieldDeclaration | NodeKind::MethodDeclaration
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comment flavour, as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// `// ...`
    Line,
    /// `/* ... */`
    Block,
    /// `/** ... */`
    Javadoc,
}

/// A source comment with its delimiters removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub kind: CommentKind,
    /// Raw text between the delimiters, untrimmed.
    pub content: String,
    pub span: Span,
}

impl Comment {
    pub fn new(kind: CommentKind, content: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            content: content.into(),
            span,
        }
    }
}

/// One node of the arena.
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    /// Display name for declarations; `None` for everything else.
    pub name: Option<String>,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Attached documentation comment. For `NodeKind::Comment` nodes this
    /// is the comment itself.
    pub comment: Option<Comment>,
}

/// A parsed source file, read-only once built.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    /// Create a tree holding only a root (compilation unit) node.
    pub fn new(root_span: Span) -> Self {
        Self {
            nodes: vec![SyntaxNode {
                kind: NodeKind::Other,
                name: None,
                span: root_span,
                parent: None,
                children: Vec::new(),
                comment: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Look up a node. Ids are only ever handed out by this tree.
    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Append a child node under `parent` and return its id.
    pub fn push(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: Option<String>,
        span: Span,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SyntaxNode {
            kind,
            name,
            span,
            parent: Some(parent),
            children: Vec::new(),
            comment: None,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append a declaration node.
    pub fn push_declaration(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: impl Into<String>,
        span: Span,
    ) -> NodeId {
        self.push(parent, kind, Some(name.into()), span)
    }

    /// Append an unattached comment node.
    pub fn push_comment(&mut self, parent: NodeId, comment: Comment) -> NodeId {
        let id = self.push(parent, NodeKind::Comment, None, comment.span);
        self.nodes[id.0].comment = Some(comment);
        id
    }

    /// Attach a documentation comment to `id`, replacing any previous one.
    pub fn attach_comment(&mut self, id: NodeId, comment: Comment) {
        self.nodes[id.0].comment = Some(comment);
    }

    /// Iterate over every node id in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_links_parent_and_child() {
        let mut tree = SyntaxTree::new(Span::lines(1, 1, 10, 1));
        let root = tree.root();
        let class = tree.push_declaration(
            root,
            NodeKind::TypeDeclaration,
            "Foo",
            Span::lines(2, 1, 9, 2),
        );
        let field = tree.push_declaration(
            class,
            NodeKind::FieldDeclaration,
            "bar",
            Span::lines(3, 5, 3, 20),
        );

        assert_eq!(tree.children(root), &[class]);
        assert_eq!(tree.children(class), &[field]);
        assert_eq!(tree.parent(field), Some(class));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_comment_node_carries_its_comment() {
        let mut tree = SyntaxTree::new(Span::default());
        let root = tree.root();
        let comment = Comment::new(CommentKind::Line, " hello", Span::lines(1, 1, 1, 9));
        let id = tree.push_comment(root, comment.clone());

        let node = tree.node(id);
        assert_eq!(node.kind, NodeKind::Comment);
        assert_eq!(node.comment.as_ref(), Some(&comment));
        assert_eq!(node.span, comment.span);
    }

    #[test]
    fn test_documentable_kinds() {
        assert!(NodeKind::TypeDeclaration.is_documentable());
        assert!(NodeKind::FieldDeclaration.is_documentable());
        assert!(NodeKind::MethodDeclaration.is_documentable());
        assert!(!NodeKind::Comment.is_documentable());
        assert!(!NodeKind::Other.is_documentable());
    }

    #[test]
    fn test_span_display() {
        assert_eq!(Span::lines(4, 7, 5, 1).to_string(), "4:7");
    }
}
