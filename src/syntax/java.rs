//! Java front end backed by tree-sitter.
//!
//! Converts a tree-sitter parse tree into the arena [`SyntaxTree`] and
//! attributes comments to the node they document:
//!
//! - A `//` comment starting on the line where the previous sibling ends is
//!   attached to that sibling (if it has no comment yet).
//! - Otherwise the last comment right before a node is attached to it, as
//!   long as no blank line separates the two.
//! - Every other comment stays in the tree as an unattached comment node.
//!
//! Body nodes (`class_body`, `enum_body`, ...) are spliced into their owning
//! declaration so members are direct children of the type they belong to.

use phf::{phf_map, phf_set};
use tree_sitter::{Language, Node, Parser};

use crate::extract::ExtractError;
use crate::syntax::{Comment, CommentKind, NodeKind, SourceParser, Span, SyntaxTree};

/// Grammar node kinds that map to documentable declarations.
static DECLARATION_KINDS: phf::Map<&'static str, NodeKind> = phf_map! {
    "class_declaration" => NodeKind::TypeDeclaration,
    "interface_declaration" => NodeKind::TypeDeclaration,
    "enum_declaration" => NodeKind::TypeDeclaration,
    "record_declaration" => NodeKind::TypeDeclaration,
    "field_declaration" => NodeKind::FieldDeclaration,
    "constant_declaration" => NodeKind::FieldDeclaration,
    "method_declaration" => NodeKind::MethodDeclaration,
};

/// Grammar node kinds whose children are hoisted into the parent.
static BODY_KINDS: phf::Set<&'static str> = phf_set! {
    "class_body",
    "interface_body",
    "enum_body",
    "enum_body_declarations",
    "annotation_type_body",
};

static COMMENT_KINDS: phf::Set<&'static str> = phf_set! {
    "line_comment",
    "block_comment",
    "comment",
};

/// Longest source excerpt quoted in a syntax error message.
const MAX_ERROR_EXCERPT: usize = 40;

pub struct JavaSourceParser {
    language: Language,
}

impl JavaSourceParser {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> Result<Parser, ExtractError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ExtractError::Syntax {
                line: 0,
                column: 0,
                message: format!("cannot load Java grammar: {}", e),
            })?;
        Ok(parser)
    }
}

impl Default for JavaSourceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for JavaSourceParser {
    fn parse(&self, source: &[u8]) -> Result<SyntaxTree, ExtractError> {
        let mut parser = self.create_parser()?;
        let ts_tree = parser.parse(source, None).ok_or_else(|| ExtractError::Syntax {
            line: 0,
            column: 0,
            message: "parser produced no tree".to_string(),
        })?;

        let root = ts_tree.root_node();
        if root.has_error() {
            return Err(syntax_error(root, source));
        }

        Ok(build_tree(root, source))
    }

    fn language(&self) -> &str {
        "java"
    }
}

/// Create a new Java parser.
pub fn new_parser() -> Box<dyn SourceParser> {
    Box::new(JavaSourceParser::new())
}

/// Register the Java parser for the .java extension.
pub fn register() {
    crate::syntax::register(".java", new_parser);
}

/// Describe the first ERROR or MISSING node under `root`.
fn syntax_error(root: Node, source: &[u8]) -> ExtractError {
    let Some(node) = first_error(root) else {
        return ExtractError::Syntax {
            line: root.start_position().row + 1,
            column: root.start_position().column + 1,
            message: "malformed source".to_string(),
        };
    };

    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let text = node.utf8_text(source).unwrap_or("");
        let excerpt: String = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(MAX_ERROR_EXCERPT)
            .collect();
        format!("unexpected `{}`", excerpt)
    };

    let start = node.start_position();
    ExtractError::Syntax {
        line: start.row + 1,
        column: start.column + 1,
        message,
    }
}

/// Pre-order search that only descends into subtrees containing errors.
fn first_error(root: Node) -> Option<Node> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Build the arena tree. Iterative so deeply nested expressions cannot
/// exhaust the stack.
fn build_tree(root: Node, source: &[u8]) -> SyntaxTree {
    let mut tree = SyntaxTree::new(Span::from_node(root));
    let mut pending = vec![(root, tree.root())];

    while let Some((node, id)) = pending.pop() {
        let members = members(node);
        let attribution = attribute_comments(&members, source);

        for (i, member) in members.iter().enumerate() {
            if attribution.consumed[i] {
                continue;
            }
            if is_comment(*member) {
                tree.push_comment(id, comment_from(*member, source));
                continue;
            }

            let (kind, name) = classify(*member, source);
            let child = tree.push(id, kind, name, Span::from_node(*member));
            if let Some(c) = attribution.attached[i] {
                tree.attach_comment(child, comment_from(members[c], source));
            }
            pending.push((*member, child));
        }
    }

    tree
}

/// Named children of `node`, with body nodes flattened in place.
fn members(node: Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if BODY_KINDS.contains(child.kind()) {
            out.extend(members(child));
        } else {
            out.push(child);
        }
    }
    out
}

fn is_comment(node: Node) -> bool {
    COMMENT_KINDS.contains(node.kind())
}

/// Map a grammar node to its kind and display name. Declarations without
/// a recoverable name are treated as `Other`.
fn classify(node: Node, source: &[u8]) -> (NodeKind, Option<String>) {
    let Some(kind) = DECLARATION_KINDS.get(node.kind()).copied() else {
        return (NodeKind::Other, None);
    };

    let name_node = match kind {
        // Only the first declarator names the heading: `int a, b;` -> `a`.
        NodeKind::FieldDeclaration => node
            .child_by_field_name("declarator")
            .and_then(|d| d.child_by_field_name("name")),
        _ => node.child_by_field_name("name"),
    };

    match name_node.and_then(|n| n.utf8_text(source).ok()) {
        Some(name) if !name.is_empty() => (kind, Some(name.to_string())),
        _ => (NodeKind::Other, None),
    }
}

struct Attribution {
    /// For each member, the index of the comment attached to it.
    attached: Vec<Option<usize>>,
    /// Comments that were attached and must not appear as nodes.
    consumed: Vec<bool>,
}

fn attribute_comments(members: &[Node], source: &[u8]) -> Attribution {
    let n = members.len();
    let mut attached = vec![None; n];
    let mut consumed = vec![false; n];
    let mut previous: Option<usize> = None;
    let mut waiting: Vec<usize> = Vec::new();

    for (i, member) in members.iter().enumerate() {
        if is_comment(*member) {
            if let Some(p) = previous {
                let trailing = waiting.is_empty()
                    && attached[p].is_none()
                    && comment_kind(*member, source) == CommentKind::Line
                    && member.start_position().row == members[p].end_position().row;
                if trailing {
                    attached[p] = Some(i);
                    consumed[i] = true;
                    continue;
                }
            }
            waiting.push(i);
            continue;
        }

        if let Some(&c) = waiting.last() {
            let gap = member
                .start_position()
                .row
                .saturating_sub(members[c].end_position().row);
            if gap <= 1 {
                attached[i] = Some(c);
                consumed[c] = true;
            }
        }
        waiting.clear();
        previous = Some(i);
    }

    Attribution { attached, consumed }
}

fn comment_kind(node: Node, source: &[u8]) -> CommentKind {
    let text = node.utf8_text(source).unwrap_or("");
    split_comment(text).0
}

fn comment_from(node: Node, source: &[u8]) -> Comment {
    let text = node.utf8_text(source).unwrap_or("");
    let (kind, content) = split_comment(text);
    Comment::new(kind, content, Span::from_node(node))
}

/// Strip comment delimiters, keeping everything in between verbatim.
fn split_comment(text: &str) -> (CommentKind, &str) {
    if let Some(rest) = text.strip_prefix("//") {
        return (CommentKind::Line, rest);
    }
    if text != "/**/" {
        if let Some(rest) = text.strip_prefix("/**") {
            return (CommentKind::Javadoc, rest.strip_suffix("*/").unwrap_or(rest));
        }
    }
    if let Some(rest) = text.strip_prefix("/*") {
        return (CommentKind::Block, rest.strip_suffix("*/").unwrap_or(rest));
    }
    (CommentKind::Block, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::NodeId;

    fn parse(source: &str) -> SyntaxTree {
        JavaSourceParser::new()
            .parse(source.as_bytes())
            .expect("source should parse")
    }

    fn find(tree: &SyntaxTree, name: &str) -> NodeId {
        tree.ids()
            .find(|id| tree.node(*id).name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("no node named {}", name))
    }

    fn comments_under(tree: &SyntaxTree, id: NodeId) -> Vec<String> {
        tree.children(id)
            .iter()
            .filter(|c| tree.node(**c).kind == NodeKind::Comment)
            .filter_map(|c| tree.node(*c).comment.as_ref())
            .map(|c| c.content.clone())
            .collect()
    }

    #[test]
    fn test_split_comment() {
        assert_eq!(split_comment("// hi"), (CommentKind::Line, " hi"));
        assert_eq!(split_comment("/// hi"), (CommentKind::Line, "/ hi"));
        assert_eq!(split_comment("/** doc */"), (CommentKind::Javadoc, " doc "));
        assert_eq!(split_comment("/* block */"), (CommentKind::Block, " block "));
        assert_eq!(split_comment("/**/"), (CommentKind::Block, ""));
    }

    #[test]
    fn test_declarations_and_members() {
        let tree = parse(
            r#"
package demo;

/** A class. */
public class Outer {
    /** Counter. */
    private int a, b, c;

    /** Runs. */
    public void run() {}

    public Outer() {}

    interface Inner {
        int LIMIT = 3;
    }

    enum Mode { ON, OFF; void flip() {} }

    record Pair(int x, int y) {}
}
"#,
        );

        let outer = find(&tree, "Outer");
        assert_eq!(tree.node(outer).kind, NodeKind::TypeDeclaration);

        let field = find(&tree, "a");
        assert_eq!(tree.node(field).kind, NodeKind::FieldDeclaration);
        assert_eq!(tree.parent(field), Some(outer));
        assert!(tree.ids().all(|id| tree.node(id).name.as_deref() != Some("b")));

        let run = find(&tree, "run");
        assert_eq!(tree.node(run).kind, NodeKind::MethodDeclaration);
        assert_eq!(tree.parent(run), Some(outer));

        assert_eq!(tree.node(find(&tree, "Inner")).kind, NodeKind::TypeDeclaration);
        assert_eq!(tree.node(find(&tree, "LIMIT")).kind, NodeKind::FieldDeclaration);
        assert_eq!(tree.node(find(&tree, "Mode")).kind, NodeKind::TypeDeclaration);
        assert_eq!(tree.parent(find(&tree, "flip")), Some(find(&tree, "Mode")));
        assert_eq!(tree.node(find(&tree, "Pair")).kind, NodeKind::TypeDeclaration);

        // Constructors are not documentable methods.
        assert!(tree
            .ids()
            .filter(|id| tree.node(*id).kind == NodeKind::MethodDeclaration)
            .all(|id| tree.node(id).name.as_deref() != Some("Outer")));
    }

    #[test]
    fn test_adjacent_javadoc_is_attached() {
        let tree = parse(
            r#"
/** A class. */
public class Foo {
    /** The answer. */
    int answer = 42;
}
"#,
        );

        let foo = find(&tree, "Foo");
        let attached = tree.node(foo).comment.as_ref().expect("attached");
        assert_eq!(attached.kind, CommentKind::Javadoc);
        assert_eq!(attached.content, " A class. ");

        let answer = find(&tree, "answer");
        assert_eq!(
            tree.node(answer).comment.as_ref().map(|c| c.content.as_str()),
            Some(" The answer. ")
        );
        assert!(comments_under(&tree, foo).is_empty());
    }

    #[test]
    fn test_blank_line_leaves_comment_unattached() {
        let tree = parse(
            r#"
class Foo {
    /** Part one. */

    /** Part two. */
    void run() {}

    /** Floating. */

    void idle() {}
}
"#,
        );

        let foo = find(&tree, "Foo");
        assert_eq!(
            comments_under(&tree, foo),
            vec![" Part one. ".to_string(), " Floating. ".to_string()]
        );
        assert_eq!(
            tree.node(find(&tree, "run")).comment.as_ref().map(|c| c.content.as_str()),
            Some(" Part two. ")
        );
        assert!(tree.node(find(&tree, "idle")).comment.is_none());
    }

    #[test]
    fn test_trailing_line_comment_attaches_to_previous() {
        let tree = parse(
            r#"
class Foo {
    int a; // about a
    /** About b. */
    int b;
}
"#,
        );

        assert_eq!(
            tree.node(find(&tree, "a")).comment.as_ref().map(|c| c.content.as_str()),
            Some(" about a")
        );
        assert_eq!(
            tree.node(find(&tree, "b")).comment.as_ref().map(|c| c.content.as_str()),
            Some(" About b. ")
        );
    }

    #[test]
    fn test_children_in_source_order() {
        let tree = parse(
            r#"
class Foo {
    int a;
    // loose

    int b;
}
"#,
        );

        let foo = find(&tree, "Foo");
        let lines: Vec<usize> = tree
            .children(foo)
            .iter()
            .map(|c| tree.node(*c).span.start_line)
            .collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = JavaSourceParser::new()
            .parse(b"class Broken { void f( }")
            .unwrap_err();
        match err {
            ExtractError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
