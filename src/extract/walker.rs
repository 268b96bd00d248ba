//! Depth-first walk over the syntax tree.

use crate::extract::orphans::collect_comments;
use crate::extract::{ExtractError, RenderContext, MAX_HEADING_DEPTH};
use crate::syntax::{NodeId, SyntaxTree};

/// Pending work on the explicit walk stack.
enum Frame {
    /// Visit a node, then its children.
    Enter(NodeId),
    /// All children of a declaration are done; restore the heading level.
    Leave,
}

/// Visit `id` and its descendants in source order, writing into `ctx`.
///
/// Expression subtrees can be thousands of levels deep, so the walk keeps
/// its own stack instead of recursing.
pub(super) fn walk(
    tree: &SyntaxTree,
    id: NodeId,
    ctx: &mut RenderContext,
) -> Result<(), ExtractError> {
    let mut stack = vec![Frame::Enter(id)];

    while let Some(frame) = stack.pop() {
        let id = match frame {
            Frame::Enter(id) => id,
            Frame::Leave => {
                ctx.ascend();
                continue;
            }
        };
        let node = tree.node(id);

        if node.kind.is_documentable() {
            let name = node.name.as_deref().unwrap_or_default();
            if ctx.depth() > MAX_HEADING_DEPTH {
                return Err(ExtractError::HeadingDepthExceeded {
                    depth: ctx.depth(),
                    name: name.to_string(),
                });
            }

            if let Some(attached) = &node.comment {
                let comments = collect_comments(tree, id, attached)?;
                ctx.heading(name);
                for comment in comments {
                    ctx.comment(comment);
                }
            }

            ctx.descend();
            stack.push(Frame::Leave);
        }

        // Reversed so the first child is popped first.
        stack.extend(node.children.iter().rev().map(|child| Frame::Enter(*child)));
    }

    Ok(())
}
