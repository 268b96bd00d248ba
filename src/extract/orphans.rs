//! Recovery of comments the parser left floating before a declaration.

use crate::extract::ExtractError;
use crate::syntax::{Comment, NodeId, NodeKind, SyntaxTree};

/// Collect the documentation block of `node`: the unattached comments
/// between it and the nearest preceding non-comment sibling (in source
/// order), followed by `attached`.
pub fn collect_comments<'t>(
    tree: &'t SyntaxTree,
    node: NodeId,
    attached: &'t Comment,
) -> Result<Vec<&'t Comment>, ExtractError> {
    let mut comments = orphans_before(tree, node)?;
    comments.push(attached);
    Ok(comments)
}

fn orphans_before(tree: &SyntaxTree, node: NodeId) -> Result<Vec<&Comment>, ExtractError> {
    let parent = tree.parent(node).ok_or(ExtractError::NotAChild { node })?;

    // Stable sort: siblings sharing a begin position keep their child order.
    let mut siblings: Vec<NodeId> = tree.children(parent).to_vec();
    siblings.sort_by_key(|id| tree.node(*id).span.begin());

    let mut positions = siblings
        .iter()
        .enumerate()
        .filter(|(_, id)| **id == node)
        .map(|(i, _)| i);
    let position = match (positions.next(), positions.next()) {
        (Some(i), None) => i,
        _ => return Err(ExtractError::NotAChild { node }),
    };

    let is_comment = |id: &NodeId| tree.node(*id).kind == NodeKind::Comment;
    let start = siblings[..position]
        .iter()
        .rposition(|id| !is_comment(id))
        .map_or(0, |p| p + 1);

    Ok(siblings[start..position]
        .iter()
        .filter(|id| is_comment(*id))
        .filter_map(|id| tree.node(*id).comment.as_ref())
        .collect())
}
