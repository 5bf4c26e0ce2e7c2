//! Splay tree maintenance for the outgoing-edge tree.
//!
//! Each object's outgoing dependencies form a binary search tree keyed by
//! target address, stored in the shared `deps` arena and addressed purely
//! through [`DepId`] links (no raw pointers). Every successful search or
//! insertion ends by splaying the touched node to the root, which is what
//! gives the tree its amortized-logarithmic bound and its locality for
//! repeatedly touched targets.

use std::cmp::Ordering;

use slotmap::SlotMap;

use crate::dependency::{DepId, Dependency};
use crate::kind::Kind;
use crate::Address;

fn is_left_child(deps: &SlotMap<DepId, Dependency>, parent: DepId, child: DepId) -> bool {
    deps[parent].left == Some(child)
}

/// Rotate `y` down and its left child up, keeping `root` pointed at whatever
/// ends up on top.
fn rotate_right(deps: &mut SlotMap<DepId, Dependency>, root: &mut Option<DepId>, y: DepId) {
    let x = deps[y].left.expect("rotate_right requires a left child");
    let b = deps[x].right;

    deps[y].left = b;
    if let Some(b) = b {
        deps[b].parent = Some(y);
    }

    let parent = deps[y].parent;
    deps[x].parent = parent;
    match parent {
        None => *root = Some(x),
        Some(p) if is_left_child(deps, p, y) => deps[p].left = Some(x),
        Some(p) => deps[p].right = Some(x),
    }

    deps[x].right = Some(y);
    deps[y].parent = Some(x);
}

/// Mirror image of [`rotate_right`].
fn rotate_left(deps: &mut SlotMap<DepId, Dependency>, root: &mut Option<DepId>, y: DepId) {
    let x = deps[y].right.expect("rotate_left requires a right child");
    let b = deps[x].left;

    deps[y].right = b;
    if let Some(b) = b {
        deps[b].parent = Some(y);
    }

    let parent = deps[y].parent;
    deps[x].parent = parent;
    match parent {
        None => *root = Some(x),
        Some(p) if is_left_child(deps, p, y) => deps[p].left = Some(x),
        Some(p) => deps[p].right = Some(x),
    }

    deps[x].left = Some(y);
    deps[y].parent = Some(x);
}

/// Splay `x` to the root of the tree, via zig, zig-zig and zig-zag steps.
fn splay(deps: &mut SlotMap<DepId, Dependency>, root: &mut Option<DepId>, x: DepId) {
    loop {
        let Some(p) = deps[x].parent else { break };
        let Some(g) = deps[p].parent else {
            // zig: parent is the root.
            if is_left_child(deps, p, x) {
                rotate_right(deps, root, p);
            } else {
                rotate_left(deps, root, p);
            }
            break;
        };

        let p_is_left = is_left_child(deps, g, p);
        let x_is_left = is_left_child(deps, p, x);

        if p_is_left == x_is_left {
            // zig-zig: x and p lean the same way off their parent.
            if p_is_left {
                rotate_right(deps, root, g);
                rotate_right(deps, root, p);
            } else {
                rotate_left(deps, root, g);
                rotate_left(deps, root, p);
            }
        } else {
            // zig-zag: x and p lean opposite ways.
            if x_is_left {
                rotate_right(deps, root, p);
                rotate_left(deps, root, g);
            } else {
                rotate_left(deps, root, p);
                rotate_right(deps, root, g);
            }
        }
    }
    *root = Some(x);
}

/// Search the tree for a node targeting `target`, splaying the found node (or
/// the last node visited on a failed search) to the root.
///
/// Returns the id of the matching node, if any.
pub(crate) fn find_and_splay(
    deps: &mut SlotMap<DepId, Dependency>,
    root: &mut Option<DepId>,
    target: Address,
) -> Option<DepId> {
    let mut cur = *root;
    let mut last = None;
    let mut found = None;

    while let Some(id) = cur {
        last = Some(id);
        match target.cmp(&deps[id].target) {
            Ordering::Equal => {
                found = Some(id);
                break;
            }
            Ordering::Less => cur = deps[id].left,
            Ordering::Greater => cur = deps[id].right,
        }
    }

    if let Some(id) = found.or(last) {
        splay(deps, root, id);
    }
    found
}

/// Insert the freshly allocated, unlinked node `new_id` (whose `target` field
/// is already set) into the tree.
///
/// Must be called right after [`find_and_splay`] returned `None`: `root` is
/// expected to hold either `None` (empty tree) or the node that a failed
/// search splayed to the top, which is used as the split point.
pub(crate) fn insert_new(
    deps: &mut SlotMap<DepId, Dependency>,
    root: &mut Option<DepId>,
    new_id: DepId,
) {
    let target = deps[new_id].target;
    deps[new_id].parent = None;
    deps[new_id].left = None;
    deps[new_id].right = None;

    let Some(old_root) = *root else {
        *root = Some(new_id);
        return;
    };

    if target < deps[old_root].target {
        let left = deps[old_root].left;
        deps[new_id].left = left;
        if let Some(l) = left {
            deps[l].parent = Some(new_id);
        }
        deps[old_root].left = None;
        deps[old_root].parent = Some(new_id);
        deps[new_id].right = Some(old_root);
    } else {
        let right = deps[old_root].right;
        deps[new_id].right = right;
        if let Some(r) = right {
            deps[r].parent = Some(new_id);
        }
        deps[old_root].right = None;
        deps[old_root].parent = Some(new_id);
        deps[new_id].left = Some(old_root);
    }
    *root = Some(new_id);
}

/// Remove every node from the tree rooted at `root`, returning them in an
/// arbitrary order, and leave the tree empty. Does not touch any incoming
/// list; the caller is responsible for unlinking each returned id from its
/// target's incoming list before freeing it.
pub(crate) fn drain_tree(deps: &SlotMap<DepId, Dependency>, root: &mut Option<DepId>) -> Vec<DepId> {
    let mut ids = Vec::new();
    let mut stack = Vec::new();
    stack.extend(*root);
    while let Some(id) = stack.pop() {
        ids.push(id);
        stack.extend(deps[id].left);
        stack.extend(deps[id].right);
    }
    *root = None;
    ids
}

/// Collect the targets of every outgoing edge of the given kind, without
/// mutating the tree.
pub(crate) fn targets_by_kind(
    deps: &SlotMap<DepId, Dependency>,
    root: Option<DepId>,
    kind: Kind,
) -> Vec<Address> {
    let mut targets = Vec::new();
    let mut stack = Vec::new();
    stack.extend(root);
    while let Some(id) = stack.pop() {
        if deps[id].kind == kind {
            targets.push(deps[id].target);
        }
        stack.extend(deps[id].left);
        stack.extend(deps[id].right);
    }
    targets
}
