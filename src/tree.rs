//! In-memory directory tree mirroring every path the layer has touched.
//!
//! Nodes live in a path-keyed arena ([`DirectoryRegistry`]); parent/child
//! relationships are expressed as paths into that arena, so the tree carries
//! no owning reference cycles. Each node tracks its own queued operations,
//! the move/copy operations landing on it from elsewhere, and its deletion
//! state.

use std::collections::{BTreeMap, BTreeSet};

use crate::ops::{FileSystemOperation, QueuedOperation};
use crate::path::StandardizedPath;

/// One path's place in the staged tree.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryNode {
    pub path: StandardizedPath,
    /// Owning parent; `None` only for the root.
    pub parent: Option<StandardizedPath>,
    pub children: BTreeSet<StandardizedPath>,
    /// Operations rooted at this node: deletes and mkdirs of direct
    /// children, and moves/copies whose source parent is this node.
    pub operations: Vec<QueuedOperation>,
    /// Move/copy operations whose destination lands in this node. Tracked
    /// for conflict checks only; the canonical copy lives in the source
    /// parent's queue.
    pub inbound_operations: Vec<QueuedOperation>,
    /// True while a delete or move-away is queued and not yet flushed.
    pub is_deleted: bool,
    /// Sticky: once true, never reset, even across re-creation. Reads below
    /// this point are stale until a flush reconciles them.
    pub was_ever_deleted: bool,
}

impl DirectoryNode {
    fn new(path: StandardizedPath, parent: Option<StandardizedPath>, is_deleted: bool) -> Self {
        DirectoryNode {
            path,
            parent,
            children: BTreeSet::new(),
            operations: Vec::new(),
            inbound_operations: Vec::new(),
            is_deleted,
            was_ever_deleted: is_deleted,
        }
    }
}

/// Path-keyed arena owning every [`DirectoryNode`].
#[derive(Debug, Default)]
pub(crate) struct DirectoryRegistry {
    nodes: BTreeMap<StandardizedPath, DirectoryNode>,
}

impl DirectoryRegistry {
    pub fn get(&self, path: &StandardizedPath) -> Option<&DirectoryNode> {
        self.nodes.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Creates the node for `path` (and its whole ancestor chain) if absent.
    ///
    /// A node created under a deleted parent starts deleted itself; creation
    /// sites that materialize the path (mkdir, move/copy destinations) must
    /// follow up with [`set_is_deleted`](Self::set_is_deleted).
    pub fn get_or_create(&mut self, path: &StandardizedPath) {
        if self.nodes.contains_key(path) {
            return;
        }

        let mut missing = vec![path.clone()];
        for ancestor in path.ancestors() {
            if self.nodes.contains_key(&ancestor) {
                break;
            }
            missing.push(ancestor);
        }

        // Root-first so each node's parent is registered before it.
        for current in missing.into_iter().rev() {
            let parent = current.parent();
            let mut inherited_deleted = false;
            if let Some(parent_path) = &parent
                && let Some(parent_node) = self.nodes.get_mut(parent_path)
            {
                parent_node.children.insert(current.clone());
                inherited_deleted = parent_node.is_deleted;
            }
            self.nodes.insert(
                current.clone(),
                DirectoryNode::new(current, parent, inherited_deleted),
            );
        }
    }

    /// Creates (if needed) and returns the parent path of `path`; for the
    /// root, the root itself.
    pub fn get_or_create_parent(&mut self, path: &StandardizedPath) -> StandardizedPath {
        let parent = path.parent().unwrap_or_else(StandardizedPath::root);
        self.get_or_create(&parent);
        parent
    }

    /// Flips a node's deletion state, maintaining the tree invariants:
    /// deleting cascades to all current descendants (and sets their sticky
    /// flags); un-deleting propagates to the parent chain, since a created
    /// path implies its ancestors exist.
    pub fn set_is_deleted(&mut self, path: &StandardizedPath, deleted: bool) {
        let Some(node) = self.nodes.get_mut(path) else {
            return;
        };

        if deleted {
            node.is_deleted = true;
            node.was_ever_deleted = true;
            for descendant in self.descendants(path) {
                if let Some(child) = self.nodes.get_mut(&descendant) {
                    child.is_deleted = true;
                    child.was_ever_deleted = true;
                }
            }
        } else {
            node.is_deleted = false;
            for ancestor in path.ancestors() {
                if let Some(ancestor_node) = self.nodes.get_mut(&ancestor) {
                    ancestor_node.is_deleted = false;
                }
            }
        }
    }

    /// Registered descendants of `path`, depth-first.
    pub fn descendants(&self, path: &StandardizedPath) -> Vec<StandardizedPath> {
        let mut result = Vec::new();
        let Some(node) = self.nodes.get(path) else {
            return result;
        };
        let mut stack: Vec<StandardizedPath> = node.children.iter().rev().cloned().collect();
        while let Some(current) = stack.pop() {
            if let Some(child) = self.nodes.get(&current) {
                stack.extend(child.children.iter().rev().cloned());
            }
            result.push(current);
        }
        result
    }

    /// True if `path` (or the nearest tracked ancestor standing in for it)
    /// is currently marked deleted.
    pub fn is_deleted_at(&self, path: &StandardizedPath) -> bool {
        if let Some(node) = self.nodes.get(path) {
            return node.is_deleted;
        }
        for ancestor in path.ancestors() {
            if let Some(node) = self.nodes.get(&ancestor) {
                return node.is_deleted;
            }
        }
        false
    }

    /// True if `path` lies at or under any node whose sticky deletion flag
    /// is set and not yet reconciled by a flush.
    pub fn was_ever_deleted_at(&self, path: &StandardizedPath) -> bool {
        if let Some(node) = self.nodes.get(path)
            && node.was_ever_deleted
        {
            return true;
        }
        path.ancestors()
            .filter_map(|ancestor| self.nodes.get(&ancestor))
            .any(|node| node.was_ever_deleted)
    }

    /// True if the parent of `file_path` has a matching `DeleteFile` queued.
    pub fn is_file_queued_for_delete(&self, file_path: &StandardizedPath) -> bool {
        let Some(parent) = file_path.parent() else {
            return false;
        };
        self.nodes.get(&parent).is_some_and(|node| {
            node.operations.iter().any(|op| {
                matches!(&op.operation, FileSystemOperation::DeleteFile { path } if path == file_path)
            })
        })
    }

    /// Removes any queued `DeleteFile` for exactly `file_path`.
    pub fn dequeue_file_delete(&mut self, file_path: &StandardizedPath) {
        let Some(parent) = file_path.parent() else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.operations.retain(|op| {
                !matches!(&op.operation, FileSystemOperation::DeleteFile { path } if path == file_path)
            });
        }
    }

    /// Removes any queued `DeleteDir` for exactly `dir_path` from its
    /// parent's queue.
    pub fn dequeue_dir_delete(&mut self, dir_path: &StandardizedPath) {
        let Some(parent) = dir_path.parent() else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.operations.retain(|op| {
                !matches!(&op.operation, FileSystemOperation::DeleteDir { dir } if dir == dir_path)
            });
        }
    }

    pub fn push_operation(&mut self, owner: &StandardizedPath, op: QueuedOperation) {
        if let Some(node) = self.nodes.get_mut(owner) {
            node.operations.push(op);
        }
    }

    pub fn push_inbound(&mut self, owner: &StandardizedPath, op: QueuedOperation) {
        if let Some(node) = self.nodes.get_mut(owner) {
            node.inbound_operations.push(op);
        }
    }

    /// Queued operations anywhere in the tree that acting on `path` right
    /// now would violate.
    ///
    /// Union of (a) ancestor move/copy/delete operations covering `path` and
    /// (b) operations rooted in `path`'s subtree with an endpoint outside
    /// it. Operations entirely inside the subtree are internal and never
    /// returned.
    pub fn external_operations(&self, path: &StandardizedPath) -> Vec<QueuedOperation> {
        let mut result: Vec<QueuedOperation> = Vec::new();

        for ancestor in path.ancestors() {
            if let Some(node) = self.nodes.get(&ancestor) {
                for op in node.operations.iter().chain(&node.inbound_operations) {
                    if op.affects(path) {
                        result.push(op.clone());
                    }
                }
            }
        }

        let subtree = std::iter::once(path.clone()).chain(self.descendants(path));
        for current in subtree {
            if let Some(node) = self.nodes.get(&current) {
                for op in node.operations.iter().chain(&node.inbound_operations) {
                    if !op.is_internal_to(path) {
                        result.push(op.clone());
                    }
                }
            }
        }

        // An operation can surface through both its source queue and its
        // inbound registration; report it once.
        result.sort_by_key(|op| op.sequence);
        result.dedup_by_key(|op| op.sequence);
        result
    }

    /// Detaches `path` and all its descendants from the registry, returning
    /// the removed nodes so a failed host call can restore them.
    pub fn remove_subtree(&mut self, path: &StandardizedPath) -> Vec<DirectoryNode> {
        let mut removed = Vec::new();
        let Some(node) = self.nodes.remove(path) else {
            return removed;
        };
        if let Some(parent) = &node.parent
            && let Some(parent_node) = self.nodes.get_mut(parent)
        {
            parent_node.children.remove(path);
        }
        let descendants: Vec<StandardizedPath> = {
            // Children links are gone from the map walk, so reuse the
            // removed node's own child set.
            let mut stack: Vec<StandardizedPath> = node.children.iter().cloned().collect();
            let mut all = Vec::new();
            while let Some(current) = stack.pop() {
                if let Some(child) = self.nodes.get(&current) {
                    stack.extend(child.children.iter().cloned());
                }
                all.push(current);
            }
            all
        };
        removed.push(node);
        for descendant in descendants {
            if let Some(child) = self.nodes.remove(&descendant) {
                removed.push(child);
            }
        }
        removed
    }

    /// Reinserts nodes detached by [`remove_subtree`](Self::remove_subtree).
    pub fn restore_subtree(&mut self, nodes: Vec<DirectoryNode>) {
        for node in nodes {
            if let Some(parent) = &node.parent {
                self.get_or_create(parent);
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.insert(node.path.clone());
                }
            }
            self.nodes.insert(node.path.clone(), node);
        }
    }

    /// Drains every queued operation in the whole tree, in ascending global
    /// sequence, clearing the registry.
    pub fn take_all_operations(&mut self) -> Vec<QueuedOperation> {
        let mut operations: Vec<QueuedOperation> = self
            .nodes
            .values_mut()
            .flat_map(|node| node.operations.drain(..))
            .collect();
        self.nodes.clear();
        operations.sort_by_key(|op| op.sequence);
        operations
    }

    /// Drains the operations scoped to `path`'s subtree, plus the ancestor
    /// `Mkdir` operations that exist solely to materialize `path`, in
    /// ascending sequence. The subtree's nodes leave the registry; ancestor
    /// nodes stay, minus the drained mkdirs.
    pub fn take_subtree_operations(&mut self, path: &StandardizedPath) -> Vec<QueuedOperation> {
        let mut operations = Vec::new();

        let mut child = path.clone();
        for ancestor in path.ancestors() {
            if let Some(node) = self.nodes.get_mut(&ancestor) {
                let mut kept = Vec::with_capacity(node.operations.len());
                for op in node.operations.drain(..) {
                    let materializes_child = matches!(
                        &op.operation,
                        FileSystemOperation::Mkdir { dir } if *dir == child
                    );
                    if materializes_child {
                        operations.push(op);
                    } else {
                        kept.push(op);
                    }
                }
                node.operations = kept;
            }
            child = ancestor;
        }

        let subtree: Vec<StandardizedPath> = std::iter::once(path.clone())
            .chain(self.descendants(path))
            .collect();
        for current in &subtree {
            if let Some(node) = self.nodes.get_mut(current) {
                operations.append(&mut node.operations);
            }
        }
        self.remove_subtree(path);

        operations.sort_by_key(|op| op.sequence);
        operations
    }

    /// Tracked, not-deleted child directories of `path`.
    pub fn live_children(&self, path: &StandardizedPath) -> Vec<StandardizedPath> {
        let Some(node) = self.nodes.get(path) else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter(|child| self.nodes.get(*child).is_some_and(|n| !n.is_deleted))
            .cloned()
            .collect()
    }
}
