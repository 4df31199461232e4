//! Conservative neighbor-leaf search (component C4): for every leaf, the set
//! of leaves (including itself) whose inner box intersects this leaf's outer
//! box, found by pruned descent from the root rather than an all-pairs scan.

use rayon::prelude::*;

use super::{NodeId, NodeKind, Tree};

impl Tree {
    /// Populates every leaf's `neighbors`/`n_neighbors` fields. Read-only
    /// descent happens in parallel across leaves; the results are written
    /// back in a second, sequential pass, since mutating `self.nodes` while
    /// still borrowing it for the descent would not satisfy the borrow
    /// checker (and the original's node objects mutate their own neighbor
    /// list mid-traversal instead).
    pub fn find_neighbors(&mut self) {
        let leaf_ids = self.leaf_ids();

        let found: Vec<(NodeId, Vec<NodeId>)> = leaf_ids
            .par_iter()
            .map(|&leaf_id| {
                let outer = self.nodes[leaf_id].outer_bbox;
                let mut matches = Vec::new();
                self.descend(self.root, &outer, &mut matches);
                (leaf_id, matches)
            })
            .collect();

        for (leaf_id, matches) in found {
            let n_neighbors = matches
                .iter()
                .map(|&other| match &self.nodes[other].kind {
                    NodeKind::Leaf { range, .. } => range.len(),
                    NodeKind::Internal { .. } => unreachable!("descend only collects leaves"),
                })
                .sum();
            if let NodeKind::Leaf {
                neighbors,
                n_neighbors: count,
                ..
            } = &mut self.nodes[leaf_id].kind
            {
                *neighbors = matches;
                *count = n_neighbors;
            }
        }
    }

    /// Collects every leaf under `id` whose inner box intersects `outer`,
    /// pruning whole subtrees whose inner box does not.
    fn descend(&self, id: NodeId, outer: &crate::geometry::Aabb, out: &mut Vec<NodeId>) {
        let node = &self.nodes[id];
        if !node.inner_bbox.intersect(outer) {
            log::trace!("pruned subtree at node {id}: inner box misses outer query box");
            return;
        }
        match &node.kind {
            NodeKind::Leaf { .. } => out.push(id),
            NodeKind::Internal { children } => {
                for child in children.iter().flatten() {
                    self.descend(*child, outer, out);
                }
            }
        }
    }
}
