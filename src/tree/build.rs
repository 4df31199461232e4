//! Orthant tree construction (component C3): double-buffered in-place
//! partitioning with prefix-sum bucketing, followed by a bottom-up
//! bounding-box refinement pass.

use std::ops::Range;

use crate::config::Config;
use crate::geometry::{orthant, Aabb, N_ORTHANTS};
use crate::particle::Particle;

use super::{Node, NodeId, NodeKind, Tree};

impl Tree {
    /// Partitions `particles` into a spatial hierarchy. Leaves hold at most
    /// `config.cutoff` particles, except where further subdivision wouldn't
    /// reduce the count (spec.md §4.1).
    pub fn build(particles: &[Particle], config: &Config) -> Tree {
        let n = particles.len();

        if n == 0 {
            let nodes = vec![Node {
                kind: NodeKind::Leaf {
                    range: 0..0,
                    neighbors: Vec::new(),
                    n_neighbors: 0,
                },
                inner_bbox: Aabb::empty(),
                outer_bbox: Aabb::empty(),
            }];
            return Tree {
                particles: Vec::new(),
                nodes,
                root: 0,
                global_array: None,
            };
        }

        let mut root_bbox = Aabb::empty();
        for p in particles {
            root_bbox.merge_point(p.pos);
        }
        let root_bbox = root_bbox.square();

        let mut buffers = [particles.to_vec(), particles.to_vec()];
        let mut nodes = Vec::with_capacity(n / config.cutoff.max(1) * 2 + 1);
        let mut out = particles.to_vec();

        let root = build_rec(
            &mut buffers,
            0,
            0..n,
            root_bbox,
            config,
            &mut nodes,
            &mut out,
        );

        let leaf_count = nodes.iter().filter(|n| n.is_leaf()).count();
        log::debug!(
            "built tree: {} particles, {} nodes, {} leaves (cutoff {})",
            n,
            nodes.len(),
            leaf_count,
            config.cutoff
        );

        let mut tree = Tree {
            particles: out,
            nodes,
            root,
            global_array: None,
        };
        tree.refine_bboxes(config);
        tree
    }

    /// Bottom-up pass: leaf boxes come from their own particles; internal
    /// boxes are the union of their children's.
    pub(crate) fn refine_bboxes(&mut self, config: &Config) {
        let margin = config.slen() + config.skin();
        refine_rec(self.root, &mut self.nodes, &self.particles, margin);
    }
}

fn src_dst_mut(
    buffers: &mut [Vec<Particle>; 2],
    cur_src: usize,
) -> (&mut Vec<Particle>, &mut Vec<Particle>) {
    let (left, right) = buffers.split_at_mut(1);
    if cur_src == 0 {
        (&mut left[0], &mut right[0])
    } else {
        (&mut right[0], &mut left[0])
    }
}

#[allow(clippy::too_many_arguments)]
fn build_rec(
    buffers: &mut [Vec<Particle>; 2],
    cur_src: usize,
    range: Range<usize>,
    bbox: Aabb,
    config: &Config,
    nodes: &mut Vec<Node>,
    out: &mut [Particle],
) -> NodeId {
    let n = range.len();

    let make_leaf = |out: &mut [Particle], buffers: &[Vec<Particle>; 2], nodes: &mut Vec<Node>| {
        out[range.clone()].copy_from_slice(&buffers[cur_src][range.clone()]);
        nodes.push(Node {
            kind: NodeKind::Leaf {
                range: range.clone(),
                neighbors: Vec::new(),
                n_neighbors: 0,
            },
            inner_bbox: Aabb::empty(),
            outer_bbox: Aabb::empty(),
        });
        nodes.len() - 1
    };

    if n <= config.cutoff {
        return make_leaf(out, buffers, nodes);
    }

    let center = bbox.center();
    let mut counts = [0usize; N_ORTHANTS];
    {
        let src = &buffers[cur_src];
        for p in &src[range.clone()] {
            counts[orthant(p.pos, center)] += 1;
        }
    }

    debug_assert_eq!(counts.iter().sum::<usize>(), n, "partition must account for every particle in range");

    // Degenerate cluster: every particle landed in the same orthant, so
    // subdividing further would not reduce the count. Terminate as a leaf
    // rather than recursing forever (spec.md §4.1 "Failure modes").
    if counts.iter().any(|&c| c == n) {
        return make_leaf(out, buffers, nodes);
    }

    let mut offsets = [0usize; N_ORTHANTS];
    {
        let mut acc = 0;
        for i in 0..N_ORTHANTS {
            offsets[i] = acc;
            acc += counts[i];
        }
    }

    {
        let (src, dst) = src_dst_mut(buffers, cur_src);
        let mut cursors = offsets;
        for i in range.clone() {
            let p = src[i];
            let o = orthant(p.pos, center);
            dst[range.start + cursors[o]] = p;
            cursors[o] += 1;
        }
    }

    let dst_buf = 1 - cur_src;
    let mut children = [None; N_ORTHANTS];
    for i in 0..N_ORTHANTS {
        if counts[i] == 0 {
            continue;
        }
        let child_range = (range.start + offsets[i])..(range.start + offsets[i] + counts[i]);
        let child_bbox = bbox.orthant(i);
        children[i] = Some(build_rec(
            buffers, dst_buf, child_range, child_bbox, config, nodes, out,
        ));
    }

    nodes.push(Node {
        kind: NodeKind::Internal { children },
        inner_bbox: Aabb::empty(),
        outer_bbox: Aabb::empty(),
    });
    nodes.len() - 1
}

fn refine_rec(id: NodeId, nodes: &mut [Node], particles: &[Particle], margin: crate::geometry::Real) {
    // Children must be refined before their parent reads the results, but
    // Rust won't let us hold `&mut nodes[id]` across a recursive call into
    // `nodes` itself — so children are refined first, their boxes copied
    // out, and only then is the parent's own node slot written.
    let child_ids: Vec<NodeId> = match &nodes[id].kind {
        NodeKind::Leaf { .. } => Vec::new(),
        NodeKind::Internal { children } => children.iter().flatten().copied().collect(),
    };
    for &child in &child_ids {
        refine_rec(child, nodes, particles, margin);
    }

    match &nodes[id].kind {
        NodeKind::Leaf { range, .. } => {
            let mut inner = Aabb::empty();
            for p in &particles[range.clone()] {
                inner.merge_point(p.pos);
            }
            let outer = inner.expand(margin);
            nodes[id].inner_bbox = inner;
            nodes[id].outer_bbox = outer;
        }
        NodeKind::Internal { .. } => {
            let mut inner = Aabb::empty();
            let mut outer = Aabb::empty();
            for &child in &child_ids {
                inner.merge_box(&nodes[child].inner_bbox);
                outer.merge_box(&nodes[child].outer_bbox);
            }
            nodes[id].inner_bbox = inner;
            nodes[id].outer_bbox = outer;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleKind;

    fn particle_at(x: crate::geometry::Real, y: crate::geometry::Real) -> Particle {
        #[cfg(not(feature = "dim3"))]
        let pos = crate::geometry::RVec::new(x, y);
        #[cfg(feature = "dim3")]
        let pos = crate::geometry::RVec::new(x, y, 0.0);
        Particle::init(pos, ParticleKind::Fluid, &Config::default())
    }

    #[test]
    fn trivial_build_is_one_leaf_containing_self_neighbor_after_search() {
        // S1 from spec.md §8.
        let particles = vec![
            particle_at(0.0, 0.0),
            particle_at(1.0, 0.0),
            particle_at(0.0, 1.0),
        ];
        let config = Config::default();
        let tree = Tree::build(&particles, &config);
        let leaves = tree.leaf_ids();
        assert_eq!(leaves.len(), 1);
        let node = tree.node(leaves[0]);
        assert!((node.inner_bbox.min.x - 0.0).abs() < 1e-9);
        assert!((node.inner_bbox.max.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partition_preserves_the_input_multiset() {
        let config = Config {
            cutoff: 4,
            ..Config::default()
        };
        let mut particles = Vec::new();
        for i in 0..50 {
            for j in 0..4 {
                particles.push(particle_at(i as crate::geometry::Real, j as crate::geometry::Real));
            }
        }
        let n = particles.len();
        let tree = Tree::build(&particles, &config);
        assert_eq!(tree.particles().len(), n);

        let mut input_sum = 0.0;
        let mut output_sum = 0.0;
        for p in &particles {
            input_sum += p.pos.x + p.pos.y;
        }
        for p in tree.particles() {
            output_sum += p.pos.x + p.pos.y;
        }
        assert!((input_sum - output_sum).abs() < 1e-6);
    }

    #[test]
    fn every_particle_lies_within_its_leafs_inner_box() {
        let config = Config {
            cutoff: 8,
            ..Config::default()
        };
        let mut particles = Vec::new();
        for i in 0..20 {
            for j in 0..20 {
                particles.push(particle_at(i as crate::geometry::Real, j as crate::geometry::Real));
            }
        }
        let tree = Tree::build(&particles, &config);
        for &leaf_id in &tree.leaf_ids() {
            let node = tree.node(leaf_id);
            for p in tree.leaf_particles(leaf_id) {
                assert!(node.inner_bbox.contains(p.pos));
            }
        }
    }

    #[test]
    fn degenerate_coincident_cluster_terminates_as_a_leaf() {
        let config = Config {
            cutoff: 4,
            ..Config::default()
        };
        let particles: Vec<Particle> = (0..200).map(|_| particle_at(0.0, 0.0)).collect();
        let tree = Tree::build(&particles, &config);
        assert_eq!(tree.leaf_ids().len(), 1);
        assert_eq!(tree.particles().len(), 200);
    }

    #[test]
    fn empty_input_builds_a_trivial_empty_root() {
        let tree = Tree::build(&[], &Config::default());
        assert_eq!(tree.particles().len(), 0);
        assert_eq!(tree.leaf_ids().len(), 1);
    }

    #[test]
    fn random_clouds_always_preserve_every_particle_and_containment() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let config = Config {
            cutoff: 8,
            ..Config::default()
        };

        for _ in 0..20 {
            let n = rng.gen_range(1..300);
            let particles: Vec<Particle> = (0..n)
                .map(|_| particle_at(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)))
                .collect();
            let tree = Tree::build(&particles, &config);
            assert_eq!(tree.particles().len(), n);
            for &leaf_id in &tree.leaf_ids() {
                let node = tree.node(leaf_id);
                for p in tree.leaf_particles(leaf_id) {
                    assert!(node.inner_bbox.contains(p.pos));
                }
            }
        }
    }

    #[test]
    fn orthant_split_has_no_orphans() {
        // S2 from spec.md §8: a 10x20 lattice should subdivide cleanly.
        let config = Config {
            cutoff: 64,
            ..Config::default()
        };
        let mut particles = Vec::new();
        for i in 0..10 {
            for j in 0..20 {
                particles.push(particle_at(i as crate::geometry::Real, j as crate::geometry::Real));
            }
        }
        let n = particles.len();
        let tree = Tree::build(&particles, &config);
        let total: usize = tree
            .leaf_ids()
            .iter()
            .map(|&id| tree.leaf_particles(id).len())
            .sum();
        assert_eq!(total, n);
    }
}
