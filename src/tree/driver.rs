//! Leaf interaction driver (component C5): gather neighbor particles into a
//! contiguous read-only snapshot per leaf, dispatch the density/hydro pair
//! kernels over disjoint mutable leaf slices, and write the results back.
//!
//! Density and hydro passes never read and write the same field within a
//! single pass (density reads `pos`/`mass`, writes `dens`/`pres`; hydro reads
//! `pos`/`vel`/`mass`/`dens`/`pres`, writes `acc`/`f`), so a leaf's mutable
//! slice and another leaf's read-only gather snapshot can safely coexist as
//! long as the two passes themselves are not interleaved.

use std::ops::Range;

use rayon::prelude::*;

use crate::config::Config;
use crate::kernel::{calc_dens_pair, calc_hydro_pair};
use crate::particle::{Dens, Hydro, Particle};

use super::{NodeId, NodeKind, Tree};

/// Splits `particles` into one mutable sub-slice per range in `ranges`.
/// Requires `ranges` to be sorted ascending and to tile `particles` with no
/// gaps — true of leaf ranges by construction of [`Tree::build`].
fn split_leaves_mut<'a>(
    mut particles: &'a mut [Particle],
    ranges: &[Range<usize>],
) -> Vec<&'a mut [Particle]> {
    let mut out = Vec::with_capacity(ranges.len());
    let mut cursor = 0;
    for r in ranges {
        let (head, tail) = particles.split_at_mut(r.len());
        debug_assert_eq!(r.start, cursor);
        cursor += r.len();
        out.push(head);
        particles = tail;
    }
    out
}

impl Tree {
    fn leaf_ranges(&self) -> Vec<(NodeId, Range<usize>)> {
        self.leaf_ids()
            .into_iter()
            .map(|id| match &self.nodes[id].kind {
                NodeKind::Leaf { range, .. } => (id, range.clone()),
                NodeKind::Internal { .. } => unreachable!("leaf_ids only returns leaves"),
            })
            .collect()
    }

    fn neighbor_sources(&self, leaf_id: NodeId) -> Vec<Particle> {
        let (neighbors, n_neighbors) = match &self.nodes[leaf_id].kind {
            NodeKind::Leaf {
                neighbors,
                n_neighbors,
                ..
            } => (neighbors, *n_neighbors),
            NodeKind::Internal { .. } => unreachable!(),
        };
        // Pre-sized per spec.md §4.3 step 1: `L.n_neighbors` is the exact
        // particle count across every neighbor leaf, so the gather buffer
        // never reallocates while it fills.
        let mut sources = Vec::with_capacity(n_neighbors);
        for &n in neighbors {
            if let NodeKind::Leaf { range, .. } = &self.nodes[n].kind {
                sources.extend_from_slice(&self.particles[range.clone()]);
            }
        }
        sources
    }

    /// Density pass (spec.md §4.4 / §4.5) over every leaf, requires
    /// [`Tree::find_neighbors`] to have already been run.
    pub fn calc_dens(&mut self, config: &Config) {
        let leaf_ranges = self.leaf_ranges();

        let per_leaf_results: Vec<Vec<Dens>> = leaf_ranges
            .par_iter()
            .map(|(leaf_id, range)| {
                let sources = self.neighbor_sources(*leaf_id);
                self.particles[range.clone()]
                    .iter()
                    .map(|target| calc_dens_pair(target, &sources, config))
                    .collect()
            })
            .collect();

        let ranges: Vec<Range<usize>> = leaf_ranges.iter().map(|(_, r)| r.clone()).collect();
        let slices = split_leaves_mut(&mut self.particles, &ranges);
        slices
            .into_par_iter()
            .zip(per_leaf_results.into_par_iter())
            .for_each(|(slice, results)| {
                for (p, d) in slice.iter_mut().zip(results) {
                    p.apply_dens(d);
                }
            });
    }

    /// Hydro-force pass (spec.md §4.4 / §4.5). Must run strictly after
    /// [`Tree::calc_dens`] within the same step, since it reads `dens`/`pres`.
    pub fn calc_hydro(&mut self, config: &Config) {
        let leaf_ranges = self.leaf_ranges();

        let per_leaf_results: Vec<Vec<Hydro>> = leaf_ranges
            .par_iter()
            .map(|(leaf_id, range)| {
                let sources = self.neighbor_sources(*leaf_id);
                self.particles[range.clone()]
                    .iter()
                    .map(|target| calc_hydro_pair(target, &sources, config))
                    .collect()
            })
            .collect();

        let ranges: Vec<Range<usize>> = leaf_ranges.iter().map(|(_, r)| r.clone()).collect();
        let slices = split_leaves_mut(&mut self.particles, &ranges);
        slices
            .into_par_iter()
            .zip(per_leaf_results.into_par_iter())
            .for_each(|(slice, results)| {
                for (p, h) in slice.iter_mut().zip(results) {
                    p.apply_hydro(h);
                }
            });
    }
}

/// Flattened neighbor-source table, cached across steps that reuse the same
/// tree topology (`reuse_tree` feature). Avoids repeating the per-leaf
/// neighbor-list lookup every step; particle data is still re-read fresh
/// from [`Tree::particles`] on each call, since positions/velocities change
/// every step even when the topology doesn't.
#[derive(Debug)]
pub struct GlobalArray {
    leaf_ranges: Vec<Range<usize>>,
    /// Flattened, per-leaf list of source particle indices into
    /// [`Tree::particles`]; `source_offsets[k]..source_offsets[k + 1]`
    /// is leaf `k`'s slice of `source_index`.
    source_index: Vec<usize>,
    source_offsets: Vec<usize>,
}

impl Tree {
    /// Builds the [`GlobalArray`] fast path from the current neighbor lists.
    /// Call once after [`Tree::find_neighbors`]; valid until the next rebuild.
    pub fn build_global_array(&mut self) {
        let leaf_ranges: Vec<Range<usize>> = self
            .leaf_ids()
            .into_iter()
            .map(|id| match &self.nodes[id].kind {
                NodeKind::Leaf { range, .. } => range.clone(),
                NodeKind::Internal { .. } => unreachable!(),
            })
            .collect();

        let leaf_ids = self.leaf_ids();
        // Pre-sized from the cached `n_neighbors` totals (spec.md §4.3 step
        // 1), so the flat index table is built with no reallocation.
        let total_neighbors: usize = leaf_ids
            .iter()
            .map(|&id| match &self.nodes[id].kind {
                NodeKind::Leaf { n_neighbors, .. } => *n_neighbors,
                NodeKind::Internal { .. } => unreachable!(),
            })
            .sum();

        let mut source_index = Vec::with_capacity(total_neighbors);
        let mut source_offsets = Vec::with_capacity(leaf_ids.len() + 1);
        source_offsets.push(0usize);
        for id in leaf_ids {
            let neighbors = match &self.nodes[id].kind {
                NodeKind::Leaf { neighbors, .. } => neighbors.clone(),
                NodeKind::Internal { .. } => unreachable!(),
            };
            for n in neighbors {
                if let NodeKind::Leaf { range, .. } = &self.nodes[n].kind {
                    source_index.extend(range.clone());
                }
            }
            source_offsets.push(source_index.len());
        }

        self.global_array = Some(GlobalArray {
            leaf_ranges,
            source_index,
            source_offsets,
        });
    }

    fn global_sources(&self, ga: &GlobalArray, leaf_idx: usize) -> Vec<Particle> {
        let start = ga.source_offsets[leaf_idx];
        let end = ga.source_offsets[leaf_idx + 1];
        ga.source_index[start..end]
            .iter()
            .map(|&i| self.particles[i])
            .collect()
    }

    /// Density pass via the cached [`GlobalArray`]. Panics if
    /// [`Tree::build_global_array`] has not been called.
    pub fn calc_dens_global(&mut self, config: &Config) {
        let ga = self.global_array.take().expect("global array not built");
        let per_leaf_results: Vec<Vec<Dens>> = (0..ga.leaf_ranges.len())
            .into_par_iter()
            .map(|leaf_idx| {
                let sources = self.global_sources(&ga, leaf_idx);
                self.particles[ga.leaf_ranges[leaf_idx].clone()]
                    .iter()
                    .map(|target| calc_dens_pair(target, &sources, config))
                    .collect()
            })
            .collect();

        let slices = split_leaves_mut(&mut self.particles, &ga.leaf_ranges);
        slices
            .into_par_iter()
            .zip(per_leaf_results.into_par_iter())
            .for_each(|(slice, results)| {
                for (p, d) in slice.iter_mut().zip(results) {
                    p.apply_dens(d);
                }
            });
        self.global_array = Some(ga);
    }

    /// Hydro pass via the cached [`GlobalArray`]; see [`Tree::calc_dens_global`].
    pub fn calc_hydro_global(&mut self, config: &Config) {
        let ga = self.global_array.take().expect("global array not built");
        let per_leaf_results: Vec<Vec<Hydro>> = (0..ga.leaf_ranges.len())
            .into_par_iter()
            .map(|leaf_idx| {
                let sources = self.global_sources(&ga, leaf_idx);
                self.particles[ga.leaf_ranges[leaf_idx].clone()]
                    .iter()
                    .map(|target| calc_hydro_pair(target, &sources, config))
                    .collect()
            })
            .collect();

        let slices = split_leaves_mut(&mut self.particles, &ga.leaf_ranges);
        slices
            .into_par_iter()
            .zip(per_leaf_results.into_par_iter())
            .for_each(|(slice, results)| {
                for (p, h) in slice.iter_mut().zip(results) {
                    p.apply_hydro(h);
                }
            });
        self.global_array = Some(ga);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleKind;

    fn lattice(n: usize, config: &Config) -> Vec<Particle> {
        let mut particles = Vec::new();
        for i in 0..n {
            for j in 0..n {
                #[cfg(not(feature = "dim3"))]
                let pos = crate::geometry::RVec::new(
                    i as crate::geometry::Real * config.l0(),
                    j as crate::geometry::Real * config.l0(),
                );
                #[cfg(feature = "dim3")]
                let pos = crate::geometry::RVec::new(
                    i as crate::geometry::Real * config.l0(),
                    j as crate::geometry::Real * config.l0(),
                    0.0,
                );
                particles.push(Particle::init(pos, ParticleKind::Fluid, config));
            }
        }
        particles
    }

    #[test]
    fn density_of_an_isolated_particle_is_its_self_kernel_contribution() {
        let config = Config::default();
        let particles = vec![Particle::init(crate::geometry::zero(), ParticleKind::Fluid, &config)];
        let mut tree = Tree::build(&particles, &config);
        tree.find_neighbors();
        tree.calc_dens(&config);
        let p = &tree.particles()[0];
        assert!(p.dens > 0.0);
    }

    #[test]
    fn global_array_path_matches_per_leaf_path() {
        let config = Config {
            cutoff: 4,
            ..Config::default()
        };
        let particles = lattice(10, &config);

        let mut tree_a = Tree::build(&particles, &config);
        tree_a.find_neighbors();
        tree_a.calc_dens(&config);
        tree_a.calc_hydro(&config);

        let mut tree_b = Tree::build(&particles, &config);
        tree_b.find_neighbors();
        tree_b.build_global_array();
        tree_b.calc_dens_global(&config);
        tree_b.calc_hydro_global(&config);

        for (a, b) in tree_a.particles().iter().zip(tree_b.particles()) {
            assert!((a.dens - b.dens).abs() < 1e-9);
            assert!((a.acc - b.acc).magnitude() < 1e-9);
        }
    }
}
