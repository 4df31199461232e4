//! Orthant-tree neighbor search and SPH pair kernels for dam-break
//! free-surface flow, parallelized over disjoint leaf ranges with `rayon`.
//!
//! The dimension (`dim3` feature), scalar precision (`single_precision`),
//! CFL timestep (`cfl_dt`), and neighbor-list reuse (`reuse_tree`) are all
//! compile-time switches — see [`geometry`] and [`config`] for why.

pub mod config;
pub mod geometry;
pub mod io;
pub mod kernel;
pub mod leapfrog;
pub mod parallel;
pub mod particle;
pub mod tree;

pub use config::Config;
pub use io::{load_particles, save_particles, SphError};
pub use leapfrog::Simulation;
pub use particle::{Particle, ParticleKind};
pub use tree::Tree;
