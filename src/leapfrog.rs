//! Leap-frog (kick-drift-kick) time integration (component C8), grounded on
//! `sph.cpp`'s `initial_kick`/`full_drift`/`final_kick`/main loop.

use crate::config::Config;
use crate::geometry::{norm_sq, Real};
use crate::particle::{Particle, ParticleKind};
use crate::tree::Tree;

/// `vel_half = vel + 0.5 * dt * acc`, fluid particles only.
pub fn initial_kick(particles: &mut [Particle], dt: Real) {
    crate::parallel::parallel_for_each_mut(particles, |p| {
        if p.kind == ParticleKind::Fluid {
            p.vel_half = p.vel + p.acc * (0.5 * dt);
        }
    });
}

/// `vel = vel_half + 0.5 * dt * acc`, fluid particles only.
pub fn final_kick(particles: &mut [Particle], dt: Real) {
    crate::parallel::parallel_for_each_mut(particles, |p| {
        if p.kind == ParticleKind::Fluid {
            p.vel = p.vel_half + p.acc * (0.5 * dt);
        }
    });
}

/// Advances `pos` by `dt * vel_half` for fluid particles. Under the
/// `reuse_tree` feature, also reports whether every particle has drifted
/// less than `SKIN / 2` from the position at the last rebuild — the
/// admissibility condition for reusing the previous step's neighbor lists.
#[cfg(feature = "reuse_tree")]
pub fn full_drift(particles: &mut [Particle], dt: Real, config: &Config) -> bool {
    use std::sync::atomic::{AtomicBool, Ordering};
    let reuse = AtomicBool::new(true);
    let half_skin2 = {
        let h = config.skin() * 0.5;
        h * h
    };
    crate::parallel::parallel_for_each_mut(particles, |p| {
        if p.kind != ParticleKind::Fluid {
            return;
        }
        p.pos = p.pos + p.vel_half * dt;
        if let Some(prev) = p.prev_pos {
            if norm_sq(p.pos - prev) >= half_skin2 {
                reuse.store(false, Ordering::Relaxed);
            }
        }
    });
    reuse.load(Ordering::Relaxed)
}

#[cfg(not(feature = "reuse_tree"))]
pub fn full_drift(particles: &mut [Particle], dt: Real, _config: &Config) {
    crate::parallel::parallel_for_each_mut(particles, |p| {
        if p.kind == ParticleKind::Fluid {
            p.pos = p.pos + p.vel_half * dt;
        }
    });
}

/// Snapshots the current position as the reuse-admissibility baseline.
#[cfg(feature = "reuse_tree")]
pub fn set_prev_pos(particles: &mut [Particle]) {
    crate::parallel::parallel_for_each_mut(particles, |p| {
        p.prev_pos = Some(p.pos);
    });
}

/// Next timestep. Under `cfl_dt`, shrinks below `config.base_dt()` when the
/// largest force magnitude would otherwise violate the CFL condition;
/// otherwise always returns `config.base_dt()`.
#[cfg(feature = "cfl_dt")]
pub fn time_step(particles: &[Particle], config: &Config) -> Real {
    let fmax = particles
        .iter()
        .filter_map(|p| p.f)
        .fold(0.0, |a: Real, b| a.max(b));
    if fmax == 0.0 {
        config.base_dt()
    } else {
        (0.25 * config.slen() / fmax).min(config.base_dt())
    }
}

#[cfg(not(feature = "cfl_dt"))]
pub fn time_step(_particles: &[Particle], config: &Config) -> Real {
    config.base_dt()
}

/// Owns the tree and the running integrator state across a sequence of
/// steps, composing the leap-frog half-kicks, the drift, the density/hydro
/// pair passes, and (under `reuse_tree`) the rebuild-vs-reuse decision, in
/// the order `sph.cpp`'s main loop runs them.
pub struct Simulation {
    tree: Tree,
    config: Config,
    pub dt: Real,
    pub step: usize,
    pub time: Real,
    #[cfg(feature = "reuse_tree")]
    reuse: bool,
    #[cfg(feature = "reuse_tree")]
    pub reuse_count: usize,
}

impl Simulation {
    /// Builds the initial tree and runs the step-0 density/hydro passes
    /// (no kicks or drift happen before step 0, per `sph.cpp`).
    pub fn new(particles: Vec<Particle>, config: Config) -> Self {
        let mut tree = Tree::build(&particles, &config);
        tree.find_neighbors();

        #[cfg(feature = "reuse_tree")]
        {
            // Step 0 always builds the reusable list (`sph.cpp`'s
            // `MAKE_LIST_FOR_REUSE` branch runs unconditionally here, since
            // `reuse` starts false), so the cache exists before the first
            // `advance()` is allowed to take the reuse path.
            tree.build_global_array();
            tree.calc_dens_global(&config);
            tree.calc_hydro_global(&config);
        }
        #[cfg(not(feature = "reuse_tree"))]
        {
            tree.calc_dens(&config);
            tree.calc_hydro(&config);
        }

        let dt = time_step(tree.particles(), &config);

        Self {
            tree,
            config,
            dt,
            step: 0,
            time: 0.0,
            #[cfg(feature = "reuse_tree")]
            reuse: false,
            #[cfg(feature = "reuse_tree")]
            reuse_count: 0,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn particles(&self) -> &[Particle] {
        self.tree.particles()
    }

    /// Runs one full leap-frog step, advancing `self.time`/`self.step`/`self.dt`.
    pub fn advance(&mut self) {
        initial_kick(self.tree.particles_mut(), self.dt);

        #[cfg(feature = "reuse_tree")]
        {
            self.reuse = full_drift(self.tree.particles_mut(), self.dt, &self.config);
        }
        #[cfg(not(feature = "reuse_tree"))]
        {
            full_drift(self.tree.particles_mut(), self.dt, &self.config);
        }

        #[cfg(feature = "reuse_tree")]
        {
            if self.reuse {
                self.tree.calc_dens_global(&self.config);
                self.tree.calc_hydro_global(&self.config);
            } else {
                set_prev_pos(self.tree.particles_mut());
                let particles = self.tree.particles().to_vec();
                self.tree = Tree::build(&particles, &self.config);
                self.tree.find_neighbors();
                self.tree.build_global_array();
                self.tree.calc_dens_global(&self.config);
                self.tree.calc_hydro_global(&self.config);
                self.reuse_count += 1;
            }
        }
        #[cfg(not(feature = "reuse_tree"))]
        {
            let particles = self.tree.particles().to_vec();
            self.tree = Tree::build(&particles, &self.config);
            self.tree.find_neighbors();
            self.tree.calc_dens(&self.config);
            self.tree.calc_hydro(&self.config);
        }

        final_kick(self.tree.particles_mut(), self.dt);

        self.time += self.dt;
        self.step += 1;
        self.dt = time_step(self.tree.particles(), &self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::zero;

    #[test]
    fn kicks_leave_wall_particles_untouched() {
        let config = Config::default();
        let mut p = Particle::init(zero(), ParticleKind::Wall, &config);
        p.acc = config.gravity();
        let before = p.vel;
        initial_kick(std::slice::from_mut(&mut p), 0.01);
        assert_eq!(p.vel_half, zero());
        assert_eq!(p.vel, before);
    }

    #[test]
    fn a_single_particle_at_rest_under_zero_gravity_never_drifts() {
        let config = Config::default();
        let mut particles = vec![Particle::init(zero(), ParticleKind::Fluid, &config)];
        // No forces applied beyond what calc_hydro computes, but with only
        // one particle and gravity zeroed out by overwriting acc directly,
        // the drift distance should be exactly the half-kick contribution.
        particles[0].acc = zero();
        initial_kick(&mut particles, 0.01);
        assert_eq!(particles[0].vel_half, zero());
    }

    #[cfg(feature = "cfl_dt")]
    #[test]
    fn cfl_timestep_never_exceeds_the_base_timestep() {
        let config = Config::default();
        let mut p = Particle::init(zero(), ParticleKind::Fluid, &config);
        p.f = Some(1_000_000.0);
        let dt = time_step(&[p], &config);
        assert!(dt <= config.base_dt());
    }

    #[cfg(not(feature = "cfl_dt"))]
    #[test]
    fn non_cfl_timestep_is_always_the_base_timestep() {
        let config = Config::default();
        let particles = vec![Particle::init(zero(), ParticleKind::Fluid, &config)];
        assert_eq!(time_step(&particles, &config), config.base_dt());
    }

    #[test]
    fn simulation_advances_time_and_step_count() {
        let config = Config {
            cutoff: 16,
            ..Config::default()
        };
        let mut particles = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                #[cfg(not(feature = "dim3"))]
                let pos = crate::geometry::RVec::new(
                    i as Real * config.l0(),
                    j as Real * config.l0(),
                );
                #[cfg(feature = "dim3")]
                let pos = crate::geometry::RVec::new(
                    i as Real * config.l0(),
                    j as Real * config.l0(),
                    0.0,
                );
                particles.push(Particle::init(pos, ParticleKind::Fluid, &config));
            }
        }
        let mut sim = Simulation::new(particles, config);
        let dt0 = sim.dt;
        sim.advance();
        assert_eq!(sim.step, 1);
        assert!((sim.time - dt0).abs() < 1e-9);
    }
}
