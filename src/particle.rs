//! Per-particle state (component C2).

use crate::config::Config;
use crate::geometry::{zero, Real, RVec};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleKind {
    Fluid,
    Wall,
}

impl ParticleKind {
    /// Parses the `type` column of a particle file: `1` is fluid, `2` is
    /// wall (spec.md §6). Any other value is the caller's problem to report.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Fluid),
            2 => Some(Self::Wall),
            _ => None,
        }
    }

    pub fn to_code(self) -> i64 {
        match self {
            Self::Fluid => 1,
            Self::Wall => 2,
        }
    }
}

/// A fluid or wall particle. All fields are mutable; the tree only ever
/// permutes these records, never copies a subset of their fields.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    pub mass: Real,
    pub kind: ParticleKind,
    pub pos: RVec,
    pub vel: RVec,
    pub acc: RVec,
    pub vel_half: RVec,
    pub dens: Real,
    pub pres: Real,
    /// Position at the last tree rebuild. Only meaningful under the
    /// `reuse_tree` feature; `None` otherwise.
    pub prev_pos: Option<RVec>,
    /// CFL force magnitude. Only meaningful under the `cfl_dt` feature.
    pub f: Option<Real>,
}

impl Particle {
    /// Initialization contract of spec.md §3: `mass = rho0 * L0^D`,
    /// `vel = acc = 0`, `dens = rho0`, `pres = p(rho0)`.
    pub fn init(pos: RVec, kind: ParticleKind, config: &Config) -> Self {
        let dens = config.rest_density();
        Self {
            mass: config.particle_mass(),
            kind,
            pos,
            vel: zero(),
            acc: zero(),
            vel_half: zero(),
            dens,
            pres: crate::kernel::pressure(dens, config),
            prev_pos: if cfg!(feature = "reuse_tree") {
                Some(pos)
            } else {
                None
            },
            f: if cfg!(feature = "cfl_dt") { Some(0.0) } else { None },
        }
    }
}

/// Density-pass result, applied back onto a [`Particle`] via
/// [`Particle::apply_dens`]. Kept separate from `Particle` rather than
/// written in-place, per the resolved Open Question in spec.md §9.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dens {
    pub dens: Real,
    pub pres: Real,
}

/// Hydro-pass result, applied back via [`Particle::apply_hydro`].
#[derive(Clone, Copy, Debug)]
pub struct Hydro {
    pub acc: RVec,
    pub f: Option<Real>,
}

impl Particle {
    pub fn apply_dens(&mut self, dens: Dens) {
        self.dens = dens.dens;
        self.pres = dens.pres;
    }

    pub fn apply_hydro(&mut self, hydro: Hydro) {
        self.acc = hydro.acc;
        if let Some(f) = hydro.f {
            self.f = Some(f);
        }
    }
}
