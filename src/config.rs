//! Runtime configuration knobs (spec.md §6, "Compile-time configuration").
//!
//! `DIM`, `DOUBLE`, `CFL_DT`, and `REUSE_TREE` are Cargo features (see
//! [`crate::geometry`]) because they change which code is compiled, not a
//! value read at runtime. Everything else in that table is a genuine runtime
//! knob and lives here so it can be loaded from a YAML file or overridden on
//! the command line.

use serde::{Deserialize, Serialize};

use crate::geometry::{Real, RVec};

/// Leaf-size threshold, max step count, output cadence, and the scale factor
/// applied to the initial particle spacing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum particles per leaf before the tree builder subdivides further.
    pub cutoff: usize,
    /// Step index at which the integrator stops even if `end_time` hasn't
    /// been reached.
    pub max_step: usize,
    /// Snapshot cadence in steps; `0` disables result-file output.
    pub output_interval: usize,
    /// Scales the initial particle spacing `L0` (and everything derived from
    /// it). Larger values correspond to a coarser (less resolved) fluid.
    pub data_scale: Real,
    /// Simulation time at which the integrator stops.
    pub end_time: Real,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cutoff: 64,
            max_step: 1000,
            output_interval: 0,
            data_scale: 1.0,
            end_time: 1.5,
        }
    }
}

impl Config {
    /// Initial particle spacing `L0 = 0.55 / 30 / data_scale`.
    pub fn l0(&self) -> Real {
        0.55 / 30.0 / self.data_scale
    }

    /// Smoothing length `SLEN = 2.1 * L0`.
    pub fn slen(&self) -> Real {
        2.1 * self.l0()
    }

    /// Neighbor-list reuse margin. Zero unless the `reuse_tree` feature is
    /// active, in which case it is `0.3 * SLEN`.
    pub fn skin(&self) -> Real {
        #[cfg(feature = "reuse_tree")]
        {
            0.3 * self.slen()
        }
        #[cfg(not(feature = "reuse_tree"))]
        {
            0.0
        }
    }

    pub fn rest_density(&self) -> Real {
        1000.0
    }

    pub fn sound_speed(&self) -> Real {
        31.3
    }

    /// Tait-EOS stiffness `C_B = rho0 * c_s^2 / 7`.
    pub fn stiffness(&self) -> Real {
        self.rest_density() * self.sound_speed() * self.sound_speed() / 7.0
    }

    pub fn alpha(&self) -> Real {
        0.1
    }

    /// Artificial-viscosity coefficient `VISC = alpha * SLEN * c_s / rho0`.
    pub fn viscosity(&self) -> Real {
        self.alpha() * self.slen() * self.sound_speed() / self.rest_density()
    }

    /// Baseline (non-CFL) leap-frog timestep.
    pub fn base_dt(&self) -> Real {
        0.4 * self.slen() / self.sound_speed() / (1.0 + 0.6 * self.alpha())
    }

    /// Per-particle mass implied by the rest density and spacing:
    /// `mass = rho0 * L0^DIM`.
    pub fn particle_mass(&self) -> Real {
        let l0 = self.l0();
        #[cfg(not(feature = "dim3"))]
        {
            self.rest_density() * l0 * l0
        }
        #[cfg(feature = "dim3")]
        {
            self.rest_density() * l0 * l0 * l0
        }
    }

    #[cfg(not(feature = "dim3"))]
    pub fn gravity(&self) -> RVec {
        RVec::new(0.0, -9.81)
    }
    #[cfg(feature = "dim3")]
    pub fn gravity(&self) -> RVec {
        RVec::new(0.0, 0.0, -9.81)
    }
}
