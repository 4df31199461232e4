//! Cubic-spline SPH kernel and the density/hydro pair loops (component C6).
//!
//! These are the inner loop of the simulation and the numerical contract of
//! the whole system, so every constant and branch here follows spec.md §4.4
//! literally rather than the (mutually divergent) `kernel.cpp` drafts in
//! `original_source/`.

use crate::config::Config;
use crate::geometry::{dot, norm_sq, Real, RVec};
use crate::particle::{Dens, Hydro, Particle};

/// Tait equation of state: `p = max(0, C_B * ((rho/rho0)^7 - 1))`.
pub fn pressure(dens: Real, config: &Config) -> Real {
    let ratio = dens / config.rest_density();
    (config.stiffness() * (ratio.powi(7) - 1.0)).max(0.0)
}

/// Smoothing radius `H = SLEN / 2`.
fn smoothing_h(config: &Config) -> Real {
    config.slen() * 0.5
}

#[cfg(not(feature = "dim3"))]
fn kernel_coef(h: Real) -> Real {
    10.0 / (7.0 * std::f64::consts::PI as Real * h * h)
}
#[cfg(feature = "dim3")]
fn kernel_coef(h: Real) -> Real {
    1.0 / (std::f64::consts::PI as Real * h * h * h)
}

#[cfg(not(feature = "dim3"))]
fn grad_coef(h: Real) -> Real {
    45.0 / (14.0 * std::f64::consts::PI as Real * h * h * h * h)
}
#[cfg(feature = "dim3")]
fn grad_coef(h: Real) -> Real {
    9.0 / (4.0 * std::f64::consts::PI as Real * h * h * h * h * h)
}

/// Cubic-spline kernel value `W(dr)`. Zero outside the `s >= 2` support.
pub fn w(dr2: Real, config: &Config) -> Real {
    let h = smoothing_h(config);
    let s = dr2.sqrt() / h;
    let v = if s < 1.0 {
        1.0 - 1.5 * s * s + 0.75 * s * s * s
    } else if s < 2.0 {
        0.25 * (2.0 - s).powi(3)
    } else {
        0.0
    };
    kernel_coef(h) * v
}

/// Kernel gradient `grad W(dr)`.
pub fn grad_w(dr: RVec, dr2: Real, config: &Config) -> RVec {
    let h = smoothing_h(config);
    let s = dr2.sqrt() / h;
    let scale = if s < 1.0 {
        s - 4.0 / 3.0
    } else if s < 2.0 {
        -(2.0 - s).powi(2) / (3.0 * s)
    } else {
        0.0
    };
    dr * (grad_coef(h) * scale)
}

/// Density pass for a single target against a slice of sources (spec.md
/// §4.4). `ps_i` here is a single particle; callers iterate the target leaf.
pub fn calc_dens_pair(target: &Particle, sources: &[Particle], config: &Config) -> Dens {
    let slen2 = config.slen() * config.slen();
    let mut dens = 0.0;
    for src in sources {
        let dr = target.pos - src.pos;
        let dr2 = norm_sq(dr);
        if dr2 >= slen2 {
            continue;
        }
        dens += src.mass * w(dr2, config);
    }
    Dens {
        dens,
        pres: pressure(dens, config),
    }
}

/// Hydro-force pass for a single target against a slice of sources,
/// including artificial viscosity and gravity (spec.md §4.4).
pub fn calc_hydro_pair(target: &Particle, sources: &[Particle], config: &Config) -> Hydro {
    let slen2 = config.slen() * config.slen();
    let visc = config.viscosity();
    let q_i = target.pres / (target.dens * target.dens);

    let mut acc = crate::geometry::zero();
    for src in sources {
        let dr = target.pos - src.pos;
        let dr2 = norm_sq(dr);
        if dr2 >= slen2 {
            continue;
        }
        let q_j = src.pres / (src.dens * src.dens);
        let grad = grad_w(dr, dr2, config);
        let dv = target.vel - src.vel;
        let vr = dot(dv, dr);
        let av = if vr > 0.0 {
            0.0
        } else {
            -visc * vr / (dr2 + 0.01 * slen2)
        };
        acc = acc - grad * (src.mass * (q_i + q_j + av));
    }
    acc = acc + config.gravity();

    let f = target.f.map(|_| target.mass * acc.magnitude());

    Hydro { acc, f }
}
