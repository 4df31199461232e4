//! Fixed-dimension vector and bounding-box algebra (component C1).
//!
//! The dimension (2D or 3D) and scalar precision are Cargo features rather
//! than runtime values, mirroring the `SPH_2D`/`SPH_DOUBLE` compile-time
//! switches of the system this crate is modeled on: there is no value of
//! `DIM` or `Real` that changes at runtime, so there is no reason to pay for
//! a runtime branch on every vector operation.

#[cfg(feature = "single_precision")]
pub use lin_alg::f32::{Vec2, Vec3};
#[cfg(feature = "single_precision")]
pub type Real = f32;

#[cfg(not(feature = "single_precision"))]
pub use lin_alg::f64::{Vec2, Vec3};
#[cfg(not(feature = "single_precision"))]
pub type Real = f64;

/// Spatial dimension of the active build: 2 or 3.
#[cfg(not(feature = "dim3"))]
pub const DIM: usize = 2;
#[cfg(feature = "dim3")]
pub const DIM: usize = 3;

/// Number of orthants (quadrants in 2D, octants in 3D) a node subdivides into.
pub const N_ORTHANTS: usize = 1 << DIM;

/// The vector type used throughout the crate: `Vec2` in 2D builds, `Vec3` in
/// 3D builds.
#[cfg(not(feature = "dim3"))]
pub type RVec = Vec2;
#[cfg(feature = "dim3")]
pub type RVec = Vec3;

/// Zero vector, spelled out once so call sites don't need to know which
/// underlying type `RVec` resolves to.
pub fn zero() -> RVec {
    RVec::new_zero()
}

/// Componentwise dot product. `lin_alg`'s `Vec2`/`Vec3` expose arithmetic
/// operators but not a dot product directly, so this stays a free function
/// rather than a trait method.
#[cfg(not(feature = "dim3"))]
pub fn dot(a: RVec, b: RVec) -> Real {
    a.x * b.x + a.y * b.y
}
#[cfg(feature = "dim3")]
pub fn dot(a: RVec, b: RVec) -> Real {
    a.x * b.x + a.y * b.y + a.z * b.z
}

/// Squared Euclidean norm, i.e. `dot(v, v)`.
pub fn norm_sq(v: RVec) -> Real {
    dot(v, v)
}

/// The orthant of `v` relative to `origin`: bit *k* is 1 iff component *k* of
/// `v` is strictly greater than component *k* of `origin`. Particles exactly
/// on a split plane fall into the lower-index orthant (spec.md §4.1).
#[cfg(not(feature = "dim3"))]
pub fn orthant(v: RVec, origin: RVec) -> usize {
    ((v.x > origin.x) as usize) | (((v.y > origin.y) as usize) << 1)
}
#[cfg(feature = "dim3")]
pub fn orthant(v: RVec, origin: RVec) -> usize {
    ((v.x > origin.x) as usize)
        | (((v.y > origin.y) as usize) << 1)
        | (((v.z > origin.z) as usize) << 2)
}

fn min_component(a: Real, b: Real) -> Real {
    if a < b {
        a
    } else {
        b
    }
}

fn max_component(a: Real, b: Real) -> Real {
    if a > b {
        a
    } else {
        b
    }
}

#[cfg(not(feature = "dim3"))]
fn componentwise_min(a: RVec, b: RVec) -> RVec {
    RVec::new(min_component(a.x, b.x), min_component(a.y, b.y))
}
#[cfg(not(feature = "dim3"))]
fn componentwise_max(a: RVec, b: RVec) -> RVec {
    RVec::new(max_component(a.x, b.x), max_component(a.y, b.y))
}
#[cfg(feature = "dim3")]
fn componentwise_min(a: RVec, b: RVec) -> RVec {
    RVec::new(
        min_component(a.x, b.x),
        min_component(a.y, b.y),
        min_component(a.z, b.z),
    )
}
#[cfg(feature = "dim3")]
fn componentwise_max(a: RVec, b: RVec) -> RVec {
    RVec::new(
        max_component(a.x, b.x),
        max_component(a.y, b.y),
        max_component(a.z, b.z),
    )
}

/// An axis-aligned bounding box. Default-constructed as *empty*
/// (`min = +inf`, `max = -inf`) so that merging any point produces a tight
/// box (spec.md §3).
#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub min: RVec,
    pub max: RVec,
}

#[cfg(not(feature = "dim3"))]
fn splat(v: Real) -> RVec {
    RVec::new(v, v)
}
#[cfg(feature = "dim3")]
fn splat(v: Real) -> RVec {
    RVec::new(v, v, v)
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: splat(Real::INFINITY),
            max: splat(Real::NEG_INFINITY),
        }
    }
}

impl Aabb {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_point(p: RVec) -> Self {
        Self { min: p, max: p }
    }

    pub fn merge_point(&mut self, p: RVec) -> &mut Self {
        self.min = componentwise_min(self.min, p);
        self.max = componentwise_max(self.max, p);
        self
    }

    pub fn merge_box(&mut self, other: &Aabb) -> &mut Self {
        self.min = componentwise_min(self.min, other.min);
        self.max = componentwise_max(self.max, other.max);
        self
    }

    /// Symmetric grow by `margin` on every axis.
    pub fn expand(&self, margin: Real) -> Self {
        Self {
            min: self.min - splat(margin),
            max: self.max + splat(margin),
        }
    }

    pub fn center(&self) -> RVec {
        (self.min + self.max) * 0.5
    }

    /// Closed-interval AABB overlap test.
    #[cfg(not(feature = "dim3"))]
    pub fn intersect(&self, other: &Aabb) -> bool {
        other.min.x <= self.max.x
            && self.min.x <= other.max.x
            && other.min.y <= self.max.y
            && self.min.y <= other.max.y
    }
    #[cfg(feature = "dim3")]
    pub fn intersect(&self, other: &Aabb) -> bool {
        other.min.x <= self.max.x
            && self.min.x <= other.max.x
            && other.min.y <= self.max.y
            && self.min.y <= other.max.y
            && other.min.z <= self.max.z
            && self.min.z <= other.max.z
    }

    /// The child box covering orthant `i` of this box relative to its center.
    #[cfg(not(feature = "dim3"))]
    pub fn orthant(&self, i: usize) -> Aabb {
        let c = self.center();
        let corner = RVec::new(
            if i & 1 != 0 { self.max.x } else { self.min.x },
            if i & 2 != 0 { self.max.y } else { self.min.y },
        );
        Aabb {
            min: componentwise_min(corner, c),
            max: componentwise_max(corner, c),
        }
    }
    #[cfg(feature = "dim3")]
    pub fn orthant(&self, i: usize) -> Aabb {
        let c = self.center();
        let corner = RVec::new(
            if i & 1 != 0 { self.max.x } else { self.min.x },
            if i & 2 != 0 { self.max.y } else { self.min.y },
            if i & 4 != 0 { self.max.z } else { self.min.z },
        );
        Aabb {
            min: componentwise_min(corner, c),
            max: componentwise_max(corner, c),
        }
    }

    /// Coerce to a square (cube in 3D) covering the same extent, so orthant
    /// subdivision stays geometrically regular. Optional per spec.md §4.1,
    /// but kept stable across a reuse-mode run of steps.
    #[cfg(not(feature = "dim3"))]
    pub fn square(&self) -> Aabb {
        let size = self.max - self.min;
        let width = max_component(size.x, size.y);
        let c = self.center();
        let half = splat(width * 0.5);
        Aabb {
            min: c - half,
            max: c + half,
        }
    }
    #[cfg(feature = "dim3")]
    pub fn square(&self) -> Aabb {
        let size = self.max - self.min;
        let width = max_component(max_component(size.x, size.y), size.z);
        let c = self.center();
        let half = splat(width * 0.5);
        Aabb {
            min: c - half,
            max: c + half,
        }
    }

    pub fn contains(&self, p: RVec) -> bool {
        self.intersect(&Aabb::from_point(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_merges_to_a_tight_point() {
        let mut b = Aabb::empty();
        b.merge_point(RVec::new_zero());
        assert!((b.min.x - b.max.x).abs() < 1e-12);
        assert!((b.min.y - b.max.y).abs() < 1e-12);
    }

    #[test]
    fn merge_keeps_min_le_max() {
        #[cfg(not(feature = "dim3"))]
        let pts = [RVec::new(1.0, -2.0), RVec::new(-3.0, 5.0)];
        #[cfg(feature = "dim3")]
        let pts = [RVec::new(1.0, -2.0, 4.0), RVec::new(-3.0, 5.0, -1.0)];

        let mut b = Aabb::empty();
        for p in pts {
            b.merge_point(p);
        }
        assert!(b.min.x <= b.max.x);
        assert!(b.min.y <= b.max.y);
    }

    #[test]
    fn orthant_children_tile_the_parent() {
        #[cfg(not(feature = "dim3"))]
        let b = Aabb {
            min: RVec::new(0.0, 0.0),
            max: RVec::new(2.0, 2.0),
        };
        #[cfg(feature = "dim3")]
        let b = Aabb {
            min: RVec::new(0.0, 0.0, 0.0),
            max: RVec::new(2.0, 2.0, 2.0),
        };

        let mut merged = Aabb::empty();
        for i in 0..N_ORTHANTS {
            let child = b.orthant(i);
            merged.merge_box(&child);
        }
        assert!((merged.min.x - b.min.x).abs() < 1e-9);
        assert!((merged.max.x - b.max.x).abs() < 1e-9);
    }

    #[test]
    fn orthant_bit_matches_sign_of_offset_from_origin() {
        #[cfg(not(feature = "dim3"))]
        {
            let origin = RVec::new(0.0, 0.0);
            assert_eq!(orthant(RVec::new(1.0, 1.0), origin), 0b11);
            assert_eq!(orthant(RVec::new(-1.0, -1.0), origin), 0b00);
            assert_eq!(orthant(RVec::new(1.0, -1.0), origin), 0b01);
        }
        #[cfg(feature = "dim3")]
        {
            let origin = RVec::new(0.0, 0.0, 0.0);
            assert_eq!(orthant(RVec::new(1.0, 1.0, 1.0), origin), 0b111);
            assert_eq!(orthant(RVec::new(-1.0, -1.0, -1.0), origin), 0b000);
        }
    }

    #[test]
    fn ties_go_to_the_lower_orthant() {
        // A particle exactly on the split plane must not be counted as
        // greater-than (strict comparison only).
        #[cfg(not(feature = "dim3"))]
        assert_eq!(orthant(RVec::new(0.0, 0.0), RVec::new(0.0, 0.0)), 0);
        #[cfg(feature = "dim3")]
        assert_eq!(
            orthant(RVec::new(0.0, 0.0, 0.0), RVec::new(0.0, 0.0, 0.0)),
            0
        );
    }
}
