//! Parallel-for abstraction (component C7).
//!
//! `parallel_for` invokes `body(i)` for each index in `range`, with no
//! ordering guarantee between invocations, exactly as spec.md §4.5 requires.
//! Back-end selection happens once, at compile time: `rayon` by default, or
//! a plain sequential loop under the `single_threaded` feature (the
//! "sequential fallback is always valid" contract).

use std::ops::Range;

use rayon::prelude::*;

#[cfg(not(feature = "single_threaded"))]
pub fn parallel_for(range: Range<usize>, body: impl Fn(usize) + Sync) {
    range.into_par_iter().for_each(|i| body(i));
}

#[cfg(feature = "single_threaded")]
pub fn parallel_for(range: Range<usize>, body: impl Fn(usize) + Sync) {
    for i in range {
        body(i);
    }
}

/// Convenience wrapper for the common case of mutating every element of a
/// slice independently — most call sites in this crate (the leaf driver, the
/// leap-frog kicks) index a `&mut [T]` rather than an opaque range.
#[cfg(not(feature = "single_threaded"))]
pub fn parallel_for_each_mut<T: Send>(items: &mut [T], body: impl Fn(&mut T) + Sync) {
    items.par_iter_mut().for_each(|item| body(item));
}

#[cfg(feature = "single_threaded")]
pub fn parallel_for_each_mut<T: Send>(items: &mut [T], body: impl Fn(&mut T) + Sync) {
    for item in items.iter_mut() {
        body(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn parallel_for_visits_every_index_exactly_once() {
        let n = 237;
        let seen: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
        parallel_for(0..n, |i| {
            seen[i].fetch_add(1, Ordering::SeqCst);
        });
        assert!(seen.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn parallel_for_each_mut_touches_every_element() {
        let mut v: Vec<i32> = (0..100).collect();
        parallel_for_each_mut(&mut v, |x| *x *= 2);
        assert!(v.iter().enumerate().all(|(i, &x)| x == (i as i32) * 2));
    }
}
