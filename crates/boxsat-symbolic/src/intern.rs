//! Weak hash-consing table shared by expression and formula cells.
//!
//! Buckets are keyed by the structural hash and hold weak references only, so
//! interning never keeps a dead term alive. Dead entries are pruned whenever
//! their bucket is visited.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::{Arc, Weak};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

pub(crate) struct Interner<T> {
    buckets: DashMap<u64, Vec<Weak<T>>, FxBuildHasher>,
}

impl<T> Interner<T> {
    pub(crate) fn new() -> Self {
        Interner {
            buckets: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Return the interned cell for `hash`, matching candidates with `same`,
    /// or insert the cell produced by `build`.
    pub(crate) fn intern(
        &self,
        hash: u64,
        same: impl Fn(&T) -> bool,
        build: impl FnOnce() -> Arc<T>,
    ) -> Arc<T> {
        let mut bucket = self.buckets.entry(hash).or_default();
        bucket.retain(|weak| weak.strong_count() > 0);
        for weak in bucket.iter() {
            if let Some(cell) = weak.upgrade() {
                if same(&cell) {
                    return cell;
                }
            }
        }
        let cell = build();
        bucket.push(Arc::downgrade(&cell));
        cell
    }
}
