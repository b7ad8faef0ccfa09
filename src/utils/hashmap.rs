//! Hash-maps and hash-sets that iterate deterministically.
//!
//! Both rely on [`FxHasher32`](super::fx_hasher::FxHasher32) so the iteration order only
//! depends on the sequence of insertions. With the `enhanced-determinism` feature enabled,
//! maps are backed by [`indexmap`] and iterate in insertion order.

use core::hash::BuildHasherDefault;

use super::fx_hasher::FxHasher32;

/// The hasher builder shared by all the maps of this crate.
pub type FxBuildHasher = BuildHasherDefault<FxHasher32>;

/// Deterministic hashmap using [`indexmap::IndexMap`].
#[cfg(feature = "enhanced-determinism")]
pub type HashMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;
/// Deterministic hashset using [`indexmap::IndexSet`].
#[cfg(feature = "enhanced-determinism")]
pub type HashSet<K> = indexmap::IndexSet<K, FxBuildHasher>;
#[cfg(feature = "enhanced-determinism")]
pub use indexmap::map::Entry;

/// Hashmap using [`hashbrown::HashMap`].
#[cfg(not(feature = "enhanced-determinism"))]
pub type HashMap<K, V> = hashbrown::hash_map::HashMap<K, V, FxBuildHasher>;
/// Hashset using [`hashbrown::HashSet`].
#[cfg(not(feature = "enhanced-determinism"))]
pub type HashSet<K> = hashbrown::hash_set::HashSet<K, FxBuildHasher>;
#[cfg(not(feature = "enhanced-determinism"))]
pub use hashbrown::hash_map::Entry;

/// Removes `key` from a [`HashMap`], preserving the order of the remaining entries when it
/// matters.
#[inline]
pub fn remove_entry<K: core::hash::Hash + Eq, V>(map: &mut HashMap<K, V>, key: &K) -> Option<V> {
    #[cfg(feature = "enhanced-determinism")]
    return map.shift_remove(key);
    #[cfg(not(feature = "enhanced-determinism"))]
    return map.remove(key);
}
