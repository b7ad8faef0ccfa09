use ena::unify::{InPlaceUnificationTable, UnifyKey};

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
struct IntKey(u32);

impl UnifyKey for IntKey {
    type Value = ();
    fn index(&self) -> u32 {
        self.0
    }
    fn from_index(u: u32) -> IntKey {
        IntKey(u)
    }
    fn tag() -> &'static str {
        "IntKey"
    }
}

/// A union-find structure over the integers `0..len`.
///
/// This has no knowledge of what the elements represent: it is used to group mesh
/// triangles into islands as well as image pixels into regions.
pub struct DisjointSet {
    table: InPlaceUnificationTable<IntKey>,
}

impl DisjointSet {
    /// Creates `len` singleton sets.
    pub fn new(len: usize) -> Self {
        let mut table = InPlaceUnificationTable::new();
        for _ in 0..len {
            let _ = table.new_key(());
        }
        Self { table }
    }

    /// The number of elements tracked by this structure.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Is this structure tracking zero elements?
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// The representative of the set containing `i`.
    pub fn find(&mut self, i: usize) -> usize {
        self.table.find(IntKey(i as u32)).0 as usize
    }

    /// Merges the sets containing `a` and `b`.
    pub fn union(&mut self, a: usize, b: usize) {
        self.table.union(IntKey(a as u32), IntKey(b as u32));
    }

    /// Are `a` and `b` in the same set?
    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.table.unioned(IntKey(a as u32), IntKey(b as u32))
    }

    /// Assigns to each element the index of its group, where groups are numbered
    /// `0..num_groups` in order of first appearance.
    ///
    /// Returns the per-element group index and the number of groups. Elements for which
    /// `include` returns `false` get `usize::MAX` and do not form groups.
    pub fn compact_groups(&mut self, include: impl Fn(usize) -> bool) -> (Vec<usize>, usize) {
        let len = self.len();
        let mut root_to_group = vec![usize::MAX; len];
        let mut groups = vec![usize::MAX; len];
        let mut num_groups = 0;

        for (i, group) in groups.iter_mut().enumerate() {
            if !include(i) {
                continue;
            }

            let root = self.find(i);
            if root_to_group[root] == usize::MAX {
                root_to_group[root] = num_groups;
                num_groups += 1;
            }
            *group = root_to_group[root];
        }

        (groups, num_groups)
    }
}

#[cfg(test)]
mod test {
    use super::DisjointSet;

    #[test]
    fn union_and_groups() {
        let mut set = DisjointSet::new(6);
        set.union(0, 3);
        set.union(3, 5);
        set.union(1, 2);

        assert!(set.connected(0, 5));
        assert!(!set.connected(0, 1));
        assert_eq!(set.find(5), set.find(0));

        let (groups, num_groups) = set.compact_groups(|i| i != 4);
        assert_eq!(num_groups, 2);
        assert_eq!(groups, vec![0, 1, 1, 0, usize::MAX, 0]);
    }
}
