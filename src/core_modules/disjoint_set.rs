// THEORY:
// A small union-find over dense indices. The connectivity resolver uses it to
// know which chunks have been merged into the same burrow, and the exit-point
// clustering uses it to form single-linkage clusters. Path halving plus union by
// size keeps every operation effectively constant time.

#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Returns the representative of the set containing `index`.
    pub fn find(&mut self, mut index: usize) -> usize {
        while self.parent[index] != index {
            self.parent[index] = self.parent[self.parent[index]];
            index = self.parent[index];
        }
        index
    }

    /// Merges the sets of `a` and `b` and returns the new representative.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return root_a;
        }
        let (large, small) = if self.size[root_a] >= self.size[root_b] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[small] = large;
        self.size[large] += self.size[small];
        large
    }

    pub fn same_set(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Groups all indices by set, ordered by the smallest member of each group.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root = vec![usize::MAX; self.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for index in 0..self.len() {
            let root = self.find(index);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot_of_root[root]].push(index);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sets_are_singletons() {
        let mut sets = DisjointSet::new(3);
        assert!(!sets.same_set(0, 1));
        assert_eq!(sets.groups(), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn union_is_transitive() {
        let mut sets = DisjointSet::new(5);
        sets.union(0, 3);
        sets.union(3, 4);
        assert!(sets.same_set(0, 4));
        assert!(!sets.same_set(1, 4));
        assert_eq!(sets.groups(), vec![vec![0, 3, 4], vec![1], vec![2]]);
    }

    #[test]
    fn union_of_same_set_keeps_root() {
        let mut sets = DisjointSet::new(2);
        let root = sets.union(0, 1);
        assert_eq!(sets.union(1, 0), root);
    }
}
