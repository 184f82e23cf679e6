//! Binary partition tree over an index range

/// Binary tree over `[0, size)`: a node is a leaf or has exactly two
/// children whose sizes add up to its own
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionTree {
    /// Number of indices in this node
    pub size: usize,
    /// Either empty (leaf) or two children
    pub children: Vec<PartitionTree>,
}

impl PartitionTree {
    /// Single leaf of the given size
    pub fn new(size: usize) -> Self {
        Self {
            size,
            children: Vec::new(),
        }
    }

    /// Internal node from two subtrees
    pub fn from_children(left: PartitionTree, right: PartitionTree) -> Self {
        Self {
            size: left.size + right.size,
            children: vec![left, right],
        }
    }

    /// Tree with leaves of at most `leaf_size` indices by recursive bisection
    pub fn with_leaf_size(size: usize, leaf_size: usize) -> Self {
        let mut tree = Self::new(size);
        tree.refine(leaf_size);
        tree
    }

    /// Split leaves in halves until every leaf holds at most `leaf_size`
    /// indices. The right half gets the remainder: `n/2` and `n - n/2`.
    pub fn refine(&mut self, leaf_size: usize) {
        let leaf_size = leaf_size.max(1);
        if self.is_leaf() {
            if self.size > leaf_size {
                self.children = vec![
                    Self::new(self.size / 2),
                    Self::new(self.size - self.size / 2),
                ];
            } else {
                return;
            }
        }
        for c in &mut self.children {
            c.refine(leaf_size);
        }
    }

    /// Split leaves until the tree has at least `min_levels` levels along
    /// every path, stopping at leaves that cannot be split further
    pub fn expand_complete(&mut self, min_levels: usize) {
        if min_levels <= 1 {
            return;
        }
        if self.is_leaf() {
            if self.size < 2 {
                return;
            }
            self.children = vec![
                Self::new(self.size / 2),
                Self::new(self.size - self.size / 2),
            ];
        }
        for c in &mut self.children {
            c.expand_complete(min_levels - 1);
        }
    }

    /// True if this node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of levels (a single leaf has one)
    pub fn levels(&self) -> usize {
        1 + self.children.iter().map(|c| c.levels()).max().unwrap_or(0)
    }

    /// Total number of nodes
    pub fn nodes(&self) -> usize {
        1 + self.children.iter().map(|c| c.nodes()).sum::<usize>()
    }

    /// Leaf sizes from left to right
    pub fn leaf_sizes(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_leaf_sizes(&mut out);
        out
    }

    fn collect_leaf_sizes(&self, out: &mut Vec<usize>) {
        if self.is_leaf() {
            out.push(self.size);
        } else {
            for c in &self.children {
                c.collect_leaf_sizes(out);
            }
        }
    }

    /// Check the structural invariants of the whole tree
    pub fn check(&self) -> bool {
        match self.children.as_slice() {
            [] => true,
            [a, b] => a.size + b.size == self.size && a.check() && b.check(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_size_is_single_leaf() {
        let t = PartitionTree::with_leaf_size(10, 16);
        assert!(t.is_leaf());
        assert_eq!(t.levels(), 1);
        assert_eq!(t.leaf_sizes(), vec![10]);
    }

    #[test]
    fn test_refine_odd_sizes() {
        let t = PartitionTree::with_leaf_size(7, 2);
        assert_eq!(t.children[0].size, 3);
        assert_eq!(t.children[1].size, 4);
        assert_eq!(t.leaf_sizes(), vec![1, 2, 2, 2]);
        assert!(t.check());
    }

    #[test]
    fn test_leaf_size_bound_for_many_sizes() {
        for n in [1usize, 2, 31, 32, 33, 100, 257, 1000] {
            for leaf in [1usize, 3, 16, 64] {
                let t = PartitionTree::with_leaf_size(n, leaf);
                let sizes = t.leaf_sizes();
                assert_eq!(sizes.iter().sum::<usize>(), n);
                assert!(sizes.iter().all(|&s| s <= leaf.max(1)) || (n <= leaf && sizes == vec![n]));
                assert!(t.check());
            }
        }
    }

    #[test]
    fn test_expand_complete() {
        let mut t = PartitionTree::with_leaf_size(100, 60);
        assert_eq!(t.levels(), 2);
        t.expand_complete(4);
        assert_eq!(t.levels(), 4);
        assert_eq!(t.leaf_sizes().len(), 8);
        assert_eq!(t.leaf_sizes().iter().sum::<usize>(), 100);

        // leaves of size one cannot be split
        let mut small = PartitionTree::new(2);
        small.expand_complete(5);
        assert_eq!(small.leaf_sizes(), vec![1, 1]);
    }
}
