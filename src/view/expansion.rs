use std::collections::BTreeSet;

/// Which rows of the current result set have their detail panel open.
///
/// Keys are row indices scoped to a result-set generation: looking up or
/// toggling with a different generation first forgets every expanded row.
#[derive(Debug, Clone, Default)]
pub struct RowExpansion {
    generation: u64,
    expanded: BTreeSet<usize>,
}

impl RowExpansion {
    fn sync(&mut self, generation: u64) {
        if self.generation != generation {
            self.generation = generation;
            self.expanded.clear();
        }
    }

    /// Flip one row and return whether it is now expanded.
    pub fn toggle(&mut self, generation: u64, index: usize) -> bool {
        self.sync(generation);
        if self.expanded.remove(&index) {
            false
        } else {
            self.expanded.insert(index);
            true
        }
    }

    pub fn is_expanded(&self, generation: u64, index: usize) -> bool {
        self.generation == generation && self.expanded.contains(&index)
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    pub fn expanded_count(&self, generation: u64) -> usize {
        if self.generation == generation {
            self.expanded.len()
        } else {
            0
        }
    }
}
