//! Binary heap of `usize` handles ordered by a caller-supplied comparator.
//!
//! The heap never sees the values it orders. Callers keep cursors or block
//! boundaries in an arena and pass `before(a, b)`, which returns true when
//! handle `a` belongs closer to the top than `b`. This keeps the comparison
//! state (blocks, sort description) borrowed instead of cloned into each entry.

#[derive(Debug, Clone, Default)]
pub struct IndexHeap {
    slots: Vec<usize>,
}

impl IndexHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            slots: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn peek(&self) -> Option<usize> {
        self.slots.first().copied()
    }

    pub fn push<F>(&mut self, handle: usize, mut before: F)
    where
        F: FnMut(usize, usize) -> bool,
    {
        self.slots.push(handle);
        self.sift_up(self.slots.len() - 1, &mut before);
    }

    pub fn pop<F>(&mut self, mut before: F) -> Option<usize>
    where
        F: FnMut(usize, usize) -> bool,
    {
        if self.slots.is_empty() {
            return None;
        }
        let top = self.slots.swap_remove(0);
        if !self.slots.is_empty() {
            self.sift_down(0, &mut before);
        }
        Some(top)
    }

    /// Restore heap order after the key behind the top handle changed.
    ///
    /// Equivalent to popping the top and pushing it back, without the extra
    /// sift-up.
    pub fn update_top<F>(&mut self, mut before: F)
    where
        F: FnMut(usize, usize) -> bool,
    {
        if !self.slots.is_empty() {
            self.sift_down(0, &mut before);
        }
    }

    fn sift_up<F>(&mut self, mut pos: usize, before: &mut F)
    where
        F: FnMut(usize, usize) -> bool,
    {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !before(self.slots[pos], self.slots[parent]) {
                break;
            }
            self.slots.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down<F>(&mut self, mut pos: usize, before: &mut F)
    where
        F: FnMut(usize, usize) -> bool,
    {
        let len = self.slots.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && before(self.slots[right], self.slots[left]) {
                right
            } else {
                left
            };
            if !before(self.slots[child], self.slots[pos]) {
                break;
            }
            self.slots.swap(pos, child);
            pos = child;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IndexHeap;

    #[test]
    fn pops_in_comparator_order() {
        let keys = [5, 1, 9, 3, 7, 3];
        let mut heap = IndexHeap::new();
        for i in 0..keys.len() {
            heap.push(i, |a, b| keys[a] < keys[b]);
        }
        let mut out = Vec::new();
        while let Some(h) = heap.pop(|a, b| keys[a] < keys[b]) {
            out.push(keys[h]);
        }
        assert_eq!(out, vec![1, 3, 3, 5, 7, 9]);
    }

    #[test]
    fn update_top_resinks_changed_key() {
        let mut keys = vec![1, 4, 6];
        let mut heap = IndexHeap::new();
        for i in 0..keys.len() {
            heap.push(i, |a, b| keys[a] < keys[b]);
        }
        assert_eq!(heap.peek(), Some(0));
        keys[0] = 5;
        heap.update_top(|a, b| keys[a] < keys[b]);
        assert_eq!(heap.peek(), Some(1));
        assert_eq!(heap.len(), 3);
    }

    #[test]
    fn max_heap_by_inverting_comparator() {
        let keys = [2, 8, 4];
        let mut heap = IndexHeap::with_capacity(3);
        for i in 0..keys.len() {
            heap.push(i, |a, b| keys[a] > keys[b]);
        }
        assert_eq!(heap.peek(), Some(1));
        heap.clear();
        assert!(heap.is_empty());
    }
}
