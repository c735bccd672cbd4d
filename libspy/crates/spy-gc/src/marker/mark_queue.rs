//! Mark Stack - Explicit worklist for the mark phase
//!
//! Marking never recurses: an object is pushed when its mark bit is set and
//! popped to have its children scanned. Deep or cyclic object graphs only
//! grow this vector, never the native stack.

/// Worklist of payload addresses waiting to be scanned
#[derive(Debug, Default)]
pub struct MarkStack {
    data: Vec<usize>,
    pushed: usize,
    high_water: usize,
}

impl MarkStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stack with pre-reserved capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pushed: 0,
            high_water: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, object: usize) {
        self.data.push(object);
        self.pushed += 1;
        self.high_water = self.high_water.max(self.data.len());
    }

    #[inline]
    pub fn pop(&mut self) -> Option<usize> {
        self.data.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Drop pending work and reset counters, keeping the allocation
    pub fn clear(&mut self) {
        self.data.clear();
        self.pushed = 0;
        self.high_water = 0;
    }

    pub fn stats(&self) -> MarkStackStats {
        MarkStackStats {
            pushed: self.pushed,
            high_water: self.high_water,
            pending: self.data.len(),
        }
    }
}

/// Statistics for one mark phase
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MarkStackStats {
    /// Objects pushed since the last clear
    pub pushed: usize,
    /// Deepest the stack got
    pub high_water: usize,
    /// Objects still waiting
    pub pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifo_order() {
        let mut stack = MarkStack::new();
        stack.push(0x10);
        stack.push(0x20);
        assert_eq!(stack.pop(), Some(0x20));
        assert_eq!(stack.pop(), Some(0x10));
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_stats_and_clear() {
        let mut stack = MarkStack::with_capacity(4);
        for addr in [0x10, 0x20, 0x30] {
            stack.push(addr);
        }
        stack.pop();
        stack.push(0x40);

        let stats = stack.stats();
        assert_eq!(stats.pushed, 4);
        assert_eq!(stats.high_water, 3);
        assert_eq!(stats.pending, 3);

        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.stats(), MarkStackStats::default());
    }
}
