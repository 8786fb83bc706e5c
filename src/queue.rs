/// Pending writes accumulated between `begin()` and `commit()`.
///
/// Shared by the adapters that batch in memory. The queue never talks to a
/// sink itself: an adapter reads [`pending`](Self::pending), performs the
/// write, and only calls [`clear`](Self::clear) or
/// [`finish`](Self::finish) once the sink accepted it. A failed flush
/// therefore leaves both the entries and the transaction flag untouched.
#[derive(Debug)]
pub struct BatchQueue<T> {
    active: bool,
    entries: Vec<T>,
}

impl<T> Default for BatchQueue<T> {
    fn default() -> Self {
        BatchQueue {
            active: false,
            entries: Vec::new(),
        }
    }
}

impl<T> BatchQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// End the transaction but keep whatever is still pending.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    pub fn pending(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when `commit()` has something to write.
    pub fn needs_flush(&self) -> bool {
        self.active && !self.entries.is_empty()
    }

    /// Drop the first `n` entries after they were accepted by the sink.
    pub fn drain_front(&mut self, n: usize) {
        let n = n.min(self.entries.len());
        self.entries.drain(..n);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Close the transaction after a successful flush (or a no-op commit).
    pub fn finish(&mut self) {
        self.entries.clear();
        self.active = false;
    }

    /// Discard pending entries without sending them.
    pub fn discard(&mut self) -> usize {
        let dropped = self.entries.len();
        self.finish();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_is_needed_only_inside_non_empty_transaction() {
        let mut queue = BatchQueue::new();
        queue.push(1);
        assert!(!queue.needs_flush());

        queue.activate();
        assert!(queue.needs_flush());

        queue.finish();
        assert!(!queue.needs_flush());
        assert!(queue.is_empty());
        assert!(!queue.is_active());
    }

    #[test]
    fn drain_front_keeps_unsent_tail_in_order() {
        let mut queue = BatchQueue::new();
        queue.activate();
        for i in 0..4 {
            queue.push(i);
        }

        queue.drain_front(2);
        assert_eq!(queue.pending(), &[2, 3]);
        assert!(queue.is_active());

        queue.drain_front(10);
        assert!(queue.is_empty());
    }

    #[test]
    fn discard_reports_dropped_entries() {
        let mut queue = BatchQueue::new();
        queue.activate();
        queue.push("a");
        queue.push("b");

        assert_eq!(queue.discard(), 2);
        assert!(!queue.is_active());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn deactivate_keeps_unsent_entries() {
        let mut queue = BatchQueue::new();
        queue.push("unsent");
        queue.activate();
        queue.deactivate();

        assert!(!queue.is_active());
        assert_eq!(queue.pending(), &["unsent"]);
    }
}
