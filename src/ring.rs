//! Fixed-depth ring queue
//!
//! `RingQueue` backs both the event queue and the trace buffer. Head and tail
//! are free-running `u8` counters that wrap naturally; the slot index is the
//! counter masked by `N - 1`, so the depth must be a power of two no larger
//! than 128. Occupancy is `tail - head` in wrapping arithmetic, which keeps the
//! queue correct from any starting offset, including one left over from a
//! previous use of the same storage.
//!
//! | Operation | Full queue | Empty queue |
//! |-----------|------------|-------------|
//! | [`put`](RingQueue::put) | rejected, unchanged | appended at tail |
//! | [`push`](RingQueue::push) | rejected, unchanged | inserted at head |
//! | [`put_overwrite`](RingQueue::put_overwrite) | oldest dropped | appended |
//! | [`get`](RingQueue::get) | oldest removed | `None` |

#[derive(Debug, Clone)]
pub struct RingQueue<T: Copy + Default, const N: usize> {
    slots: [T; N],
    head: u8,
    tail: u8,
}

impl<T: Copy + Default, const N: usize> RingQueue<T, N> {
    const MASK: u8 = {
        assert!(N.is_power_of_two() && N <= 128, "depth must be a power of two <= 128");
        (N - 1) as u8
    };

    /// Empty queue starting at offset 0
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Empty queue whose head and tail start at `offset`
    pub fn with_offset(offset: u8) -> Self {
        let _ = Self::MASK;
        Self {
            slots: [T::default(); N],
            head: offset,
            tail: offset,
        }
    }

    /// Discard all elements; the current offset is kept
    #[inline]
    pub fn clear(&mut self) {
        self.head = self.tail;
    }

    #[inline]
    pub fn len(&self) -> usize {
        usize::from(self.tail.wrapping_sub(self.head))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    fn slot(index: u8) -> usize {
        usize::from(index & Self::MASK)
    }

    /// FIFO insert at the tail. A full queue hands the element back.
    pub fn put(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.slots[Self::slot(self.tail)] = item;
        self.tail = self.tail.wrapping_add(1);
        Ok(())
    }

    /// Remove the element at the head
    pub fn get(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[Self::slot(self.head)];
        self.head = self.head.wrapping_add(1);
        Some(item)
    }

    /// LIFO insert at the head, so the next `get` returns it
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.head = self.head.wrapping_sub(1);
        self.slots[Self::slot(self.head)] = item;
        Ok(())
    }

    /// FIFO insert that drops the oldest element when full. Returns the
    /// dropped element, if any.
    pub fn put_overwrite(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.get() } else { None };
        self.slots[Self::slot(self.tail)] = item;
        self.tail = self.tail.wrapping_add(1);
        evicted
    }

    /// Element at the head without removing it
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        Some(&self.slots[Self::slot(self.head)])
    }

    /// Elements from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.tail.wrapping_sub(self.head))
            .map(move |i| &self.slots[Self::slot(self.head.wrapping_add(i))])
    }
}

impl<T: Copy + Default, const N: usize> Default for RingQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    const OFFSETS: [u8; 8] = [0, 1, 2, 3, 4, 5, 254, 255];

    fn assert_occupancy<T: Copy + Default, const N: usize>(q: &RingQueue<T, N>, expected: usize) {
        assert_eq!(q.len(), expected);
        assert_eq!(q.is_empty(), expected == 0);
        assert_eq!(q.is_full(), expected == N);
        assert_eq!(q.iter().count(), expected);
    }

    fn check_fifo<const N: usize>(offset: u8) {
        for n in 0..=N {
            let mut q = RingQueue::<u16, N>::with_offset(offset);
            for i in 0..n {
                assert!(q.put(1000 + i as u16).is_ok());
                assert_occupancy(&q, i + 1);
            }
            for i in 0..n {
                assert_eq!(q.get(), Some(1000 + i as u16));
                assert_occupancy(&q, n - i - 1);
            }
            assert_eq!(q.get(), None);
            assert_occupancy(&q, 0);
        }
    }

    fn check_full_rejects<const N: usize>(offset: u8) {
        let mut q = RingQueue::<u8, N>::with_offset(offset);
        for i in 0..N {
            q.put(i as u8).unwrap();
        }
        let before: Vec<u8> = q.iter().copied().collect();
        assert_eq!(q.put(0xEE), Err(0xEE));
        assert_eq!(q.push(0xEF), Err(0xEF));
        assert_occupancy(&q, N);
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), before);
        for i in 0..N {
            assert_eq!(q.get(), Some(i as u8));
        }
    }

    fn check_lifo<const N: usize>(offset: u8) {
        let mut q = RingQueue::<u32, N>::with_offset(offset);
        for i in 0..N - 1 {
            q.put(i as u32).unwrap();
        }
        q.push(0xDEAD).unwrap();
        assert_occupancy(&q, N);
        assert_eq!(q.get(), Some(0xDEAD));
        for i in 0..N - 1 {
            assert_eq!(q.get(), Some(i as u32));
        }
    }

    fn check_overwrite<const N: usize>(offset: u8) {
        let mut q = RingQueue::<u16, N>::with_offset(offset);
        for i in 0..(3 * N) as u16 {
            let evicted = q.put_overwrite(i);
            if usize::from(i) < N {
                assert_eq!(evicted, None);
            } else {
                assert_eq!(evicted, Some(i - N as u16));
            }
            assert!(q.len() <= N);
        }
        let kept: Vec<u16> = q.iter().copied().collect();
        let expected: Vec<u16> = (2 * N as u16..3 * N as u16).collect();
        assert_eq!(kept, expected);
    }

    macro_rules! for_depths {
        ($check:ident) => {
            for &offset in &OFFSETS {
                $check::<1>(offset);
                $check::<2>(offset);
                $check::<4>(offset);
                $check::<8>(offset);
                $check::<16>(offset);
            }
        };
    }

    #[test]
    fn test_fifo_order_from_any_offset() {
        for_depths!(check_fifo);
    }

    #[test]
    fn test_full_queue_rejects_without_change() {
        for_depths!(check_full_rejects);
    }

    #[test]
    fn test_lifo_push_is_read_first() {
        for_depths!(check_lifo);
    }

    #[test]
    fn test_overwrite_keeps_newest() {
        for_depths!(check_overwrite);
    }

    #[test]
    fn test_clear_keeps_offset() {
        let mut q = RingQueue::<u8, 4>::with_offset(254);
        q.put(1).unwrap();
        q.put(2).unwrap();
        q.put(3).unwrap();
        q.clear();
        assert_occupancy(&q, 0);
        assert_eq!(q.peek(), None);
        q.put(9).unwrap();
        assert_eq!(q.peek(), Some(&9));
    }

    #[test]
    fn test_max_depth() {
        let mut q = RingQueue::<u8, 128>::with_offset(255);
        for i in 0..128 {
            q.put(i).unwrap();
        }
        assert!(q.is_full());
        assert_eq!(q.put(0), Err(0));
        assert_eq!(q.get(), Some(0));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8),
        Push(u8),
        Overwrite(u8),
        Get,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Put),
            any::<u8>().prop_map(Op::Push),
            any::<u8>().prop_map(Op::Overwrite),
            Just(Op::Get),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_vecdeque_model(
            offset in any::<u8>(),
            ops in proptest::collection::vec(op_strategy(), 0..200),
        ) {
            const DEPTH: usize = 8;
            let mut q = RingQueue::<u8, DEPTH>::with_offset(offset);
            let mut model: VecDeque<u8> = VecDeque::new();

            for op in ops {
                match op {
                    Op::Put(v) => {
                        let accepted = q.put(v).is_ok();
                        prop_assert_eq!(accepted, model.len() < DEPTH);
                        if accepted {
                            model.push_back(v);
                        }
                    }
                    Op::Push(v) => {
                        let accepted = q.push(v).is_ok();
                        prop_assert_eq!(accepted, model.len() < DEPTH);
                        if accepted {
                            model.push_front(v);
                        }
                    }
                    Op::Overwrite(v) => {
                        let evicted = q.put_overwrite(v);
                        let expected = if model.len() == DEPTH { model.pop_front() } else { None };
                        prop_assert_eq!(evicted, expected);
                        model.push_back(v);
                    }
                    Op::Get => {
                        prop_assert_eq!(q.get(), model.pop_front());
                    }
                }
                prop_assert_eq!(q.len(), model.len());
                prop_assert!(q.iter().copied().eq(model.iter().copied()));
            }
        }
    }
}
