//! Arena for heap-allocated integer arrays.
//!
//! The interpreter never sees raw pointers; it holds opaque `i32` handles
//! that index into this arena. Each allocated buffer is laid out as
//! `[length, elem0, elem1, …]` so `arraylength` reads slot 0 and element
//! access is shifted by one slot. Arrays live for the whole run, there is
//! no individual release.

/// Arena of heap-allocated integer arrays addressed by opaque handles.
#[derive(Debug, Default)]
pub struct Heap {
    arrays: Vec<Vec<i32>>,
}

impl Heap {
    pub fn new() -> Self {
        Self { arrays: Vec::new() }
    }

    /// Allocates a zeroed array of `length` elements and returns its
    /// handle. The length is stored at slot 0 of the backing buffer.
    /// Taking an unsigned length keeps the bytecode-level check for
    /// negative counts out of the arena.
    pub fn allocate(&mut self, length: usize) -> i32 {
        let mut array = vec![0i32; length + 1];
        array[0] = length as i32;
        self.arrays.push(array);
        (self.arrays.len() - 1) as i32
    }

    /// Returns the backing buffer for `reference`, length slot included.
    pub fn array(&self, reference: i32) -> Option<&[i32]> {
        usize::try_from(reference)
            .ok()
            .and_then(|idx| self.arrays.get(idx))
            .map(Vec::as_slice)
    }

    /// Mutable variant of [`Heap::array`].
    pub fn array_mut(&mut self, reference: i32) -> Option<&mut [i32]> {
        usize::try_from(reference)
            .ok()
            .and_then(|idx| self.arrays.get_mut(idx))
            .map(Vec::as_mut_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_zeroed_arrays_with_length_slot() {
        let mut heap = Heap::new();
        let re = heap.allocate(3);
        let array = heap.array(re).unwrap();
        assert_eq!(array, &[3, 0, 0, 0]);
    }

    #[test]
    fn handles_are_stable_across_allocations() {
        let mut heap = Heap::new();
        let first = heap.allocate(1);
        let second = heap.allocate(2);
        assert_ne!(first, second);
        heap.array_mut(first).unwrap()[1] = 42;
        assert_eq!(heap.array(first).unwrap()[1], 42);
        assert_eq!(heap.array(second).unwrap()[0], 2);
    }

    #[test]
    fn bogus_references_yield_none() {
        let heap = Heap::new();
        assert!(heap.array(0).is_none());
        assert!(heap.array(-1).is_none());
    }

    #[test]
    fn empty_arrays_still_carry_a_length_slot() {
        let mut heap = Heap::new();
        let re = heap.allocate(0);
        assert_eq!(heap.array(re).unwrap(), &[0]);
    }
}
