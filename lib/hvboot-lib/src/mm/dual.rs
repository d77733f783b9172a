use core::alloc::Layout;
use core::ptr::NonNull;

use super::buddy::{Buddy, BuddyBlock, MIN_ORDER};
use super::heap::{FirstFitHeap, HeapBlock};
use crate::config::mm::{ALIGNED_MAX_ORDER, HEAP_ALIGNMENT};
use crate::int::order_for;

/// Handle returned by [`DualAllocator`]. Freeing goes back to the allocator
/// named by the variant.
#[derive(Debug, PartialEq, Eq)]
pub enum Allocation {
    Heap(HeapBlock),
    Aligned(BuddyBlock),
}

impl Allocation {
    pub fn as_ptr(&self) -> *mut u8 {
        match self {
            Self::Heap(b) => b.as_ptr(),
            Self::Aligned(b) => b.as_ptr(),
        }
    }

    /// Rebuilds the handle for a pointer handed out under `layout`, using the
    /// same alignment threshold as [`DualAllocator::alloc_layout`].
    ///
    /// # Safety
    /// `ptr` must have been returned by `alloc_layout(layout)`.
    pub unsafe fn from_raw(ptr: NonNull<u8>, layout: Layout) -> Self {
        if layout.align() > HEAP_ALIGNMENT {
            Self::Aligned(BuddyBlock::from_raw(ptr, aligned_order(layout)))
        } else {
            let layout = Layout::from_size_align_unchecked(layout.size(), HEAP_ALIGNMENT);
            Self::Heap(HeapBlock::from_raw(ptr, layout))
        }
    }
}

fn aligned_order(layout: Layout) -> u8 {
    order_for(layout.size())
        .max(order_for(layout.align()))
        .max(MIN_ORDER)
}

/// Boot-time allocation context: the first-fit heap plus the aligned buddy.
///
/// Built once from the two arenas it owns.
pub struct DualAllocator {
    heap: FirstFitHeap,
    aligned: Buddy,
}

impl DualAllocator {
    pub fn new(heap_arena: &'static mut [u8], aligned_arena: &'static mut [u8]) -> Self {
        let heap = FirstFitHeap::new(heap_arena);
        let mut aligned = Buddy::new(MIN_ORDER, ALIGNED_MAX_ORDER);
        let start = aligned_arena.as_mut_ptr() as usize;
        unsafe { aligned.reclaim_range(start, start + aligned_arena.len()) };
        crate::debug!(
            "heap {} KiB, aligned buddy {} KiB",
            heap.size() / 1024,
            aligned.free_bytes() / 1024
        );
        Self { heap, aligned }
    }

    /// Default path. Panics when the heap is exhausted.
    pub fn alloc(&mut self, size: usize) -> Allocation {
        match self.try_alloc(size) {
            Some(a) => a,
            None => panic!("out of memory: {} bytes requested", size),
        }
    }

    pub fn try_alloc(&mut self, size: usize) -> Option<Allocation> {
        self.heap.alloc(size).map(Allocation::Heap)
    }

    /// Aligned path. Panics if the order exceeds the buddy's maximum or the
    /// buddy is exhausted.
    pub fn alloc_aligned(&mut self, size: usize, align: usize) -> Allocation {
        let layout = match Layout::from_size_align(size.max(1), align) {
            Ok(l) => l,
            Err(_) => panic!("invalid alignment {:#x}", align),
        };
        self.alloc_buddy(layout)
    }

    /// Dispatches on `layout.align() > HEAP_ALIGNMENT`.
    pub fn alloc_layout(&mut self, layout: Layout) -> Allocation {
        if layout.align() > HEAP_ALIGNMENT {
            self.alloc_buddy(layout)
        } else {
            match self.heap.alloc_layout(layout) {
                Some(b) => Allocation::Heap(b),
                None => panic!("out of memory: {} bytes requested", layout.size()),
            }
        }
    }

    fn alloc_buddy(&mut self, layout: Layout) -> Allocation {
        let order = aligned_order(layout);
        if order > self.aligned.max_order() {
            panic!(
                "aligned allocation of order {} above maximum {}",
                order,
                self.aligned.max_order()
            );
        }
        match self.aligned.alloc(order) {
            Some(b) => Allocation::Aligned(b),
            None => panic!("out of aligned memory: order {}", order),
        }
    }

    pub fn free(&mut self, allocation: Allocation) {
        match allocation {
            Allocation::Heap(b) => self.heap.free(b),
            Allocation::Aligned(b) => self.aligned.free(b),
        }
    }

    pub fn heap_used(&self) -> usize {
        self.heap.used()
    }

    pub fn aligned_free_bytes(&self) -> usize {
        self.aligned.free_bytes()
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::{alloc, Layout};
    use std::boxed::Box;
    use std::vec;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::config::mm::{ALIGNED_ARENA_SIZE, HEAP_SIZE};

    fn allocator() -> DualAllocator {
        let heap = Box::leak(vec![0u8; HEAP_SIZE].into_boxed_slice());
        let layout = Layout::from_size_align(ALIGNED_ARENA_SIZE, ALIGNED_ARENA_SIZE).unwrap();
        let aligned = unsafe {
            let ptr = alloc(layout);
            assert!(!ptr.is_null());
            core::slice::from_raw_parts_mut(ptr, ALIGNED_ARENA_SIZE)
        };
        DualAllocator::new(heap, aligned)
    }

    #[test]
    fn default_path_uses_heap() {
        let mut a = allocator();
        let block = a.alloc(100);
        assert!(matches!(block, Allocation::Heap(_)));
        assert_eq!(block.as_ptr() as usize % HEAP_ALIGNMENT, 0);
        assert!(a.heap_used() >= 100);
        a.free(block);
        assert_eq!(a.heap_used(), 0);
    }

    #[test]
    fn aligned_path_uses_buddy() {
        let mut a = allocator();
        let block = a.alloc_aligned(24, 4096);
        assert!(matches!(block, Allocation::Aligned(ref b) if b.order() == 12));
        assert_eq!(block.as_ptr() as usize % 4096, 0);
        assert_eq!(a.aligned_free_bytes(), ALIGNED_ARENA_SIZE - 4096);
        a.free(block);
        assert_eq!(a.aligned_free_bytes(), ALIGNED_ARENA_SIZE);
    }

    #[test]
    fn size_dominates_alignment() {
        let mut a = allocator();
        let block = a.alloc_aligned(5000, 64);
        assert!(matches!(block, Allocation::Aligned(ref b) if b.order() == 13));
        a.free(block);
    }

    #[test]
    fn random_aligned_requests() {
        let mut a = allocator();
        let mut rng = StdRng::seed_from_u64(0xa11);
        for _ in 0..2000 {
            let align = 1usize << rng.gen_range(5..=ALIGNED_MAX_ORDER);
            let size = rng.gen_range(1..=1usize << ALIGNED_MAX_ORDER);
            let order = order_for(size).max(order_for(align));
            let block = a.alloc_aligned(size, align);
            match block {
                Allocation::Aligned(ref b) => assert_eq!(b.order(), order),
                Allocation::Heap(_) => panic!("aligned request served by the heap"),
            }
            assert_eq!(block.as_ptr() as usize % (1 << order), 0);
            a.free(block);
            assert_eq!(a.aligned_free_bytes(), ALIGNED_ARENA_SIZE);
        }
    }

    #[test]
    fn layout_dispatch_matches_from_raw() {
        let mut a = allocator();
        for layout in [
            Layout::from_size_align(40, 8).unwrap(),
            Layout::from_size_align(40, 16).unwrap(),
            Layout::from_size_align(40, 32).unwrap(),
            Layout::from_size_align(3000, 2048).unwrap(),
        ] {
            let block = a.alloc_layout(layout);
            let ptr = NonNull::new(block.as_ptr()).unwrap();
            assert_eq!(unsafe { Allocation::from_raw(ptr, layout) }, block);
            a.free(block);
        }
        assert_eq!(a.heap_used(), 0);
        assert_eq!(a.aligned_free_bytes(), ALIGNED_ARENA_SIZE);
    }

    #[test]
    fn try_alloc_reports_exhaustion() {
        let mut a = allocator();
        assert!(a.try_alloc(HEAP_SIZE * 2).is_none());
    }

    #[test]
    #[should_panic(expected = "out of memory")]
    fn heap_exhaustion_is_fatal() {
        let mut a = allocator();
        a.alloc(HEAP_SIZE * 2);
    }

    #[test]
    #[should_panic(expected = "above maximum")]
    fn over_large_alignment_is_fatal() {
        let mut a = allocator();
        a.alloc_aligned(16, 1 << (ALIGNED_MAX_ORDER + 1));
    }
}
