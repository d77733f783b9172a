use core::alloc::Layout;
use core::ptr::NonNull;

use linked_list_allocator::Heap;

use crate::config::mm::HEAP_ALIGNMENT;

/// A block handed out by [`FirstFitHeap`]. Carries the layout it was allocated with.
#[derive(Debug, PartialEq, Eq)]
pub struct HeapBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl HeapBlock {
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// # Safety
    /// `ptr` and `layout` must come from a block previously returned by the heap.
    pub unsafe fn from_raw(ptr: NonNull<u8>, layout: Layout) -> Self {
        Self { ptr, layout }
    }
}

/// Fixed arena with a first-fit free list. Never grows.
pub struct FirstFitHeap {
    heap: Heap,
}

unsafe impl Send for FirstFitHeap {}

impl FirstFitHeap {
    pub fn new(arena: &'static mut [u8]) -> Self {
        let mut heap = Heap::empty();
        unsafe { heap.init(arena.as_mut_ptr(), arena.len()) };
        Self { heap }
    }

    pub fn alloc(&mut self, size: usize) -> Option<HeapBlock> {
        let layout = Layout::from_size_align(size.max(1), HEAP_ALIGNMENT).ok()?;
        self.alloc_layout(layout)
    }

    pub fn alloc_layout(&mut self, layout: Layout) -> Option<HeapBlock> {
        debug_assert!(layout.align() <= HEAP_ALIGNMENT);
        let layout = layout.align_to(HEAP_ALIGNMENT).ok()?;
        let ptr = self.heap.allocate_first_fit(layout).ok()?;
        Some(HeapBlock { ptr, layout })
    }

    pub fn free(&mut self, block: HeapBlock) {
        unsafe { self.heap.deallocate(block.ptr, block.layout) }
    }

    pub fn used(&self) -> usize {
        self.heap.used()
    }

    pub fn size(&self) -> usize {
        self.heap.size()
    }
}
