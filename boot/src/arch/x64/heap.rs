use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{addr_of_mut, NonNull};

use hvboot_lib::config::mm::{ALIGNED_ARENA_SIZE, DMA_POOL_SIZE, HEAP_SIZE};
use hvboot_lib::mm::{Allocation, DmaPool, DmaRegion, DualAllocator};
use spin::{Mutex, Once};

#[repr(C, align(4096))]
struct PageAligned<const N: usize>([u8; N]);

#[repr(C, align(0x100000))]
struct Arena<const N: usize>([u8; N]);

static mut HEAP_ARENA: PageAligned<HEAP_SIZE> = PageAligned([0; HEAP_SIZE]);
static mut ALIGNED_ARENA: Arena<ALIGNED_ARENA_SIZE> = Arena([0; ALIGNED_ARENA_SIZE]);
static mut DMA_POOL_DATA: PageAligned<DMA_POOL_SIZE> = PageAligned([0; DMA_POOL_SIZE]);

static HEAP: Once<Mutex<DualAllocator>> = Once::new();
static DMA_POOL: Once<Mutex<DmaPool>> = Once::new();

pub fn init_heap() {
    HEAP.call_once(|| {
        let (heap, aligned) = unsafe {
            (
                &mut (&mut *addr_of_mut!(HEAP_ARENA)).0[..],
                &mut (&mut *addr_of_mut!(ALIGNED_ARENA)).0[..],
            )
        };
        Mutex::new(DualAllocator::new(heap, aligned))
    });
}

pub fn init_dma_pool() {
    DMA_POOL.call_once(|| {
        let region = unsafe { &mut (&mut *addr_of_mut!(DMA_POOL_DATA)).0[..] };
        Mutex::new(DmaPool::reclaim(region))
    });
}

pub fn alloc_dma(page_order: u8) -> Option<DmaRegion> {
    DMA_POOL.get()?.lock().alloc(page_order)
}

struct BootAllocator;

unsafe impl GlobalAlloc for BootAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match HEAP.get() {
            Some(heap) => heap.lock().alloc_layout(layout).as_ptr(),
            None => panic!("heap not initialized"),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let (Some(heap), Some(ptr)) = (HEAP.get(), NonNull::new(ptr)) else {
            panic!("heap not initialized");
        };
        heap.lock().free(Allocation::from_raw(ptr, layout));
    }
}

#[global_allocator]
static ALLOCATOR: BootAllocator = BootAllocator;
