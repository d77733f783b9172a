use core::ptr::write_bytes;

use super::buddy::{Buddy, BuddyBlock};
use crate::config::mm::DMA_POOL_MAX_ORDER;
use crate::config::PAGE_SHIFT;

/// Page-granular region handed out by the [`DmaPool`].
///
/// Memory is identity mapped during bring-up, so `phys` equals the virtual address.
#[derive(Debug, PartialEq, Eq)]
pub struct DmaRegion {
    block: BuddyBlock,
}

impl DmaRegion {
    pub fn virt(&self) -> *mut u8 {
        self.block.as_ptr()
    }

    pub fn phys(&self) -> u64 {
        self.block.addr() as u64
    }

    /// Order in pages.
    pub fn order(&self) -> u8 {
        self.block.order() - PAGE_SHIFT
    }

    pub fn size(&self) -> usize {
        self.block.size()
    }
}

pub struct DmaPool {
    buddy: Buddy,
}

impl DmaPool {
    /// Zeroes `region` and turns it into the pool. Taking the region by value
    /// means it can only ever be reclaimed once.
    pub fn reclaim(region: &'static mut [u8]) -> Self {
        unsafe { write_bytes(region.as_mut_ptr(), 0, region.len()) };
        let mut buddy = Buddy::new(PAGE_SHIFT, PAGE_SHIFT + DMA_POOL_MAX_ORDER);
        let start = region.as_mut_ptr() as usize;
        unsafe { buddy.reclaim_range(start, start + region.len()) };
        crate::debug!(
            "DMA pool at {:#x}, {} KiB free",
            start,
            buddy.free_bytes() / 1024
        );
        Self { buddy }
    }

    /// Allocates `1 << page_order` pages. The memory is zeroed.
    pub fn alloc(&mut self, page_order: u8) -> Option<DmaRegion> {
        if page_order > DMA_POOL_MAX_ORDER {
            return None;
        }
        let block = self.buddy.alloc(page_order + PAGE_SHIFT)?;
        unsafe { write_bytes(block.as_ptr(), 0, block.size()) };
        Some(DmaRegion { block })
    }

    pub fn free(&mut self, region: DmaRegion) {
        self.buddy.free(region.block)
    }

    pub fn free_bytes(&self) -> usize {
        self.buddy.free_bytes()
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::{alloc, Layout};

    use super::*;
    use crate::config::mm::DMA_POOL_SIZE;
    use crate::config::PAGE_SIZE;

    fn pool_region() -> &'static mut [u8] {
        let layout = Layout::from_size_align(DMA_POOL_SIZE, DMA_POOL_SIZE).unwrap();
        unsafe {
            let ptr = alloc(layout);
            assert!(!ptr.is_null());
            ptr.write_bytes(0xaa, DMA_POOL_SIZE);
            core::slice::from_raw_parts_mut(ptr, DMA_POOL_SIZE)
        }
    }

    #[test]
    fn regions_are_page_aligned_and_zeroed() {
        let mut pool = DmaPool::reclaim(pool_region());
        assert_eq!(pool.free_bytes(), DMA_POOL_SIZE);
        let region = pool.alloc(3).unwrap();
        assert_eq!(region.phys() % (8 * PAGE_SIZE) as u64, 0);
        assert_eq!(region.order(), 3);
        assert_eq!(region.phys(), region.virt() as u64);
        let bytes = unsafe { core::slice::from_raw_parts(region.virt(), region.size()) };
        assert!(bytes.iter().all(|&b| b == 0));
        pool.free(region);
        assert_eq!(pool.free_bytes(), DMA_POOL_SIZE);
    }

    #[test]
    fn oversized_order_leaves_pool_untouched() {
        let mut pool = DmaPool::reclaim(pool_region());
        assert!(pool.alloc(DMA_POOL_MAX_ORDER + 1).is_none());
        assert_eq!(pool.free_bytes(), DMA_POOL_SIZE);
        let whole = pool.alloc(DMA_POOL_MAX_ORDER).unwrap();
        assert!(pool.alloc(0).is_none());
        pool.free(whole);
    }
}
