use core::ptr::{write, NonNull};

use intrusive_collections::{intrusive_adapter, LinkedList, LinkedListLink, UnsafeRef};

use crate::int::{align_up, alignment_order, order_floor};

struct FreeBlock {
    link: LinkedListLink,
}

intrusive_adapter!(FreeBlockAdapter = UnsafeRef<FreeBlock>: FreeBlock { link: LinkedListLink });

/// Smallest block order: a free block must hold its list link.
pub const MIN_ORDER: u8 = 4;

const ORDER_COUNT: usize = usize::BITS as usize;

/// A block handed out by a [`Buddy`], `1 << order` bytes aligned to its size.
#[derive(Debug, PartialEq, Eq)]
pub struct BuddyBlock {
    ptr: NonNull<u8>,
    order: u8,
}

impl BuddyBlock {
    /// # Safety
    /// `ptr` and `order` must come from a block previously returned by the buddy.
    pub unsafe fn from_raw(ptr: NonNull<u8>, order: u8) -> Self {
        Self { ptr, order }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn size(&self) -> usize {
        1 << self.order
    }
}

/// Binary buddy allocator with free lists threaded through the free blocks.
///
/// Blocks are identified by address and order; the buddy of a block at `addr`
/// of order `o` lives at `addr ^ (1 << o)`. Every block is naturally aligned.
pub struct Buddy {
    lists: [LinkedList<FreeBlockAdapter>; ORDER_COUNT],
    min_order: u8,
    max_order: u8,
    free_bytes: usize,
}

unsafe impl Send for Buddy {}

impl Buddy {
    pub fn new(min_order: u8, max_order: u8) -> Self {
        assert!(min_order >= MIN_ORDER && min_order <= max_order && (max_order as usize) < ORDER_COUNT);
        Self {
            lists: core::array::from_fn(|_| LinkedList::new(FreeBlockAdapter::new())),
            min_order,
            max_order,
            free_bytes: 0,
        }
    }

    pub fn min_order(&self) -> u8 {
        self.min_order
    }

    pub fn max_order(&self) -> u8 {
        self.max_order
    }

    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    /// Number of free blocks currently held at `order`.
    pub fn free_blocks(&self, order: u8) -> usize {
        self.lists[order as usize].iter().count()
    }

    /// Hands `start..end` to the allocator as maximal naturally aligned blocks.
    ///
    /// # Safety
    /// The range must be writable memory owned by nobody else, for as long as
    /// the buddy lives.
    pub unsafe fn reclaim_range(&mut self, start: usize, end: usize) {
        let min = 1usize << self.min_order;
        let mut cur = align_up(start, min);
        while cur < end && end - cur >= min {
            let order = alignment_order(cur)
                .min(order_floor(end - cur))
                .min(self.max_order);
            self.free_at(cur, order);
            cur += 1 << order;
        }
    }

    pub fn alloc(&mut self, order: u8) -> Option<BuddyBlock> {
        let order = order.max(self.min_order);
        if order > self.max_order {
            return None;
        }
        let found = (order..=self.max_order).find(|&o| !self.lists[o as usize].is_empty())?;
        let block = self.lists[found as usize].pop_front()?;
        let addr = UnsafeRef::into_raw(block) as usize;
        for o in (order..found).rev() {
            unsafe { self.push(addr + (1 << o), o) };
        }
        self.free_bytes -= 1 << order;
        NonNull::new(addr as *mut u8).map(|ptr| BuddyBlock { ptr, order })
    }

    pub fn free(&mut self, block: BuddyBlock) {
        unsafe { self.free_at(block.addr(), block.order) }
    }

    unsafe fn free_at(&mut self, mut addr: usize, mut order: u8) {
        debug_assert_eq!(addr & ((1 << order) - 1), 0, "unaligned buddy block");
        self.free_bytes += 1 << order;
        while order < self.max_order {
            let buddy = addr ^ (1 << order);
            let mut cursor = self.lists[order as usize].front_mut();
            let mut merged = false;
            while let Some(b) = cursor.get() {
                if b as *const FreeBlock as usize == buddy {
                    cursor.remove();
                    merged = true;
                    break;
                }
                cursor.move_next();
            }
            if !merged {
                break;
            }
            addr = addr.min(buddy);
            order += 1;
        }
        self.push(addr, order);
    }

    unsafe fn push(&mut self, addr: usize, order: u8) {
        let ptr = addr as *mut FreeBlock;
        write(ptr, FreeBlock { link: LinkedListLink::new() });
        self.lists[order as usize].push_front(UnsafeRef::from_raw(ptr));
    }
}
