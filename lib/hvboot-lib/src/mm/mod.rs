//! Boot-time memory: a first-fit heap for ordinary allocations, a buddy for
//! over-aligned ones, and a buddy-managed DMA pool for device buffers.

mod buddy;
mod dma;
mod dual;
mod heap;

pub use buddy::*;
pub use dma::*;
pub use dual::*;
pub use heap::*;
