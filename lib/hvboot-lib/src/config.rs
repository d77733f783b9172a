//! Compile-time configuration of the bring-up layer.

pub const PAGE_SHIFT: u8 = 12;
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

pub mod mm {
    /// Size of the first-fit heap arena.
    pub const HEAP_SIZE: usize = 1024 * 1024;
    /// Alignment of every default-path allocation. Requests above it go to the buddy.
    pub const HEAP_ALIGNMENT: usize = 16;

    /// Size of the arena behind the aligned-allocation buddy.
    pub const ALIGNED_ARENA_SIZE: usize = 1024 * 1024;
    /// Largest block order (in bytes) the aligned buddy hands out.
    pub const ALIGNED_MAX_ORDER: u8 = 20;

    pub const DMA_POOL_SIZE: usize = 0x10_0000;
    /// Largest DMA block order, in pages.
    pub const DMA_POOL_MAX_ORDER: u8 = 8;
}

pub mod console {
    /// Serial number reported by the debug device when `xhci` has no value.
    pub const DEFAULT_XHCI_IDENTIFIER: &str = "CBS0001";
    /// COM1, used when the BIOS data area does not name a port.
    pub const FALLBACK_SERIAL_PORT: u16 = 0x3f8;
}

pub mod xhci {
    /// Polls of DCCTRL.DCR before the configure handshake is declared dead.
    pub const DBC_CONFIGURE_RETRIES: u64 = 50_000_000;
    /// Polls of DCCTRL.DCE after enabling or disabling the capability.
    pub const DBC_ENABLE_RETRIES: u64 = 1_000_000;
    /// Spins between port power off and power on.
    pub const POWER_CYCLE_SPINS: u64 = 10_000_000;

    /// DMA buffer for one DbC instance, in pages (as an order).
    pub const DMA_ORDER: u8 = 3;

    pub const USB_VENDOR_ID: u16 = 0x1d6b;
    pub const USB_PRODUCT_ID: u16 = 0x0010;
    pub const USB_DEVICE_REVISION: u16 = 0x0010;
    pub const USB_PROTOCOL: u8 = 0;

    pub const MANUFACTURER: &str = "hvboot";
    pub const PRODUCT: &str = "DbC console";
}

pub mod intr {
    pub const PIC_BASE: u8 = 32;
    pub const IOAPIC_BASE: usize = 0xfec0_0000;
}
