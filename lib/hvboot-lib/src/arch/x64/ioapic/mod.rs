//! I/O APIC, reached through its select/window register pair.

mod redirection;
pub use redirection::*;

use static_assertions as sa;

use crate::{PaddedVolatile, ReadWrite, WriteOnly};

/// Select/window register pair: write an index, then access the data.
pub trait IoApicAccess {
    fn read(&mut self, index: u32) -> u32;
    fn write(&mut self, index: u32, value: u32);
}

type Register<P> = PaddedVolatile<u32, P, 12>;
sa::const_assert_eq!(core::mem::size_of::<Register<ReadWrite>>(), 0x10);

#[repr(C)]
pub struct MmioRegisters {
    select: Register<WriteOnly>,
    window: Register<ReadWrite>,
}

impl MmioRegisters {
    /// # Safety
    /// `addr` must be the identity mapped base of an IOAPIC.
    pub unsafe fn at(addr: usize) -> &'static mut Self {
        &mut *(addr as *mut Self)
    }
}

impl IoApicAccess for &mut MmioRegisters {
    fn read(&mut self, index: u32) -> u32 {
        self.select.write(index);
        self.window.read()
    }

    fn write(&mut self, index: u32, value: u32) {
        self.select.write(index);
        self.window.write(value)
    }
}

pub struct IoApic<R> {
    regs: R,
}

impl<R: IoApicAccess> IoApic<R> {
    const REG_VER: u32 = 0x1;
    const REG_RED_BASE: u32 = 0x10;

    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Number of redirection entries. A version register reading all ones
    /// means nothing decodes the window, so there are none.
    pub fn max_red_entries(&mut self) -> u16 {
        let ver = self.regs.read(Self::REG_VER);
        if ver == u32::MAX {
            return 0;
        }
        ((ver >> 16) & 0xff) as u16 + 1
    }

    pub fn read_redirection(&mut self, n: u16) -> RedirectionEntry {
        let idx = Self::REG_RED_BASE + 2 * n as u32;
        let low = self.regs.read(idx) as u64;
        let high = self.regs.read(idx + 1) as u64;
        RedirectionEntry::new((high << 32) | low)
    }

    pub fn write_redirection(&mut self, n: u16, entry: RedirectionEntry) {
        let idx = Self::REG_RED_BASE + 2 * n as u32;
        let value = entry.bits();
        self.regs.write(idx + 1, (value >> 32) as u32);
        self.regs.write(idx, value as u32);
    }

    /// Masks every entry that is not masked yet. Returns how many were changed.
    pub fn mask_all(&mut self) -> usize {
        let mut changed = 0;
        for n in 0..self.max_red_entries() {
            let mut entry = self.read_redirection(n);
            if !entry.masked() {
                entry.set_masked(true);
                self.write_redirection(n, entry);
                changed += 1;
            }
        }
        changed
    }
}
