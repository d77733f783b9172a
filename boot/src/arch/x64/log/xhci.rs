use hvboot_lib::acpi::AcpiMcfg;
use hvboot_lib::mm::DmaRegion;
use hvboot_lib::pci::{EcamConfigSpace, PciDevice};
use hvboot_lib::xhci::{DbcConfig, DriverAccess, PowerCycle, XhciConsole};
use hvboot_lib::Volatile;

use crate::arch::x64::heap;

/// Registers of an identity mapped xHCI controller.
pub struct MmioAccess {
    base: usize,
}

impl MmioAccess {
    fn reg<T>(&self, offset: usize) -> &'static mut Volatile<T> {
        unsafe { Volatile::at(self.base + offset) }
    }
}

impl DriverAccess for MmioAccess {
    fn read32(&mut self, offset: usize) -> u32 {
        self.reg(offset).read()
    }

    fn write32(&mut self, offset: usize, value: u32) {
        self.reg(offset).write(value)
    }

    fn read64(&mut self, offset: usize) -> u64 {
        self.reg(offset).read()
    }

    fn write64(&mut self, offset: usize, value: u64) {
        self.reg(offset).write(value)
    }

    fn alloc_dma(&mut self, page_order: u8) -> Option<DmaRegion> {
        heap::alloc_dma(page_order)
    }
}

pub fn open(mcfg: &AcpiMcfg, device: &PciDevice, identifier: &[u16], power: PowerCycle) -> XhciConsole<MmioAccess> {
    let mut cfg = unsafe { EcamConfigSpace::new(*mcfg) };
    let Some(bar) = device.bar(&mut cfg, 0) else {
        panic!("xHCI {:?} has no BAR0", device.addr);
    };
    let access = MmioAccess {
        base: bar.address as usize,
    };
    match XhciConsole::init(access, &DbcConfig::new(identifier, power)) {
        Ok(console) => console,
        Err(e) => panic!("{}", e),
    }
}
