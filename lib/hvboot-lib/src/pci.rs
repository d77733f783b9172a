//! PCI Express enumeration over ECAM. Read-only apart from BAR sizing.

use alloc::vec::Vec;
use core::fmt;

use crate::acpi::AcpiMcfg;
use crate::Volatile;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PciAddress {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciAddress {
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device,
            function,
        }
    }
}

impl fmt::Debug for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

/// Configuration space accessor. Offsets are dword aligned.
pub trait ConfigSpace {
    fn read32(&mut self, addr: PciAddress, offset: u16) -> u32;
    fn write32(&mut self, addr: PciAddress, offset: u16, value: u32);

    fn bus_range(&self) -> (u8, u8);
}

pub struct EcamConfigSpace {
    mcfg: AcpiMcfg,
}

impl EcamConfigSpace {
    /// # Safety
    /// The ECAM window described by `mcfg` must be identity mapped.
    pub unsafe fn new(mcfg: AcpiMcfg) -> Self {
        Self { mcfg }
    }

    fn reg(&self, addr: PciAddress, offset: u16) -> &'static mut Volatile<u32> {
        let off = ecam_offset(self.mcfg.start_bus, addr) + (offset as usize & 0xffc);
        unsafe { Volatile::at(self.mcfg.base as usize + off) }
    }
}

pub fn ecam_offset(start_bus: u8, addr: PciAddress) -> usize {
    ((addr.bus - start_bus) as usize) << 20
        | (addr.device as usize) << 15
        | (addr.function as usize) << 12
}

impl ConfigSpace for EcamConfigSpace {
    fn read32(&mut self, addr: PciAddress, offset: u16) -> u32 {
        self.reg(addr, offset).read()
    }

    fn write32(&mut self, addr: PciAddress, offset: u16, value: u32) {
        self.reg(addr, offset).write(value)
    }

    fn bus_range(&self) -> (u8, u8) {
        (self.mcfg.start_bus, self.mcfg.end_bus)
    }
}

const REG_ID: u16 = 0x00;
const REG_CLASS: u16 = 0x08;
const REG_HEADER: u16 = 0x0c;
const REG_BAR0: u16 = 0x10;

const VENDOR_NONE: u16 = 0xffff;
const HEADER_MULTIFUNCTION: u8 = 0x80;

pub const CLASS_SERIAL_BUS: u8 = 0x0c;
pub const SUBCLASS_USB: u8 = 0x03;
pub const PROG_IF_XHCI: u8 = 0x30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarKind {
    Io,
    Memory32 { prefetchable: bool },
    Memory64 { prefetchable: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bar {
    pub kind: BarKind,
    pub address: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PciDevice {
    pub addr: PciAddress,
    pub vendor_id: u16,
    pub device_id: u16,
    pub class: u8,
    pub subclass: u8,
    pub prog_if: u8,
    pub header_type: u8,
}

impl PciDevice {
    fn probe<C: ConfigSpace + ?Sized>(cfg: &mut C, addr: PciAddress) -> Option<Self> {
        let id = cfg.read32(addr, REG_ID);
        let vendor_id = id as u16;
        if vendor_id == VENDOR_NONE {
            return None;
        }
        let class = cfg.read32(addr, REG_CLASS);
        let header = cfg.read32(addr, REG_HEADER);
        Some(Self {
            addr,
            vendor_id,
            device_id: (id >> 16) as u16,
            class: (class >> 24) as u8,
            subclass: (class >> 16) as u8,
            prog_if: (class >> 8) as u8,
            header_type: (header >> 16) as u8,
        })
    }

    pub fn is_multifunction(&self) -> bool {
        self.header_type & HEADER_MULTIFUNCTION != 0
    }

    pub fn is_xhci(&self) -> bool {
        self.class == CLASS_SERIAL_BUS && self.subclass == SUBCLASS_USB && self.prog_if == PROG_IF_XHCI
    }

    /// Decodes and sizes BAR `n`. Sizing writes all ones and restores the
    /// original value. Returns `None` for an unimplemented BAR.
    pub fn bar<C: ConfigSpace + ?Sized>(&self, cfg: &mut C, n: u8) -> Option<Bar> {
        let off = REG_BAR0 + 4 * n as u16;
        let low = cfg.read32(self.addr, off);
        let probe = |cfg: &mut C, off: u16, orig: u32| {
            cfg.write32(self.addr, off, u32::MAX);
            let mask = cfg.read32(self.addr, off);
            cfg.write32(self.addr, off, orig);
            mask
        };

        if low & 1 != 0 {
            let mask = probe(cfg, off, low) & !0x3;
            if mask == 0 {
                return None;
            }
            return Some(Bar {
                kind: BarKind::Io,
                address: (low & !0x3) as u64,
                size: ((!mask).wrapping_add(1) & 0xffff) as u64,
            });
        }

        let prefetchable = low & 0x8 != 0;
        let (kind, address, mask) = match (low >> 1) & 0x3 {
            0x2 => {
                let high = cfg.read32(self.addr, off + 4);
                let mask_low = probe(cfg, off, low) & !0xf;
                let mask_high = probe(cfg, off + 4, high);
                (
                    BarKind::Memory64 { prefetchable },
                    ((high as u64) << 32) | (low & !0xf) as u64,
                    ((mask_high as u64) << 32) | mask_low as u64,
                )
            }
            _ => {
                let mask = probe(cfg, off, low) & !0xf;
                (
                    BarKind::Memory32 { prefetchable },
                    (low & !0xf) as u64,
                    0xffff_ffff_0000_0000 | mask as u64,
                )
            }
        };
        if mask as u32 == 0 && mask >> 32 == 0xffff_ffff {
            return None;
        }
        Some(Bar {
            kind,
            address,
            size: (!mask).wrapping_add(1),
        })
    }
}

pub struct PciBus<C> {
    cfg: C,
}

impl<C: ConfigSpace> PciBus<C> {
    pub fn new(cfg: C) -> Self {
        Self { cfg }
    }

    pub fn config(&mut self) -> &mut C {
        &mut self.cfg
    }

    /// Every present function on every bus of the window.
    pub fn scan(&mut self) -> Vec<PciDevice> {
        let mut found = Vec::new();
        let (start, end) = self.cfg.bus_range();
        for bus in start..=end {
            for device in 0..32 {
                let Some(dev) = PciDevice::probe(&mut self.cfg, PciAddress::new(bus, device, 0)) else {
                    continue;
                };
                found.push(dev);
                if !dev.is_multifunction() {
                    continue;
                }
                for function in 1..8 {
                    if let Some(f) = PciDevice::probe(&mut self.cfg, PciAddress::new(bus, device, function)) {
                        found.push(f);
                    }
                }
            }
        }
        found
    }

    pub fn find_xhci(&mut self) -> Option<PciDevice> {
        let dev = self.scan().into_iter().find(PciDevice::is_xhci)?;
        crate::info!(
            "xHCI controller {:?} ({:04x}:{:04x})",
            dev.addr,
            dev.vendor_id,
            dev.device_id
        );
        Some(dev)
    }
}
