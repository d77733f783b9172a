use core::mem::size_of;
use core::ptr::read_unaligned;

use super::SdtHeader;

/// One ECAM window from the MCFG table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcpiMcfg {
    pub base: u64,
    pub segment: u16,
    pub start_bus: u8,
    pub end_bus: u8,
}

impl AcpiMcfg {
    pub fn busses(&self) -> usize {
        (self.end_bus as usize).saturating_sub(self.start_bus as usize) + 1
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
struct Entry {
    base: u64,
    segment: u16,
    start_bus: u8,
    end_bus: u8,
    _res: u32,
}

pub(super) struct Mcfg<'a> {
    bytes: &'a [u8],
}

impl<'a> Mcfg<'a> {
    pub const SIGNATURE: &'static [u8; 4] = b"MCFG";
    const ENTRIES_OFFSET: usize = size_of::<SdtHeader>() + 8;

    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn iter(&self) -> impl Iterator<Item = AcpiMcfg> + 'a {
        self.bytes
            .get(Self::ENTRIES_OFFSET..)
            .unwrap_or(&[])
            .chunks_exact(size_of::<Entry>())
            .map(|chunk| {
                let e: Entry = unsafe { read_unaligned(chunk.as_ptr().cast()) };
                AcpiMcfg {
                    base: e.base,
                    segment: e.segment,
                    start_bus: e.start_bus,
                    end_bus: e.end_bus,
                }
            })
    }

    pub fn first(&self) -> Option<AcpiMcfg> {
        self.iter().next()
    }
}
