//! Just enough ACPI to find the PCI Express ECAM window.

mod mcfg;
pub use mcfg::*;

use core::fmt;
use core::mem::size_of;
use core::ptr::read_unaligned;
use core::slice;

use static_assertions as sa;

#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct SdtHeader {
    pub sig: [u8; 4],
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oemid: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub oem_revision: u32,
    pub creator_id: u32,
    pub creator_revision: u32,
}
sa::const_assert_eq!(size_of::<SdtHeader>(), 36);

impl fmt::Debug for SdtHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            sig,
            length,
            revision,
            oemid,
            ..
        } = *self;
        f.debug_struct("SdtHeader")
            .field("sig", &core::str::from_utf8(&sig).unwrap_or("????"))
            .field("length", &length)
            .field("revision", &revision)
            .field("oemid", &core::str::from_utf8(&oemid).unwrap_or("??????"))
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct Rsdp {
    pub signature: [u8; 8],
    pub checksum: u8,
    pub oemid: [u8; 6],
    pub revision: u8,
    pub rsdt_address: u32,
    pub length: u32,
    pub xsdt_address: u64,
    pub ext_checksum: u8,
    _res: [u8; 3],
}
sa::const_assert_eq!(size_of::<Rsdp>(), 36);

impl Rsdp {
    pub const SIGNATURE: &'static [u8; 8] = b"RSD PTR ";
    const V1_LEN: usize = 20;

    /// Validates the structure at `addr` and returns a copy of it.
    ///
    /// # Safety
    /// `addr` must be readable for 36 bytes.
    pub unsafe fn read(addr: usize) -> Option<Self> {
        let bytes = slice::from_raw_parts(addr as *const u8, size_of::<Self>());
        Self::parse(bytes)
    }

    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::V1_LEN
            || &bytes[..8] != Self::SIGNATURE
            || !checksum_ok(&bytes[..Self::V1_LEN])
        {
            return None;
        }
        let revision = bytes[15];
        if revision >= 2 && (bytes.len() < size_of::<Self>() || !checksum_ok(&bytes[..size_of::<Self>()])) {
            return None;
        }
        let mut raw = [0u8; size_of::<Rsdp>()];
        let len = if revision >= 2 { size_of::<Self>() } else { Self::V1_LEN };
        raw[..len].copy_from_slice(&bytes[..len]);
        Some(unsafe { read_unaligned(raw.as_ptr().cast()) })
    }

    /// Root table address and the width of its entries.
    fn root(&self) -> (usize, usize) {
        let xsdt = self.xsdt_address;
        if self.revision >= 2 && xsdt != 0 {
            (xsdt as usize, size_of::<u64>())
        } else {
            (self.rsdt_address as usize, size_of::<u32>())
        }
    }
}

fn checksum_ok(bytes: &[u8]) -> bool {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)) == 0
}

/// Returns the bytes of the table at `addr` if its length and checksum are sane.
unsafe fn table<'a>(addr: usize) -> Option<&'a [u8]> {
    if addr == 0 {
        return None;
    }
    let hdr: SdtHeader = read_unaligned(addr as *const SdtHeader);
    let len = hdr.length as usize;
    if len < size_of::<SdtHeader>() {
        return None;
    }
    let bytes = slice::from_raw_parts(addr as *const u8, len);
    checksum_ok(bytes).then_some(bytes)
}

/// Iterates the table addresses listed by an RSDT (u32) or XSDT (u64).
struct RootEntries<'a> {
    entries: &'a [u8],
    width: usize,
}

impl Iterator for RootEntries<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.entries.len() < self.width {
            return None;
        }
        let (entry, rest) = self.entries.split_at(self.width);
        self.entries = rest;
        let mut raw = [0u8; 8];
        raw[..self.width].copy_from_slice(entry);
        Some(u64::from_le_bytes(raw) as usize)
    }
}

/// Follows the RSDP at `rsdp_addr` to the MCFG and returns its first entry.
///
/// # Safety
/// Every table reachable from the RSDP must be identity mapped.
pub unsafe fn find_mcfg(rsdp_addr: usize) -> Option<AcpiMcfg> {
    let rsdp = Rsdp::read(rsdp_addr)?;
    let (root, width) = rsdp.root();
    let root = table(root)?;
    let entries = RootEntries {
        entries: &root[size_of::<SdtHeader>()..],
        width,
    };
    for addr in entries {
        let Some(bytes) = table(addr) else {
            continue;
        };
        if &bytes[..4] == Mcfg::SIGNATURE {
            return Mcfg::new(bytes).first();
        }
    }
    None
}

/// Searches `mem`, which starts at physical address `base`, for a valid RSDP
/// on a 16-byte boundary.
pub fn scan_for_rsdp(mem: &[u8], base: usize) -> Option<usize> {
    (0..mem.len())
        .step_by(16)
        .find(|&off| Rsdp::parse(&mem[off..]).is_some())
        .map(|off| base + off)
}

const BDA_EBDA_SEGMENT: usize = 0x40e;
const BIOS_AREA: core::ops::Range<usize> = 0xe0000..0x100000;

/// Legacy BIOS RSDP search: first KiB of the EBDA, then the BIOS ROM area.
///
/// # Safety
/// The low 1 MiB must be identity mapped.
pub unsafe fn scan_bios_rsdp() -> Option<usize> {
    let ebda = (read_unaligned(BDA_EBDA_SEGMENT as *const u16) as usize) << 4;
    if ebda != 0 {
        let mem = slice::from_raw_parts(ebda as *const u8, 1024);
        if let Some(addr) = scan_for_rsdp(mem, ebda) {
            return Some(addr);
        }
    }
    let mem = slice::from_raw_parts(BIOS_AREA.start as *const u8, BIOS_AREA.len());
    scan_for_rsdp(mem, BIOS_AREA.start)
}
