//! Reads the command line and ACPI pointer from whichever boot protocol
//! handed over control.

use alloc::string::String;
use core::fmt;
use core::mem::size_of;
use core::ptr::read_unaligned;
use core::slice;

use crate::acpi::{self, AcpiMcfg};

pub const MULTIBOOT1_MAGIC: u32 = 0x2bad_b002;
pub const MULTIBOOT2_MAGIC: u32 = 0x36d7_6289;
pub const XEN_PVH_MAGIC: u32 = 0x336e_c578;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootProtocol {
    Multiboot1,
    Multiboot2,
    XenPvh,
}

impl TryFrom<u32> for BootProtocol {
    type Error = BootInfoError;

    fn try_from(magic: u32) -> Result<Self, Self::Error> {
        match magic {
            MULTIBOOT1_MAGIC => Ok(Self::Multiboot1),
            MULTIBOOT2_MAGIC => Ok(Self::Multiboot2),
            XEN_PVH_MAGIC => Ok(Self::XenPvh),
            _ => Err(BootInfoError::UnknownMagic(magic)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootInfoError {
    UnknownMagic(u32),
    /// A Multiboot2 command-line tag whose size is smaller than its header.
    MalformedCmdline,
}

impl fmt::Display for BootInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMagic(m) => write!(f, "unknown boot magic {:#010x}", m),
            Self::MalformedCmdline => write!(f, "Malformed cmdline tag"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootInfo {
    pub protocol: BootProtocol,
    pub cmdline: String,
    pub mcfg: Option<AcpiMcfg>,
}

impl BootInfo {
    /// Parses the boot information, using the legacy BIOS area search for
    /// Multiboot1.
    ///
    /// # Safety
    /// `info` must be the pointer the loader passed along with `magic`, and
    /// everything it references must be identity mapped.
    pub unsafe fn read(magic: u32, info: usize) -> Result<Self, BootInfoError> {
        Self::read_with(magic, info, || acpi::scan_bios_rsdp())
    }

    /// # Safety
    /// See [`BootInfo::read`].
    pub unsafe fn read_with(
        magic: u32,
        info: usize,
        legacy_rsdp: impl FnOnce() -> Option<usize>,
    ) -> Result<Self, BootInfoError> {
        let protocol = BootProtocol::try_from(magic)?;
        let (cmdline, rsdp) = match protocol {
            BootProtocol::Multiboot1 => (multiboot1_cmdline(info), legacy_rsdp()),
            BootProtocol::Multiboot2 => multiboot2(info)?,
            BootProtocol::XenPvh => xen_pvh(info),
        };
        let mcfg = match rsdp {
            Some(rsdp) => acpi::find_mcfg(rsdp),
            None => None,
        };
        crate::debug!(
            "boot protocol {:?}, cmdline \"{}\", mcfg {:?}",
            protocol,
            cmdline,
            mcfg
        );
        Ok(Self {
            protocol,
            cmdline,
            mcfg,
        })
    }
}

fn until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

unsafe fn c_string(addr: usize) -> String {
    if addr == 0 {
        return String::new();
    }
    let ptr = addr as *const u8;
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    until_nul(slice::from_raw_parts(ptr, len))
}

const MB1_FLAG_CMDLINE: u32 = 1 << 2;
const MB1_CMDLINE_OFFSET: usize = 16;

unsafe fn multiboot1_cmdline_addr(info: usize) -> usize {
    let flags = read_unaligned(info as *const u32);
    if flags & MB1_FLAG_CMDLINE == 0 {
        return 0;
    }
    read_unaligned((info + MB1_CMDLINE_OFFSET) as *const u32) as usize
}

unsafe fn multiboot1_cmdline(info: usize) -> String {
    c_string(multiboot1_cmdline_addr(info))
}

#[repr(C)]
#[derive(Clone, Copy)]
struct TagHeader {
    ty: u32,
    size: u32,
}

const MB2_TAG_END: u32 = 0;
const MB2_TAG_CMDLINE: u32 = 1;
const MB2_TAG_RSDP_V1: u32 = 14;
const MB2_TAG_RSDP_V2: u32 = 15;

/// Walks Multiboot2 tags: `(type, whole tag bytes including header)`.
struct Mb2Tags<'a> {
    rest: &'a [u8],
}

impl<'a> Mb2Tags<'a> {
    unsafe fn new(info: usize) -> Self {
        let total = read_unaligned(info as *const u32) as usize;
        let total = total.max(8);
        Self {
            rest: &slice::from_raw_parts(info as *const u8, total)[8..],
        }
    }
}

impl<'a> Iterator for Mb2Tags<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < size_of::<TagHeader>() {
            return None;
        }
        let hdr: TagHeader = unsafe { read_unaligned(self.rest.as_ptr().cast()) };
        if hdr.ty == MB2_TAG_END {
            return None;
        }
        let size = (hdr.size as usize).min(self.rest.len());
        let tag = &self.rest[..size];
        let next = (size.max(size_of::<TagHeader>()) + 7) & !7;
        self.rest = self.rest.get(next..).unwrap_or(&[]);
        Some((hdr.ty, tag))
    }
}

unsafe fn multiboot2(info: usize) -> Result<(String, Option<usize>), BootInfoError> {
    let mut cmdline = String::new();
    let mut rsdp_v1 = None;
    let mut rsdp_v2 = None;
    for (ty, tag) in Mb2Tags::new(info) {
        match ty {
            MB2_TAG_CMDLINE => {
                let body = tag
                    .get(size_of::<TagHeader>()..)
                    .ok_or(BootInfoError::MalformedCmdline)?;
                cmdline = until_nul(body);
            }
            MB2_TAG_RSDP_V1 if rsdp_v1.is_none() => {
                rsdp_v1 = Some(tag.as_ptr() as usize + size_of::<TagHeader>())
            }
            MB2_TAG_RSDP_V2 if rsdp_v2.is_none() => {
                rsdp_v2 = Some(tag.as_ptr() as usize + size_of::<TagHeader>())
            }
            _ => (),
        }
    }
    Ok((cmdline, rsdp_v2.or(rsdp_v1)))
}

/// Leading part of the Xen `hvm_start_info` structure.
#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct HvmStartInfo {
    magic: u32,
    version: u32,
    flags: u32,
    nr_modules: u32,
    modlist_paddr: u64,
    cmdline_paddr: u64,
    rsdp_paddr: u64,
}

unsafe fn xen_pvh(info: usize) -> (String, Option<usize>) {
    let start: HvmStartInfo = read_unaligned(info as *const HvmStartInfo);
    let rsdp = (start.rsdp_paddr != 0).then_some(start.rsdp_paddr as usize);
    (c_string(start.cmdline_paddr as usize), rsdp)
}
