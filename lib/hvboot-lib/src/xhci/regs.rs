//! Register offsets and bits. Capability offsets are relative to the MMIO
//! base, DbC offsets to the start of the DbC extended capability.

use bitflags::bitflags;

pub const CAPLENGTH: usize = 0x00;
pub const HCSPARAMS1: usize = 0x04;
pub const HCCPARAMS1: usize = 0x10;

pub const EXT_CAP_DBC: u8 = 10;

pub const PORTSC_BASE: usize = 0x400;
pub const PORTSC_STRIDE: usize = 0x10;
pub const PORTSC_PED: u32 = 1 << 1;
/// Port reset, written as one to start a reset.
pub const PORTSC_PR: u32 = 1 << 4;
pub const PORTSC_PP: u32 = 1 << 9;
/// Status change bits, cleared by writing one.
pub const PORTSC_RW1C: u32 = 0x7f << 17;

pub const DCDB: usize = 0x04;
pub const DCERSTSZ: usize = 0x08;
pub const DCERSTBA: usize = 0x10;
pub const DCERDP: usize = 0x18;
pub const DCCTRL: usize = 0x20;
pub const DCPORTSC: usize = 0x28;
pub const DCCP: usize = 0x30;
pub const DDI1: usize = 0x38;
pub const DDI2: usize = 0x3c;

pub const DOORBELL_OUT: u32 = 0 << 8;

bitflags! {
    pub struct DbcControl: u32 {
        /// DbC run.
        const DCR = 1 << 0;
        /// Link status event enable.
        const LSE = 1 << 1;
        /// Halt OUT TR (RW1C).
        const HOT = 1 << 2;
        /// Halt IN TR (RW1C).
        const HIT = 1 << 3;
        /// Run change (RW1C).
        const DRC = 1 << 4;
        /// DbC enable.
        const DCE = 1 << 31;

        const RW1C = Self::HOT.bits | Self::HIT.bits | Self::DRC.bits;
    }
}

bitflags! {
    pub struct DbcPortSc: u32 {
        const CCS = 1 << 0;
        const PED = 1 << 1;
        const PR = 1 << 4;
        const CSC = 1 << 17;
        const PRC = 1 << 21;
        const PLC = 1 << 22;
        const CEC = 1 << 23;

        const RW1C = Self::CSC.bits | Self::PRC.bits | Self::PLC.bits | Self::CEC.bits;
    }
}

/// Offset of root port `n` (1-based) for an operational base at `caplength`.
pub const fn portsc(caplength: usize, n: usize) -> usize {
    caplength + PORTSC_BASE + PORTSC_STRIDE * (n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portsc_offsets() {
        assert_eq!(portsc(0x20, 1), 0x420);
        assert_eq!(portsc(0x80, 4), 0x4b0);
    }

    #[test]
    fn rw1c_groups() {
        assert_eq!(DbcControl::RW1C.bits(), 0x1c);
        assert!(!DbcPortSc::RW1C.contains(DbcPortSc::PED));
    }
}
