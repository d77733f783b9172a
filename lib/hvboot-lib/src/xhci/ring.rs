//! Transfer and event rings of 16-byte TRBs.

use core::ptr::{read_volatile, write_volatile};

use modular_bitfield::bitfield;
use modular_bitfield::specifiers::*;

pub const TRB_NORMAL: u8 = 1;
pub const TRB_LINK: u8 = 6;
pub const TRB_TRANSFER_EVENT: u8 = 32;

pub const COMPLETION_SUCCESS: u8 = 1;
pub const COMPLETION_SHORT_PACKET: u8 = 13;

#[bitfield(bits = 32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub struct TrbControl {
    pub cycle: bool,
    /// Toggle cycle on link TRBs, evaluate next TRB otherwise.
    pub toggle: bool,
    pub isp: bool,
    pub no_snoop: bool,
    pub chain: bool,
    pub ioc: bool,
    pub idt: bool,
    #[skip]
    __: B2,
    pub bei: bool,
    pub trb_type: B6,
    pub endpoint: B5,
    #[skip]
    __: B3,
    pub slot: u8,
}

#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trb {
    pub parameter: u64,
    pub status: u32,
    pub control: TrbControl,
}

impl Trb {
    pub fn new(parameter: u64, status: u32, control: TrbControl) -> Self {
        Self {
            parameter,
            status,
            control,
        }
    }

    /// Normal TRB for `len` bytes at `data`, interrupting on completion.
    pub fn normal(data: u64, len: u32) -> Self {
        Self::new(
            data,
            len & 0x1_ffff,
            TrbControl::new().with_trb_type(TRB_NORMAL).with_ioc(true),
        )
    }

    pub fn link(target: u64) -> Self {
        Self::new(
            target,
            0,
            TrbControl::new().with_trb_type(TRB_LINK).with_toggle(true),
        )
    }

    pub fn completion_code(&self) -> u8 {
        (self.status >> 24) as u8
    }

    /// Residual length of a transfer event.
    pub fn transfer_length(&self) -> u32 {
        self.status & 0x00ff_ffff
    }
}

pub const TRB_SIZE: usize = core::mem::size_of::<Trb>();

/// Producer side of a transfer ring. The last slot holds a link TRB back to
/// the start that toggles the cycle state.
pub struct TransferRing {
    base: *mut Trb,
    phys: u64,
    len: usize,
    enqueue: usize,
    cycle: bool,
}

impl TransferRing {
    /// # Safety
    /// `base` must point to `len` writable TRBs that the device sees at `phys`.
    pub unsafe fn new(base: *mut Trb, phys: u64, len: usize) -> Self {
        assert!(len >= 2);
        let ring = Self {
            base,
            phys,
            len,
            enqueue: 0,
            cycle: true,
        };
        write_volatile(base.add(len - 1), Trb::link(phys));
        ring
    }

    pub fn phys(&self) -> u64 {
        self.phys
    }

    /// Writes `trb` with the producer cycle bit and returns its device address.
    pub fn enqueue(&mut self, mut trb: Trb) -> u64 {
        trb.control.set_cycle(self.cycle);
        let at = self.enqueue;
        unsafe { write_volatile(self.base.add(at), trb) };
        self.enqueue += 1;
        if self.enqueue == self.len - 1 {
            let mut link = Trb::link(self.phys);
            link.control.set_cycle(self.cycle);
            unsafe { write_volatile(self.base.add(self.enqueue), link) };
            self.enqueue = 0;
            self.cycle = !self.cycle;
        }
        self.phys + (at * TRB_SIZE) as u64
    }
}

/// Consumer side of a single-segment event ring.
pub struct EventRing {
    base: *const Trb,
    phys: u64,
    len: usize,
    dequeue: usize,
    cycle: bool,
}

impl EventRing {
    /// # Safety
    /// `base` must point to `len` zeroed TRBs that the device sees at `phys`.
    pub unsafe fn new(base: *const Trb, phys: u64, len: usize) -> Self {
        Self {
            base,
            phys,
            len,
            dequeue: 0,
            cycle: true,
        }
    }

    pub fn phys(&self) -> u64 {
        self.phys
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Device address of the next slot to consume, for DCERDP.
    pub fn dequeue_phys(&self) -> u64 {
        self.phys + (self.dequeue * TRB_SIZE) as u64
    }

    pub fn pop(&mut self) -> Option<Trb> {
        let trb = unsafe { read_volatile(self.base.add(self.dequeue)) };
        if trb.control.cycle() != self.cycle {
            return None;
        }
        self.dequeue += 1;
        if self.dequeue == self.len {
            self.dequeue = 0;
            self.cycle = !self.cycle;
        }
        Some(trb)
    }
}
