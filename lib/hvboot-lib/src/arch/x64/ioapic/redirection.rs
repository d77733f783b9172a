use core::fmt;

use modular_bitfield::specifiers::*;
use modular_bitfield::{bitfield, BitfieldSpecifier};

#[derive(BitfieldSpecifier, Copy, Clone, Debug, PartialEq, Eq)]
#[bits = 1]
pub enum TriggerMode {
    Edge = 0,
    Level = 1,
}

#[derive(BitfieldSpecifier, Copy, Clone, Debug, PartialEq, Eq)]
#[bits = 3]
pub enum DeliveryMode {
    Fixed = 0,
    LowPriority = 1,
    Smi = 2,
    Nmi = 4,
    Init = 5,
    ExtInt = 7,
}

#[bitfield(bits = 64)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Entry {
    vector: u8,
    delivery_mode: DeliveryMode,
    logical: bool,
    pending: bool,
    low_active: bool,
    remote_irr: bool,
    trigger_mode: TriggerMode,
    mask: bool,
    #[skip]
    __: B39,
    destination: u8,
}

/// One IOAPIC redirection table entry.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct RedirectionEntry {
    inner: Entry,
}

impl fmt::Debug for RedirectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectionEntry")
            .field("vector", &self.vector())
            .field("delivery_mode", &self.inner.delivery_mode_or_err())
            .field("trigger_mode", &self.inner.trigger_mode())
            .field("masked", &self.masked())
            .finish()
    }
}

impl RedirectionEntry {
    pub const fn new(value: u64) -> Self {
        Self {
            inner: Entry::from_bytes(value.to_le_bytes()),
        }
    }

    pub fn bits(&self) -> u64 {
        u64::from_le_bytes(self.inner.into_bytes())
    }

    pub fn vector(&self) -> u8 {
        self.inner.vector()
    }

    pub fn set_vector(&mut self, v: u8) {
        self.inner.set_vector(v);
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        self.inner.trigger_mode()
    }

    pub fn masked(&self) -> bool {
        self.inner.mask()
    }

    pub fn set_masked(&mut self, masked: bool) {
        self.inner.set_mask(masked);
    }
}
