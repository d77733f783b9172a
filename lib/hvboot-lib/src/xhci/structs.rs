//! Data structures the controller reads from DMA memory.

use core::mem::size_of;

use modular_bitfield::bitfield;
use modular_bitfield::specifiers::*;
use static_assertions as sa;

use crate::config::PAGE_SIZE;

/// DbC info context: addresses and lengths of the four string descriptors.
#[repr(C)]
#[derive(Debug)]
pub struct InfoContext {
    pub string0: u64,
    pub manufacturer: u64,
    pub product: u64,
    pub serial: u64,
    pub string0_len: u8,
    pub manufacturer_len: u8,
    pub product_len: u8,
    pub serial_len: u8,
    _res: [u32; 7],
}
sa::const_assert_eq!(size_of::<InfoContext>(), 64);

impl InfoContext {
    /// `strings` holds the device address of string0, manufacturer, product
    /// and serial, in that order.
    pub fn new(strings: [u64; 4], descs: &StringDescriptors) -> Self {
        Self {
            string0: strings[0],
            manufacturer: strings[1],
            product: strings[2],
            serial: strings[3],
            string0_len: descs.string0.length,
            manufacturer_len: descs.manufacturer.length,
            product_len: descs.product.length,
            serial_len: descs.serial.length,
            _res: [0; 7],
        }
    }
}

pub const EP_TYPE_BULK_OUT: u8 = 2;
pub const EP_TYPE_BULK_IN: u8 = 6;

#[bitfield(bits = 32)]
#[derive(Debug, Clone, Copy)]
#[repr(u32)]
pub struct EndpointInfo {
    #[skip]
    __: B1,
    pub cerr: B2,
    pub ep_type: B3,
    #[skip]
    __: B1,
    pub hid: bool,
    pub max_burst: u8,
    pub max_packet_size: u16,
}

#[repr(C)]
#[derive(Debug)]
pub struct EndpointContext {
    pub state: u32,
    pub info: EndpointInfo,
    /// TR dequeue pointer with the dequeue cycle state in bit 0.
    pub dequeue: u64,
    pub average_trb_length: u32,
    _res: [u32; 11],
}
sa::const_assert_eq!(size_of::<EndpointContext>(), 64);

impl EndpointContext {
    pub const MAX_PACKET_SIZE: u16 = 1024;

    pub fn bulk(ep_type: u8, ring_phys: u64) -> Self {
        let info = EndpointInfo::new()
            .with_cerr(3)
            .with_ep_type(ep_type)
            .with_max_packet_size(Self::MAX_PACKET_SIZE);
        Self {
            state: 0,
            info,
            dequeue: ring_phys | 1,
            average_trb_length: Self::MAX_PACKET_SIZE as u32,
            _res: [0; 11],
        }
    }
}

pub const USB_DT_STRING: u8 = 3;
pub const LANGID_EN_US: u16 = 0x0409;

/// USB string descriptor, UTF-16LE. Holds at most 31 code units.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StringDescriptor {
    pub length: u8,
    pub ty: u8,
    pub chars: [u16; 31],
}
sa::const_assert_eq!(size_of::<StringDescriptor>(), 64);

impl StringDescriptor {
    pub const MAX_CHARS: usize = 31;

    pub fn new(units: impl IntoIterator<Item = u16>) -> Self {
        let mut chars = [0u16; Self::MAX_CHARS];
        let mut n = 0;
        for (slot, u) in chars.iter_mut().zip(units) {
            *slot = u.to_le();
            n += 1;
        }
        Self {
            length: (2 + 2 * n) as u8,
            ty: USB_DT_STRING,
            chars,
        }
    }

    pub fn units(&self) -> &[u16] {
        &self.chars[..(self.length as usize - 2) / 2]
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct StringDescriptors {
    pub string0: StringDescriptor,
    pub manufacturer: StringDescriptor,
    pub product: StringDescriptor,
    pub serial: StringDescriptor,
}

/// Event ring segment table entry.
#[repr(C)]
#[derive(Debug)]
pub struct ErstEntry {
    pub base: u64,
    /// In TRBs.
    pub size: u32,
    _res: u32,
}
sa::const_assert_eq!(size_of::<ErstEntry>(), 16);

impl ErstEntry {
    pub fn new(base: u64, size: u32) -> Self {
        Self { base, size, _res: 0 }
    }
}

/// Everything the DbC needs in one page. The three contexts must stay
/// contiguous and in this order.
#[repr(C)]
#[derive(Debug)]
pub struct XhciDebugStructs {
    pub info: InfoContext,
    pub out_ep: EndpointContext,
    pub in_ep: EndpointContext,
    pub strings: StringDescriptors,
    pub erst: ErstEntry,
}
sa::const_assert!(size_of::<XhciDebugStructs>() < PAGE_SIZE);
sa::const_assert_eq!(size_of::<XhciDebugStructs>(), 3 * 64 + 4 * 64 + 16);

#[cfg(test)]
mod tests {
    use core::mem::offset_of;
    use std::string::String;

    use super::*;

    #[test]
    fn context_layout() {
        assert_eq!(offset_of!(XhciDebugStructs, out_ep), 64);
        assert_eq!(offset_of!(XhciDebugStructs, in_ep), 128);
        assert_eq!(offset_of!(XhciDebugStructs, erst), 448);
        assert_eq!(offset_of!(EndpointContext, dequeue), 8);
    }

    #[test]
    fn endpoint_info_bits() {
        let ctx = EndpointContext::bulk(EP_TYPE_BULK_IN, 0x1000);
        let raw: u32 = ctx.info.into();
        assert_eq!(raw, (1024 << 16) | (6 << 3) | (3 << 1));
        assert_eq!(ctx.dequeue, 0x1001);
    }

    #[test]
    fn string_descriptor_truncates() {
        let d = StringDescriptor::new("CBS0001".encode_utf16());
        assert_eq!(d.length, 16);
        assert_eq!(d.ty, 3);
        assert_eq!(String::from_utf16(d.units()).unwrap(), "CBS0001");

        let long = StringDescriptor::new(core::iter::repeat(b'x' as u16).take(40));
        assert_eq!(long.length, 64);
        assert_eq!(long.units().len(), StringDescriptor::MAX_CHARS);
    }
}
