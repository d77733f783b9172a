use core::fmt;
use core::hint::spin_loop;
use core::mem::size_of;
use core::ptr::{copy_nonoverlapping, write_volatile};
use core::sync::atomic::{fence, Ordering};

use super::regs::*;
use super::ring::{
    EventRing, TransferRing, Trb, COMPLETION_SHORT_PACKET, COMPLETION_SUCCESS, TRB_SIZE,
    TRB_TRANSFER_EVENT,
};
use super::structs::*;
use crate::config::xhci::*;
use crate::config::PAGE_SIZE;
use crate::mm::DmaRegion;

/// Register and DMA access for the driver. Offsets are from the MMIO base.
pub trait DriverAccess {
    fn read32(&mut self, offset: usize) -> u32;
    fn write32(&mut self, offset: usize, value: u32);
    fn read64(&mut self, offset: usize) -> u64;
    fn write64(&mut self, offset: usize, value: u64);

    fn alloc_dma(&mut self, page_order: u8) -> Option<DmaRegion>;

    fn delay(&mut self, spins: u64) {
        for _ in 0..spins {
            spin_loop();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerCycle {
    None,
    PowerCycle,
}

#[derive(Clone, Copy, Debug)]
pub struct DbcConfig<'a> {
    /// Serial number string, UTF-16.
    pub identifier: &'a [u16],
    pub power: PowerCycle,
    pub configure_retries: u64,
}

impl<'a> DbcConfig<'a> {
    pub fn new(identifier: &'a [u16], power: PowerCycle) -> Self {
        Self {
            identifier,
            power,
            configure_retries: DBC_CONFIGURE_RETRIES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbcError {
    NoDebugCapability,
    OutOfDmaMemory,
    ConfigureTimeout,
}

impl fmt::Display for DbcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDebugCapability => write!(f, "No debug capability present!"),
            Self::OutOfDmaMemory => write!(f, "not enough DMA memory"),
            Self::ConfigureTimeout => write!(f, "DbC was not configured by the host"),
        }
    }
}

/// Offset of the DbC extended capability, following the xECP chain.
pub fn find_dbc<A: DriverAccess + ?Sized>(access: &mut A) -> Option<usize> {
    let xecp = ((access.read32(HCCPARAMS1) >> 16) & 0xffff) as usize;
    if xecp == 0 {
        return None;
    }
    let mut off = xecp * 4;
    loop {
        let hdr = access.read32(off);
        if hdr as u8 == EXT_CAP_DBC {
            return Some(off);
        }
        let next = ((hdr >> 8) & 0xff) as usize;
        if next == 0 {
            return None;
        }
        off += next * 4;
    }
}

/// Page indices inside the DMA buffer.
const PAGE_STRUCTS: usize = 0;
const PAGE_EVENT_RING: usize = 1;
const PAGE_OUT_RING: usize = 2;
const PAGE_IN_RING: usize = 3;
const PAGE_OUT_DATA: usize = 4;

const TRBS_PER_PAGE: usize = PAGE_SIZE / TRB_SIZE;

/// Console that sends bytes to the debug host over the DbC bulk OUT endpoint.
pub struct XhciConsole<A> {
    access: A,
    dbc: usize,
    dma: DmaRegion,
    out_ring: TransferRing,
    events: EventRing,
    last_completion: Option<u8>,
}

unsafe impl<A: Send> Send for XhciConsole<A> {}

impl<A: DriverAccess> XhciConsole<A> {
    pub fn init(mut access: A, config: &DbcConfig<'_>) -> Result<Self, DbcError> {
        let dbc = find_dbc(&mut access).ok_or(DbcError::NoDebugCapability)?;
        let dma = access.alloc_dma(DMA_ORDER).ok_or(DbcError::OutOfDmaMemory)?;

        let page = |n: usize| (dma.virt().wrapping_add(n * PAGE_SIZE), dma.phys() + (n * PAGE_SIZE) as u64);
        let (ev_virt, ev_phys) = page(PAGE_EVENT_RING);
        let (out_virt, out_phys) = page(PAGE_OUT_RING);
        let (in_virt, in_phys) = page(PAGE_IN_RING);

        let events = unsafe { EventRing::new(ev_virt.cast(), ev_phys, TRBS_PER_PAGE) };
        let out_ring = unsafe { TransferRing::new(out_virt.cast(), out_phys, TRBS_PER_PAGE) };
        // Never read from, but the IN endpoint needs a valid ring.
        let _in_ring = unsafe { TransferRing::new(in_virt.cast(), in_phys, TRBS_PER_PAGE) };

        let mut console = Self {
            access,
            dbc,
            dma,
            out_ring,
            events,
            last_completion: None,
        };
        console.disable();
        console.program(config);
        if config.power == PowerCycle::PowerCycle {
            console.power_cycle_ports();
        }
        console.enable(config.configure_retries)?;
        crate::info!("DbC configured");
        Ok(console)
    }

    fn dbc_read32(&mut self, reg: usize) -> u32 {
        self.access.read32(self.dbc + reg)
    }

    fn dbc_write32(&mut self, reg: usize, value: u32) {
        self.access.write32(self.dbc + reg, value)
    }

    fn dbc_write64(&mut self, reg: usize, value: u64) {
        self.access.write64(self.dbc + reg, value)
    }

    fn control(&mut self) -> DbcControl {
        DbcControl::from_bits_truncate(self.dbc_read32(DCCTRL))
    }

    /// Polls until `DCE` reads `enabled` or the budget runs out.
    fn wait_enabled(&mut self, enabled: bool) -> bool {
        for _ in 0..DBC_ENABLE_RETRIES {
            if self.control().contains(DbcControl::DCE) == enabled {
                return true;
            }
            spin_loop();
        }
        crate::warn!("DbC enable did not read back {}", enabled);
        false
    }

    fn disable(&mut self) {
        self.dbc_write32(DCCTRL, 0);
        self.wait_enabled(false);
    }

    fn program(&mut self, config: &DbcConfig<'_>) {
        let phys = self.dma.phys();
        let structs_phys = phys + (PAGE_STRUCTS * PAGE_SIZE) as u64;
        let strings_off = core::mem::offset_of!(XhciDebugStructs, strings);
        let desc = size_of::<StringDescriptor>();

        let strings = StringDescriptors {
            string0: StringDescriptor::new([LANGID_EN_US]),
            manufacturer: StringDescriptor::new(MANUFACTURER.encode_utf16()),
            product: StringDescriptor::new(PRODUCT.encode_utf16()),
            serial: StringDescriptor::new(config.identifier.iter().copied()),
        };
        let addrs = [0, 1, 2, 3].map(|n| structs_phys + (strings_off + n * desc) as u64);
        let structs = XhciDebugStructs {
            info: InfoContext::new(addrs, &strings),
            out_ep: EndpointContext::bulk(EP_TYPE_BULK_OUT, self.out_ring.phys()),
            in_ep: EndpointContext::bulk(EP_TYPE_BULK_IN, phys + (PAGE_IN_RING * PAGE_SIZE) as u64),
            strings,
            erst: ErstEntry::new(self.events.phys(), self.events.len() as u32),
        };
        unsafe { write_volatile(self.dma.virt().cast::<XhciDebugStructs>(), structs) };
        fence(Ordering::SeqCst);

        let erst_phys = structs_phys + core::mem::offset_of!(XhciDebugStructs, erst) as u64;
        self.dbc_write32(DCERSTSZ, 1);
        self.dbc_write64(DCERSTBA, erst_phys);
        self.dbc_write64(DCERDP, self.events.dequeue_phys());
        self.dbc_write64(DCCP, structs_phys);
        self.dbc_write32(DDI1, (USB_VENDOR_ID as u32) << 16 | USB_PROTOCOL as u32);
        self.dbc_write32(DDI2, (USB_DEVICE_REVISION as u32) << 16 | USB_PRODUCT_ID as u32);
    }

    /// Turns every root port off and on again so the host notices the
    /// debug device.
    fn power_cycle_ports(&mut self) {
        let caplength = (self.access.read32(CAPLENGTH) & 0xff) as usize;
        let ports = (self.access.read32(HCSPARAMS1) >> 24) as usize;
        crate::debug!("power cycling {} root ports", ports);
        for n in 1..=ports {
            let reg = portsc(caplength, n);
            let v = self.access.read32(reg) & !(PORTSC_PED | PORTSC_PR | PORTSC_RW1C);
            self.access.write32(reg, v & !PORTSC_PP);
        }
        self.access.delay(POWER_CYCLE_SPINS);
        for n in 1..=ports {
            let reg = portsc(caplength, n);
            let v = self.access.read32(reg) & !(PORTSC_PED | PORTSC_PR | PORTSC_RW1C);
            self.access.write32(reg, v | PORTSC_PP);
        }
    }

    fn enable(&mut self, retries: u64) -> Result<(), DbcError> {
        self.dbc_write32(DCCTRL, (DbcControl::DCE | DbcControl::LSE).bits());
        self.wait_enabled(true);

        let portsc = DbcPortSc::from_bits_truncate(self.dbc_read32(DCPORTSC));
        self.dbc_write32(DCPORTSC, ((portsc - DbcPortSc::RW1C) | DbcPortSc::PED).bits());

        let mut configured = false;
        for _ in 0..retries {
            if self.control().contains(DbcControl::DCR) {
                configured = true;
                break;
            }
            spin_loop();
        }
        if !configured {
            return Err(DbcError::ConfigureTimeout);
        }

        let ctrl = self.control() - DbcControl::RW1C;
        self.dbc_write32(DCCTRL, (ctrl | DbcControl::DRC).bits());
        Ok(())
    }

    fn out_data(&self) -> (*mut u8, u64) {
        let off = PAGE_OUT_DATA * PAGE_SIZE;
        (self.dma.virt().wrapping_add(off), self.dma.phys() + off as u64)
    }

    /// Sends `bytes`, one page per transfer, and waits for each to complete.
    pub fn write(&mut self, bytes: &[u8]) {
        let (data, data_phys) = self.out_data();
        for chunk in bytes.chunks(PAGE_SIZE) {
            unsafe { copy_nonoverlapping(chunk.as_ptr(), data, chunk.len()) };
            let trb = self.out_ring.enqueue(Trb::normal(data_phys, chunk.len() as u32));
            fence(Ordering::SeqCst);
            self.dbc_write32(DCDB, DOORBELL_OUT);
            self.last_completion = Some(self.wait_transfer(trb));
        }
    }

    /// Returns the completion code of the transfer event for `trb`.
    fn wait_transfer(&mut self, trb: u64) -> u8 {
        loop {
            let Some(event) = self.events.pop() else {
                spin_loop();
                continue;
            };
            let dequeue = self.events.dequeue_phys();
            self.dbc_write64(DCERDP, dequeue);
            if event.control.trb_type() == TRB_TRANSFER_EVENT && event.parameter == trb {
                let code = event.completion_code();
                if code != COMPLETION_SUCCESS && code != COMPLETION_SHORT_PACKET {
                    crate::warn!(
                        "DbC transfer failed with completion code {} ({} bytes not sent)",
                        code,
                        event.transfer_length()
                    );
                }
                return code;
            }
        }
    }

    /// Completion code of the most recent transfer, if any was sent.
    pub fn last_completion(&self) -> Option<u8> {
        self.last_completion
    }

    pub fn access(&mut self) -> &mut A {
        &mut self.access
    }
}

impl<A: DriverAccess> fmt::Write for XhciConsole<A> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::{alloc, Layout};
    use std::collections::BTreeMap;
    use std::vec;
    use std::vec::Vec;

    use super::super::ring::{TrbControl, TRB_LINK, TRB_NORMAL};
    use super::*;
    use crate::config::mm::DMA_POOL_SIZE;
    use crate::mm::DmaPool;

    const DBC: usize = 0x110;
    const CAPLEN: usize = 0x20;

    /// A controller that completes every OUT transfer as soon as the doorbell
    /// rings.
    struct SimXhci {
        regs: BTreeMap<usize, u32>,
        pool: Option<DmaPool>,
        configure_after: Option<u32>,
        port_enabled: bool,
        polls: u32,
        out: Option<(u64, bool)>,
        event_enqueue: usize,
        event_cycle: bool,
        received: Vec<u8>,
        completion: u8,
        portsc_writes: Vec<(usize, u32)>,
    }

    impl SimXhci {
        fn new() -> Self {
            let layout = Layout::from_size_align(DMA_POOL_SIZE, DMA_POOL_SIZE).unwrap();
            let region = unsafe {
                let ptr = alloc(layout);
                assert!(!ptr.is_null());
                core::slice::from_raw_parts_mut(ptr, DMA_POOL_SIZE)
            };
            let mut regs = BTreeMap::new();
            regs.insert(CAPLENGTH, 0x0100_0000 | CAPLEN as u32);
            regs.insert(HCSPARAMS1, 2 << 24);
            regs.insert(HCCPARAMS1, 0x40 << 16);
            regs.insert(0x100, 0x0000_0401);
            regs.insert(DBC, EXT_CAP_DBC as u32);
            regs.insert(portsc(CAPLEN, 1), PORTSC_PP | PORTSC_PED | (1 << 17) | 1);
            regs.insert(portsc(CAPLEN, 2), PORTSC_PP);
            Self {
                regs,
                pool: Some(DmaPool::reclaim(region)),
                configure_after: Some(3),
                port_enabled: false,
                polls: 0,
                out: None,
                event_enqueue: 0,
                event_cycle: true,
                received: Vec::new(),
                completion: COMPLETION_SUCCESS,
                portsc_writes: Vec::new(),
            }
        }

        fn reg(&self, off: usize) -> u32 {
            self.regs.get(&off).copied().unwrap_or(0)
        }

        fn reg64(&self, off: usize) -> u64 {
            self.reg(off) as u64 | (self.reg(off + 4) as u64) << 32
        }

        fn structs(&self) -> &XhciDebugStructs {
            unsafe { &*(self.reg64(DBC + DCCP) as *const XhciDebugStructs) }
        }

        fn post_event(&mut self, trb: u64) {
            let erst = unsafe { &*(self.reg64(DBC + DCERSTBA) as *const ErstEntry) };
            let (base, size) = (erst.base, erst.size as usize);
            let control = TrbControl::new()
                .with_trb_type(TRB_TRANSFER_EVENT)
                .with_endpoint(2)
                .with_cycle(self.event_cycle);
            let event = Trb::new(trb, (self.completion as u32) << 24, control);
            unsafe { write_volatile((base as *mut Trb).add(self.event_enqueue), event) };
            self.event_enqueue += 1;
            if self.event_enqueue == size {
                self.event_enqueue = 0;
                self.event_cycle = !self.event_cycle;
            }
        }

        fn ring_out(&mut self) {
            let (mut deq, mut cycle) = match self.out {
                Some(state) => state,
                None => {
                    let raw = self.structs().out_ep.dequeue;
                    (raw & !0xf, raw & 1 != 0)
                }
            };
            loop {
                let trb = unsafe { *(deq as *const Trb) };
                if trb.control.cycle() != cycle {
                    break;
                }
                match trb.control.trb_type() {
                    TRB_LINK => {
                        deq = trb.parameter;
                        if trb.control.toggle() {
                            cycle = !cycle;
                        }
                    }
                    TRB_NORMAL => {
                        let data = unsafe {
                            core::slice::from_raw_parts(trb.parameter as *const u8, trb.status as usize)
                        };
                        self.received.extend_from_slice(data);
                        self.post_event(deq);
                        deq += TRB_SIZE as u64;
                    }
                    t => panic!("unexpected TRB type {}", t),
                }
            }
            self.out = Some((deq, cycle));
        }
    }

    impl DriverAccess for SimXhci {
        fn read32(&mut self, offset: usize) -> u32 {
            if offset == DBC + DCCTRL && self.port_enabled {
                self.polls += 1;
                if Some(self.polls) == self.configure_after {
                    let ctrl = self.reg(offset) | (DbcControl::DCR | DbcControl::DRC).bits();
                    self.regs.insert(offset, ctrl);
                }
            }
            self.reg(offset)
        }

        fn write32(&mut self, offset: usize, value: u32) {
            match offset {
                o if o == DBC + DCCTRL => {
                    let cur = DbcControl::from_bits_truncate(self.reg(o));
                    let value = DbcControl::from_bits_truncate(value);
                    let next = if value.contains(DbcControl::DCE) {
                        (value & (DbcControl::DCE | DbcControl::LSE))
                            | (cur & DbcControl::DCR)
                            | (cur & DbcControl::RW1C & !value)
                    } else {
                        DbcControl::empty()
                    };
                    self.regs.insert(o, next.bits());
                }
                o if o == DBC + DCPORTSC => {
                    self.port_enabled |= value & PORTSC_PED != 0;
                    self.regs.insert(o, value);
                }
                o if o == DBC + DCDB => {
                    assert_eq!(value, DOORBELL_OUT);
                    self.ring_out();
                }
                o if o >= portsc(CAPLEN, 1) => {
                    self.portsc_writes.push((o, value));
                    self.regs.insert(o, value);
                }
                o => {
                    self.regs.insert(o, value);
                }
            }
        }

        fn read64(&mut self, offset: usize) -> u64 {
            self.reg64(offset)
        }

        fn write64(&mut self, offset: usize, value: u64) {
            self.regs.insert(offset, value as u32);
            self.regs.insert(offset + 4, (value >> 32) as u32);
        }

        fn alloc_dma(&mut self, page_order: u8) -> Option<DmaRegion> {
            self.pool.as_mut()?.alloc(page_order)
        }

        fn delay(&mut self, _spins: u64) {}
    }

    fn identifier() -> Vec<u16> {
        "CBS0001".encode_utf16().collect()
    }

    fn console(sim: SimXhci) -> XhciConsole<SimXhci> {
        let id = identifier();
        XhciConsole::init(sim, &DbcConfig::new(&id, PowerCycle::None)).unwrap()
    }

    #[test]
    fn finds_capability_through_chain() {
        let mut sim = SimXhci::new();
        assert_eq!(find_dbc(&mut sim), Some(DBC));
        sim.regs.insert(DBC, 0x02);
        assert_eq!(find_dbc(&mut sim), None);
        sim.regs.insert(HCCPARAMS1, 0);
        assert_eq!(find_dbc(&mut sim), None);
    }

    #[test]
    fn missing_capability() {
        let mut sim = SimXhci::new();
        sim.regs.insert(HCCPARAMS1, 0);
        let id = identifier();
        let res = XhciConsole::init(sim, &DbcConfig::new(&id, PowerCycle::None));
        assert_eq!(res.err(), Some(DbcError::NoDebugCapability));
    }

    #[test]
    fn missing_dma_memory() {
        let mut sim = SimXhci::new();
        sim.pool = None;
        let id = identifier();
        let res = XhciConsole::init(sim, &DbcConfig::new(&id, PowerCycle::None));
        assert_eq!(res.err(), Some(DbcError::OutOfDmaMemory));
    }

    #[test]
    fn configure_budget_exhausted() {
        let mut sim = SimXhci::new();
        sim.configure_after = None;
        let id = identifier();
        let mut config = DbcConfig::new(&id, PowerCycle::None);
        config.configure_retries = 100;
        let res = XhciConsole::init(sim, &config);
        assert_eq!(res.err(), Some(DbcError::ConfigureTimeout));
    }

    #[test]
    fn init_programs_registers() {
        let mut con = console(SimXhci::new());
        let dma = con.dma.phys();
        let sim = con.access();

        assert_eq!(sim.reg64(DBC + DCCP), dma);
        assert_eq!(sim.reg64(DBC + DCERSTBA), dma + 448);
        assert_eq!(sim.reg(DBC + DCERSTSZ), 1);
        assert_eq!(sim.reg64(DBC + DCERDP), dma + PAGE_SIZE as u64);
        assert_eq!(sim.reg(DBC + DDI1), 0x1d6b_0000);
        assert_eq!(sim.reg(DBC + DDI2), 0x0010_0010);

        let ctrl = DbcControl::from_bits_truncate(sim.reg(DBC + DCCTRL));
        assert!(ctrl.contains(DbcControl::DCE | DbcControl::LSE | DbcControl::DCR));
        assert!(!ctrl.contains(DbcControl::DRC));
        assert!(sim.portsc_writes.is_empty());

        let structs = sim.structs();
        assert_eq!(structs.strings.serial.units(), &identifier()[..]);
        assert_eq!(structs.strings.string0.units(), &[0x0409]);
        assert_eq!(structs.info.serial_len, 16);
        assert_eq!(structs.info.serial, dma + 192 + 3 * 64);
        assert_eq!(structs.out_ep.info.ep_type(), EP_TYPE_BULK_OUT);
        assert_eq!(structs.in_ep.info.ep_type(), EP_TYPE_BULK_IN);
        assert_eq!(structs.out_ep.info.max_packet_size(), 1024);
        assert_eq!(structs.out_ep.dequeue, dma + 2 * PAGE_SIZE as u64 + 1);
        assert_eq!(structs.erst.base, dma + PAGE_SIZE as u64);
        assert_eq!(structs.erst.size, 256);
    }

    #[test]
    fn write_sends_normal_trb() {
        let mut con = console(SimXhci::new());
        con.write(b"hello");
        let dma = con.dma.phys();
        let sim = con.access();
        assert_eq!(sim.received, b"hello");
        assert_eq!(sim.reg64(DBC + DCERDP), dma + PAGE_SIZE as u64 + 16);

        let trb = unsafe { *((dma + 2 * PAGE_SIZE as u64) as *const Trb) };
        assert_eq!(trb.control.trb_type(), TRB_NORMAL);
        assert!(trb.control.ioc());
        assert_eq!(trb.status, 5);
        assert_eq!(trb.parameter, dma + 4 * PAGE_SIZE as u64);
    }

    #[test]
    fn long_writes_are_split_into_pages() {
        let mut con = console(SimXhci::new());
        let data: Vec<u8> = (0..PAGE_SIZE + 100).map(|i| i as u8).collect();
        con.write(&data);
        assert_eq!(con.access().received, data);
        assert_eq!(con.access().event_enqueue, 2);
    }

    #[test]
    fn rings_wrap() {
        let mut con = console(SimXhci::new());
        let mut expected = Vec::new();
        for i in 0..600u32 {
            let byte = [b'a' + (i % 26) as u8];
            con.write(&byte);
            expected.push(byte[0]);
        }
        assert_eq!(con.access().received, expected);
    }

    #[test]
    fn fmt_write_forwards_bytes() {
        use core::fmt::Write;

        let mut con = console(SimXhci::new());
        write!(con, "{}-{}", 1, "two").unwrap();
        assert_eq!(con.access().received, b"1-two");
    }

    #[test]
    fn power_cycle_clears_then_sets_pp() {
        let sim = SimXhci::new();
        let id = identifier();
        let mut con = XhciConsole::init(sim, &DbcConfig::new(&id, PowerCycle::PowerCycle)).unwrap();
        let writes = con.access().portsc_writes.clone();
        let p1 = portsc(CAPLEN, 1);
        let p2 = portsc(CAPLEN, 2);
        assert_eq!(writes, vec![(p1, 1), (p2, 0), (p1, 1 | PORTSC_PP), (p2, PORTSC_PP)]);
    }

    #[test]
    fn power_cycle_does_not_restart_port_reset() {
        let mut sim = SimXhci::new();
        sim.regs.insert(portsc(CAPLEN, 2), PORTSC_PP | PORTSC_PR);
        let id = identifier();
        let mut con = XhciConsole::init(sim, &DbcConfig::new(&id, PowerCycle::PowerCycle)).unwrap();
        let writes = con.access().portsc_writes.clone();
        assert_eq!(writes.len(), 4);
        assert!(writes.iter().all(|&(_, v)| v & PORTSC_PR == 0));
    }

    #[test]
    fn transfer_completion_is_recorded() {
        let mut con = console(SimXhci::new());
        assert_eq!(con.last_completion(), None);
        con.write(b"ok");
        assert_eq!(con.last_completion(), Some(COMPLETION_SUCCESS));
    }

    #[test]
    fn failed_transfer_still_returns() {
        let mut sim = SimXhci::new();
        sim.completion = 6;
        let mut con = console(sim);
        con.write(b"stalled");
        con.write(b"again");
        assert_eq!(con.last_completion(), Some(6));
        assert_eq!(con.access().received, b"stalledagain");
    }
}
