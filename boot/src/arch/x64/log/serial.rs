use hvboot_lib::acpi::AcpiMcfg;
use hvboot_lib::arch::serial::{bios_serial_port, Init, Serial};
use hvboot_lib::console::Platform;
use hvboot_lib::pci::{EcamConfigSpace, PciBus, PciDevice};

pub fn open(port: u16) -> Serial<Init> {
    unsafe { Serial::new(port).init() }
}

/// Platform queries against the real machine. Everything is identity mapped.
pub struct BarePlatform;

impl Platform for BarePlatform {
    fn bios_serial_port(&mut self) -> u16 {
        unsafe { bios_serial_port() }
    }

    fn find_xhci(&mut self, mcfg: &AcpiMcfg) -> Option<PciDevice> {
        let cfg = unsafe { EcamConfigSpace::new(*mcfg) };
        PciBus::new(cfg).find_xhci()
    }
}
