use hvboot_lib::arch::apic::software_disable_lapic;
use hvboot_lib::arch::ioapic::{IoApic, MmioRegisters};
use hvboot_lib::arch::pic::disable_pic;
use hvboot_lib::arch::disable_interrupts;
use hvboot_lib::config::intr::IOAPIC_BASE;
use hvboot_lib::debug;

/// Leaves every interrupt source masked: PIC remapped and masked, IOAPIC
/// entries masked, local APIC software disabled.
pub fn init_interrupt_controllers() {
    disable_interrupts();
    unsafe {
        disable_pic();
        let mut ioapic = IoApic::new(MmioRegisters::at(IOAPIC_BASE));
        let masked = ioapic.mask_all();
        let lapic = software_disable_lapic();
        debug!("masked {} IOAPIC entries, LAPIC disabled: {}", masked, lapic);
    }
}
