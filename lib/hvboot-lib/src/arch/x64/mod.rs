pub mod apic;
pub mod ioapic;
pub mod msr;
pub mod pic;
pub mod port;
pub mod serial;

use core::arch::asm;

pub fn disable_interrupts() {
    unsafe {
        asm!("cli", options(nomem, nostack));
    }
}

pub fn hlt_loop() -> ! {
    disable_interrupts();
    loop {
        unsafe {
            asm!("hlt", options(nomem, nostack));
        }
    }
}

/// Stops with an invalid-opcode exception. Used before any console exists.
pub fn trap() -> ! {
    unsafe {
        asm!("ud2", options(nomem, nostack, noreturn));
    }
}
