//! Legacy 8259 pair. Only remapped and masked, never used.

use super::port::{Port, PortWriteOnly};
use crate::config::intr::PIC_BASE;

const ICW1_INIT: u8 = 0x11;
const ICW4_8086: u8 = 0x01;

struct Pic {
    cmd: PortWriteOnly<u8>,
    data: Port<u8>,
}

impl Pic {
    const fn new(base: u16) -> Self {
        Self {
            cmd: PortWriteOnly::new(base),
            data: Port::new(base + 1),
        }
    }
}

/// Remaps both PICs above the exception vectors and masks every line.
///
/// # Safety
/// Interrupts must be disabled.
pub unsafe fn disable_pic() {
    let mut master = Pic::new(0x20);
    let mut slave = Pic::new(0xa0);

    master.cmd.write(ICW1_INIT);
    slave.cmd.write(ICW1_INIT);

    master.data.write(PIC_BASE);
    slave.data.write(PIC_BASE + 8);

    master.data.write(4);
    slave.data.write(2);

    master.data.write(ICW4_8086);
    slave.data.write(ICW4_8086);

    master.data.write(0xff);
    slave.data.write(0xff);
}
