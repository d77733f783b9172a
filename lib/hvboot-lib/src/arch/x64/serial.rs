//! 16550 UART driven through port I/O.

use core::fmt;
use core::hint::spin_loop;
use core::marker::PhantomData;

use super::port::Port;
use crate::config::console::FALLBACK_SERIAL_PORT;

pub struct Uninit;
pub struct Init;

const DATA: usize = 0;
const INT_ENABLE: usize = 1;
const FIFO_CTRL: usize = 2;
const LINE_CTRL: usize = 3;
const MODEM_CTRL: usize = 4;
const LINE_STATUS: usize = 5;

const LSR_THR_EMPTY: u8 = 1 << 5;

/// Physical address of the COM1 entry of the BIOS data area.
pub const BDA_COM1: usize = 0x400;

pub struct Serial<S> {
    base: u16,
    ports: [Port<u8>; 6],
    state: PhantomData<S>,
}

impl Serial<Uninit> {
    pub const fn new(base: u16) -> Self {
        Self {
            base,
            ports: [
                Port::new(base),
                Port::new(base + 1),
                Port::new(base + 2),
                Port::new(base + 3),
                Port::new(base + 4),
                Port::new(base + 5),
            ],
            state: PhantomData,
        }
    }

    /// Programs 115200 8N1 with FIFOs enabled and interrupts off.
    ///
    /// # Safety
    /// `base` must be the I/O base of a 16550 compatible UART.
    pub unsafe fn init(mut self) -> Serial<Init> {
        self.ports[INT_ENABLE].write(0x00);
        self.ports[LINE_CTRL].write(0x80);
        self.ports[DATA].write(0x01);
        self.ports[INT_ENABLE].write(0x00);
        self.ports[LINE_CTRL].write(0x03);
        self.ports[FIFO_CTRL].write(0xc7);
        self.ports[MODEM_CTRL].write(0x03);
        Serial {
            base: self.base,
            ports: self.ports,
            state: PhantomData,
        }
    }
}

impl<S> Serial<S> {
    pub fn base(&self) -> u16 {
        self.base
    }
}

impl Serial<Init> {
    pub fn put(&mut self, c: u8) {
        unsafe {
            while self.ports[LINE_STATUS].read() & LSR_THR_EMPTY == 0 {
                spin_loop();
            }
            self.ports[DATA].write(c);
        }
    }
}

impl fmt::Write for Serial<Init> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.put(b'\r');
            }
            self.put(b);
        }
        Ok(())
    }
}

/// Port named by the BIOS data area word, or COM1 when the word is zero.
pub fn serial_port_from_bda(word: u16) -> u16 {
    match word {
        0 => FALLBACK_SERIAL_PORT,
        port => port,
    }
}

/// # Safety
/// The low 1 MiB must be identity mapped.
pub unsafe fn bios_serial_port() -> u16 {
    let word = core::ptr::read_volatile(BDA_COM1 as *const u16);
    serial_port_from_bda(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bda_falls_back_to_com1() {
        assert_eq!(serial_port_from_bda(0), 0x3f8);
        assert_eq!(serial_port_from_bda(0x2f8), 0x2f8);
    }

    #[test]
    fn uninit_keeps_base() {
        assert_eq!(Serial::new(0x3e8).base(), 0x3e8);
    }
}
