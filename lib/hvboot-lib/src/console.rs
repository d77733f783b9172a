//! Picks the console from the boot options and keeps the single installed
//! output.

use alloc::vec::Vec;
use core::fmt;

use crate::acpi::AcpiMcfg;
use crate::cmdline::Options;
use crate::config::console::DEFAULT_XHCI_IDENTIFIER;
use crate::pci::PciDevice;
use crate::xhci::PowerCycle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleChoice {
    Serial(u16),
    XhciDebug {
        device: PciDevice,
        /// Serial number string the debug device reports, UTF-16.
        identifier: Vec<u16>,
        power: PowerCycle,
    },
    /// `xhci` was requested but there is no controller. Not fatal.
    NoneYet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerialPortParseError;

impl fmt::Display for SerialPortParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid serial port")
    }
}

/// Hexadecimal I/O port, with or without a `0x` prefix.
pub fn parse_serial_port(value: &str) -> Result<u16, SerialPortParseError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u16::from_str_radix(digits, 16).map_err(|_| SerialPortParseError)
}

pub fn xhci_identifier(value: &str) -> Vec<u16> {
    let id = if value.is_empty() {
        DEFAULT_XHCI_IDENTIFIER
    } else {
        value
    };
    id.encode_utf16().collect()
}

/// Hardware queries the selection policy depends on.
pub trait Platform {
    fn bios_serial_port(&mut self) -> u16;
    fn find_xhci(&mut self, mcfg: &AcpiMcfg) -> Option<PciDevice>;
}

/// `serial` beats `xhci`; with neither, the BIOS serial port is used.
///
/// Panics on an unparsable `serial=` value and on `xhci` without an MCFG.
pub fn select<P: Platform + ?Sized>(
    opts: &Options<'_>,
    mcfg: Option<&AcpiMcfg>,
    platform: &mut P,
) -> ConsoleChoice {
    if let Some(value) = opts.serial {
        let port = if value.is_empty() {
            platform.bios_serial_port()
        } else {
            match parse_serial_port(value) {
                Ok(port) => port,
                Err(e) => panic!("{}: \"{}\"", e, value),
            }
        };
        return ConsoleChoice::Serial(port);
    }

    if let Some(value) = opts.xhci {
        let Some(mcfg) = mcfg else {
            panic!("No valid MCFG pointer given!");
        };
        let Some(device) = platform.find_xhci(mcfg) else {
            return ConsoleChoice::NoneYet;
        };
        let power = match opts.xhci_power {
            Some("1") => PowerCycle::PowerCycle,
            _ => PowerCycle::None,
        };
        return ConsoleChoice::XhciDebug {
            device,
            identifier: xhci_identifier(value),
            power,
        };
    }

    ConsoleChoice::Serial(platform.bios_serial_port())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlreadyInstalledError;

impl fmt::Display for AlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Output already initialized")
    }
}

/// Holds at most one output for the lifetime of the program.
pub struct OutputSlot<T> {
    output: Option<T>,
}

impl<T> OutputSlot<T> {
    pub const fn new() -> Self {
        Self { output: None }
    }

    pub fn install(&mut self, output: T) -> Result<(), AlreadyInstalledError> {
        if self.output.is_some() {
            return Err(AlreadyInstalledError);
        }
        self.output = Some(output);
        Ok(())
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.output.as_mut()
    }

    pub fn is_installed(&self) -> bool {
        self.output.is_some()
    }
}

impl<T> Default for OutputSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
