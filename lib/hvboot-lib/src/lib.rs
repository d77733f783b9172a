#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod access;
pub use access::*;

mod volatile;
pub use volatile::*;

pub mod acpi;
pub mod arch;
pub mod bootinfo;
pub mod cmdline;
pub mod config;
pub mod console;
pub mod int;
pub mod log;
pub mod mm;
pub mod pci;
pub mod xhci;
