#![no_std]
#![no_main]

extern crate alloc;

mod arch;

pub use arch::x64::boot_cmdline;
