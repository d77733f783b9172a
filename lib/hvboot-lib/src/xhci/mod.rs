//! USB debug console over the xHCI Debug Capability (DbC).

mod dbc;
pub mod regs;
pub mod ring;
pub mod structs;

pub use dbc::*;
