//! Type-level access permissions for registers and ports.

mod sealed {
    pub trait Permission {}
}

pub trait Readable: sealed::Permission {}
pub trait Writable: sealed::Permission {}

macro_rules! permission {
    ($(#[$m:meta])* $name:ident: $($tr:ident),+) => {
        $(#[$m])*
        pub enum $name {}
        impl sealed::Permission for $name {}
        $(impl $tr for $name {})+
    };
}

permission!(
    /// Register that must only be read.
    ReadOnly: Readable
);
permission!(
    /// Register that must only be written, e.g. a doorbell.
    WriteOnly: Writable
);
permission!(ReadWrite: Readable, Writable);
