use core::arch::asm;
use core::marker::PhantomData;

use crate::access::*;

pub trait PortData: Sized {
    unsafe fn read(port: u16) -> Self;
    unsafe fn write(port: u16, value: Self);
}

impl PortData for u8 {
    unsafe fn read(port: u16) -> Self {
        let value;
        asm!(
            "in al, dx",
            in("dx") port,
            lateout("al") value,
            options(nomem, nostack, preserves_flags),
        );
        value
    }

    unsafe fn write(port: u16, value: Self) {
        asm!(
            "out dx, al",
            in("dx") port,
            in("al") value,
            options(nomem, nostack, preserves_flags),
        );
    }
}

pub struct Port<T: PortData, A = ReadWrite> {
    port: u16,
    value: PhantomData<T>,
    access: PhantomData<A>,
}

impl<T: PortData, A> Port<T, A> {
    pub const fn new(port: u16) -> Self {
        Self {
            port,
            value: PhantomData,
            access: PhantomData,
        }
    }

    pub unsafe fn read(&self) -> T
    where
        A: Readable,
    {
        T::read(self.port)
    }

    pub unsafe fn write(&mut self, value: T)
    where
        A: Writable,
    {
        T::write(self.port, value)
    }
}

pub type PortWriteOnly<T> = Port<T, WriteOnly>;
