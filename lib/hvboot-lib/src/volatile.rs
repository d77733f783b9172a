use core::marker::PhantomData;
use core::ptr;

pub use crate::access::*;

/// A memory-mapped register. Every access goes through a volatile load or store.
#[repr(transparent)]
pub struct Volatile<T, P = ReadWrite>(T, PhantomData<P>);

impl<T, P> Volatile<T, P> {
    pub const fn new(value: T) -> Self {
        Self(value, PhantomData)
    }

    /// # Safety
    /// `addr` must point to a live, suitably aligned register of type `T`.
    pub unsafe fn at<'a>(addr: usize) -> &'a mut Self {
        &mut *(addr as *mut Self)
    }

    pub fn write(&mut self, value: T)
    where
        P: Writable,
    {
        unsafe { ptr::write_volatile(&mut self.0, value) }
    }

    pub fn read(&self) -> T
    where
        T: Copy,
        P: Readable,
    {
        unsafe { ptr::read_volatile(&self.0) }
    }

    pub fn update(&mut self, f: impl FnOnce(&mut T))
    where
        T: Copy,
        P: Readable + Writable,
    {
        let mut v = self.read();
        f(&mut v);
        self.write(v);
    }
}

/// Register followed by `N` bytes of padding, as found in indirect register windows.
#[repr(C)]
pub struct PaddedVolatile<T, P, const N: usize> {
    volatile: Volatile<T, P>,
    _pad: [u8; N],
}

impl<T, P, const N: usize> PaddedVolatile<T, P, N> {
    pub fn write(&mut self, value: T)
    where
        P: Writable,
    {
        self.volatile.write(value)
    }

    pub fn read(&self) -> T
    where
        T: Copy,
        P: Readable,
    {
        self.volatile.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_reads_then_writes() {
        let mut reg: Volatile<u32> = Volatile::new(0x10);
        reg.update(|v| *v |= 1);
        assert_eq!(reg.read(), 0x11);
    }
}
