use core::arch::asm;

pub struct Msr(u32);

impl Msr {
    pub const fn new(reg: u32) -> Self {
        Self(reg)
    }

    pub unsafe fn read(&self) -> u64 {
        let hi: u32;
        let lo: u32;
        asm!(
            "rdmsr",
            in("ecx") self.0,
            lateout("edx") hi,
            lateout("eax") lo,
            options(nostack, nomem),
        );
        ((hi as u64) << 32) | lo as u64
    }

    pub unsafe fn write(&mut self, value: u64) {
        asm!(
            "wrmsr",
            in("ecx") self.0,
            in("edx") (value >> 32) as u32,
            in("eax") value as u32,
            options(nostack, nomem),
        );
    }
}

pub const IA32_APIC_BASE: Msr = Msr::new(0x1b);
