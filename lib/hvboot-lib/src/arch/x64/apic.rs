use raw_cpuid::CpuId;

use super::msr::{Msr, IA32_APIC_BASE};
use crate::Volatile;

const APIC_BASE_X2APIC: u64 = 1 << 10;
const APIC_BASE_ENABLE: u64 = 1 << 11;
const APIC_BASE_ADDR_MASK: u64 = 0x000f_ffff_ffff_f000;
const SVR_OFFSET: usize = 0xf0;
const SVR_APIC_ENABLE: u32 = 1 << 8;

/// SVR in the x2APIC MSR range. The MMIO page is not decoded in that mode.
const X2APIC_SVR: u32 = 0x80f;

pub fn has_apic() -> bool {
    CpuId::new()
        .get_feature_info()
        .map_or(false, |f| f.has_apic())
}

/// How the local APIC registers are reached, decoded from `IA32_APIC_BASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LapicMode {
    Disabled,
    XApic { base: usize },
    X2Apic,
}

impl LapicMode {
    pub fn from_apic_base(value: u64) -> Self {
        if value & APIC_BASE_ENABLE == 0 {
            Self::Disabled
        } else if value & APIC_BASE_X2APIC != 0 {
            Self::X2Apic
        } else {
            Self::XApic {
                base: (value & APIC_BASE_ADDR_MASK) as usize,
            }
        }
    }
}

/// Clears the software-enable bit of the local APIC if it is globally enabled.
///
/// # Safety
/// The APIC MMIO page must be identity mapped.
pub unsafe fn software_disable_lapic() -> bool {
    if !has_apic() {
        return false;
    }
    match LapicMode::from_apic_base(IA32_APIC_BASE.read()) {
        LapicMode::Disabled => false,
        LapicMode::XApic { base } => {
            let svr: &mut Volatile<u32> = Volatile::at(base + SVR_OFFSET);
            svr.update(|v| *v &= !SVR_APIC_ENABLE);
            true
        }
        LapicMode::X2Apic => {
            let mut svr = Msr::new(X2APIC_SVR);
            let value = svr.read();
            svr.write(value & !(SVR_APIC_ENABLE as u64));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apic_base_modes() {
        assert_eq!(LapicMode::from_apic_base(0xfee0_0000), LapicMode::Disabled);
        assert_eq!(
            LapicMode::from_apic_base(0xfee0_0000 | APIC_BASE_ENABLE | 1 << 8),
            LapicMode::XApic { base: 0xfee0_0000 }
        );
        assert_eq!(
            LapicMode::from_apic_base(0xfee0_0000 | APIC_BASE_ENABLE | APIC_BASE_X2APIC),
            LapicMode::X2Apic
        );
    }

    #[test]
    fn x2apic_bit_without_enable_is_disabled() {
        assert_eq!(LapicMode::from_apic_base(APIC_BASE_X2APIC), LapicMode::Disabled);
    }
}
