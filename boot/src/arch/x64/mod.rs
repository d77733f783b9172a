mod heap;
mod intr;
pub mod log;
mod panic;

use hvboot_lib::arch::{hlt_loop, trap};
use hvboot_lib::bootinfo::{BootInfo, BootInfoError};
use hvboot_lib::info;
use spin::Once;

static BOOT_INFO: Once<BootInfo> = Once::new();

/// Command line the loader passed, kept for code running after bring-up.
pub fn boot_cmdline() -> &'static str {
    BOOT_INFO.get().map_or("", |info| info.cmdline.as_str())
}

/// 64-bit entry, reached from the loader trampoline with the protocol magic
/// and the boot information pointer.
#[no_mangle]
pub extern "C" fn entry64(magic: u32, boot_info: usize) -> ! {
    heap::init_dma_pool();
    heap::init_heap();

    let info = match unsafe { BootInfo::read(magic, boot_info) } {
        Ok(info) => info,
        Err(BootInfoError::UnknownMagic(_)) => trap(),
        Err(e) => panic!("{}", e),
    };
    let info = BOOT_INFO.call_once(|| info);

    log::initialize(info);
    intr::init_interrupt_controllers();

    info!("hvboot: {:?} boot, cmdline \"{}\"", info.protocol, boot_cmdline());
    hlt_loop()
}
