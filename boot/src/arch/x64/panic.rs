use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, Ordering};

use hvboot_lib::arch::{disable_interrupts, hlt_loop};

use crate::unsafe_println;

static IN_PANIC: AtomicBool = AtomicBool::new(false);

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    disable_interrupts();
    let nested = IN_PANIC.swap(true, Ordering::SeqCst);
    unsafe {
        if nested {
            unsafe_println!("=== PANIC WHILE PANICKING ===");
        } else {
            unsafe_println!("\x1b[1;31m=== PANIC ===\x1b[0m");
        }
        unsafe_println!("{}", info);
    }
    hlt_loop()
}
