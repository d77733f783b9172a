mod serial;
mod xhci;

use core::fmt::{self, Arguments, Write};

use hvboot_lib::arch::serial::{Init, Serial};
use hvboot_lib::bootinfo::BootInfo;
use hvboot_lib::cmdline::Options;
use hvboot_lib::console::{self, ConsoleChoice, OutputSlot};
use hvboot_lib::xhci::XhciConsole;
use spin::Mutex;

pub enum Console {
    Serial(Serial<Init>),
    Xhci(XhciConsole<xhci::MmioAccess>),
}

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self {
            Self::Serial(serial) => serial.write_str(s),
            Self::Xhci(xhci) => xhci.write_str(s),
        }
    }
}

pub static OUTPUT: Mutex<OutputSlot<Console>> = Mutex::new(OutputSlot::new());

fn install(console: Console) {
    if let Err(e) = OUTPUT.lock().install(console) {
        panic!("{}", e);
    }
    unsafe { hvboot_lib::log::set_handler(log_handler) };
}

unsafe fn log_handler(args: Arguments<'_>, is_unsafe: bool) {
    if is_unsafe {
        crate::unsafe_println!("{}", args);
    } else {
        crate::println!("{}", args);
    }
}

/// Selects the console from the command line and installs it. Without a
/// console, output is dropped.
pub fn initialize(info: &BootInfo) {
    let opts = Options::parse(&info.cmdline);
    let mut platform = serial::BarePlatform;
    match console::select(&opts, info.mcfg.as_ref(), &mut platform) {
        ConsoleChoice::Serial(port) => install(Console::Serial(serial::open(port))),
        ConsoleChoice::XhciDebug {
            device,
            identifier,
            power,
        } => {
            let Some(mcfg) = info.mcfg.as_ref() else {
                panic!("No valid MCFG pointer given!");
            };
            install(Console::Xhci(xhci::open(mcfg, &device, &identifier, power)));
        }
        ConsoleChoice::NoneYet => (),
    }

    // Noisy links may have garbage in flight; start on a fresh line.
    crate::print!("\n\n");
}

#[macro_export]
macro_rules! print {
    ($($args:tt)*) => {{
        if let Some(out) = $crate::arch::x64::log::OUTPUT.lock().get_mut() {
            #[allow(unused_imports)]
            use core::fmt::Write;
            let _ = write!(*out, $($args)*);
        }
    }};
}

#[macro_export]
macro_rules! println {
    ($($args:tt)*) => {{
        if let Some(out) = $crate::arch::x64::log::OUTPUT.lock().get_mut() {
            #[allow(unused_imports)]
            use core::fmt::Write;
            let _ = writeln!(*out, $($args)*);
        }
    }};
}

/// Writes without honoring the output lock. Only for the panic path.
#[macro_export]
macro_rules! unsafe_println {
    ($($args:tt)*) => {{
        let lock = &$crate::arch::x64::log::OUTPUT;
        if lock.is_locked() {
            lock.force_unlock();
        }
        if let Some(out) = lock.lock().get_mut() {
            #[allow(unused_imports)]
            use core::fmt::Write;
            let _ = writeln!(*out, $($args)*);
        }
    }};
}
