//! Fatal precondition reporting.
//!
//! Model and configuration bugs (full queue, exhausted pool, bad priority,
//! zero-delay timer) are not recoverable. They are routed through a single
//! application-controlled handler and then halt the current thread of
//! control with a panic.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

/// Where a precondition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssertInfo {
    pub module: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub expr: &'static str,
}

impl fmt::Display for AssertInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{} ({})", self.expr, self.file, self.line, self.module)
    }
}

/// Application hook invoked before the runtime halts.
pub type AssertHandler = fn(&AssertInfo);

static HANDLER: Mutex<Cell<Option<AssertHandler>>> = Mutex::new(Cell::new(None));

/// Installs (or with `None`, removes) the process-wide assertion handler.
pub fn set_assert_handler(handler: Option<AssertHandler>) {
    critical_section::with(|cs| HANDLER.borrow(cs).set(handler));
}

/// Reports a failed precondition and halts.
///
/// The handler runs first so the application can log, reset or park the
/// hardware; if it returns, execution still does not resume.
#[cold]
#[inline(never)]
pub fn assertion_failed(info: &AssertInfo) -> ! {
    log::error!("assertion failed: {info}");
    let handler = critical_section::with(|cs| HANDLER.borrow(cs).get());
    if let Some(handler) = handler {
        handler(info);
    }
    panic!("assertion failed: {}", info)
}

/// Checks a precondition, reporting a failure through [`assertion_failed`].
///
/// ```should_panic
/// let depth = 9;
/// rkh_core::require!(depth < 8, "hierarchy too deep");
/// ```
#[macro_export]
macro_rules! require {
    ($cond:expr, $msg:expr $(,)?) => {
        if !($cond) {
            $crate::assert::assertion_failed(&$crate::assert::AssertInfo {
                module: module_path!(),
                file: file!(),
                line: line!(),
                expr: $msg,
            })
        }
    };
    ($cond:expr $(,)?) => {
        $crate::require!($cond, stringify!($cond))
    };
}

/// Unconditional fatal error, used where a branch must be unreachable.
#[macro_export]
macro_rules! fatal {
    ($msg:expr) => {
        $crate::assert::assertion_failed(&$crate::assert::AssertInfo {
            module: module_path!(),
            file: file!(),
            line: line!(),
            expr: $msg,
        })
    };
}
