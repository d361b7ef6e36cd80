pub mod fit;
pub mod inspect;

use distfit_core::Error;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_OPEN: i32 = 3;
pub const EXIT_IO: i32 = 4;
// 5 is STALL_EXIT_CODE, raised by the watchdog itself under the abort policy.
pub const EXIT_INSUFFICIENT_DATA: i32 = 6;

/// Process exit code for a failed run.
pub fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Config(_) => EXIT_CONFIG,
        Error::Open { .. } => EXIT_OPEN,
        Error::Io(_) | Error::IncompleteCoverage { .. } => EXIT_IO,
        Error::InsufficientData { .. } => EXIT_INSUFFICIENT_DATA,
        _ => EXIT_FAILURE,
    }
}

/// Print an error the way every command does and return its exit code.
pub fn report_error(context: &str, err: &Error) -> i32 {
    log::debug!("{context} failed ({})", err.kind());
    eprintln!("{context}: {err}");
    exit_code(err)
}
