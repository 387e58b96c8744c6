//! Fatal exit handling.
//!
//! Exiting goes through [`Terminate`] so the failure path can be exercised
//! without ending the test process.

/// Exit status for any configuration or mirror failure.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Ends the program with an exit status.
pub trait Terminate {
    fn exit(&self, code: i32);
}

/// Exits the current process.
pub struct ProcessExit;

impl Terminate for ProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}

/// Log `err` with its full cause chain and terminate with a failure status.
pub fn fatal(err: &anyhow::Error, terminate: &dyn Terminate) {
    tracing::error!("{err:#}");
    terminate.exit(FAILURE_EXIT_CODE);
}
