//! Nagios/Icinga checks for OpenStack services.
//!
//! The crate is split into a small plugin core and one binary per check.
//! The core provides the pieces every check shares: the Nagios threshold
//! [`Range`] grammar, the compact [`parse_duration`] format ("1h30m"),
//! [`Metric`] and its perfdata rendering, [`ScalarContext`] for mapping a
//! measured value onto a [`ServiceState`], and the [`Check`]/[`Runner`] pair
//! that turns a [`Resource`] probe into a status line and an exit code.
//!
//! A minimal check looks like this:
//!
//! ```no_run
//! use osnag::{Check, Metric, ProbeError, Range, Resource, Runner, ScalarContext};
//!
//! struct Pending;
//!
//! impl Resource for Pending {
//!     fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
//!         Ok(vec![Metric::new("pending", 3.0).min(0.0)])
//!     }
//! }
//!
//! fn main() {
//!     Runner::new()
//!         .safe_run(|| {
//!             let warning: Range = "0:5".parse()?;
//!             let critical: Range = "0:10".parse()?;
//!             Ok::<_, osnag::CheckError>(
//!                 Check::new()
//!                     .context(ScalarContext::new("pending", warning, critical))
//!                     .run(&Pending)?,
//!             )
//!         })
//!         .print_and_exit()
//! }
//! ```

use std::fmt;

mod check;
mod duration;
mod metric;
mod probe;
mod range;
mod runner;

pub mod icinga;
pub mod session;

pub use crate::check::{
    bracketed_pairs, Check, CheckResult, Evaluation, MetricSummary, ScalarContext, Summary,
};
pub use crate::duration::{parse_duration, DurationParseError};
pub use crate::metric::{Metric, Unit};
pub use crate::probe::{run_json_command, ProbeError, Resource};
pub use crate::range::{evaluate, Range, RangeParseError};
pub use crate::runner::{Runner, RunnerResult};

/// A service state as understood by Nagios and Icinga.
///
/// States are ordered by severity so that the worst result of a probe can be
/// picked with [`Iterator::max`]: `Ok < Warning < Critical < Unknown`.
/// Unknown sorts last because a check that could not gather its data must
/// never look healthier than one that did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// The process exit code nagios expects for this state.
    pub fn exit_code(self) -> i32 {
        match self {
            ServiceState::Ok => 0,
            ServiceState::Warning => 1,
            ServiceState::Critical => 2,
            ServiceState::Unknown => 3,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceState::Ok => "OK",
            ServiceState::Warning => "WARNING",
            ServiceState::Critical => "CRITICAL",
            ServiceState::Unknown => "UNKNOWN",
        })
    }
}

/// Everything that can go wrong before or during a probe.
///
/// Configuration errors (`Range`, `Duration`) and probe failures all map to
/// an UNKNOWN exit; the distinction only matters for the message.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Range(#[from] RangeParseError),
    #[error(transparent)]
    Duration(#[from] DurationParseError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Set up `tracing` on stderr, keeping stdout free for the status line.
///
/// The verbosity count comes from the repeated `-v` flag; an explicit
/// `RUST_LOG` overrides it.
pub fn init_diagnostics(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
