//! Error-safe driver around a check's main body.

use std::fmt::Display;

use crate::{CheckResult, ServiceState};

/// Runs a check body and converts any error into a status line plus exit
/// code instead of a panic or a bare stderr message.
///
/// The default error state is Unknown, per the plugin guidelines for "could
/// not gather data"; [`Runner::on_error`] lets a check reclassify specific
/// errors.
pub struct Runner<E> {
    on_error: Option<Box<dyn FnOnce(&E) -> ServiceState>>,
}

impl<E: Display> Runner<E> {
    pub fn new() -> Self {
        Self { on_error: None }
    }

    pub fn on_error(mut self, f: impl FnOnce(&E) -> ServiceState + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn safe_run(self, f: impl FnOnce() -> Result<CheckResult, E>) -> RunnerResult<E> {
        match f() {
            Ok(result) => RunnerResult::Ok(result),
            Err(err) => {
                let state = self
                    .on_error
                    .map(|f| f(&err))
                    .unwrap_or(ServiceState::Unknown);
                RunnerResult::Err(state, err)
            }
        }
    }
}

impl<E: Display> Default for Runner<E> {
    fn default() -> Self {
        Runner::new()
    }
}

pub enum RunnerResult<E> {
    Ok(CheckResult),
    Err(ServiceState, E),
}

impl<E: Display> RunnerResult<E> {
    pub fn print_and_exit(self) -> ! {
        match self {
            RunnerResult::Ok(result) => result.print_and_exit(),
            RunnerResult::Err(state, err) => {
                println!("{} - {}", state, err);
                std::process::exit(state.exit_code());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Check, Metric, ProbeError, Resource};

    #[derive(Debug, thiserror::Error)]
    #[error("woops")]
    struct EmptyError;

    struct Empty;

    impl Resource for Empty {
        fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_runner_ok() {
        let result = Runner::<EmptyError>::new()
            .on_error(|_| {
                panic!("on_error must not run on success");
            })
            .safe_run(|| Ok(Check::new().run(&Empty).unwrap()));

        assert!(matches!(result, RunnerResult::Ok(_)));
    }

    #[test]
    fn test_runner_error_defaults_to_unknown() {
        let result = Runner::new().safe_run(|| Err(EmptyError));
        assert!(matches!(result, RunnerResult::Err(ServiceState::Unknown, _)));
    }

    #[test]
    fn test_runner_error_state_override() {
        let result = Runner::new()
            .on_error(|_: &EmptyError| ServiceState::Critical)
            .safe_run(|| Err(EmptyError));
        assert!(matches!(
            result,
            RunnerResult::Err(ServiceState::Critical, _)
        ));
    }

    #[test]
    fn test_runner_with_anyhow_error() {
        // Check bodies that bubble up anyhow::Error work unchanged, and the
        // hook can reclassify based on the message.
        let result = Runner::new()
            .on_error(|err: &anyhow::Error| {
                if err.to_string().contains("connection refused") {
                    ServiceState::Critical
                } else {
                    ServiceState::Unknown
                }
            })
            .safe_run(|| Err(anyhow::anyhow!("connection refused")));

        match result {
            RunnerResult::Err(state, err) => {
                assert_eq!(state, ServiceState::Critical);
                assert_eq!(err.to_string(), "connection refused");
            }
            RunnerResult::Ok(_) => panic!("expected an error result"),
        }
    }
}
