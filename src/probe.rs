//! The probe seam every check implements, and the ways a probe can fail.

use std::process::Command;

use tracing::debug;

use crate::Metric;

/// A single external observation, yielding the metrics to evaluate.
///
/// One implementation per check; there is deliberately no deeper hierarchy
/// than this one trait.
pub trait Resource {
    fn probe(&self) -> Result<Vec<Metric>, ProbeError>;
}

/// A failed attempt to gather data. Probe failures are always fatal and
/// never retried; the message ends up verbatim in the UNKNOWN status line.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("no usable endpoint: {0}")]
    Endpoint(String),
    #[error("cannot run {command:?}: {source}")]
    Command {
        command: String,
        source: std::io::Error,
    },
    #[error("{command:?} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed response: missing {0}")]
    MissingField(&'static str),
    #[error("cannot read CA bundle {path}: {source}")]
    CaBundle {
        path: String,
        source: std::io::Error,
    },
    #[error("console worker exited before reporting a result")]
    WorkerLost,
}

/// Run an external command and parse its stdout as JSON.
///
/// Arguments are passed as a vector, nothing goes through a shell. Used by
/// the ironic checks, which shell out to the `openstack` CLI the way the
/// service operators do.
pub fn run_json_command(program: &str, args: &[&str]) -> Result<serde_json::Value, ProbeError> {
    let rendered = format!("{} {}", program, args.join(" "));
    debug!(command = %rendered, "running external command");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ProbeError::Command {
            command: rendered.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::CommandFailed {
            command: rendered,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}
