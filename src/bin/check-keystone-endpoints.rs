//! Check the number of endpoints registered in Keystone.
//!
//! A sudden change in the endpoint count usually means a service was
//! re-registered or dropped out of the catalog.

use clap::{ArgAction, CommandFactory, Parser};
use serde_json::Value;

use osnag::session::{Session, SessionArgs};
use osnag::{
    icinga, Check, CheckError, CheckResult, Metric, ProbeError, Range, Resource, Runner,
    ScalarContext,
};

/// Nagios/Icinga check for the Keystone endpoint catalog.
#[derive(Debug, Parser)]
#[command(name = "check-keystone-endpoints", version, about)]
struct Args {
    /// Return warning if the number of endpoints is outside RANGE
    #[arg(short = 'w', long, value_name = "RANGE", default_value = "0:")]
    warn: String,

    /// Return critical if the number of endpoints is outside RANGE
    #[arg(short = 'c', long, value_name = "RANGE", default_value = "0:")]
    critical: String,

    /// Increase diagnostic output on stderr (up to three times)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    os: SessionArgs,
}

struct KeystoneEndpoints<'a> {
    session: &'a Session,
}

impl Resource for KeystoneEndpoints<'_> {
    fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
        let body = self
            .session
            .get_json(&format!("{}/endpoints", self.session.auth_url()))?;
        let count = endpoint_count(&body)?;
        Ok(vec![Metric::new("endpoints", count as f64).min(0.0)])
    }
}

fn endpoint_count(body: &Value) -> Result<usize, ProbeError> {
    body.get("endpoints")
        .and_then(Value::as_array)
        .map(Vec::len)
        .ok_or(ProbeError::MissingField("endpoints"))
}

fn run(args: &Args) -> Result<CheckResult, CheckError> {
    let warning: Range = args.warn.parse()?;
    let critical: Range = args.critical.parse()?;

    let session = Session::connect(&args.os)?;
    let result = Check::new()
        .context(ScalarContext::new("endpoints", warning, critical))
        .run(&KeystoneEndpoints { session: &session })?;
    Ok(result)
}

fn main() {
    if let Err(e) =
        icinga::print_command_config_if_env_and_exit("check-keystone-endpoints", &Args::command())
    {
        eprintln!("cannot generate command config: {}", e);
        std::process::exit(3);
    }

    let args = Args::parse();
    osnag::init_diagnostics(args.verbose);

    Runner::new().safe_run(|| run(&args)).print_and_exit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_count() {
        let body = json!({ "endpoints": [{"id": "a"}, {"id": "b"}] });
        assert_eq!(endpoint_count(&body).unwrap(), 2);

        let empty = json!({ "endpoints": [] });
        assert_eq!(endpoint_count(&empty).unwrap(), 0);
    }

    #[test]
    fn test_endpoint_count_missing_field() {
        let err = endpoint_count(&json!({})).unwrap_err();
        assert!(err.to_string().contains("endpoints"));
    }
}
