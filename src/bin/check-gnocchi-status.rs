//! Check the Gnocchi measure backlog.
//!
//! Polls `/v1/status` and alerts on the number of measures still waiting to
//! be processed by the metricd workers.

use clap::{ArgAction, CommandFactory, Parser};
use serde_json::Value;

use osnag::session::{Session, SessionArgs};
use osnag::{
    icinga, Check, CheckError, CheckResult, Metric, ProbeError, Range, Resource, Runner,
    ScalarContext,
};

/// Nagios/Icinga check for the Gnocchi measure-processing backlog.
#[derive(Debug, Parser)]
#[command(name = "check-gnocchi-status", version, about)]
struct Args {
    /// Return warning if the number of pending measures is outside RANGE
    #[arg(short = 'w', long, value_name = "RANGE", default_value = "1:")]
    warn: String,

    /// Return critical if the number of pending measures is outside RANGE
    #[arg(short = 'c', long, value_name = "RANGE", default_value = "0:")]
    critical: String,

    /// Increase diagnostic output on stderr (up to three times)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    os: SessionArgs,
}

struct GnocchiStatus<'a> {
    session: &'a Session,
}

impl Resource for GnocchiStatus<'_> {
    fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
        let endpoint = self.session.endpoint("metric")?;
        let status = self
            .session
            .get_json(&format!("{}/v1/status?details=false", endpoint))?;

        let measures = status
            .pointer("/storage/summary/measures")
            .and_then(Value::as_f64)
            .ok_or(ProbeError::MissingField("storage.summary.measures"))?;

        Ok(vec![Metric::new("measures_to_process", measures).min(0.0)])
    }
}

fn run(args: &Args) -> Result<CheckResult, CheckError> {
    let warning: Range = args.warn.parse()?;
    let critical: Range = args.critical.parse()?;

    let session = Session::connect(&args.os)?;
    let result = Check::new()
        .context(ScalarContext::new("measures_to_process", warning, critical))
        .run(&GnocchiStatus { session: &session })?;
    Ok(result)
}

fn main() {
    if let Err(e) = icinga::print_command_config_if_env_and_exit("check-gnocchi-status", &Args::command()) {
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

    #[test]
    fn test_args_defaults_parse_as_ranges() {
        let args = Args::try_parse_from([
            "check-gnocchi-status",
            "--os-auth-url",
            "http://k:5000/v3",
            "--os-username",
            "u",
            "--os-password",
            "p",
            "--os-project-name",
            "ops",
        ])
        .unwrap();
        assert!(args.warn.parse::<Range>().is_ok());
        assert!(args.critical.parse::<Range>().is_ok());
    }

    #[test]
    fn test_command_config_generation() {
        let cmd = icinga::IcingaCommand::from_clap("check-gnocchi-status", &Args::command());
        assert!(cmd.is_ok());
    }
}
