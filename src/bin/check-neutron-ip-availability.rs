//! Check IP usage of one Neutron network.
//!
//! Mirrors `openstack ip availability show`: reports total and used IPs of
//! the network and alerts when usage leaves the configured band.

use clap::{ArgAction, CommandFactory, Parser};
use serde_json::Value;

use osnag::session::{Session, SessionArgs};
use osnag::{
    icinga, Check, CheckError, CheckResult, Metric, MetricSummary, ProbeError, Range, Resource,
    Runner, ScalarContext,
};

/// Nagios/Icinga check for Neutron network IP availability.
#[derive(Debug, Parser)]
#[command(name = "check-neutron-ip-availability", version, about)]
struct Args {
    /// UUID of the network to check
    #[arg(short = 'n', long, value_name = "UUID")]
    network_uuid: String,

    /// Return warning if the number of used IPs is outside RANGE
    #[arg(short = 'w', long, value_name = "RANGE", default_value = "0:200")]
    warn: String,

    /// Return critical if the number of used IPs is outside RANGE
    #[arg(short = 'c', long, value_name = "RANGE", default_value = "0:230")]
    critical: String,

    /// Increase diagnostic output on stderr (up to three times)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    os: SessionArgs,
}

struct NetworkIpAvailability<'a> {
    session: &'a Session,
    network_uuid: String,
}

impl Resource for NetworkIpAvailability<'_> {
    fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
        let endpoint = self.session.endpoint("network")?;
        let body = self.session.get_json(&format!(
            "{}/v2.0/network-ip-availabilities/{}",
            endpoint, self.network_uuid
        ))?;
        let (total, used) = extract_usage(&body)?;

        Ok(vec![
            Metric::new("total", total).min(0.0),
            Metric::new("used", used).min(0.0).max(total),
        ])
    }
}

fn extract_usage(body: &Value) -> Result<(f64, f64), ProbeError> {
    let availability = body
        .get("network_ip_availability")
        .ok_or(ProbeError::MissingField("network_ip_availability"))?;
    let total = availability
        .get("total_ips")
        .and_then(Value::as_f64)
        .ok_or(ProbeError::MissingField("network_ip_availability.total_ips"))?;
    let used = availability
        .get("used_ips")
        .and_then(Value::as_f64)
        .ok_or(ProbeError::MissingField("network_ip_availability.used_ips"))?;
    Ok((total, used))
}

fn run(args: &Args) -> Result<CheckResult, CheckError> {
    let warning: Range = args.warn.parse()?;
    let critical: Range = args.critical.parse()?;

    let session = Session::connect(&args.os)?;
    let resource = NetworkIpAvailability {
        session: &session,
        network_uuid: args.network_uuid.clone(),
    };
    let result = Check::new()
        .context(ScalarContext::new("used", warning, critical))
        .summary(MetricSummary::of(&["total", "used"]))
        .run(&resource)?;
    Ok(result)
}

fn main() {
    if let Err(e) = icinga::print_command_config_if_env_and_exit(
        "check-neutron-ip-availability",
        &Args::command(),
    ) {
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
    fn test_extract_usage() {
        let body = json!({
            "network_ip_availability": {
                "network_id": "6801d9c8",
                "total_ips": 253,
                "used_ips": 251,
            }
        });
        assert_eq!(extract_usage(&body).unwrap(), (253.0, 251.0));
    }

    #[test]
    fn test_extract_usage_missing() {
        assert!(extract_usage(&json!({})).is_err());
        assert!(extract_usage(&json!({ "network_ip_availability": {} })).is_err());
    }
}
