//! Check that a Gnocchi metric keeps receiving measures.
//!
//! Searches active resources (those without an `ended_at`), then counts the
//! measures reported for the named metric inside the `--since` window. A
//! count of zero usually means the ceilometer pipeline stalled.

use chrono::Utc;
use clap::{ArgAction, CommandFactory, Parser};
use serde_json::{json, Value};
use tracing::debug;

use osnag::session::{Session, SessionArgs};
use osnag::{
    icinga, parse_duration, Check, CheckError, CheckResult, DurationParseError, Metric,
    ProbeError, Range, Resource, Runner, ScalarContext,
};

/// Nagios/Icinga check for recent Gnocchi metric measurements.
#[derive(Debug, Parser)]
#[command(name = "check-gnocchi-metrics", version, about)]
struct Args {
    /// Metric name to look for
    #[arg(short = 'm', long, value_name = "METRIC_NAME")]
    metric: String,

    /// Time window of measures to examine, e.g. "5m" or "1h30m"
    #[arg(short = 's', long, value_name = "DURATION", default_value = "5m")]
    since: String,

    /// Maximum number of resources to poll metrics for
    #[arg(long, value_name = "LIMIT", default_value_t = 100)]
    resource_limit: u32,

    /// Return warning if the number of measures is outside RANGE
    #[arg(short = 'w', long, value_name = "RANGE", default_value = "1:")]
    warn: String,

    /// Return critical if the number of measures is outside RANGE
    #[arg(short = 'c', long, value_name = "RANGE", default_value = "0:")]
    critical: String,

    /// Increase diagnostic output on stderr (up to three times)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    os: SessionArgs,
}

struct GnocchiMetrics<'a> {
    session: &'a Session,
    metric: String,
    since: chrono::Duration,
    resource_limit: u32,
}

impl Resource for GnocchiMetrics<'_> {
    fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
        let endpoint = self.session.endpoint("metric")?;

        // Gnocchi cannot filter a resource search by metric name, so ask for
        // the most recently started active resources and filter client-side.
        let search_url = format!(
            "{}/v1/search/resource/generic?limit={}&sorts=started_at:desc",
            endpoint, self.resource_limit
        );
        let resources = self
            .session
            .post_json(&search_url, &json!({ "=": { "ended_at": null } }))?;
        let resources = resources
            .as_array()
            .ok_or(ProbeError::MissingField("resource search result array"))?;

        let start = (Utc::now() - self.since)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();

        let mut measures = 0usize;
        for id in resource_ids_with_metric(resources, &self.metric) {
            let url = format!(
                "{}/v1/resource/generic/{}/metric/{}/measures?start={}",
                endpoint, id, self.metric, start
            );
            let points = self.session.get_json(&url)?;
            let count = points.as_array().map_or(0, Vec::len);
            debug!(resource = %id, count, "fetched measures");
            measures += count;
        }

        Ok(vec![Metric::new("measures", measures as f64).min(0.0)])
    }
}

/// The ids of the resources that carry the named metric.
fn resource_ids_with_metric<'a>(resources: &'a [Value], metric: &str) -> Vec<&'a str> {
    resources
        .iter()
        .filter(|r| r.pointer(&format!("/metrics/{}", metric)).is_some())
        .filter_map(|r| r.get("id").and_then(Value::as_str))
        .collect()
}

/// Parse the window and carry it over into chrono's millisecond-backed
/// duration. A grammatically valid but astronomically large window cannot be
/// subtracted from a timestamp, so it is a configuration error like any
/// other malformed duration.
fn since_window(text: &str) -> Result<chrono::Duration, DurationParseError> {
    let since = parse_duration(text)?;
    i64::try_from(since.as_secs())
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| DurationParseError(text.to_owned()))
}

fn run(args: &Args) -> Result<CheckResult, CheckError> {
    let warning: Range = args.warn.parse()?;
    let critical: Range = args.critical.parse()?;
    let since = since_window(&args.since)?;

    let session = Session::connect(&args.os)?;
    let resource = GnocchiMetrics {
        session: &session,
        metric: args.metric.clone(),
        since,
        resource_limit: args.resource_limit,
    };
    let result = Check::new()
        .context(ScalarContext::new("measures", warning, critical))
        .run(&resource)?;
    Ok(result)
}

fn main() {
    if let Err(e) =
        icinga::print_command_config_if_env_and_exit("check-gnocchi-metrics", &Args::command())
    {
        eprintln!("cannot generate command config: {}", e);
        std::process::exit(3);
    }

    let args = Args::parse();
    osnag::init_diagnostics(args.verbose);

    Runner::new().safe_run(|| run(&args)).print_and_exit()
}
