//! Check serial consoles of associated Ironic nodes.
//!
//! Lists the associated nodes, then asks for each node's console state
//! through a bounded pool of worker threads; one console probe per node.
//! A node whose console probe fails is reported as unreachable instead of
//! aborting the whole batch, and the problem summary names the offending
//! nodes rather than just the metric.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use clap::{ArgAction, CommandFactory, Parser};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use osnag::{
    bracketed_pairs, icinga, run_json_command, Check, CheckError, CheckResult, Evaluation, Metric,
    ProbeError, Range, Resource, Runner, ScalarContext, Summary,
};

/// Nagios/Icinga check for disabled Ironic node consoles.
#[derive(Debug, Parser)]
#[command(name = "check-ironic-consoles", version, about)]
struct Args {
    /// Return warning if the number of associated nodes with disabled
    /// consoles is outside RANGE (default: warn if any console is disabled)
    #[arg(short = 'w', long, value_name = "RANGE", default_value = "@1:")]
    warn: String,

    /// Return critical if the number of associated nodes with disabled
    /// consoles is outside RANGE
    #[arg(short = 'c', long, value_name = "RANGE", default_value = "0:")]
    critical: String,

    /// The OpenStack client executable to run
    #[arg(long, value_name = "CMD", default_value = "openstack")]
    openstack_cmd: String,

    /// Number of concurrent console probes
    #[arg(long, value_name = "N", default_value_t = 4)]
    pool_size: usize,

    /// Increase diagnostic output on stderr (up to three times)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Deserialize)]
struct NodeRow {
    #[serde(rename = "UUID", alias = "uuid")]
    uuid: String,
    #[serde(rename = "Name", alias = "name", default)]
    name: Option<String>,
}

impl NodeRow {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uuid)
    }
}

/// The already-gathered console states; [`Resource::probe`] only folds them
/// into metrics.
struct ConsoleSurvey {
    total: usize,
    disabled: Vec<String>,
    unreachable: Vec<String>,
}

impl ConsoleSurvey {
    fn gather(openstack_cmd: &str, pool_size: usize) -> Result<ConsoleSurvey, ProbeError> {
        let raw = run_json_command(
            openstack_cmd,
            &[
                "baremetal",
                "node",
                "list",
                "--associated",
                "--fields",
                "uuid",
                "name",
                "-f",
                "json",
            ],
        )?;
        let nodes: Vec<NodeRow> = serde_json::from_value(raw)?;

        let states = probe_consoles(openstack_cmd, &nodes, pool_size);

        let mut disabled = Vec::new();
        let mut unreachable = Vec::new();
        for (node, state) in nodes.iter().zip(states) {
            match state {
                Ok(true) => {}
                Ok(false) => disabled.push(node.label().to_owned()),
                Err(err) => {
                    warn!(node = node.label(), %err, "console probe failed");
                    unreachable.push(node.label().to_owned());
                }
            }
        }

        Ok(ConsoleSurvey {
            total: nodes.len(),
            disabled,
            unreachable,
        })
    }
}

impl Resource for ConsoleSurvey {
    fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
        Ok(vec![
            Metric::new("disabled", self.disabled.len() as f64).min(0.0),
            Metric::new("total", self.total as f64).min(0.0),
            Metric::new("unreachable", self.unreachable.len() as f64).min(0.0),
        ])
    }
}

/// Ask every node for its console state, at most `pool_size` probes at a
/// time. Results come back in input order; a failed probe occupies its slot
/// as an error instead of silently disappearing.
fn probe_consoles(
    openstack_cmd: &str,
    nodes: &[NodeRow],
    pool_size: usize,
) -> Vec<Result<bool, ProbeError>> {
    if nodes.is_empty() {
        return Vec::new();
    }
    let workers = pool_size.clamp(1, nodes.len());
    let cursor = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let cursor = &cursor;
            scope.spawn(move || loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                if index >= nodes.len() {
                    break;
                }
                let result = console_enabled(openstack_cmd, &nodes[index].uuid);
                debug!(node = nodes[index].label(), ok = result.is_ok(), "probed console");
                if tx.send((index, result)).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Result<bool, ProbeError>>> =
        (0..nodes.len()).map(|_| None).collect();
    for (index, result) in rx {
        slots[index] = Some(result);
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or(Err(ProbeError::WorkerLost)))
        .collect()
}

fn console_enabled(openstack_cmd: &str, uuid: &str) -> Result<bool, ProbeError> {
    let body = run_json_command(
        openstack_cmd,
        &["baremetal", "node", "console", "show", uuid, "-f", "json"],
    )?;
    body.get("console_enabled")
        .and_then(Value::as_bool)
        .ok_or(ProbeError::MissingField("console_enabled"))
}

/// Names the misbehaving nodes instead of only counting them.
struct ConsoleSummary {
    disabled: Vec<String>,
    unreachable: Vec<String>,
}

impl ConsoleSummary {
    fn unreachable_note(&self) -> String {
        if self.unreachable.is_empty() {
            String::new()
        } else {
            format!(" (unreachable: {})", self.unreachable.join(", "))
        }
    }
}

impl Summary for ConsoleSummary {
    fn ok(&self, evaluations: &[Evaluation]) -> String {
        format!("{}{}", bracketed_pairs(evaluations), self.unreachable_note())
    }

    fn problem(&self, evaluations: &[Evaluation]) -> String {
        let mut line = bracketed_pairs(evaluations);
        if !self.disabled.is_empty() {
            line.push_str(&format!(
                " consoles disabled on: {}",
                self.disabled.join(", ")
            ));
        }
        line.push_str(&self.unreachable_note());
        line
    }
}

fn run(args: &Args) -> Result<CheckResult, CheckError> {
    let warning: Range = args.warn.parse()?;
    let critical: Range = args.critical.parse()?;
    let total_warning: Range = "0:".parse()?;
    let total_critical: Range = "@0".parse()?;

    let survey = ConsoleSurvey::gather(&args.openstack_cmd, args.pool_size)?;
    let summary = ConsoleSummary {
        disabled: survey.disabled.clone(),
        unreachable: survey.unreachable.clone(),
    };

    let result = Check::new()
        .context(ScalarContext::new("disabled", warning, critical))
        .context(ScalarContext::new("total", total_warning, total_critical))
        .summary(summary)
        .run(&survey)?;
    Ok(result)
}

fn main() {
    if let Err(e) =
        icinga::print_command_config_if_env_and_exit("check-ironic-consoles", &Args::command())
    {
        eprintln!("cannot generate command config: {}", e);
        std::process::exit(3);
    }

    let args = Args::parse();
    osnag::init_diagnostics(args.verbose);

    Runner::new().safe_run(|| run(&args)).print_and_exit()
}
