//! Couples a probe's metrics with threshold contexts and a summary.

use std::process;

use crate::{evaluate, Metric, ProbeError, Range, Resource, ServiceState};

/// Alerting thresholds for one named metric.
///
/// Metrics the check yields without a matching context are informational
/// only and always evaluate to Ok.
#[derive(Clone, Debug)]
pub struct ScalarContext {
    name: String,
    warning: Range,
    critical: Range,
}

impl ScalarContext {
    pub fn new(name: &str, warning: Range, critical: Range) -> ScalarContext {
        ScalarContext {
            name: name.to_owned(),
            warning,
            critical,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, value: f64) -> ServiceState {
        evaluate(value, &self.warning, &self.critical)
    }
}

/// One metric together with the state it evaluated to.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub metric: Metric,
    pub state: ServiceState,
    warning: Option<Range>,
    critical: Option<Range>,
}

impl Evaluation {
    fn perf_string(&self) -> String {
        self.metric
            .perf_string(self.warning.as_ref(), self.critical.as_ref())
    }
}

/// Builds the human-readable half of the status line.
///
/// The default implementation shows every metric when all is well, and only
/// the offending ones on a problem. Checks that can name the concrete
/// misbehaving resource (check-ironic-consoles names nodes) provide their
/// own implementation.
pub trait Summary {
    fn ok(&self, evaluations: &[Evaluation]) -> String {
        bracketed_pairs(evaluations)
    }

    fn problem(&self, evaluations: &[Evaluation]) -> String {
        bracketed(evaluations.iter().filter(|e| e.state > ServiceState::Ok))
    }
}

/// The `[name:value ...]` form shared by the stock summaries; custom
/// implementations usually start from this and append detail.
pub fn bracketed_pairs(evaluations: &[Evaluation]) -> String {
    bracketed(evaluations.iter())
}

fn bracketed<'a>(evaluations: impl Iterator<Item = &'a Evaluation>) -> String {
    let pairs: Vec<String> = evaluations.map(|e| e.metric.pair()).collect();
    format!("[{}]", pairs.join(" "))
}

/// The stock summary. An optional `show` list restricts and orders which
/// metrics appear on success.
#[derive(Debug, Default)]
pub struct MetricSummary {
    show: Option<Vec<String>>,
}

impl MetricSummary {
    pub fn of(names: &[&str]) -> MetricSummary {
        MetricSummary {
            show: Some(names.iter().map(|n| (*n).to_owned()).collect()),
        }
    }
}

impl Summary for MetricSummary {
    fn ok(&self, evaluations: &[Evaluation]) -> String {
        match &self.show {
            None => bracketed(evaluations.iter()),
            Some(names) => bracketed(
                names
                    .iter()
                    .filter_map(|n| evaluations.iter().find(|e| e.metric.name() == n)),
            ),
        }
    }
}

/// One full probe-evaluate-report cycle.
///
/// All ranges are parsed before [`Check::run`] touches the network, so a
/// configuration mistake is reported before any possibly expensive probe.
pub struct Check {
    contexts: Vec<ScalarContext>,
    summary: Box<dyn Summary>,
}

impl Check {
    pub fn new() -> Check {
        Check {
            contexts: Vec::new(),
            summary: Box::new(MetricSummary::default()),
        }
    }

    pub fn context(mut self, context: ScalarContext) -> Check {
        self.contexts.push(context);
        self
    }

    pub fn summary(mut self, summary: impl Summary + 'static) -> Check {
        self.summary = Box::new(summary);
        self
    }

    /// Probe the resource and fold its metrics into a single result.
    ///
    /// The aggregate state is the maximum severity over all evaluations;
    /// ties are broken by severity alone, never by metric order.
    pub fn run(&self, resource: &dyn Resource) -> Result<CheckResult, ProbeError> {
        let metrics = resource.probe()?;

        let evaluations: Vec<Evaluation> = metrics
            .into_iter()
            .map(|metric| {
                let context = self.contexts.iter().find(|c| c.name() == metric.name());
                Evaluation {
                    state: context
                        .map(|c| c.evaluate(metric.value()))
                        .unwrap_or(ServiceState::Ok),
                    warning: context.map(|c| c.warning.clone()),
                    critical: context.map(|c| c.critical.clone()),
                    metric,
                }
            })
            .collect();

        let state = evaluations
            .iter()
            .map(|e| e.state)
            .max()
            .unwrap_or(ServiceState::Ok);

        let summary = if state == ServiceState::Ok {
            self.summary.ok(&evaluations)
        } else {
            self.summary.problem(&evaluations)
        };

        let mut line = format!("{} - {}", state, summary);
        if !evaluations.is_empty() {
            let perf: Vec<String> = evaluations.iter().map(Evaluation::perf_string).collect();
            line.push_str(" | ");
            line.push_str(&perf.join(" "));
        }

        Ok(CheckResult {
            state,
            evaluations,
            line,
        })
    }
}

impl Default for Check {
    fn default() -> Self {
        Check::new()
    }
}

/// The outcome of a check run: aggregate state plus the rendered status line.
#[derive(Debug)]
pub struct CheckResult {
    state: ServiceState,
    evaluations: Vec<Evaluation>,
    line: String,
}

impl CheckResult {
    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    /// The single `<VERDICT> - <summary> | <perfdata>` output line.
    pub fn status_line(&self) -> &str {
        &self.line
    }

    pub fn print_and_exit(&self) -> ! {
        println!("{}", self.line);
        process::exit(self.state.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Metric>);

    impl Resource for Fixed {
        fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
            Ok(self.0.clone())
        }
    }

    fn ctx(name: &str, warn: &str, crit: &str) -> ScalarContext {
        ScalarContext::new(name, warn.parse().unwrap(), crit.parse().unwrap())
    }

    #[test]
    fn test_ok_summary_shows_all_pairs() {
        let resource = Fixed(vec![Metric::new("used", 42.0), Metric::new("total", 100.0)]);
        let result = Check::new()
            .context(ctx("used", "0:200", "0:230"))
            .run(&resource)
            .unwrap();

        assert_eq!(result.state(), ServiceState::Ok);
        assert_eq!(
            result.status_line(),
            "OK - [used:42 total:100] | used=42;0:200;0:230 total=100"
        );
    }

    #[test]
    fn test_problem_summary_lists_offenders_only() {
        let resource = Fixed(vec![
            Metric::new("a", 1.0),
            Metric::new("b", 250.0),
            Metric::new("c", 300.0),
        ]);
        let result = Check::new()
            .context(ctx("a", "0:10", "0:20"))
            .context(ctx("b", "0:200", "0:300"))
            .context(ctx("c", "0:200", "0:230"))
            .run(&resource)
            .unwrap();

        // a:OK b:WARNING c:CRITICAL aggregates to CRITICAL, and only the
        // offenders show up in the summary.
        assert_eq!(result.state(), ServiceState::Critical);
        assert!(result.status_line().starts_with("CRITICAL - [b:250 c:300]"));
    }

    #[test]
    fn test_metric_without_context_is_informational() {
        let resource = Fixed(vec![Metric::new("total", 5.0)]);
        let result = Check::new().run(&resource).unwrap();
        assert_eq!(result.state(), ServiceState::Ok);
    }

    #[test]
    fn test_empty_probe_is_ok_without_perfdata() {
        let result = Check::new().run(&Fixed(vec![])).unwrap();
        assert_eq!(result.state(), ServiceState::Ok);
        assert_eq!(result.status_line(), "OK - []");
    }

    #[test]
    fn test_show_list_orders_ok_summary() {
        let resource = Fixed(vec![Metric::new("total", 10.0), Metric::new("used", 3.0)]);
        let result = Check::new()
            .summary(MetricSummary::of(&["used", "total"]))
            .run(&resource)
            .unwrap();
        assert!(result.status_line().starts_with("OK - [used:3 total:10]"));
    }

    #[test]
    fn test_run_is_idempotent() {
        let resource = Fixed(vec![Metric::new("b", 250.0)]);
        let check = Check::new().context(ctx("b", "0:200", "0:230"));
        let first = check.run(&resource).unwrap();
        let second = check.run(&resource).unwrap();
        assert_eq!(first.state(), second.state());
        assert_eq!(first.status_line(), second.status_line());
    }

    #[test]
    fn test_probe_error_propagates() {
        struct Failing;
        impl Resource for Failing {
            fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
                Err(ProbeError::MissingField("storage.summary.measures"))
            }
        }

        let err = Check::new().run(&Failing).unwrap_err();
        assert!(err.to_string().contains("storage.summary.measures"));
    }
}
