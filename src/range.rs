//! Nagios/Icinga threshold ranges.
//!
//! The textual grammar is the one every plugin consumer already knows, see
//! <https://nagios-plugins.org/doc/guidelines.html#THRESHOLDFORMAT>:
//!
//! * `start:end` — alert if the value is below start or above end
//! * `start:` — no upper bound
//! * `:end` or plain `end` — lower bound defaults to 0
//! * `~` as the start means negative infinity
//! * a leading `@` inverts the range: alert if the value is *inside* it

use std::fmt;
use std::str::FromStr;

use crate::ServiceState;

/// A parsed threshold range. Immutable; keeps the original spec string so
/// perfdata can echo it back bit for bit.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    start: f64,
    end: f64,
    inside: bool,
    spec: String,
}

/// The range spec did not follow the Nagios threshold grammar.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RangeParseError {
    #[error("invalid bound {bound:?} in range {spec:?}")]
    InvalidBound { spec: String, bound: String },
    #[error("start is greater than end in range {spec:?}")]
    StartAboveEnd { spec: String },
}

impl Range {
    /// True if `value` violates the range, i.e. the check should alert.
    ///
    /// Bounds are inclusive on the OK side: `0:200` accepts exactly 0 and
    /// exactly 200. With the `@` prefix the same bounds alert instead.
    pub fn check(&self, value: f64) -> bool {
        let outside = value < self.start || value > self.end;
        if self.inside {
            !outside
        } else {
            outside
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }
}

impl FromStr for Range {
    type Err = RangeParseError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (inside, body) = match spec.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (start, end) = match body.split_once(':') {
            Some((start, end)) => {
                let start = match start {
                    "" => 0.0,
                    "~" => f64::NEG_INFINITY,
                    other => parse_bound(spec, other)?,
                };
                let end = match end {
                    "" => f64::INFINITY,
                    other => parse_bound(spec, other)?,
                };
                (start, end)
            }
            // A bare number is an upper bound with an implicit start of 0.
            None if body.is_empty() => (0.0, f64::INFINITY),
            None => (0.0, parse_bound(spec, body)?),
        };

        if start > end {
            return Err(RangeParseError::StartAboveEnd {
                spec: spec.to_owned(),
            });
        }

        Ok(Range {
            start,
            end,
            inside,
            spec: spec.to_owned(),
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Classify `value` against a warning and a critical range.
///
/// Critical wins outright: when both ranges trigger the verdict is Critical,
/// never an aggregate of the two. Evaluation is pure, the same inputs always
/// produce the same state.
pub fn evaluate(value: f64, warning: &Range, critical: &Range) -> ServiceState {
    if critical.check(value) {
        ServiceState::Critical
    } else if warning.check(value) {
        ServiceState::Warning
    } else {
        ServiceState::Ok
    }
}

fn parse_bound(spec: &str, bound: &str) -> Result<f64, RangeParseError> {
    // f64::from_str would happily take "inf" or "nan"; the threshold grammar
    // only knows plain decimal numbers.
    let numeric = !bound.is_empty()
        && bound
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
    if !numeric {
        return Err(invalid(spec, bound));
    }
    bound.parse().map_err(|_| invalid(spec, bound))
}

fn invalid(spec: &str, bound: &str) -> RangeParseError {
    RangeParseError::InvalidBound {
        spec: spec.to_owned(),
        bound: bound.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(spec: &str) -> Range {
        spec.parse().unwrap()
    }

    #[test]
    fn test_lower_bound_only() {
        let r = range("1:");
        assert!(r.check(0.0));
        assert!(!r.check(1.0));
        assert!(!r.check(1000.0));
    }

    #[test]
    fn test_both_bounds() {
        let r = range("0:200");
        assert!(r.check(-1.0));
        assert!(!r.check(0.0));
        assert!(!r.check(200.0));
        assert!(r.check(200.1));
    }

    #[test]
    fn test_bare_number_is_upper_bound() {
        let r = range("10");
        assert!(r.check(-0.5));
        assert!(!r.check(0.0));
        assert!(!r.check(10.0));
        assert!(r.check(10.5));

        let explicit = range(":10");
        assert_eq!(explicit.start(), r.start());
        assert_eq!(explicit.end(), r.end());
    }

    #[test]
    fn test_inverted() {
        // "@0" is a single-point range: alert exactly at zero.
        let r = range("@0");
        assert!(r.check(0.0));
        assert!(!r.check(0.1));
        assert!(!r.check(-0.1));

        let r = range("@10:20");
        assert!(!r.check(9.0));
        assert!(r.check(10.0));
        assert!(r.check(15.0));
        assert!(r.check(20.0));
        assert!(!r.check(21.0));
    }

    #[test]
    fn test_negative_infinity_start() {
        let r = range("~:5");
        assert!(!r.check(-1e12));
        assert!(!r.check(5.0));
        assert!(r.check(5.5));
    }

    #[test]
    fn test_negative_bounds() {
        let r = range("-20:-10");
        assert!(r.check(-21.0));
        assert!(!r.check(-15.0));
        assert!(r.check(-9.0));
    }

    #[test]
    fn test_empty_spec_never_alerts() {
        let r = range("");
        assert!(!r.check(0.0));
        assert!(!r.check(1e9));
        assert!(r.check(-0.1));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["abc", "1:x", "x:1", "1:2:3", "@@1", "1e3", "nan", ":inf"] {
            assert!(bad.parse::<Range>().is_err(), "spec {:?}", bad);
        }
        assert_eq!(
            "10:2".parse::<Range>().unwrap_err(),
            RangeParseError::StartAboveEnd {
                spec: "10:2".to_owned()
            }
        );
    }

    #[test]
    fn test_display_round_trips_spec() {
        for spec in ["1:", "@0", "~:5", "0:200"] {
            assert_eq!(range(spec).to_string(), spec);
        }
    }

    #[test]
    fn test_evaluate_critical_wins() {
        let warn = range("1:");
        let crit = range("1:");
        assert_eq!(evaluate(0.0, &warn, &crit), ServiceState::Critical);
        assert_eq!(evaluate(1.0, &warn, &crit), ServiceState::Ok);
    }

    #[test]
    fn test_evaluate_warning_band() {
        let warn = range("0:200");
        let crit = range("0:230");
        assert_eq!(evaluate(250.0, &warn, &crit), ServiceState::Critical);
        assert_eq!(evaluate(210.0, &warn, &crit), ServiceState::Warning);
        assert_eq!(evaluate(100.0, &warn, &crit), ServiceState::Ok);
    }

    #[test]
    fn test_evaluate_inverted_single_point() {
        let warn = range("0:");
        let crit = range("@0");
        assert_eq!(evaluate(0.0, &warn, &crit), ServiceState::Critical);
        assert_eq!(evaluate(1.0, &warn, &crit), ServiceState::Ok);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let warn = range("0:200");
        let crit = range("0:230");
        let first = evaluate(250.0, &warn, &crit);
        assert_eq!(first, evaluate(250.0, &warn, &crit));
    }
}
