//! Metrics and their perfdata representation.

use std::fmt;

use crate::Range;

/// Unit of measurement, appended to the perfdata value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Unit {
    #[default]
    None,
    Seconds,
    Milliseconds,
    Microseconds,
    Percentage,
    Bytes,
    Counter,
    Other(String),
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unit::None => "",
            Unit::Seconds => "s",
            Unit::Milliseconds => "ms",
            Unit::Microseconds => "us",
            Unit::Percentage => "%",
            Unit::Bytes => "B",
            Unit::Counter => "c",
            Unit::Other(s) => s,
        })
    }
}

/// One observed value of a probe.
///
/// The optional min/max are display bounds for graphing tools only; alerting
/// bounds live in the [`ScalarContext`](crate::ScalarContext) the metric is
/// evaluated against.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    name: String,
    value: f64,
    unit: Unit,
    min: Option<f64>,
    max: Option<f64>,
}

impl Metric {
    pub fn new(name: &str, value: f64) -> Metric {
        Metric {
            name: name.to_owned(),
            value,
            unit: Unit::None,
            min: None,
            max: None,
        }
    }

    pub fn unit(mut self, unit: Unit) -> Metric {
        self.unit = unit;
        self
    }

    pub fn min(mut self, min: f64) -> Metric {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Metric {
        self.max = Some(max);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// The `name:value` pair used in summary lines.
    pub fn pair(&self) -> String {
        format!("{}:{}", self.name, fmt_value(self.value))
    }

    /// Render the `label=value[uom];warn;crit;min;max` perfdata phrase.
    ///
    /// Trailing empty fields are trimmed, labels are quoted the way nagios
    /// wants them: `=` replaced, `'` doubled, whole label quoted if it
    /// contains a space.
    pub fn perf_string(&self, warning: Option<&Range>, critical: Option<&Range>) -> String {
        let mut fields = vec![format!(
            "{}={}{}",
            perf_label(&self.name),
            fmt_value(self.value),
            self.unit
        )];
        fields.push(warning.map(Range::to_string).unwrap_or_default());
        fields.push(critical.map(Range::to_string).unwrap_or_default());
        fields.push(self.min.map(fmt_value).unwrap_or_default());
        fields.push(self.max.map(fmt_value).unwrap_or_default());

        let joined = fields.join(";");
        joined.trim_end_matches(';').to_owned()
    }
}

/// Counts print as integers, durations keep their fraction.
fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn perf_label(name: &str) -> String {
    let name = name.replace('=', "_");
    if name.contains(' ') {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.replace('\'', "''")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_perf_string() {
        let m = Metric::new("measures", 12.0);
        assert_eq!(m.perf_string(None, None), "measures=12");
    }

    #[test]
    fn test_perf_string_with_ranges_and_bounds() {
        let warn: Range = "1:".parse().unwrap();
        let crit: Range = "0:".parse().unwrap();
        let m = Metric::new("measures", 3.0).min(0.0);
        assert_eq!(
            m.perf_string(Some(&warn), Some(&crit)),
            "measures=3;1:;0:;0"
        );
    }

    #[test]
    fn test_perf_string_trims_trailing_fields() {
        let warn: Range = "0:200".parse().unwrap();
        let m = Metric::new("used", 42.0);
        assert_eq!(m.perf_string(Some(&warn), None), "used=42;0:200");
    }

    #[test]
    fn test_unit_suffix() {
        let m = Metric::new("gettime", 0.25).unit(Unit::Seconds).min(0.0);
        assert_eq!(m.perf_string(None, None), "gettime=0.25s;;;0");
        assert_eq!(m.pair(), "gettime:0.25");
    }

    #[test]
    fn test_label_quoting() {
        let cases = [
            ("plain", "plain=0"),
            ("a=b", "a_b=0"),
            ("it's", "it''s=0"),
            ("two words", "'two words'=0"),
        ];
        for (label, expected) in cases {
            assert_eq!(Metric::new(label, 0.0).perf_string(None, None), expected);
        }
    }

    #[test]
    fn test_value_formatting() {
        assert_eq!(Metric::new("m", 200.0).pair(), "m:200");
        assert_eq!(Metric::new("m", -3.0).pair(), "m:-3");
        assert_eq!(Metric::new("m", 0.125).pair(), "m:0.125");
    }
}
