use std::{fmt::Write as _, time::Duration};

use crate::host::substitute_host;

/// A single measurement, tagged with the StatsD metric type it is reported as.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Measurement {
    /// Increments a counter by the given amount.
    Increment(i64),

    /// Decrements a counter by the given amount.
    Decrement(i64),

    /// A duration, in whole milliseconds.
    Timing(i64),

    /// A duration, reported as fractional milliseconds.
    PrecisionTiming(Duration),

    /// Sets a gauge to the given value.
    Gauge(i64),

    /// Changes a gauge by the given amount.
    GaugeDelta(i64),

    /// Sets a gauge to the given floating-point value.
    FloatGauge(f64),

    /// Changes a gauge by the given floating-point amount.
    FloatGaugeDelta(f64),

    /// An absolute value which is not averaged or aggregated by the collector.
    Absolute(i64),

    /// An absolute floating-point value which is not averaged or aggregated by the collector.
    FloatAbsolute(f64),

    /// A continuously increasing total, such as read operations since boot.
    Total(i64),
}

#[derive(Clone, Copy)]
enum MetricType {
    Counter,
    Timing,
    Gauge,
    Absolute,
    Total,
}

impl MetricType {
    fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "|c",
            MetricType::Timing => "|ms",
            MetricType::Gauge => "|g",
            MetricType::Absolute => "|a",
            MetricType::Total => "|t",
        }
    }
}

#[derive(Clone, Copy)]
enum MetricValue {
    Integer(i128),
    FloatingPoint(f64),
    Milliseconds(f64),
}

struct MetricValueFormatter {
    int_writer: itoa::Buffer,
    float_writer: ryu::Buffer,
    fixed_buf: String,
}

impl MetricValueFormatter {
    fn new() -> Self {
        Self { int_writer: itoa::Buffer::new(), float_writer: ryu::Buffer::new(), fixed_buf: String::new() }
    }

    fn format(&mut self, value: MetricValue) -> &str {
        match value {
            MetricValue::Integer(v) => self.int_writer.format(v),
            MetricValue::FloatingPoint(v) => self.float_writer.format_finite(v),
            MetricValue::Milliseconds(v) => {
                self.fixed_buf.clear();
                // Writing into a `String` cannot fail.
                let _ = write!(self.fixed_buf, "{v:.6}");
                &self.fixed_buf
            }
        }
    }
}

/// The wire lines produced for a single measurement.
///
/// Most measurements render to exactly one line. Zero-valued counter changes and non-finite floating-point values
/// render to nothing, and setting a gauge to a negative value renders to two lines: a reset to zero, followed by the
/// negative value. (A bare leading `-` is otherwise interpreted by the collector as a gauge delta.)
#[derive(Debug, Default, PartialEq)]
pub struct Rendered {
    first: Option<String>,
    second: Option<String>,
}

impl Rendered {
    fn none() -> Self {
        Self::default()
    }

    fn one(line: String) -> Self {
        Self { first: Some(line), second: None }
    }

    fn two(first: String, second: String) -> Self {
        Self { first: Some(first), second: Some(second) }
    }

    /// Returns `true` if no lines were rendered.
    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none()
    }
}

impl Iterator for Rendered {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.first.take().or_else(|| self.second.take())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = usize::from(self.first.is_some()) + usize::from(self.second.is_some());
        (len, Some(len))
    }
}

impl ExactSizeIterator for Rendered {}

/// Renders measurements into StatsD wire lines.
///
/// Every rendered name is prefixed with the configured prefix, and the first occurrence of the host placeholder
/// (`%HOST%`) in a metric name is replaced with the configured hostname. The placeholder is also substituted in the
/// prefix itself, once, when the renderer is created.
#[derive(Clone, Debug)]
pub struct Renderer {
    prefix: String,
    hostname: String,
}

impl Renderer {
    /// Creates a new `Renderer` with the given prefix and hostname.
    pub fn new<P, H>(prefix: P, hostname: H) -> Self
    where
        P: AsRef<str>,
        H: Into<String>,
    {
        let hostname = hostname.into();
        let prefix = substitute_host(prefix.as_ref(), &hostname).into_owned();
        Self { prefix, hostname }
    }

    /// Returns the prefix applied to every metric name.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the hostname substituted for the host placeholder.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Renders a measurement for the given metric name.
    pub fn render(&self, name: &str, measurement: Measurement) -> Rendered {
        let name = substitute_host(name, &self.hostname);
        render_lines(&self.prefix, &name, measurement)
    }

    /// Prepends the prefix to an already-rendered line.
    pub fn prefixed(&self, line: &str) -> String {
        let mut prefixed = String::with_capacity(self.prefix.len() + line.len());
        prefixed.push_str(&self.prefix);
        prefixed.push_str(line);
        prefixed
    }
}

/// Renders a measurement into wire lines, without any host placeholder substitution.
pub(crate) fn render_lines(prefix: &str, name: &str, measurement: Measurement) -> Rendered {
    let mut formatter = MetricValueFormatter::new();
    let mut line = |value: MetricValue, explicit_sign: bool, metric_type: MetricType| {
        write_line(&mut formatter, prefix, name, value, explicit_sign, metric_type)
    };

    match measurement {
        Measurement::Increment(0) | Measurement::Decrement(0) => Rendered::none(),
        Measurement::Increment(n) => {
            Rendered::one(line(MetricValue::Integer(i128::from(n)), false, MetricType::Counter))
        }
        Measurement::Decrement(n) => {
            Rendered::one(line(MetricValue::Integer(-i128::from(n)), false, MetricType::Counter))
        }
        Measurement::Timing(n) => {
            Rendered::one(line(MetricValue::Integer(i128::from(n)), false, MetricType::Timing))
        }
        Measurement::PrecisionTiming(d) => {
            let millis = d.as_nanos() as f64 / 1_000_000.0;
            Rendered::one(line(MetricValue::Milliseconds(millis), false, MetricType::Timing))
        }
        Measurement::Gauge(n) if n < 0 => Rendered::two(
            line(MetricValue::Integer(0), false, MetricType::Gauge),
            line(MetricValue::Integer(i128::from(n)), false, MetricType::Gauge),
        ),
        Measurement::Gauge(n) => {
            Rendered::one(line(MetricValue::Integer(i128::from(n)), false, MetricType::Gauge))
        }
        Measurement::GaugeDelta(n) => {
            Rendered::one(line(MetricValue::Integer(i128::from(n)), n >= 0, MetricType::Gauge))
        }
        Measurement::FloatGauge(f) | Measurement::FloatGaugeDelta(f) | Measurement::FloatAbsolute(f)
            if !f.is_finite() =>
        {
            Rendered::none()
        }
        Measurement::FloatGauge(f) if f < 0.0 => Rendered::two(
            line(MetricValue::Integer(0), false, MetricType::Gauge),
            line(MetricValue::FloatingPoint(f), false, MetricType::Gauge),
        ),
        Measurement::FloatGauge(f) => {
            Rendered::one(line(MetricValue::FloatingPoint(unsigned_zero(f)), false, MetricType::Gauge))
        }
        Measurement::FloatGaugeDelta(f) => {
            let f = unsigned_zero(f);
            Rendered::one(line(MetricValue::FloatingPoint(f), f >= 0.0, MetricType::Gauge))
        }
        Measurement::Absolute(n) => {
            Rendered::one(line(MetricValue::Integer(i128::from(n)), false, MetricType::Absolute))
        }
        Measurement::FloatAbsolute(f) => {
            Rendered::one(line(MetricValue::FloatingPoint(f), false, MetricType::Absolute))
        }
        Measurement::Total(n) => {
            Rendered::one(line(MetricValue::Integer(i128::from(n)), false, MetricType::Total))
        }
    }
}

// `-0.0` would otherwise be written with a leading minus sign, which the collector reads as a delta.
fn unsigned_zero(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

fn write_line(
    formatter: &mut MetricValueFormatter,
    prefix: &str,
    name: &str,
    value: MetricValue,
    explicit_sign: bool,
    metric_type: MetricType,
) -> String {
    let value = formatter.format(value);
    let suffix = metric_type.as_str();

    let mut line = String::with_capacity(prefix.len() + name.len() + value.len() + suffix.len() + 2);
    line.push_str(prefix);
    line.push_str(name);
    line.push(':');
    if explicit_sign {
        line.push('+');
    }
    line.push_str(value);
    line.push_str(suffix);
    line
}
