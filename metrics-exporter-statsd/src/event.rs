use crate::render::{render_lines, Measurement};

/// A source of pre-rendered stats.
///
/// Each stat is a complete `<name>:<value>|<type>` line, without the client's prefix, which is applied by
/// [`StatsdClient::send_event`][crate::StatsdClient::send_event].
pub trait Event {
    /// Returns the rendered stats for this event.
    fn stats(&self) -> Vec<String>;
}

impl<E: Event> Event for [E] {
    fn stats(&self) -> Vec<String> {
        self.iter().flat_map(E::stats).collect()
    }
}

/// A single named measurement, as an [`Event`].
///
/// The name is used verbatim: the host placeholder is not substituted.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricEvent {
    name: String,
    measurement: Measurement,
}

impl MetricEvent {
    /// Creates a new `MetricEvent`.
    pub fn new<N>(name: N, measurement: Measurement) -> Self
    where
        N: Into<String>,
    {
        Self { name: name.into(), measurement }
    }

    /// Returns the metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the measurement.
    pub fn measurement(&self) -> Measurement {
        self.measurement
    }
}

impl Event for MetricEvent {
    fn stats(&self) -> Vec<String> {
        render_lines("", &self.name, self.measurement).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, MetricEvent};
    use crate::render::Measurement;

    #[test]
    fn metric_event_stats() {
        let event = MetricEvent::new("requests", Measurement::Increment(3));
        assert_eq!(event.stats(), ["requests:3|c"]);

        let event = MetricEvent::new("%HOST%.depth", Measurement::Gauge(-4));
        assert_eq!(event.stats(), ["%HOST%.depth:0|g", "%HOST%.depth:-4|g"]);

        let event = MetricEvent::new("requests", Measurement::Increment(0));
        assert!(event.stats().is_empty());
    }

    #[test]
    fn slice_of_events() {
        let events = [
            MetricEvent::new("a", Measurement::Total(1)),
            MetricEvent::new("b", Measurement::Decrement(0)),
            MetricEvent::new("c", Measurement::Absolute(2)),
        ];

        assert_eq!(events[..].stats(), ["a:1|t", "c:2|a"]);
    }
}
