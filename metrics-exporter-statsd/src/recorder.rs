use std::{sync::Arc, time::Duration};

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};

use crate::{client::StatsdClient, render::Measurement};

/// A recorder that forwards metrics to a StatsD collector.
///
/// Every update is sent as it happens; nothing is aggregated locally. Labels are ignored, as plain StatsD has no notion
/// of tags. Counters are sent as counter increments (or totals, when set to an absolute value), gauges as gauges, and
/// histograms as precision timings, with recorded values taken to be seconds.
pub struct StatsdRecorder {
    client: StatsdClient,
}

impl StatsdRecorder {
    pub(crate) fn new(client: StatsdClient) -> Self {
        StatsdRecorder { client }
    }

    /// Returns the client that this recorder sends through.
    pub fn client(&self) -> &StatsdClient {
        &self.client
    }
}

impl Recorder for StatsdRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(Handle::new(key, &self.client)))
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(Handle::new(key, &self.client)))
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(Handle::new(key, &self.client)))
    }
}

struct Handle {
    name: String,
    client: StatsdClient,
}

impl Handle {
    fn new(key: &Key, client: &StatsdClient) -> Self {
        Handle { name: key.name().to_string(), client: client.clone() }
    }

    fn send(&self, measurement: Measurement) {
        self.client.send(&self.name, measurement);
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl CounterFn for Handle {
    fn increment(&self, value: u64) {
        self.send(Measurement::Increment(saturating_i64(value)));
    }

    fn absolute(&self, value: u64) {
        self.send(Measurement::Total(saturating_i64(value)));
    }
}

impl GaugeFn for Handle {
    fn increment(&self, value: f64) {
        self.send(Measurement::FloatGaugeDelta(value));
    }

    fn decrement(&self, value: f64) {
        self.send(Measurement::FloatGaugeDelta(-value));
    }

    fn set(&self, value: f64) {
        self.send(Measurement::FloatGauge(value));
    }
}

impl HistogramFn for Handle {
    fn record(&self, value: f64) {
        // Negative, non-finite, or out of range values have no timing representation.
        if let Ok(delta) = Duration::try_from_secs_f64(value) {
            self.send(Measurement::PrecisionTiming(delta));
        }
    }
}
