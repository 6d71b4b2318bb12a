use std::{fmt, sync::Arc, time::Duration};

use crate::{
    event::Event,
    forwarder::{RemoteAddr, Sink},
    render::{Measurement, Renderer},
    telemetry::TelemetrySnapshot,
};

struct Inner {
    remote_addr: RemoteAddr,
    renderer: Renderer,
    sink: Sink,
}

/// A client for sending metrics to a StatsD collector.
///
/// Every method is fire-and-forget: metrics are rendered on the calling thread, handed to a bounded queue, and sent by
/// a background thread. Nothing ever blocks, and nothing ever fails from the caller's point of view. If the queue is
/// full, or the collector is unreachable, metrics are dropped.
///
/// The client is cheap to clone, and all clones share the same queue and background thread. The background thread
/// stops once [`shutdown`][Self::shutdown] is called, or once every clone has been dropped.
///
/// See the [StatsD metric types][types] for the semantics of each method.
///
/// [types]: https://github.com/statsd/statsd/blob/master/docs/metric_types.md
#[derive(Clone)]
pub struct StatsdClient {
    inner: Arc<Inner>,
}

impl StatsdClient {
    pub(crate) fn new(remote_addr: RemoteAddr, renderer: Renderer, sink: Sink) -> Self {
        StatsdClient { inner: Arc::new(Inner { remote_addr, renderer, sink }) }
    }

    /// Increments a counter. Often used to note a particular event.
    ///
    /// A count of zero sends nothing.
    pub fn incr(&self, stat: &str, count: i64) {
        self.send(stat, Measurement::Increment(count));
    }

    /// Decrements a counter.
    ///
    /// A count of zero sends nothing.
    pub fn decr(&self, stat: &str, count: i64) {
        self.send(stat, Measurement::Decrement(count));
    }

    /// Tracks a duration, given in milliseconds.
    pub fn timing(&self, stat: &str, millis: i64) {
        self.send(stat, Measurement::Timing(millis));
    }

    /// Tracks a duration, reported as fractional milliseconds.
    pub fn precision_timing(&self, stat: &str, delta: Duration) {
        self.send(stat, Measurement::PrecisionTiming(delta));
    }

    /// Sets a gauge.
    ///
    /// Gauges keep their value until it is changed again. Due to the underlying protocol, a gauge cannot be set to a
    /// negative number directly, so negative values are sent as a reset to zero followed by the (negative) value.
    pub fn gauge(&self, stat: &str, value: i64) {
        self.send(stat, Measurement::Gauge(value));
    }

    /// Changes a gauge by the given amount.
    pub fn gauge_delta(&self, stat: &str, delta: i64) {
        self.send(stat, Measurement::GaugeDelta(delta));
    }

    /// Sets a gauge to a floating-point value.
    ///
    /// Negative values are handled as in [`gauge`][Self::gauge].
    pub fn fgauge(&self, stat: &str, value: f64) {
        self.send(stat, Measurement::FloatGauge(value));
    }

    /// Changes a gauge by the given floating-point amount.
    pub fn fgauge_delta(&self, stat: &str, delta: f64) {
        self.send(stat, Measurement::FloatGaugeDelta(delta));
    }

    /// Sends an absolute value, which is not averaged or aggregated by the collector.
    pub fn absolute(&self, stat: &str, value: i64) {
        self.send(stat, Measurement::Absolute(value));
    }

    /// Sends an absolute floating-point value, which is not averaged or aggregated by the collector.
    pub fn fabsolute(&self, stat: &str, value: f64) {
        self.send(stat, Measurement::FloatAbsolute(value));
    }

    /// Sends a continuously increasing total, such as read operations since boot.
    pub fn total(&self, stat: &str, value: i64) {
        self.send(stat, Measurement::Total(value));
    }

    /// Renders and sends a measurement.
    pub fn send(&self, stat: &str, measurement: Measurement) {
        for line in self.inner.renderer.render(stat, measurement) {
            self.inner.sink.submit(line);
        }
    }

    /// Sends every stat of an event, with the prefix applied.
    pub fn send_event<E>(&self, event: &E)
    where
        E: Event + ?Sized,
    {
        for stat in event.stats() {
            self.inner.sink.submit(self.inner.renderer.prefixed(&stat));
        }
    }

    /// Sends an already rendered line, as is.
    pub fn submit_raw<L>(&self, line: L)
    where
        L: Into<String>,
    {
        self.inner.sink.submit(line.into());
    }

    /// Returns the collector address.
    pub fn remote_address(&self) -> &str {
        self.inner.remote_addr.as_str()
    }

    /// Returns the prefix applied to every metric name.
    pub fn prefix(&self) -> &str {
        self.inner.renderer.prefix()
    }

    /// Returns a snapshot of the client's internal telemetry.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.inner.sink.telemetry().snapshot()
    }

    /// Stops the background thread, flushing already queued metrics on a best-effort basis.
    ///
    /// Metrics sent after shutting down, from this or any other clone, are dropped. Calling this more than once is
    /// harmless.
    pub fn shutdown(&self) {
        self.inner.sink.shutdown();
    }
}

impl fmt::Display for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.remote_addr, f)
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClient")
            .field("remote_addr", &self.inner.remote_addr.as_str())
            .field("prefix", &self.inner.renderer.prefix())
            .finish_non_exhaustive()
    }
}
