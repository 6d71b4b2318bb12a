use std::sync::atomic::{AtomicU64, Ordering};

/// Exporter telemetry.
///
/// `Telemetry` collects information about the delivery engine's behavior. It is shared between producers, which only
/// ever record dropped metrics, and the forwarder, which records everything else.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    metrics_dropped_queue_full: AtomicU64,
    metrics_dropped_closed: AtomicU64,
    metrics_dropped_oversized: AtomicU64,
    metrics_discarded_backoff: AtomicU64,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    packets_failed: AtomicU64,
    bytes_failed: AtomicU64,
    connects: AtomicU64,
    connect_failures: AtomicU64,
    forced_reconnects: AtomicU64,
}

impl Telemetry {
    /// Tracks a metric dropped because the queue was full.
    pub fn track_queue_full(&self) {
        self.metrics_dropped_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Tracks a metric dropped because the sink was already shut down.
    pub fn track_closed(&self) {
        self.metrics_dropped_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Tracks a metric dropped because it could not fit within a single packet.
    pub fn track_oversized(&self) {
        self.metrics_dropped_oversized.fetch_add(1, Ordering::Relaxed);
    }

    /// Tracks a metric discarded while backing off.
    pub fn track_backoff_discard(&self) {
        self.metrics_discarded_backoff.fetch_add(1, Ordering::Relaxed);
    }

    /// Tracks a successful packet send.
    pub fn track_packet_send_succeeded(&self, bytes_len: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes_len as u64, Ordering::Relaxed);
    }

    /// Tracks a failed packet send.
    pub fn track_packet_send_failed(&self, bytes_len: usize) {
        self.packets_failed.fetch_add(1, Ordering::Relaxed);
        self.bytes_failed.fetch_add(bytes_len as u64, Ordering::Relaxed);
    }

    /// Tracks the outcome of a connection attempt.
    pub fn track_connect(&self, succeeded: bool) {
        if succeeded {
            self.connects.fetch_add(1, Ordering::Relaxed);
        } else {
            self.connect_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Tracks a reconnect forced by the reconnect interval.
    pub fn track_forced_reconnect(&self) {
        self.forced_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            metrics_dropped_queue_full: self.metrics_dropped_queue_full.load(Ordering::Relaxed),
            metrics_dropped_closed: self.metrics_dropped_closed.load(Ordering::Relaxed),
            metrics_dropped_oversized: self.metrics_dropped_oversized.load(Ordering::Relaxed),
            metrics_discarded_backoff: self.metrics_discarded_backoff.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_failed: self.packets_failed.load(Ordering::Relaxed),
            bytes_failed: self.bytes_failed.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            forced_reconnects: self.forced_reconnects.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the exporter's telemetry.
///
/// All values are cumulative since the client was built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Metrics dropped because the queue was full.
    pub metrics_dropped_queue_full: u64,

    /// Metrics dropped because the client had already been shut down.
    pub metrics_dropped_closed: u64,

    /// Metrics dropped because they were larger than the maximum packet size.
    pub metrics_dropped_oversized: u64,

    /// Metrics discarded while backing off after a transport failure.
    pub metrics_discarded_backoff: u64,

    /// Packets successfully handed to the transport.
    pub packets_sent: u64,

    /// Bytes successfully handed to the transport.
    pub bytes_sent: u64,

    /// Packets that failed to send.
    pub packets_failed: u64,

    /// Bytes that failed to send.
    pub bytes_failed: u64,

    /// Transport handles successfully created.
    pub connects: u64,

    /// Failed attempts to create a transport handle.
    pub connect_failures: u64,

    /// Transport handles replaced because the reconnect interval elapsed.
    pub forced_reconnects: u64,
}
