use std::{
    fmt, io,
    net::{SocketAddr, ToSocketAddrs as _},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::error;

use crate::telemetry::Telemetry;

pub mod sync;

/// Address of the collector, in `<host>:<port>` form.
///
/// The address is resolved again every time the forwarder connects, so that a collector whose address changes over
/// time (behind a load balancer, for example) is picked up on the next reconnect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RemoteAddr(String);

impl RemoteAddr {
    /// Resolves the address into one or more socket addresses.
    pub fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        let addrs = self.0.to_socket_addrs()?.collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' did not resolve to any addresses", self.0),
            ));
        }

        Ok(addrs)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'a> TryFrom<&'a str> for RemoteAddr {
    type Error = String;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        if addr.parse::<SocketAddr>().is_ok() {
            return Ok(RemoteAddr(addr.to_string()));
        }

        // Hostnames are only checked for shape here: resolution happens when connecting.
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
                Ok(_) => Ok(RemoteAddr(addr.to_string())),
                Err(e) => Err(format!("invalid port '{port}': {e}")),
            },
            _ => Err(format!("'{addr}' is not in the form <host>:<port>")),
        }
    }
}

impl fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Forwarder configuration.
#[derive(Clone, Debug)]
pub(crate) struct ForwarderConfiguration {
    pub remote_addr: RemoteAddr,
    pub max_packet_len: usize,
    pub flush_interval: Duration,
    pub reconnect_interval: Duration,
    pub backoff: Duration,
    pub write_timeout: Duration,
}

/// Producer-side handle to the delivery engine.
///
/// Metrics are handed to the forwarder thread through a bounded queue. Submitting never blocks: when the queue is full,
/// the metric is dropped.
pub(crate) struct Sink {
    queue: Sender<String>,
    closed: AtomicBool,
    shutdown: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    telemetry: Arc<Telemetry>,
}

impl Sink {
    /// Spawns the forwarder thread and returns a handle to it.
    ///
    /// # Errors
    ///
    /// If the forwarder thread cannot be spawned, an error is returned.
    pub fn spawn(config: ForwarderConfiguration, queue_capacity: usize) -> io::Result<Self> {
        let (queue_tx, queue_rx) = bounded(queue_capacity);
        let (shutdown_tx, shutdown_rx) = bounded(0);
        let telemetry = Arc::new(Telemetry::default());

        let forwarder = sync::Forwarder::new(config, queue_rx, shutdown_rx, Arc::clone(&telemetry));
        let worker = thread::Builder::new()
            .name("metrics-exporter-statsd-forwarder".to_string())
            .spawn(move || forwarder.run())?;

        Ok(Sink {
            queue: queue_tx,
            closed: AtomicBool::new(false),
            shutdown: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(worker)),
            telemetry,
        })
    }

    /// Enqueues a rendered metric, dropping it if the queue is full or the sink has been shut down.
    pub fn submit(&self, metric: String) {
        if self.closed.load(Ordering::Acquire) {
            self.telemetry.track_closed();
            return;
        }

        match self.queue.try_send(metric) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.telemetry.track_queue_full(),
            // The forwarder is gone, so nothing will ever consume the queue again.
            Err(TrySendError::Disconnected(_)) => self.telemetry.track_closed(),
        }
    }

    /// Stops the forwarder thread and waits for it to exit.
    ///
    /// Metrics already queued are flushed on a best-effort basis. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);

        // Dropping the sender is what signals the forwarder.
        drop(self.shutdown.lock().take());

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("Forwarder thread panicked before shutting down.");
            }
        }
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Creates a sink without a forwarder thread, handing back the consuming end of its queue.
    #[cfg(test)]
    pub(crate) fn detached(queue_capacity: usize) -> (Self, crossbeam_channel::Receiver<String>) {
        let (queue_tx, queue_rx) = bounded(queue_capacity);
        let sink = Sink {
            queue: queue_tx,
            closed: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            worker: Mutex::new(None),
            telemetry: Arc::new(Telemetry::default()),
        };
        (sink, queue_rx)
    }
}
