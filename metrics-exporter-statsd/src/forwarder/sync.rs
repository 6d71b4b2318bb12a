use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    sync::Arc,
    time::Instant,
};

use crossbeam_channel::{after, select, tick, Receiver};
use tracing::{debug, error, trace};

use crate::{
    telemetry::Telemetry,
    writer::{Append, PacketBuffer},
};

use super::ForwarderConfiguration;

/// A connected UDP socket, along with the deadline after which it must be replaced.
struct Connection {
    socket: UdpSocket,
    expires: Receiver<Instant>,
}

impl Connection {
    fn open(config: &ForwarderConfiguration) -> io::Result<Self> {
        let addrs = config.remote_addr.resolve()?;

        // Only try addresses of the same family as the first one, since that's what we bind to.
        let is_ipv4 = addrs[0].is_ipv4();
        let addrs = addrs.into_iter().filter(|addr| addr.is_ipv4() == is_ipv4).collect::<Vec<_>>();
        let local_addr = if is_ipv4 {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local_addr)?;
        socket.connect(&addrs[..])?;
        socket.set_write_timeout(Some(config.write_timeout))?;

        Ok(Connection { socket, expires: after(config.reconnect_interval) })
    }

    /// Sends the current packet, if any, and clears the buffer regardless of the outcome.
    fn send(&self, buffer: &mut PacketBuffer, telemetry: &Telemetry) -> io::Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let packet_len = buffer.len();
        let result = self.socket.send(buffer.as_bytes());
        buffer.clear();

        match result {
            Ok(_) => {
                trace!(packet_len, "Sent packet.");
                telemetry.track_packet_send_succeeded(packet_len);
                Ok(())
            }
            Err(e) => {
                telemetry.track_packet_send_failed(packet_len);
                Err(e)
            }
        }
    }

    /// Adds a metric to the current packet, sending the packet first if the metric would not fit.
    fn push(&self, buffer: &mut PacketBuffer, telemetry: &Telemetry, metric: &str) -> io::Result<()> {
        match buffer.try_append(metric.as_bytes()) {
            Append::Appended => Ok(()),
            Append::Full => {
                self.send(buffer, telemetry)?;
                if buffer.try_append(metric.as_bytes()) != Append::Appended {
                    telemetry.track_oversized();
                }
                Ok(())
            }
            Append::Oversized => {
                debug!(metric_len = metric.len(), "Dropping metric larger than the maximum packet size.");
                telemetry.track_oversized();
                Ok(())
            }
        }
    }
}

/// States of the forwarder.
enum WorkerState {
    /// Creating a new transport handle.
    Connecting,

    /// Batching metrics and sending packets.
    Active(Connection),

    /// Discarding metrics while waiting to reconnect after a failure.
    Backoff,

    /// The sink was shut down or dropped.
    Stopped,
}

/// Batches queued metrics into packets and sends them to the collector over UDP.
pub struct Forwarder {
    config: ForwarderConfiguration,
    queue: Receiver<String>,
    shutdown: Receiver<()>,
    buffer: PacketBuffer,
    telemetry: Arc<Telemetry>,
}

impl Forwarder {
    /// Create a new synchronous `Forwarder`.
    ///
    /// The forwarder stops once `shutdown` disconnects, or once every sender for `queue` is dropped.
    pub(crate) fn new(
        config: ForwarderConfiguration,
        queue: Receiver<String>,
        shutdown: Receiver<()>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Forwarder { buffer: PacketBuffer::new(config.max_packet_len), config, queue, shutdown, telemetry }
    }

    /// Run the forwarder until the sink is shut down.
    pub fn run(mut self) {
        let flush = tick(self.config.flush_interval);

        let mut state = WorkerState::Connecting;
        loop {
            state = match state {
                WorkerState::Connecting => self.connect(),
                WorkerState::Active(connection) => self.forward(&connection, &flush),
                WorkerState::Backoff => self.backoff(),
                WorkerState::Stopped => break,
            };
        }

        debug!(remote_addr = %self.config.remote_addr, "Forwarder stopped.");
    }

    fn connect(&mut self) -> WorkerState {
        match Connection::open(&self.config) {
            Ok(connection) => {
                debug!(remote_addr = %self.config.remote_addr, "Connected to collector.");
                self.telemetry.track_connect(true);
                self.buffer.clear();
                WorkerState::Active(connection)
            }
            Err(e) => {
                error!(error = %e, remote_addr = %self.config.remote_addr, "Failed to connect to collector.");
                self.telemetry.track_connect(false);
                WorkerState::Backoff
            }
        }
    }

    fn forward(&mut self, connection: &Connection, flush: &Receiver<Instant>) -> WorkerState {
        let Forwarder { queue, shutdown, buffer, telemetry, .. } = self;
        let (queue, shutdown, telemetry) = (&*queue, &*shutdown, &**telemetry);

        loop {
            select! {
                recv(queue) -> msg => match msg {
                    Ok(metric) => {
                        if let Err(e) = connection.push(buffer, telemetry, &metric) {
                            error!(error = %e, "Failed to send packet.");
                            return WorkerState::Backoff;
                        }
                    }
                    Err(_) => return Self::drain(queue, connection, buffer, telemetry),
                },
                recv(shutdown) -> _ => return Self::drain(queue, connection, buffer, telemetry),
                recv(flush) -> _ => {
                    if let Err(e) = connection.send(buffer, telemetry) {
                        error!(error = %e, "Failed to flush packet.");
                        return WorkerState::Backoff;
                    }
                }
                recv(connection.expires) -> _ => {
                    debug!("Reconnecting to collector.");
                    telemetry.track_forced_reconnect();
                    buffer.clear();
                    return WorkerState::Connecting;
                }
            }
        }
    }

    /// Sends whatever is already queued, then stops.
    fn drain(
        queue: &Receiver<String>,
        connection: &Connection,
        buffer: &mut PacketBuffer,
        telemetry: &Telemetry,
    ) -> WorkerState {
        // Producers may still be racing with the shutdown, so only take what was queued when we got here.
        let pending = queue.len();
        for metric in queue.try_iter().take(pending) {
            if let Err(e) = connection.push(buffer, telemetry, &metric) {
                error!(error = %e, "Failed to send packet during shutdown.");
                return WorkerState::Stopped;
            }
        }

        if let Err(e) = connection.send(buffer, telemetry) {
            error!(error = %e, "Failed to flush packet during shutdown.");
        }

        WorkerState::Stopped
    }

    fn backoff(&mut self) -> WorkerState {
        debug!(backoff = ?self.config.backoff, "Backing off before reconnecting to collector.");
        self.buffer.clear();

        let deadline = after(self.config.backoff);
        loop {
            select! {
                recv(self.queue) -> msg => match msg {
                    Ok(_) => self.telemetry.track_backoff_discard(),
                    Err(_) => return WorkerState::Stopped,
                },
                recv(self.shutdown) -> _ => return WorkerState::Stopped,
                recv(deadline) -> _ => return WorkerState::Connecting,
            }
        }
    }
}
