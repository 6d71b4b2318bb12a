use std::time::Duration;

use thiserror::Error;

use crate::{
    client::StatsdClient,
    forwarder::{ForwarderConfiguration, RemoteAddr, Sink},
    host::resolve_hostname,
    recorder::StatsdRecorder,
    render::Renderer,
    writer::{LARGEST_VALID_PACKET_LEN, SMALLEST_VALID_PACKET},
};

const DEFAULT_REMOTE_ADDR: &str = "127.0.0.1:8125";
const DEFAULT_MAX_PACKET_LEN: usize = 1432;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Errors that could occur while building or installing a StatsD client/exporter.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },

    /// A configuration value was out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Details about the invalid value.
        reason: String,
    },

    /// Failed to spawn the background forwarder thread.
    #[error("failed to spawn background thread for exporter")]
    Backend,

    /// Failed to install the recorder due to an existing global recorder already being installed.
    #[error("failed to install exporter as global recorder")]
    FailedToInstall,
}

/// Builder for a StatsD client and exporter.
pub struct StatsdBuilder {
    remote_addr: RemoteAddr,
    prefix: String,
    hostname: Option<String>,
    max_packet_len: usize,
    flush_interval: Duration,
    reconnect_interval: Duration,
    backoff: Duration,
    write_timeout: Duration,
    queue_capacity: usize,
}

impl StatsdBuilder {
    /// Set the remote address to send metrics to.
    ///
    /// The address must be in the format of `<host>:<port>`. Hostnames are resolved every time the client connects, and
    /// not when building.
    ///
    /// Defaults to sending to `127.0.0.1:8125` over UDP.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.remote_addr = RemoteAddr::try_from(addr.as_ref())
            .map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the prefix applied to every metric name.
    ///
    /// The prefix is prepended as-is, so it should generally end with a separator such as `.`. The first occurrence of
    /// `%HOST%` in the prefix is replaced with the hostname.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn with_prefix<P>(mut self, prefix: P) -> Self
    where
        P: Into<String>,
    {
        self.prefix = prefix.into();
        self
    }

    /// Set the hostname substituted for `%HOST%` in the prefix and in metric names.
    ///
    /// Defaults to the hostname reported by the operating system.
    #[must_use]
    pub fn with_hostname<H>(mut self, hostname: H) -> Self
    where
        H: Into<String>,
    {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the maximum packet size, in bytes.
    ///
    /// Metrics are batched into newline-delimited packets that never exceed this size. A metric that cannot fit within
    /// a packet by itself is dropped. This should generally be set below the path MTU of the network between the client
    /// and the collector, to avoid fragmentation.
    ///
    /// Defaults to 1432 bytes.
    #[must_use]
    pub fn with_maximum_packet_size(mut self, max_packet_len: usize) -> Self {
        self.max_packet_len = max_packet_len;
        self
    }

    /// Set the flush interval.
    ///
    /// This is the longest a metric will be held in a partially filled packet before being sent.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Set the reconnect interval.
    ///
    /// The socket is replaced, and the remote address resolved again, every time this interval elapses, regardless of
    /// whether or not any errors occurred. Any metrics buffered at that point are discarded.
    ///
    /// Defaults to 60 seconds.
    #[must_use]
    pub fn with_reconnect_interval(mut self, reconnect_interval: Duration) -> Self {
        self.reconnect_interval = reconnect_interval;
        self
    }

    /// Set the backoff duration.
    ///
    /// After failing to connect or send, all metrics are discarded for this long before reconnecting.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub fn with_backoff_duration(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the write timeout for sending packets.
    ///
    /// When the write timeout is reached, the packet being sent is dropped and the client backs off.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the queue capacity.
    ///
    /// This is the number of rendered metrics that can be waiting to be batched at any given time. When the queue is
    /// full, new metrics are dropped.
    ///
    /// Defaults to 4096.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        let invalid = |reason: String| -> Result<(), BuildError> { Err(BuildError::InvalidConfiguration { reason }) };

        if !(SMALLEST_VALID_PACKET.len()..=LARGEST_VALID_PACKET_LEN).contains(&self.max_packet_len) {
            return invalid(format!(
                "maximum packet size must be between {} and {} bytes (got {})",
                SMALLEST_VALID_PACKET.len(),
                LARGEST_VALID_PACKET_LEN,
                self.max_packet_len
            ));
        }
        if self.flush_interval.is_zero() {
            return invalid("flush interval must be non-zero".to_string());
        }
        if self.reconnect_interval.is_zero() {
            return invalid("reconnect interval must be non-zero".to_string());
        }
        if self.write_timeout.is_zero() {
            return invalid("write timeout must be non-zero".to_string());
        }
        if self.queue_capacity == 0 {
            return invalid("queue capacity must be non-zero".to_string());
        }

        Ok(())
    }

    /// Builds the client.
    ///
    /// The background forwarder thread is spawned immediately.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, or the forwarder thread cannot be spawned, an error will be returned.
    pub fn build(self) -> Result<StatsdClient, BuildError> {
        self.validate()?;

        let hostname = self.hostname.unwrap_or_else(resolve_hostname);
        let renderer = Renderer::new(&self.prefix, hostname);

        let forwarder_config = ForwarderConfiguration {
            remote_addr: self.remote_addr.clone(),
            max_packet_len: self.max_packet_len,
            flush_interval: self.flush_interval,
            reconnect_interval: self.reconnect_interval,
            backoff: self.backoff,
            write_timeout: self.write_timeout,
        };
        let sink = Sink::spawn(forwarder_config, self.queue_capacity).map_err(|_| BuildError::Backend)?;

        Ok(StatsdClient::new(self.remote_addr, renderer, sink))
    }

    /// Builds the client, wrapped in a recorder.
    ///
    /// The recorder must be manually installed by the caller.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, or the forwarder thread cannot be spawned, an error will be returned.
    pub fn build_recorder(self) -> Result<StatsdRecorder, BuildError> {
        self.build().map(StatsdRecorder::new)
    }

    /// Builds the client and installs it as the global recorder.
    ///
    /// A handle to the client is returned, which shares its queue and forwarder thread with the installed recorder.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, the forwarder thread cannot be spawned, or a global recorder is already
    /// installed, an error will be returned.
    pub fn install(self) -> Result<StatsdClient, BuildError> {
        let client = self.build()?;

        metrics::set_global_recorder(StatsdRecorder::new(client.clone()))
            .map_err(|_| BuildError::FailedToInstall)?;
        Ok(client)
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder {
            remote_addr: RemoteAddr::try_from(DEFAULT_REMOTE_ADDR)
                .unwrap_or_else(|_| unreachable!("default remote address is valid")),
            prefix: String::new(),
            hostname: None,
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            backoff: DEFAULT_BACKOFF,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
