//! A fire-and-forget [StatsD][statsd] client, and a [`metrics`]-compatible exporter built on top of it.
//!
//! [statsd]: https://github.com/statsd/statsd
//!
//! # Usage
//!
//! The client can be used directly:
//!
//! ```no_run
//! # use metrics_exporter_statsd::StatsdBuilder;
//! // The builder configures the collector address, the metric prefix, how metrics are batched, and so on.
//! let client = StatsdBuilder::default()
//!     .with_remote_address("127.0.0.1:8125")
//!     .expect("invalid remote address")
//!     .with_prefix("%HOST%.myapp.")
//!     .build()
//!     .expect("failed to build client");
//!
//! client.incr("requests", 1);
//! client.gauge("queue_depth", 42);
//! client.timing("db.query", 17);
//!
//! // Flushes anything still queued and stops the background thread.
//! client.shutdown();
//! ```
//!
//! Or it can be installed as the global recorder for all `metrics` calls:
//!
//! ```no_run
//! # use metrics_exporter_statsd::StatsdBuilder;
//! let client = StatsdBuilder::default().install().expect("failed to install recorder/exporter");
//!
//! metrics::counter!("requests").increment(1);
//! metrics::histogram!("request_duration").record(0.042);
//!
//! // The returned client shares its background thread with the installed recorder.
//! client.shutdown();
//! ```
//!
//! # Delivery
//!
//! Calls never block and never fail. Metrics are rendered on the calling thread, and handed to a bounded queue that is
//! drained by a single background thread. When the queue is full, new metrics are dropped.
//!
//! The background thread batches metrics into newline-delimited UDP packets, up to a configurable maximum size. A
//! partially filled packet is sent after the flush interval elapses. The socket is replaced periodically so that
//! collectors whose address changes over time are picked up. If connecting or sending fails, the background thread
//! discards all metrics for the backoff duration before trying again.
//!
//! # Host substitution
//!
//! The first occurrence of `%HOST%` in the prefix, and in each metric name, is replaced with the hostname. The
//! hostname defaults to the one reported by the operating system.
//!
//! # Telemetry
//!
//! The client tracks how many metrics were dropped, and why, along with packets and bytes sent. A snapshot can be
//! taken with [`StatsdClient::telemetry`].

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdBuilder};

mod client;
pub use self::client::StatsdClient;

mod event;
pub use self::event::{Event, MetricEvent};

mod forwarder;

mod host;
pub use self::host::HOST_PLACEHOLDER;

mod recorder;
pub use self::recorder::StatsdRecorder;

mod render;
pub use self::render::{Measurement, Rendered, Renderer};

mod telemetry;
pub use self::telemetry::TelemetrySnapshot;

mod writer;
