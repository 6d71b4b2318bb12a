use std::{
    net::UdpSocket,
    time::{Duration, Instant},
};

use metrics_exporter_statsd::{Measurement, MetricEvent, StatsdBuilder, StatsdClient};
use proptest::prelude::*;

const LONG: Duration = Duration::from_secs(3600);

fn listener() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    socket
}

fn builder_for(listener: &UdpSocket) -> StatsdBuilder {
    let addr = listener.local_addr().unwrap().to_string();
    StatsdBuilder::default()
        .with_remote_address(addr)
        .unwrap()
        .with_hostname("web01")
        .with_flush_interval(LONG)
        .with_reconnect_interval(LONG)
}

/// Reads every packet that is already waiting on the listener.
fn drain_packets(listener: &UdpSocket) -> Vec<String> {
    listener.set_read_timeout(Some(Duration::from_millis(200))).unwrap();

    let mut packets = Vec::new();
    let mut buf = [0u8; 65_536];
    while let Ok(len) = listener.recv(&mut buf) {
        packets.push(String::from_utf8(buf[..len].to_vec()).unwrap());
    }
    packets
}

fn drain_lines(listener: &UdpSocket) -> Vec<String> {
    drain_packets(listener).iter().flat_map(|packet| packet.split('\n').map(str::to_string)).collect()
}

/// Sends through `client`, shuts it down, and collects every line that reached the collector.
fn send_and_collect(listener: &UdpSocket, client: &StatsdClient, send: impl FnOnce(&StatsdClient)) -> Vec<String> {
    send(client);
    client.shutdown();
    drain_lines(listener)
}

#[test]
fn prefixed_total_is_delivered_on_flush() {
    let listener = listener();
    let client = builder_for(&listener)
        .with_prefix("app.")
        .with_maximum_packet_size(100)
        .with_flush_interval(Duration::from_secs(1))
        .build()
        .unwrap();

    client.total("x:y:z", 5);

    // Nothing else is sent, so the flush timer is what delivers the packet.
    let mut buf = [0u8; 128];
    let len = listener.recv(&mut buf).expect("expected a packet within the flush interval");
    assert_eq!(&buf[..len], b"app.x:y:z:5|t");

    client.shutdown();
}

#[test]
fn metric_types_on_the_wire() {
    let listener = listener();
    let client = builder_for(&listener).build().unwrap();

    let lines = send_and_collect(&listener, &client, |client| {
        client.incr("requests", 3);
        client.decr("requests", 2);
        client.timing("db.query", 17);
        client.precision_timing("db.query", Duration::from_micros(1500));
        client.gauge("depth", 4);
        client.gauge_delta("depth", 1);
        client.gauge_delta("depth", -2);
        client.fgauge("load", 0.25);
        client.fgauge_delta("load", 0.5);
        client.absolute("seen", 9);
        client.fabsolute("ratio", 1.5);
        client.total("reads", 1234);
    });

    assert_eq!(
        lines,
        [
            "requests:3|c",
            "requests:-2|c",
            "db.query:17|ms",
            "db.query:1.500000|ms",
            "depth:4|g",
            "depth:+1|g",
            "depth:-2|g",
            "load:0.25|g",
            "load:+0.5|g",
            "seen:9|a",
            "ratio:1.5|a",
            "reads:1234|t",
        ]
    );
}

#[test]
fn zero_counters_send_nothing() {
    let listener = listener();
    let client = builder_for(&listener).build().unwrap();

    let lines = send_and_collect(&listener, &client, |client| {
        client.incr("skipped", 0);
        client.decr("skipped", 0);
        client.incr("kept", 1);
    });

    assert_eq!(lines, ["kept:1|c"]);
}

#[test]
fn negative_gauge_resets_to_zero_first() {
    let listener = listener();
    let client = builder_for(&listener).build().unwrap();

    let lines = send_and_collect(&listener, &client, |client| {
        client.gauge("depth", -5);
        client.fgauge("temp", -1.5);
    });

    assert_eq!(lines, ["depth:0|g", "depth:-5|g", "temp:0|g", "temp:-1.5|g"]);
}

#[test]
fn host_placeholder_is_substituted() {
    let listener = listener();
    let client = builder_for(&listener).with_prefix("%HOST%.").build().unwrap();
    assert_eq!(client.prefix(), "web01.");

    let lines = send_and_collect(&listener, &client, |client| {
        client.gauge("zz.%HOST%", 3);
        client.incr("%HOST%.%HOST%", 1);
    });

    assert_eq!(lines, ["web01.zz.web01:3|g", "web01.web01.%HOST%:1|c"]);
}

#[test]
fn events_are_prefixed_verbatim() {
    let listener = listener();
    let client = builder_for(&listener).with_prefix("app.").build().unwrap();

    let events = [
        MetricEvent::new("logins.%HOST%", Measurement::Increment(2)),
        MetricEvent::new("sessions", Measurement::Gauge(7)),
    ];

    let lines = send_and_collect(&listener, &client, |client| {
        client.send_event(&events[..]);
        client.send_event(&MetricEvent::new("errors", Measurement::Total(1)));
        client.submit_raw("raw:1|c");
    });

    assert_eq!(lines, ["app.logins.%HOST%:2|c", "app.sessions:7|g", "app.errors:1|t", "raw:1|c"]);
}

#[test]
fn burst_beyond_queue_capacity_does_not_block() {
    let listener = listener();
    let client = builder_for(&listener).with_queue_capacity(8).build().unwrap();

    // Read concurrently so the listener's receive buffer never overflows.
    let reader = listener.try_clone().unwrap();
    reader.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
    let reader = std::thread::spawn(move || {
        let mut delivered = 0u64;
        let mut buf = [0u8; 65_536];
        while let Ok(len) = reader.recv(&mut buf) {
            delivered += buf[..len].split(|b| *b == b'\n').count() as u64;
        }
        delivered
    });

    let started = Instant::now();
    for i in 0..10_000 {
        client.incr("burst", i + 1);
    }
    assert!(started.elapsed() < Duration::from_secs(5));

    client.shutdown();
    let delivered = reader.join().unwrap();
    let telemetry = client.telemetry();
    assert!(telemetry.metrics_dropped_queue_full > 0);
    assert_eq!(delivered + telemetry.metrics_dropped_queue_full, 10_000);
    assert_eq!(telemetry.metrics_dropped_closed, 0);
    assert_eq!(telemetry.metrics_dropped_oversized, 0);
    assert_eq!(telemetry.metrics_discarded_backoff, 0);
}

#[test]
fn shutdown_is_idempotent_and_drops_later_metrics() {
    let listener = listener();
    let client = builder_for(&listener).build().unwrap();
    let clone = client.clone();

    client.incr("before", 1);
    client.shutdown();
    clone.shutdown();
    clone.incr("after", 1);

    assert_eq!(drain_lines(&listener), ["before:1|c"]);

    let telemetry = client.telemetry();
    assert_eq!(telemetry.metrics_dropped_closed, 1);
    assert_eq!(telemetry.metrics_dropped_queue_full, 0);
}

#[test]
fn delivery_resumes_after_collector_restart() {
    let first = listener();
    let addr = first.local_addr().unwrap();

    let client = builder_for(&first)
        .with_flush_interval(Duration::from_millis(20))
        .with_reconnect_interval(Duration::from_secs(2))
        .with_backoff_duration(Duration::from_millis(100))
        .build()
        .unwrap();

    client.incr("before", 1);
    let mut buf = [0u8; 1024];
    let len = first.recv(&mut buf).expect("expected a packet before the restart");
    assert_eq!(&buf[..len], b"before:1|c");

    // Sends fail while nothing is listening, which puts the client into backoff.
    drop(first);
    for _ in 0..10 {
        client.incr("lost", 1);
        std::thread::sleep(Duration::from_millis(20));
    }

    let telemetry = client.telemetry();
    assert!(telemetry.packets_failed >= 1);
    assert!(telemetry.metrics_discarded_backoff > 0);
    assert_eq!(telemetry.forced_reconnects, 0);

    let second = UdpSocket::bind(addr).unwrap();
    second.set_read_timeout(Some(Duration::from_millis(50))).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut resumed = false;
    while !resumed && Instant::now() < deadline {
        client.incr("after", 1);
        if let Ok(len) = second.recv(&mut buf) {
            let packet = String::from_utf8_lossy(&buf[..len]).into_owned();
            resumed = packet.split('\n').any(|line| line == "after:1|c");
        }
    }

    assert!(resumed, "delivery did not resume after the collector came back");
    client.shutdown();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn packets_never_exceed_maximum_size(
        max_packet_len in 5usize..64,
        names in prop::collection::vec("[a-z]{1,12}", 1..64),
    ) {
        let listener = listener();
        let client = builder_for(&listener)
            .with_maximum_packet_size(max_packet_len)
            .build()
            .unwrap();

        for name in &names {
            client.incr(name, 1);
        }
        client.shutdown();

        let expected = names
            .iter()
            .map(|name| format!("{name}:1|c"))
            .filter(|line| line.len() <= max_packet_len)
            .collect::<Vec<_>>();

        let packets = drain_packets(&listener);
        for packet in &packets {
            prop_assert!(packet.len() <= max_packet_len);
        }

        let lines = packets.iter().flat_map(|packet| packet.split('\n').map(str::to_string)).collect::<Vec<_>>();
        prop_assert_eq!(lines, expected);
        prop_assert_eq!(
            client.telemetry().metrics_dropped_oversized as usize,
            names.len() - packets.iter().map(|packet| packet.split('\n').count()).sum::<usize>()
        );
    }
}
