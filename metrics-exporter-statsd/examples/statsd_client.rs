use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_statsd::StatsdBuilder;
use rand::Rng;

fn main() {
    tracing_subscriber::fmt::init();

    let client = StatsdBuilder::default()
        .with_remote_address("localhost:8125")
        .expect("failed to parse remote address")
        .with_prefix("%HOST%.example.")
        .install()
        .expect("failed to install StatsD recorder");

    let mut rng = rand::rng();
    let started = Instant::now();

    // Pretend to do some work for a while, reporting through both the client and the `metrics` macros.
    while started.elapsed() < Duration::from_secs(30) {
        let work = Duration::from_millis(rng.random_range(5..50));
        std::thread::sleep(work);

        counter!("loops").increment(1);
        histogram!("loop_delta_secs").record(work.as_secs_f64());
        client.precision_timing("loop_delta", work);

        if rand::random_bool(0.75) {
            gauge!("lucky_iterations").increment(1.0);
        } else {
            gauge!("lucky_iterations").decrement(1.0);
        }
    }

    client.gauge("queue_depth", -3);
    client.shutdown();

    println!("telemetry: {:?}", client.telemetry());
}
