//metrics.rs
use lazy_static::lazy_static;
use prometheus::{register_counter, register_histogram, Counter, Histogram, HistogramOpts, Opts};

lazy_static! {
    pub static ref REFRESHES: Counter = register_counter!(Opts::new(
        "notification_refreshes_total",
        "Total number of page-0 refreshes applied"
    ))
    .unwrap();

    pub static ref FETCH_FAILURES: Counter = register_counter!(Opts::new(
        "notification_fetch_failures_total",
        "Total number of failed notification fetches"
    ))
    .unwrap();

    pub static ref MUTATIONS: Counter = register_counter!(Opts::new(
        "notification_mutations_total",
        "Total number of optimistic mutations applied"
    ))
    .unwrap();

    pub static ref ROLLBACKS: Counter = register_counter!(Opts::new(
        "notification_rollbacks_total",
        "Total number of optimistic mutations rolled back"
    ))
    .unwrap();

    pub static ref RESYNCS: Counter = register_counter!(Opts::new(
        "notification_resyncs_total",
        "Total number of failed mutations reconciled by a refresh"
    ))
    .unwrap();

    pub static ref FETCH_TIME: Histogram = register_histogram!(
        HistogramOpts::new(
            "notification_fetch_seconds",
            "Time taken to fetch a page of notifications"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    )
    .unwrap();
}

pub fn metrics_text() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return format!("Error encoding metrics: {}", e);
    }

    match String::from_utf8(buffer) {
        Ok(metrics) => metrics,
        Err(e) => format!("Error converting metrics to string: {}", e),
    }
}
