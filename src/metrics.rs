use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use once_cell::sync::Lazy;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static CHECK_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("website_checks_total", "Website checks by outcome");
    let ctr = IntCounterVec::new(opts, &["outcome"]).expect("creating check counter");
    REGISTRY.register(Box::new(ctr.clone())).expect("registering check counter");
    ctr
});

static LATENCY_HIST: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new("website_check_latency_milliseconds", "Probe latency in milliseconds")
        .buckets(vec![
            5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0,
            1000.0, 2500.0, 5000.0, 10000.0,
        ]);
    let hist = HistogramVec::new(opts, &["outcome"]).expect("creating latency histogram");
    REGISTRY.register(Box::new(hist.clone())).expect("registering latency histogram");
    hist
});

/// Outcome is one of `reachable`, `unreachable`, `rejected`, `store_error`.
pub fn inc_check(outcome: &str) {
    CHECK_COUNTER.with_label_values(&[outcome]).inc();
}

pub fn observe_latency(outcome: &str, latency_ms: f64) {
    LATENCY_HIST.with_label_values(&[outcome]).observe(latency_ms);
}

/// Text exposition of everything registered so far.
pub fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    // touch the lazies so an idle process still exports empty series
    Lazy::force(&CHECK_COUNTER);
    Lazy::force(&LATENCY_HIST);
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buf)?;
    Ok((encoder.format_type().to_string(), buf))
}
