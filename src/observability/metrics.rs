use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub admissions_total: IntCounterVec,
    pub admission_latency_seconds: HistogramVec,
    pub transitions_total: IntCounterVec,
    pub geocode_requests_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let admissions_total = IntCounterVec::new(
            Opts::new("admissions_total", "Order admissions by outcome"),
            &["outcome"],
        )
        .expect("valid admissions_total metric");

        let admission_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "admission_latency_seconds",
                "Latency of order admission in seconds",
            ),
            &["outcome"],
        )
        .expect("valid admission_latency_seconds metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Lifecycle transitions by action and outcome"),
            &["action", "outcome"],
        )
        .expect("valid transitions_total metric");

        let geocode_requests_total = IntCounterVec::new(
            Opts::new("geocode_requests_total", "Upstream geocoding calls by outcome"),
            &["outcome"],
        )
        .expect("valid geocode_requests_total metric");

        registry
            .register(Box::new(admissions_total.clone()))
            .expect("register admissions_total");
        registry
            .register(Box::new(admission_latency_seconds.clone()))
            .expect("register admission_latency_seconds");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(geocode_requests_total.clone()))
            .expect("register geocode_requests_total");

        Self {
            registry,
            admissions_total,
            admission_latency_seconds,
            transitions_total,
            geocode_requests_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
