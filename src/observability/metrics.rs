use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::error::AppError;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub ride_transitions_total: IntCounterVec,
    pub dispatch_events_total: IntCounterVec,
    pub dispatch_queue_depth: IntGauge,
    pub payment_verifications_total: IntCounterVec,
    pub gateway_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, AppError> {
        let registry = Registry::new();

        let ride_transitions_total = IntCounterVec::new(
            Opts::new("ride_transitions_total", "Ride state transitions by outcome"),
            &["transition", "outcome"],
        )
        .map_err(metric_error)?;

        let dispatch_events_total = IntCounterVec::new(
            Opts::new(
                "dispatch_events_total",
                "ride_request events sent to candidate drivers by outcome",
            ),
            &["outcome"],
        )
        .map_err(metric_error)?;

        let dispatch_queue_depth =
            IntGauge::new("dispatch_queue_depth", "Rides waiting for dispatch fan-out")
                .map_err(metric_error)?;

        let payment_verifications_total = IntCounterVec::new(
            Opts::new(
                "payment_verifications_total",
                "Gateway callbacks by signature outcome",
            ),
            &["outcome"],
        )
        .map_err(metric_error)?;

        let gateway_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gateway_latency_seconds",
                "Latency of payment gateway order creation in seconds",
            ),
            &["outcome"],
        )
        .map_err(metric_error)?;

        registry
            .register(Box::new(ride_transitions_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(dispatch_events_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(dispatch_queue_depth.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(payment_verifications_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(gateway_latency_seconds.clone()))
            .map_err(metric_error)?;

        Ok(Self {
            registry,
            ride_transitions_total,
            dispatch_events_total,
            dispatch_queue_depth,
            payment_verifications_total,
            gateway_latency_seconds,
        })
    }

    pub fn record_transition(&self, transition: &str, outcome: &str) {
        self.ride_transitions_total
            .with_label_values(&[transition, outcome])
            .inc();
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

fn metric_error(err: prometheus::Error) -> AppError {
    AppError::Internal(format!("failed to set up metrics: {err}"))
}
