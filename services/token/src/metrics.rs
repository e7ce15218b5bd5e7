//! Prometheus metrics for the token service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auth_tokens_issued_total",
        "Total number of tokens issued",
        &["token_type"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Refresh rotations counter.
pub static TOKENS_ROTATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auth_tokens_rotated_total",
        "Total number of refresh token rotations",
        &["status"]
    )
    .expect("Failed to register tokens_rotated metric")
});

/// Origin anomalies counter.
pub static ORIGIN_ANOMALIES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auth_origin_anomalies_total",
        "Refresh rotations presented from a different client address",
        &["delivered"]
    )
    .expect("Failed to register origin_anomalies metric")
});

/// Record an issued token.
pub fn record_token_issued(token_type: &str) {
    TOKENS_ISSUED.with_label_values(&[token_type]).inc();
}

/// Record a rotation outcome.
pub fn record_rotation(status: &str) {
    TOKENS_ROTATED.with_label_values(&[status]).inc();
}

/// Record an origin anomaly and whether its alert was accepted.
pub fn record_origin_anomaly(delivered: bool) {
    let label = if delivered { "true" } else { "false" };
    ORIGIN_ANOMALIES.with_label_values(&[label]).inc();
}

/// Render the default registry in the text exposition format.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_token_issued() {
        record_token_issued("access");
        let value = TOKENS_ISSUED.with_label_values(&["access"]).get();
        assert!(value > 0.0);
    }

    #[test]
    fn test_record_origin_anomaly() {
        record_origin_anomaly(false);
        let value = ORIGIN_ANOMALIES.with_label_values(&["false"]).get();
        assert!(value > 0.0);
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        record_rotation("success");
        let text = render();
        assert!(text.contains("auth_tokens_rotated_total"));
    }
}
