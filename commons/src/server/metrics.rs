//! Prometheus request metrics.

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};

use super::ServerError;

/// Metric namespace for a service name: lowercase, with anything outside
/// `[a-z0-9_]` replaced by `_`.
fn namespace(service_name: &str) -> String {
    let name: String = service_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{name}")
    } else {
        name
    }
}

pub(super) fn build(service_name: &str, path: &str) -> Result<PrometheusMetrics, ServerError> {
    PrometheusMetricsBuilder::new(&namespace(service_name))
        .endpoint(path)
        .build()
        .map_err(|err| ServerError::Metrics(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("orders", "orders")]
    #[case("Order-Service.v2", "order_service_v2")]
    #[case("3d-render", "_3d_render")]
    fn namespaces_are_prometheus_safe(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(namespace(input), expected);
    }
}
