//! Prometheus export of the metrics emitted through the `metrics` facade.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// Port of the `/metrics` endpoint when none is configured.
pub const DEFAULT_METRICS_PORT: u16 = 9000;

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// `install_recorder` sets a process wide recorder and fails when called twice, which tests do.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the recorder once and returns a handle rendering the current metrics.
///
/// Must be called inside a tokio runtime, which runs the periodic upkeep of the recorder.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *prometheus_handle = Some(handle.clone());

    let upkeep_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(UPKEEP_INTERVAL).await;
            trace!("running metrics upkeep");
            upkeep_handle.run_upkeep();
        }
    });

    Ok(handle)
}

/// Installs the recorder together with an HTTP listener serving `[::]:{port}/metrics`.
///
/// Every series is labeled with `pipeline` when `pipeline_id` is given.
pub fn init_metrics(port: u16, pipeline_id: Option<&str>) -> Result<(), BuildError> {
    let address = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
    let mut builder = PrometheusBuilder::new().with_http_listener(address);

    if let Some(pipeline_id) = pipeline_id {
        builder = builder.add_global_label("pipeline", pipeline_id);
    }

    builder.install()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_is_installed_once() {
        let first = init_metrics_handle().unwrap();
        let second = init_metrics_handle().unwrap();

        ::metrics::counter!("silver_test_total").increment(1);

        assert!(first.render().contains("silver_test_total"));
        assert!(second.render().contains("silver_test_total"));
    }
}
