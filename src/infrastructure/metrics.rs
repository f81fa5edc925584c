// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 在指定地址启动Prometheus导出器并注册应用指标
pub fn init_metrics(listen: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = listen.parse()?;

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return Ok(());
    }

    describe_counter!(
        "autoconnect_jobs_total",
        "Total number of connection jobs by outcome"
    );
    describe_histogram!(
        "autoconnect_job_duration_seconds",
        "Duration of connection jobs in seconds"
    );
    describe_counter!(
        "autoconnect_reconcile_runs_total",
        "Total number of reconciliation passes by outcome"
    );
    describe_counter!(
        "autoconnect_entries_connected_total",
        "Total number of queue entries promoted to connected"
    );

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}
