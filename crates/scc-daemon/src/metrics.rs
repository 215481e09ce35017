//! Prometheus metrics for the daemon: recorder setup plus a thin
//! counter/gauge/histogram helper layer over the job, queue, and pipeline
//! events this process emits. No HTTP-request middleware or path
//! sanitizer, since this process has no HTTP surface to instrument.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-wide Prometheus recorder. Call once at startup.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new().install_recorder().expect("failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // Queue metrics
    pub const QUEUE_LENGTH: &str = "scc_queue_length";
    pub const QUEUE_DLQ_LENGTH: &str = "scc_queue_dlq_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "scc_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "scc_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "scc_jobs_failed_total";
    pub const JOBS_RETRIED_TOTAL: &str = "scc_jobs_retried_total";
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "scc_jobs_dead_lettered_total";

    // Pipeline stage metrics
    pub const STAGE_DURATION_SECONDS: &str = "scc_stage_duration_seconds";
    pub const RECORDINGS_DISCOVERED_TOTAL: &str = "scc_recordings_discovered_total";
    pub const VODS_NEEDING_REVIEW_TOTAL: &str = "scc_vods_needing_review_total";
    pub const CAPTION_CHECK_REPAIRS_TOTAL: &str = "scc_caption_check_repairs_total";

    // Scan metrics
    pub const SCAN_DURATION_SECONDS: &str = "scc_scan_duration_seconds";
    pub const VOLUME_UNAVAILABLE_TOTAL: &str = "scc_volume_unavailable_total";

    // External client metrics
    pub const CABLECAST_REQUEST_DURATION_SECONDS: &str = "scc_cablecast_request_duration_seconds";
    pub const ASR_REQUEST_DURATION_SECONDS: &str = "scc_asr_request_duration_seconds";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "scc_rate_limit_hits_total";
}

/// Update queue length gauge for one queue.
pub fn set_queue_length(queue: &str, length: u64) {
    let labels = [("queue", queue.to_string())];
    gauge!(names::QUEUE_LENGTH, &labels).set(length as f64);
}

/// Update DLQ length gauge for one queue.
pub fn set_dlq_length(queue: &str, length: u64) {
    let labels = [("queue", queue.to_string())];
    gauge!(names::QUEUE_DLQ_LENGTH, &labels).set(length as f64);
}

pub fn record_job_enqueued(template_name: &str) {
    let labels = [("template", template_name.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(template_name: &str) {
    let labels = [("template", template_name.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

pub fn record_job_failed(template_name: &str) {
    let labels = [("template", template_name.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_retried(template_name: &str) {
    let labels = [("template", template_name.to_string())];
    counter!(names::JOBS_RETRIED_TOTAL, &labels).increment(1);
}

pub fn record_job_dead_lettered(template_name: &str) {
    let labels = [("template", template_name.to_string())];
    counter!(names::JOBS_DEAD_LETTERED_TOTAL, &labels).increment(1);
}

/// Record how long one pipeline stage took for a run.
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_recordings_discovered(volume_id: &str, count: u64) {
    let labels = [("volume", volume_id.to_string())];
    counter!(names::RECORDINGS_DISCOVERED_TOTAL, &labels).increment(count);
}

pub fn record_vod_needs_review(volume_id: &str) {
    let labels = [("volume", volume_id.to_string())];
    counter!(names::VODS_NEEDING_REVIEW_TOTAL, &labels).increment(1);
}

pub fn record_caption_check_repair(volume_id: &str) {
    let labels = [("volume", volume_id.to_string())];
    counter!(names::CAPTION_CHECK_REPAIRS_TOTAL, &labels).increment(1);
}

pub fn record_scan_duration(volume_id: &str, duration_secs: f64) {
    let labels = [("volume", volume_id.to_string())];
    histogram!(names::SCAN_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_volume_unavailable(volume_id: &str) {
    let labels = [("volume", volume_id.to_string())];
    counter!(names::VOLUME_UNAVAILABLE_TOTAL, &labels).increment(1);
}

pub fn record_cablecast_request_duration(operation: &str, duration_secs: f64) {
    let labels = [("operation", operation.to_string())];
    histogram!(names::CABLECAST_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_asr_request_duration(duration_secs: f64) {
    histogram!(names::ASR_REQUEST_DURATION_SECONDS).record(duration_secs);
}

pub fn record_rate_limit_hit(client: &str) {
    let labels = [("client", client.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}
