//! Prompt and generation speed estimates.
//!
//! Prefill is treated as compute-bound and decode as memory-bandwidth-bound.
//! Multiple GPUs scale sub-linearly.

use crate::quant::QuantScheme;

/// Exponent applied to GPU count for compute.
pub const COMPUTE_SCALING_EXP: f64 = 0.6;
/// Exponent applied to GPU count for memory bandwidth.
pub const BANDWIDTH_SCALING_EXP: f64 = 0.8;

pub fn effective_compute(fp16_compute: f64, gpu_count: u32) -> f64 {
    fp16_compute * (gpu_count as f64).powf(COMPUTE_SCALING_EXP)
}

pub fn effective_bandwidth(bandwidth_gbs: f64, gpu_count: u32) -> f64 {
    bandwidth_gbs * (gpu_count as f64).powf(BANDWIDTH_SCALING_EXP)
}

/// Prefill tokens/sec. `1000` maps the compute proxy to tok/s and `sqrt(2)`
/// accounts for average utilization loss during prefill.
pub fn prompt_throughput(effective_compute: f64, total_params_b: f64) -> f64 {
    if total_params_b <= 0.0 {
        return 0.0;
    }
    effective_compute * 1000.0 / (total_params_b * std::f64::consts::SQRT_2)
}

/// Decode tokens/sec: every generated token reads the active weights once.
pub fn generation_throughput(
    effective_bandwidth: f64,
    active_params_b: f64,
    bytes_per_param: f64,
) -> f64 {
    let bytes_per_token = active_params_b * bytes_per_param;
    if bytes_per_token <= 0.0 {
        return 0.0;
    }
    effective_bandwidth / bytes_per_token
}

/// Aggregate and per-user speed for one deployment.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ThroughputEstimate {
    pub prompt_tps: f64,
    pub generation_tps: f64,
    pub prompt_tps_per_user: f64,
    pub generation_tps_per_user: f64,
}

impl ThroughputEstimate {
    /// Per-user figures assume uniform time slicing between `users`.
    pub fn estimate(
        fp16_compute: f64,
        bandwidth_gbs: f64,
        gpu_count: u32,
        total_params_b: f64,
        active_params_b: f64,
        weight_quant: QuantScheme,
        users: u32,
    ) -> Self {
        let prompt_tps =
            prompt_throughput(effective_compute(fp16_compute, gpu_count), total_params_b);
        let generation_tps = generation_throughput(
            effective_bandwidth(bandwidth_gbs, gpu_count),
            active_params_b,
            weight_quant.bytes_per_param(),
        );
        let share = users.max(1) as f64;

        ThroughputEstimate {
            prompt_tps,
            generation_tps,
            prompt_tps_per_user: prompt_tps / share,
            generation_tps_per_user: generation_tps / share,
        }
    }
}
