//! VRAM accounting for a serving deployment.
//!
//! All figures are in GB (2^30 bytes for the KV cache, parameter-billions
//! times bytes for weights, matching how serving runtimes report them).

use crate::quant::QuantScheme;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Share of weight memory assumed for activations, per GPU.
const ACTIVATION_FRACTION: f64 = 0.10;
const ACTIVATION_MIN_GB: f64 = 1.0;
const ACTIVATION_MAX_GB: f64 = 4.0;

/// Memory taken by the model weights.
pub fn weight_memory_gb(total_params_b: f64, scheme: QuantScheme) -> f64 {
    total_params_b * scheme.bytes_per_param() * scheme.weight_safety_factor()
}

/// KV-cache memory for one request filled to `max_context_tokens`.
/// The factor 2 covers both the key and the value tensor.
pub fn kv_cache_per_context_gb(
    layers: u32,
    kv_heads: u32,
    head_dim: u32,
    max_context_tokens: u32,
    scheme: QuantScheme,
) -> f64 {
    let values =
        head_dim as f64 * kv_heads as f64 * layers as f64 * 2.0 * max_context_tokens as f64;
    values * scheme.bytes_per_param() / BYTES_PER_GIB
}

/// Portion of VRAM the serving runtime is allowed to manage.
pub fn pool_budget_gb(total_vram_gb: f64, utilization: f64) -> f64 {
    total_vram_gb * utilization
}

/// Heuristic activation overhead, clamped per GPU then scaled by GPU count.
pub fn activation_overhead_gb(weight_memory_gb: f64, gpu_count: u32) -> f64 {
    (weight_memory_gb * ACTIVATION_FRACTION).clamp(ACTIVATION_MIN_GB, ACTIVATION_MAX_GB)
        * gpu_count as f64
}

/// Where the VRAM of a (GPU, count) pool goes.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MemoryBreakdown {
    pub model_gb: f64,
    pub activation_overhead_gb: f64,
    /// One full-length context.
    pub kv_cache_per_context_gb: f64,
    /// VRAM outside the managed pool.
    pub reserved_gb: f64,
    pub managed_pool_gb: f64,
    /// Weights + one context + activations.
    pub total_required_gb: f64,
}

impl MemoryBreakdown {
    pub fn fits(&self) -> bool {
        self.total_required_gb <= self.managed_pool_gb
    }

    /// Pool left for KV cache once weights and activations are placed.
    pub fn usable_kv_gb(&self) -> f64 {
        (self.managed_pool_gb - self.model_gb - self.activation_overhead_gb).max(0.0)
    }

    /// Number of full-length contexts that fit in the usable KV pool.
    pub fn max_concurrency(&self) -> f64 {
        if self.kv_cache_per_context_gb > 0.0 {
            self.usable_kv_gb() / self.kv_cache_per_context_gb
        } else {
            0.0
        }
    }

    pub fn shortfall_gb(&self) -> f64 {
        (self.total_required_gb - self.managed_pool_gb).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_weight_memory_7b_int4() {
        assert!(close(weight_memory_gb(7.0, QuantScheme::Int4), 4.15625));
    }

    #[test]
    fn test_weight_memory_linear_in_params() {
        for q in QuantScheme::ALL {
            let slope = q.bytes_per_param() * q.weight_safety_factor();
            for params in [0.5, 7.0, 13.0, 70.0, 405.0] {
                assert!(close(weight_memory_gb(params, q), params * slope));
            }
        }
        assert!(close(weight_memory_gb(70.0, QuantScheme::Fp16), 140.0));
        assert!(close(weight_memory_gb(8.0, QuantScheme::Int8), 8.0));
    }

    #[test]
    fn test_kv_cache_gqa_8k_fp8() {
        let gb = kv_cache_per_context_gb(32, 8, 128, 8192, QuantScheme::Fp8);
        assert!(close(gb, 0.5));
        // fp16 doubles it
        let gb16 = kv_cache_per_context_gb(32, 8, 128, 8192, QuantScheme::Fp16);
        assert!(close(gb16, 1.0));
    }

    #[test]
    fn test_kv_cache_zero_context() {
        assert_eq!(kv_cache_per_context_gb(32, 8, 128, 0, QuantScheme::Fp8), 0.0);
    }

    #[test]
    fn test_pool_budget() {
        assert!(close(pool_budget_gb(24.0, 0.9), 21.6));
        assert_eq!(pool_budget_gb(0.0, 0.9), 0.0);
    }

    #[test]
    fn test_activation_overhead_clamped() {
        // 4.15625 * 0.1 < 1.0 -> floor
        assert!(close(activation_overhead_gb(4.15625, 1), 1.0));
        // 20 * 0.1 = 2.0 inside the band
        assert!(close(activation_overhead_gb(20.0, 1), 2.0));
        // 140 * 0.1 > 4.0 -> ceiling, scaled by count
        assert!(close(activation_overhead_gb(140.0, 4), 16.0));
    }

    #[test]
    fn test_breakdown_zero_cache_has_zero_concurrency() {
        let b = MemoryBreakdown {
            model_gb: 4.0,
            activation_overhead_gb: 1.0,
            kv_cache_per_context_gb: 0.0,
            reserved_gb: 2.4,
            managed_pool_gb: 21.6,
            total_required_gb: 5.0,
        };
        assert!(b.fits());
        assert_eq!(b.max_concurrency(), 0.0);
        assert_eq!(b.shortfall_gb(), 0.0);
    }

    #[test]
    fn test_breakdown_usable_never_negative() {
        let b = MemoryBreakdown {
            model_gb: 40.0,
            activation_overhead_gb: 4.0,
            kv_cache_per_context_gb: 0.5,
            reserved_gb: 2.4,
            managed_pool_gb: 21.6,
            total_required_gb: 44.5,
        };
        assert!(!b.fits());
        assert_eq!(b.usable_kv_gb(), 0.0);
        assert_eq!(b.max_concurrency(), 0.0);
        assert!(close(b.shortfall_gb(), 22.9));
    }
}
