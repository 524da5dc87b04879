use crate::catalog::GpuCard;
use crate::error::PlanError;
use crate::memory::{self, MemoryBreakdown};
use crate::models::ModelArchitecture;
use crate::quant::QuantScheme;
use crate::throughput::ThroughputEstimate;

/// vLLM's default `--gpu-memory-utilization`.
pub const DEFAULT_GPU_UTILIZATION: f64 = 0.9;
pub const DEFAULT_MAX_CONTEXT: u32 = 8192;

/// Everything about the serving load that does not depend on the GPU.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Workload {
    pub architecture: ModelArchitecture,
    pub weight_quant: QuantScheme,
    pub kv_quant: QuantScheme,
    pub max_context_tokens: u32,
    pub users: u32,
    /// Fraction of VRAM handed to the serving runtime, in (0, 1].
    pub gpu_utilization: f64,
}

impl Workload {
    pub fn new(architecture: ModelArchitecture) -> Self {
        Workload {
            architecture,
            weight_quant: QuantScheme::Int4,
            kv_quant: QuantScheme::Fp8,
            max_context_tokens: DEFAULT_MAX_CONTEXT,
            users: 1,
            gpu_utilization: DEFAULT_GPU_UTILIZATION,
        }
    }

    pub fn with_quant(mut self, weight_quant: QuantScheme, kv_quant: QuantScheme) -> Self {
        self.weight_quant = weight_quant;
        self.kv_quant = kv_quant;
        self
    }

    pub fn with_max_context(mut self, tokens: u32) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    pub fn with_users(mut self, users: u32) -> Self {
        self.users = users;
        self
    }

    pub fn with_gpu_utilization(mut self, utilization: f64) -> Self {
        self.gpu_utilization = utilization;
        self
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        self.architecture.validate()?;
        if !(self.gpu_utilization > 0.0 && self.gpu_utilization <= 1.0) {
            return Err(PlanError::InvalidUtilization(self.gpu_utilization));
        }
        if self.max_context_tokens == 0 {
            return Err(PlanError::ZeroContext);
        }
        if self.users == 0 {
            return Err(PlanError::ZeroUsers);
        }
        Ok(())
    }

    /// Weight memory; independent of GPU count.
    pub fn weight_memory_gb(&self) -> f64 {
        memory::weight_memory_gb(self.architecture.total_params_b, self.weight_quant)
    }

    /// KV cache for one full-length context; independent of GPU count.
    pub fn kv_cache_per_context_gb(&self) -> f64 {
        let arch = &self.architecture;
        memory::kv_cache_per_context_gb(
            arch.layers,
            arch.kv_heads,
            arch.head_dim,
            self.max_context_tokens,
            self.kv_quant,
        )
    }

    /// Memory accounting for `gpu_count` cards of `gpu`.
    pub fn memory_breakdown(&self, gpu: &GpuCard, gpu_count: u32) -> MemoryBreakdown {
        let model_gb = self.weight_memory_gb();
        let kv_cache_per_context_gb = self.kv_cache_per_context_gb();

        let total_vram = gpu.vram_gb * gpu_count as f64;
        let managed_pool_gb = memory::pool_budget_gb(total_vram, self.gpu_utilization);
        let activation_overhead_gb = memory::activation_overhead_gb(model_gb, gpu_count);

        MemoryBreakdown {
            model_gb,
            activation_overhead_gb,
            kv_cache_per_context_gb,
            reserved_gb: total_vram - managed_pool_gb,
            managed_pool_gb,
            total_required_gb: model_gb + kv_cache_per_context_gb + activation_overhead_gb,
        }
    }
}

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PerformanceEstimate {
    pub gpu_count: u32,
    pub memory: MemoryBreakdown,
    pub throughput: ThroughputEstimate,
    /// Full-length contexts that fit at once. Fractional.
    pub max_concurrency: f64,
    /// `max_context_tokens * max_concurrency`.
    pub max_tokens: f64,
    /// Required memory as a share of the managed pool.
    pub utilization_pct: f64,
}

impl PerformanceEstimate {
    /// Per-GPU view of a pooled figure, for display.
    pub fn per_gpu(&self, gb: f64) -> f64 {
        gb / self.gpu_count.max(1) as f64
    }
}

/// The model plus one full context does not fit in the managed pool.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "Insufficient VRAM: need {:.2} GB (incl. overhead) but managed pool is {:.2} GB",
    .memory.total_required_gb,
    .memory.managed_pool_gb
)]
pub struct CapacityExceeded {
    pub memory: MemoryBreakdown,
}

pub type EvaluationResult = Result<PerformanceEstimate, CapacityExceeded>;

/// Evaluate `workload` on `gpu_count` cards of `gpu`.
///
/// Succeeds when weights, one full context and activation overhead fit in
/// the managed pool; the boundary itself counts as a fit.
pub fn evaluate(gpu: &GpuCard, gpu_count: u32, workload: &Workload) -> EvaluationResult {
    let memory = workload.memory_breakdown(gpu, gpu_count);

    if !memory.fits() {
        tracing::trace!(
            gpu = %gpu.name,
            gpu_count,
            required_gb = memory.total_required_gb,
            pool_gb = memory.managed_pool_gb,
            "capacity exceeded"
        );
        return Err(CapacityExceeded { memory });
    }

    let arch = &workload.architecture;
    let throughput = ThroughputEstimate::estimate(
        gpu.fp16_compute,
        gpu.memory_bandwidth_gbs,
        gpu_count,
        arch.total_params_b,
        arch.active_params_b,
        workload.weight_quant,
        workload.users,
    );
    let max_concurrency = memory.max_concurrency();
    let utilization_pct = if memory.managed_pool_gb > 0.0 {
        memory.total_required_gb / memory.managed_pool_gb * 100.0
    } else {
        0.0
    };

    Ok(PerformanceEstimate {
        gpu_count,
        memory,
        throughput,
        max_concurrency,
        max_tokens: workload.max_context_tokens as f64 * max_concurrency,
        utilization_pct,
    })
}
