//! Cheapest GPU setup that can serve a workload.
//!
//! Every (GPU count, card) pair is evaluated. Candidates are evaluated in
//! parallel and then reduced sequentially in (count, catalog) order, so the
//! chosen plan never depends on thread scheduling.

use std::cmp::Ordering;
use std::ops::RangeInclusive;

use rayon::prelude::*;

use crate::catalog::{GpuCard, GpuCatalog};
use crate::error::PlanError;
use crate::fit::{self, EvaluationResult, PerformanceEstimate, Workload};

pub const MIN_GPU_COUNT: u32 = 1;
pub const MAX_GPU_COUNT: u32 = 8;

/// Hourly costs closer than this are considered equal.
pub const COST_TIE_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AllocationRequest {
    pub workload: Workload,
}

impl AllocationRequest {
    pub fn new(workload: Workload) -> Self {
        AllocationRequest { workload }
    }

    pub fn gpu_counts(&self) -> RangeInclusive<u32> {
        MIN_GPU_COUNT..=MAX_GPU_COUNT
    }
}

/// One evaluated (card, count) combination.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub gpu: &'a GpuCard,
    pub gpu_count: u32,
    pub result: EvaluationResult,
}

impl Candidate<'_> {
    pub fn total_price_hr(&self) -> f64 {
        self.gpu.price_hr * self.gpu_count as f64
    }

    /// Fits in memory and supports `users` full-length contexts at once.
    pub fn qualifies(&self, users: u32) -> bool {
        matches!(&self.result, Ok(est) if est.max_concurrency >= users as f64)
    }

    pub fn estimate(&self) -> Option<&PerformanceEstimate> {
        self.result.as_ref().ok()
    }
}

/// The selected setup.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AllocationPlan {
    pub gpu: GpuCard,
    pub gpu_count: u32,
    pub estimate: PerformanceEstimate,
    pub total_price_hr: f64,
}

/// Evaluate every card at every GPU count, in (count, catalog) order.
pub fn evaluate_candidates<'a>(
    request: &AllocationRequest,
    catalog: &'a GpuCatalog,
) -> Vec<Candidate<'a>> {
    let pairs: Vec<(u32, &GpuCard)> = request
        .gpu_counts()
        .flat_map(|count| catalog.cards().iter().map(move |gpu| (count, gpu)))
        .collect();

    pairs
        .into_par_iter()
        .map(|(gpu_count, gpu)| Candidate {
            gpu,
            gpu_count,
            result: fit::evaluate(gpu, gpu_count, &request.workload),
        })
        .collect()
}

/// Pick the cheapest qualifying candidate. A candidate replaces the current
/// best when strictly cheaper, or when within `COST_TIE_EPSILON` and using
/// fewer GPUs. Catalog order is never a tie-breaker.
pub fn select_best<'c, 'a>(
    candidates: &'c [Candidate<'a>],
    users: u32,
) -> Option<&'c Candidate<'a>> {
    let mut best: Option<&Candidate<'a>> = None;
    for candidate in candidates.iter().filter(|c| c.qualifies(users)) {
        let price = candidate.total_price_hr();
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let current_price = current.total_price_hr();
                if (price - current_price).abs() < COST_TIE_EPSILON {
                    if candidate.gpu_count < current.gpu_count {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                } else if price < current_price {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

/// Qualifying candidates ordered by hourly cost, then GPU count.
pub fn qualifying_candidates<'a>(
    request: &AllocationRequest,
    catalog: &'a GpuCatalog,
) -> Vec<Candidate<'a>> {
    let users = request.workload.users;
    let mut qualifying: Vec<Candidate<'a>> = evaluate_candidates(request, catalog)
        .into_iter()
        .filter(|c| c.qualifies(users))
        .collect();
    qualifying.sort_by(|a, b| {
        a.total_price_hr()
            .partial_cmp(&b.total_price_hr())
            .unwrap_or(Ordering::Equal)
            .then(a.gpu_count.cmp(&b.gpu_count))
    });
    qualifying
}

/// Cheapest (card, count) that serves `request.workload.users` concurrent
/// full-length contexts.
pub fn find_best_allocation(
    request: &AllocationRequest,
    catalog: &GpuCatalog,
) -> Result<AllocationPlan, PlanError> {
    request.workload.validate()?;
    let users = request.workload.users;

    let candidates = evaluate_candidates(request, catalog);
    tracing::debug!(
        evaluated = candidates.len(),
        fitting = candidates.iter().filter(|c| c.result.is_ok()).count(),
        qualifying = candidates.iter().filter(|c| c.qualifies(users)).count(),
        "allocation sweep finished"
    );

    let best = select_best(&candidates, users).ok_or(PlanError::NoSolutionFound { users })?;
    let estimate = best.estimate().cloned().ok_or(PlanError::NoSolutionFound { users })?;

    tracing::info!(
        gpu = %best.gpu.name,
        gpu_count = best.gpu_count,
        price_hr = best.total_price_hr(),
        concurrency = estimate.max_concurrency,
        "selected allocation"
    );

    Ok(AllocationPlan {
        gpu: best.gpu.clone(),
        gpu_count: best.gpu_count,
        total_price_hr: best.total_price_hr(),
        estimate,
    })
}
