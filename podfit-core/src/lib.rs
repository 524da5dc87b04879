//! Capacity planning for LLM serving on rented GPUs.
//!
//! [`fit::evaluate`] answers "does this model fit on N of this GPU, and how
//! fast will it be"; [`plan::find_best_allocation`] sweeps a [`GpuCatalog`]
//! for the cheapest setup that serves the requested number of concurrent
//! full-length contexts.

pub mod catalog;
pub mod error;
pub mod fit;
pub mod memory;
pub mod models;
pub mod plan;
pub mod providers;
pub mod quant;
pub mod throughput;

pub use catalog::{GpuCard, GpuCatalog};
pub use error::{CatalogError, MetadataError, PlanError, ProvisionError};
pub use fit::{CapacityExceeded, EvaluationResult, PerformanceEstimate, Workload};
pub use models::ModelArchitecture;
pub use plan::{AllocationPlan, AllocationRequest};
pub use quant::QuantScheme;
