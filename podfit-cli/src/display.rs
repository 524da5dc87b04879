use colored::*;
use podfit_core::catalog::GpuCard;
use podfit_core::fit::Workload;
use podfit_core::models::ModelArchitecture;
use podfit_core::plan::{AllocationPlan, Candidate};
use podfit_core::providers::{PodRequest, PodStatus};
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct GpuRow {
    #[tabled(rename = "GPU")]
    name: String,
    #[tabled(rename = "VRAM")]
    vram: String,
    #[tabled(rename = "Bandwidth")]
    bandwidth: String,
    #[tabled(rename = "FP16")]
    compute: String,
    #[tabled(rename = "KV")]
    kv_quant: String,
    #[tabled(rename = "$/hr")]
    price: String,
}

#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "GPU")]
    name: String,
    #[tabled(rename = "Count")]
    count: u32,
    #[tabled(rename = "$/hr")]
    price: String,
    #[tabled(rename = "Max Conc.")]
    concurrency: String,
    #[tabled(rename = "Mem %")]
    mem_use: String,
    #[tabled(rename = "Prompt tok/s")]
    prompt: String,
    #[tabled(rename = "Gen tok/s")]
    generation: String,
    #[tabled(rename = "Gen/user")]
    per_user: String,
}

pub fn display_architecture(arch: &ModelArchitecture) {
    println!(
        "Model Params: {:.2}B parameters ({}), {} layers, {} KV heads x {} dim",
        arch.total_params_b,
        arch.param_source.label(),
        arch.layers,
        arch.kv_heads,
        arch.head_dim
    );
    if arch.is_moe() {
        println!("  MoE: {:.2}B active parameters per token", arch.active_params_b);
    }
    if arch.param_source.is_estimate() {
        println!(
            "  {}",
            "Parameter count is an estimate; results may be off.".yellow()
        );
    }
}

pub fn display_gpus(cards: &[GpuCard]) {
    println!("\n{}", "=== GPU Catalog ===".bold().cyan());
    println!("Total GPUs: {}\n", cards.len());

    let rows: Vec<GpuRow> = cards
        .iter()
        .map(|c| GpuRow {
            name: c.name.clone(),
            vram: format!("{:.0} GB", c.vram_gb),
            bandwidth: format!("{:.0} GB/s", c.memory_bandwidth_gbs),
            compute: format!("{:.1}", c.fp16_compute),
            kv_quant: c.kv_quant.label().to_string(),
            price: format!("{:.2}", c.price_hr),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_candidates(candidates: &[Candidate], users: u32) {
    if candidates.is_empty() {
        println!(
            "\n{}",
            format!("No GPU setup can handle {} concurrent users.", users).yellow()
        );
        return;
    }

    println!("\n{}", "=== Qualifying GPU Setups ===".bold().cyan());
    println!("Found {} setup(s) for {} user(s)\n", candidates.len(), users);

    let rows: Vec<CandidateRow> = candidates
        .iter()
        .filter_map(|c| {
            let est = c.estimate()?;
            Some(CandidateRow {
                name: c.gpu.name.clone(),
                count: c.gpu_count,
                price: format!("{:.2}", c.total_price_hr()),
                concurrency: format!("{:.1}x", est.max_concurrency),
                mem_use: format!("{:.1}%", est.utilization_pct),
                prompt: format!("{:.0}", est.throughput.prompt_tps),
                generation: format!("{:.0}", est.throughput.generation_tps),
                per_user: format!("{:.1}", est.throughput.generation_tps_per_user),
            })
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_plan(plan: &AllocationPlan, workload: &Workload) {
    let est = &plan.estimate;
    let mem = &est.memory;
    let tp = &est.throughput;

    println!(
        "\n{}",
        format!(
            "--- Best Setup found: {}x {} (${:.2}/hr) ---",
            plan.gpu_count, plan.gpu.name, plan.total_price_hr
        )
        .bold()
        .green()
    );

    println!("{}", "VRAM Breakdown (per GPU pool):".bold().underline());
    println!("  - Model Weights: {:.2} GB", est.per_gpu(mem.model_gb));
    println!(
        "  - Activation OH: {:.2} GB (estimated)",
        est.per_gpu(mem.activation_overhead_gb)
    );
    println!("  - KV Cache (1x): {:.2} GB", mem.kv_cache_per_context_gb);
    println!(
        "  - System Reserv: {:.2} GB (outside serving pool)",
        est.per_gpu(mem.reserved_gb)
    );
    println!(
        "  - Total Managed: {:.2} GB (utilization: {})",
        est.per_gpu(mem.managed_pool_gb),
        workload.gpu_utilization
    );
    println!();

    println!("{}", "Concurrency Estimates:".bold().underline());
    println!(
        "  - Max Concurrency: {:.2}x (at {} tokens)",
        est.max_concurrency, workload.max_context_tokens
    );
    println!("  - Total Capacity:  {:.0} tokens", est.max_tokens);
    println!();

    println!(
        "{}",
        format!("Performance Estimates (for {} users):", workload.users)
            .bold()
            .underline()
    );
    println!("  - Prompt Speed:  {:.0} tok/s", tp.prompt_tps);
    println!("  - Gen Speed:     {:.0} tok/s", tp.generation_tps);
    println!("  - Per User Gen:  {:.1} tok/s", tp.generation_tps_per_user);
}

pub fn display_pod_request(request: &PodRequest, mutation: &str) {
    println!("\n{}", "Dry run: pod request not sent".yellow().bold());
    println!("  GPU: {}x {}", request.gpu_count, request.gpu_type_id);
    println!("  Request: {}", mutation);
}

pub fn display_pod_status(pod_id: &str, status: &PodStatus) {
    match status {
        PodStatus::Unknown => println!("Pod {}: {}", pod_id, "unknown".yellow()),
        PodStatus::Other { state } => println!("Pod {}: {}", pod_id, state.yellow()),
        PodStatus::Running { address, ports } => {
            println!("Pod {}: {}", pod_id, "running".green().bold());
            println!("  Address: {}", address);
            for p in ports {
                println!(
                    "  Port {} -> {}:{} ({})",
                    p.private_port,
                    p.ip.as_deref().unwrap_or("-"),
                    p.public_port.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                    p.kind.as_deref().unwrap_or("tcp")
                );
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────
// JSON output for machine consumption
// ────────────────────────────────────────────────────────────────────

pub fn display_json_plan(
    arch: &ModelArchitecture,
    workload: &Workload,
    plan: &AllocationPlan,
    deployment: Option<serde_json::Value>,
) {
    print_json(&plan_document(arch, workload, plan, deployment));
}

/// The single JSON document `plan --json` writes to stdout.
fn plan_document(
    arch: &ModelArchitecture,
    workload: &Workload,
    plan: &AllocationPlan,
    deployment: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut output = serde_json::json!({
        "model": arch_json(arch),
        "request": request_json(workload),
        "plan": plan_json(plan),
    });
    if let Some(deployment) = deployment {
        output["deployment"] = deployment;
    }
    output
}

pub fn dry_run_json(request: &PodRequest, mutation: &str) -> serde_json::Value {
    serde_json::json!({
        "dry_run": true,
        "pod_request": request,
        "mutation": mutation,
    })
}

pub fn pod_json(pod_id: &str, status: Option<&PodStatus>) -> serde_json::Value {
    serde_json::json!({ "id": pod_id, "status": status })
}

pub fn display_json_candidates(
    arch: &ModelArchitecture,
    workload: &Workload,
    candidates: &[Candidate],
) {
    let setups: Vec<serde_json::Value> = candidates
        .iter()
        .filter_map(|c| {
            let est = c.estimate()?;
            Some(serde_json::json!({
                "gpu": c.gpu.name,
                "gpu_count": c.gpu_count,
                "total_price_hr": round2(c.total_price_hr()),
                "max_concurrency": round2(est.max_concurrency),
                "utilization_pct": round1(est.utilization_pct),
                "generation_tps": round1(est.throughput.generation_tps),
                "prompt_tps": round1(est.throughput.prompt_tps),
            }))
        })
        .collect();
    let output = serde_json::json!({
        "model": arch_json(arch),
        "request": request_json(workload),
        "candidates": setups,
    });
    print_json(&output);
}

pub fn display_json_gpus(cards: &[GpuCard]) {
    print_json(&serde_json::json!({ "gpus": cards }));
}

pub fn display_json_value(value: &serde_json::Value) {
    print_json(value);
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization failed: {}", e),
    }
}

fn arch_json(arch: &ModelArchitecture) -> serde_json::Value {
    serde_json::json!({
        "name": arch.name,
        "total_params_b": round2(arch.total_params_b),
        "active_params_b": round2(arch.active_params_b),
        "layers": arch.layers,
        "kv_heads": arch.kv_heads,
        "head_dim": arch.head_dim,
        "param_source": arch.param_source,
    })
}

fn request_json(workload: &Workload) -> serde_json::Value {
    serde_json::json!({
        "quant": workload.weight_quant.label(),
        "kv_quant": workload.kv_quant.label(),
        "max_length": workload.max_context_tokens,
        "users": workload.users,
        "gpu_utilization": workload.gpu_utilization,
    })
}

fn plan_json(plan: &AllocationPlan) -> serde_json::Value {
    let est = &plan.estimate;
    let mem = &est.memory;
    serde_json::json!({
        "gpu": plan.gpu.name,
        "provider_id": plan.gpu.provider_id,
        "gpu_count": plan.gpu_count,
        "total_price_hr": round2(plan.total_price_hr),
        "memory_gb": {
            "model": round2(mem.model_gb),
            "activation_overhead": round2(mem.activation_overhead_gb),
            "kv_cache_per_context": round2(mem.kv_cache_per_context_gb),
            "reserved": round2(mem.reserved_gb),
            "managed_pool": round2(mem.managed_pool_gb),
            "total_required": round2(mem.total_required_gb),
        },
        "max_concurrency": round2(est.max_concurrency),
        "max_tokens": est.max_tokens.floor(),
        "utilization_pct": round1(est.utilization_pct),
        "throughput": {
            "prompt_tps": round1(est.throughput.prompt_tps),
            "generation_tps": round1(est.throughput.generation_tps),
            "prompt_tps_per_user": round1(est.throughput.prompt_tps_per_user),
            "generation_tps_per_user": round1(est.throughput.generation_tps_per_user),
        },
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
