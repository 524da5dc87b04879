mod deploy;
mod display;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use podfit_core::ProvisionError;
use podfit_core::catalog::GpuCatalog;
use podfit_core::fit::{DEFAULT_GPU_UTILIZATION, Workload};
use podfit_core::models::ModelArchitecture;
use podfit_core::plan::{self, AllocationPlan, AllocationRequest};
use podfit_core::providers::{
    self, CloudProvider, HuggingFaceProvider, MetadataProvider, PodRequest, PodSource,
    RunpodProvider,
};
use podfit_core::quant::QuantScheme;

#[derive(Parser)]
#[command(name = "podfit")]
#[command(about = "Find the cheapest GPU pod that can serve an LLM", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output results as JSON (for tool integration)
    #[arg(long, global = true)]
    json: bool,

    /// Load the GPU catalog from a JSON file instead of the built-in table
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// More logging on stderr (-v debug, -vv trace). RUST_LOG also works.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args)]
struct WorkloadArgs {
    /// Hugging Face model id, e.g. meta-llama/Llama-3.1-8B-Instruct
    #[arg(long)]
    model: String,

    /// Weight quantization: fp16, fp8, int8, int4
    #[arg(long, default_value = "int4")]
    quant: QuantScheme,

    /// KV cache quantization: fp16, fp8, int8, int4
    #[arg(long, default_value = "fp8")]
    kv_quant: QuantScheme,

    /// Maximum context length per request (tokens)
    #[arg(long, default_value_t = 8192, value_parser = clap::value_parser!(u32).range(1..))]
    max_length: u32,

    /// Concurrent users, each at full context length
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    users: u32,

    /// GPU memory utilization handed to the serving runtime (0-1]
    #[arg(long, default_value_t = DEFAULT_GPU_UTILIZATION, value_parser = parse_utilization)]
    util: f64,

    /// Only consider GPUs whose name matches (case-insensitive regex or substring)
    #[arg(long, value_name = "PATTERN")]
    gpu: Option<String>,

    /// Continue with a guessed architecture if model metadata is unavailable
    #[arg(long)]
    assume_fallback: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick the cheapest GPU setup and optionally deploy it
    Plan {
        #[command(flatten)]
        workload: WorkloadArgs,

        /// RunPod template to deploy with
        #[arg(long, conflicts_with = "image")]
        template: Option<String>,

        /// Container image to deploy; started with generated vLLM arguments
        #[arg(long)]
        image: Option<String>,

        /// Print the provisioning request without sending it
        #[arg(long)]
        dry_run: bool,

        /// Seconds to wait for the pod to become reachable (0 to skip)
        #[arg(long, default_value_t = 600)]
        wait: u64,

        /// RunPod API key
        #[arg(long, env = "RUNPOD_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// List every GPU setup that meets the concurrency requirement
    Compare {
        #[command(flatten)]
        workload: WorkloadArgs,

        /// Limit number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show the GPU catalog
    Gpus {
        /// Only show GPUs whose name matches
        #[arg(long, value_name = "PATTERN")]
        gpu: Option<String>,
    },

    /// Show the status of a pod
    Status {
        pod_id: String,

        /// RunPod API key
        #[arg(long, env = "RUNPOD_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

fn parse_utilization(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if v > 0.0 && v <= 1.0 {
        Ok(v)
    } else {
        Err(format!("utilization must be in (0, 1], got {v}"))
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_catalog(path: &Option<PathBuf>, pattern: &Option<String>) -> anyhow::Result<GpuCatalog> {
    let catalog = match path {
        Some(p) => GpuCatalog::from_file(p)
            .with_context(|| format!("loading GPU catalog {}", p.display()))?,
        None => GpuCatalog::builtin(),
    };
    match pattern {
        Some(pat) => Ok(catalog.filter_by_name(pat)?),
        None => Ok(catalog),
    }
}

fn resolve_architecture(args: &WorkloadArgs, json: bool) -> anyhow::Result<ModelArchitecture> {
    let provider = HuggingFaceProvider::new();
    if !json {
        println!("Fetching model info for {}...", args.model);
    }
    let arch = if args.assume_fallback {
        providers::fetch_or_fallback(&provider, &args.model)
    } else {
        provider
            .fetch_architecture(&args.model)
            .with_context(|| format!("failed to fetch model info from {}", provider.name()))?
    };
    arch.validate()
        .with_context(|| format!("unusable metadata for {}", args.model))?;
    if !json {
        display::display_architecture(&arch);
    }
    Ok(arch)
}

fn build_request(args: &WorkloadArgs, arch: ModelArchitecture) -> AllocationRequest {
    AllocationRequest::new(
        Workload::new(arch)
            .with_quant(args.quant, args.kv_quant)
            .with_max_context(args.max_length)
            .with_users(args.users)
            .with_gpu_utilization(args.util),
    )
}

fn run_plan(
    cli: &Cli,
    args: &WorkloadArgs,
    source: Option<PodSource>,
    dry_run: bool,
    wait: u64,
    api_key: &Option<String>,
) -> anyhow::Result<()> {
    let catalog = load_catalog(&cli.catalog, &args.gpu)?;
    let arch = resolve_architecture(args, cli.json)?;
    let request = build_request(args, arch.clone());

    let plan = plan::find_best_allocation(&request, &catalog)?;

    if !cli.json {
        display::display_plan(&plan, &request.workload);
    }

    // Container deployments get vLLM arguments derived from the plan
    let source = source.map(|s| match s {
        PodSource::Container { image, .. } => PodSource::Container {
            image,
            args: providers::vllm_launch_args(&args.model, &plan, &request.workload),
        },
        template => template,
    });
    let deployment = match source {
        Some(source) => Some(deploy_plan(cli.json, &plan, source, dry_run, wait, api_key)?),
        None => {
            if !cli.json {
                println!("\nNo template or image provided. Skipping deployment.");
            }
            None
        }
    };

    if cli.json {
        display::display_json_plan(&arch, &request.workload, &plan, deployment);
    }
    Ok(())
}

/// Human-readable progress goes to stdout, or to the log when stdout carries JSON.
fn progress(json: bool, message: &str) {
    if json {
        tracing::info!("{message}");
    } else {
        println!("{message}");
    }
}

/// Deploy (or dry-run) the plan. Returns the JSON description of what happened.
fn deploy_plan(
    json: bool,
    plan: &AllocationPlan,
    source: PodSource,
    dry_run: bool,
    wait: u64,
    api_key: &Option<String>,
) -> anyhow::Result<serde_json::Value> {
    let pod_request = PodRequest::from_plan(plan, source);
    let mutation = providers::deploy_mutation(&pod_request);
    if dry_run {
        if !json {
            display::display_pod_request(&pod_request, &mutation);
        }
        return Ok(display::dry_run_json(&pod_request, &mutation));
    }

    let provider = RunpodProvider::new().with_api_key(api_key.clone());
    if !provider.has_api_key() {
        bail!(ProvisionError::MissingApiKey);
    }
    progress(
        json,
        &format!("\nDeploying {}x {} to {}...", plan.gpu_count, plan.gpu.name, provider.name()),
    );
    let pod = provider.create_pod(&pod_request).context("failed to create pod")?;
    progress(json, &format!("Pod created successfully! ID: {}", pod.id));

    if wait == 0 {
        return Ok(display::pod_json(&pod.id, None));
    }
    progress(json, "Waiting for connection details...");
    let status = deploy::wait_for_ready(&provider, &pod.id, Duration::from_secs(wait))?;
    if !json {
        display::display_pod_status(&pod.id, &status);
        if !status.is_running() {
            println!("Pod is not reachable yet; check again with `podfit status {}`.", pod.id);
        }
    }
    Ok(display::pod_json(&pod.id, Some(&status)))
}

fn run_compare(cli: &Cli, args: &WorkloadArgs, limit: Option<usize>) -> anyhow::Result<()> {
    let catalog = load_catalog(&cli.catalog, &args.gpu)?;
    let arch = resolve_architecture(args, cli.json)?;
    let request = build_request(args, arch.clone());
    request.workload.validate()?;

    let mut candidates = plan::qualifying_candidates(&request, &catalog);
    if let Some(n) = limit {
        candidates.truncate(n);
    }

    if cli.json {
        display::display_json_candidates(&arch, &request.workload, &candidates);
    } else {
        display::display_candidates(&candidates, args.users);
    }
    if candidates.is_empty() {
        bail!("no GPU setup can handle {} concurrent users", args.users);
    }
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Plan {
            workload,
            template,
            image,
            dry_run,
            wait,
            api_key,
        } => {
            let source = match (template, image) {
                (Some(template_id), _) => Some(PodSource::Template {
                    template_id: template_id.clone(),
                }),
                (None, Some(image)) => Some(PodSource::Container {
                    image: image.clone(),
                    args: Vec::new(),
                }),
                (None, None) => None,
            };
            run_plan(cli, workload, source, *dry_run, *wait, api_key)
        }

        Commands::Compare { workload, limit } => run_compare(cli, workload, *limit),

        Commands::Gpus { gpu } => {
            let catalog = load_catalog(&cli.catalog, gpu)?;
            if cli.json {
                display::display_json_gpus(catalog.cards());
            } else {
                display::display_gpus(catalog.cards());
            }
            Ok(())
        }

        Commands::Status { pod_id, api_key } => {
            let provider = RunpodProvider::new().with_api_key(api_key.clone());
            let status = provider.pod_status(pod_id)?;
            if cli.json {
                display::display_json_value(&display::pod_json(pod_id, Some(&status)));
            } else {
                display::display_pod_status(pod_id, &status);
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_serving_defaults() {
        let cli = Cli::try_parse_from(["podfit", "plan", "--model", "org/model-7b"]).unwrap();
        let Commands::Plan { workload, wait, dry_run, .. } = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(workload.quant, QuantScheme::Int4);
        assert_eq!(workload.kv_quant, QuantScheme::Fp8);
        assert_eq!(workload.max_length, 8192);
        assert_eq!(workload.users, 1);
        assert_eq!(workload.util, 0.9);
        assert_eq!(wait, 600);
        assert!(!dry_run);
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        let parse = |extra: &[&str]| {
            let mut args = vec!["podfit", "plan", "--model", "m"];
            args.extend_from_slice(extra);
            Cli::try_parse_from(args)
        };
        assert!(parse(&["--util", "1.5"]).is_err());
        assert!(parse(&["--users", "0"]).is_err());
        assert!(parse(&["--quant", "q4_k_m"]).is_err());
        assert!(parse(&["--template", "t", "--image", "i"]).is_err());
        assert!(parse(&["--image", "i", "--dry-run"]).is_ok());
    }

    #[test]
    fn test_parse_utilization() {
        assert_eq!(parse_utilization("0.85"), Ok(0.85));
        assert_eq!(parse_utilization("1"), Ok(1.0));
        assert!(parse_utilization("0").is_err());
        assert!(parse_utilization("abc").is_err());
    }

    #[test]
    fn test_build_request_carries_args() {
        let cli = Cli::try_parse_from([
            "podfit",
            "compare",
            "--model",
            "m",
            "--quant",
            "fp16",
            "--kv-quant",
            "fp16",
            "--users",
            "3",
            "--max-length",
            "4096",
            "--util",
            "0.8",
        ])
        .unwrap();
        let Commands::Compare { workload, .. } = cli.command else {
            panic!("expected compare");
        };
        let request = build_request(&workload, ModelArchitecture::fallback("m"));
        assert_eq!(request.workload.weight_quant, QuantScheme::Fp16);
        assert_eq!(request.workload.kv_quant, QuantScheme::Fp16);
        assert_eq!(request.workload.users, 3);
        assert_eq!(request.workload.max_context_tokens, 4096);
        assert_eq!(request.workload.gpu_utilization, 0.8);
    }

    #[test]
    fn test_load_catalog_with_filter() {
        let catalog = load_catalog(&None, &Some("a100".to_string())).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(load_catalog(&None, &Some("tpu".to_string())).is_err());
    }
}
