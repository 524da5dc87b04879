//! Remote collaborators: model metadata and GPU pod provisioning.
//!
//! Nothing in the capacity model calls these. Callers resolve a
//! [`ModelArchitecture`] up front and hand the final [`AllocationPlan`] to a
//! [`CloudProvider`] afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MetadataError, ProvisionError};
use crate::fit::Workload;
use crate::models::{self, ModelArchitecture, ParamSource};
use crate::plan::AllocationPlan;
use crate::quant::QuantScheme;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Model metadata
// ---------------------------------------------------------------------------

/// Resolves a model id to the architecture figures the planner needs.
pub trait MetadataProvider {
    fn name(&self) -> &str;

    fn fetch_architecture(&self, model_id: &str) -> Result<ModelArchitecture, MetadataError>;
}

/// Fetch metadata, or fall back to [`ModelArchitecture::fallback`] with a
/// warning when the provider cannot answer.
pub fn fetch_or_fallback(provider: &dyn MetadataProvider, model_id: &str) -> ModelArchitecture {
    match provider.fetch_architecture(model_id) {
        Ok(arch) => arch,
        Err(e) => {
            tracing::warn!(
                model = model_id,
                error = %e,
                "metadata unavailable, using fallback architecture"
            );
            ModelArchitecture::fallback(model_id)
        }
    }
}

/// Reads `config.json` and the safetensors index from the Hugging Face Hub.
pub struct HuggingFaceProvider {
    endpoint: String,
    token: Option<String>,
}

impl Default for HuggingFaceProvider {
    fn default() -> Self {
        Self {
            endpoint: std::env::var("HF_ENDPOINT")
                .unwrap_or_else(|_| "https://huggingface.co".to_string()),
            token: std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}

impl HuggingFaceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_json(&self, url: &str) -> Result<Value, MetadataError> {
        let http_err = |e: ureq::Error| MetadataError::Http {
            url: url.to_string(),
            message: e.to_string(),
        };
        let mut req = ureq::get(url);
        if let Some(token) = &self.token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = req
            .config()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build()
            .call()
            .map_err(http_err)?;
        resp.into_body().read_json::<Value>().map_err(http_err)
    }

    /// Parameter total from the Hub's safetensors index, if published.
    fn safetensors_total(&self, model_id: &str) -> Option<u64> {
        let url = format!("{}/api/models/{}", self.endpoint.trim_end_matches('/'), model_id);
        match self.get_json(&url) {
            Ok(info) => info.pointer("/safetensors/total").and_then(Value::as_u64),
            Err(e) => {
                tracing::debug!(model = model_id, error = %e, "no safetensors index");
                None
            }
        }
    }
}

impl MetadataProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "Hugging Face"
    }

    fn fetch_architecture(&self, model_id: &str) -> Result<ModelArchitecture, MetadataError> {
        let url = format!(
            "{}/{}/resolve/main/config.json",
            self.endpoint.trim_end_matches('/'),
            model_id
        );
        let config = self.get_json(&url)?;
        if !config.is_object() {
            return Err(MetadataError::Malformed {
                model: model_id.to_string(),
                message: "config.json is not an object".to_string(),
            });
        }

        let safetensors = if declared_params(&config).is_none() {
            self.safetensors_total(model_id)
        } else {
            None
        };

        let arch = architecture_from_config(model_id, &config, safetensors);
        if arch.param_source.is_estimate() {
            tracing::warn!(
                model = model_id,
                params_b = arch.total_params_b,
                source = arch.param_source.label(),
                "parameter count not published"
            );
        }
        Ok(arch)
    }
}

/// Multimodal wrappers keep the language model config nested.
fn text_config(config: &Value) -> &Value {
    if let Some(text) = config.pointer("/thinker_config/text_config") {
        text
    } else if let Some(text) = config.get("text_config") {
        text
    } else {
        config
    }
}

/// `num_parameters` is sometimes serialized as a float, e.g. `7.24e9`.
fn declared_params(config: &Value) -> Option<f64> {
    config
        .get("num_parameters")
        .and_then(Value::as_f64)
        .filter(|n| *n > 0.0)
}

fn first_u64(config: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|k| config.get(*k).and_then(Value::as_u64))
        .find(|v| *v > 0)
}

/// Build an architecture from a Hugging Face `config.json`.
///
/// Missing shape fields fall back to 32 layers, 32 KV heads and 128 head
/// dim. The parameter count comes from `num_parameters`, then the
/// safetensors total, then the model name.
pub fn architecture_from_config(
    model_id: &str,
    config: &Value,
    safetensors_total: Option<u64>,
) -> ModelArchitecture {
    let text = text_config(config);

    let layers = first_u64(text, &["num_hidden_layers", "n_layer"])
        .unwrap_or(models::DEFAULT_LAYERS as u64);
    let attn_heads = first_u64(text, &["num_attention_heads", "n_head"]);
    let kv_heads = first_u64(text, &["num_key_value_heads"])
        .or(attn_heads)
        .unwrap_or(models::DEFAULT_KV_HEADS as u64);
    let head_dim = first_u64(text, &["head_dim"])
        .or_else(|| {
            let heads = attn_heads?;
            let hidden = first_u64(text, &["hidden_size"]).unwrap_or(4096);
            Some(hidden / heads).filter(|d| *d > 0)
        })
        .unwrap_or(models::DEFAULT_HEAD_DIM as u64);

    let (total_params_b, param_source) = match declared_params(config) {
        Some(n) => (n / 1e9, ParamSource::Config),
        None => match safetensors_total.filter(|n| *n > 0) {
            Some(n) => (n as f64 / 1e9, ParamSource::Safetensors),
            None => models::guess_params_from_name(model_id),
        },
    };

    let active_params_b = match (
        first_u64(text, &["num_experts"]),
        first_u64(text, &["num_experts_per_tok"]),
    ) {
        (Some(experts), per_tok) => per_tok.unwrap_or(1) as f64 / experts as f64 * total_params_b,
        (None, _) => total_params_b,
    };

    ModelArchitecture {
        name: model_id.to_string(),
        total_params_b,
        active_params_b: active_params_b.min(total_params_b),
        layers: layers as u32,
        kv_heads: kv_heads as u32,
        head_dim: head_dim as u32,
        param_source,
    }
}

// ---------------------------------------------------------------------------
// Pod provisioning
// ---------------------------------------------------------------------------

/// What the pod runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PodSource {
    /// A provider-side template that already defines image and arguments.
    Template { template_id: String },
    /// A container image started with the given arguments.
    Container { image: String, args: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodRequest {
    pub name: String,
    pub gpu_type_id: String,
    pub gpu_count: u32,
    pub source: PodSource,
    pub container_disk_gb: u32,
    pub ports: String,
}

impl PodRequest {
    pub fn from_plan(plan: &AllocationPlan, source: PodSource) -> Self {
        PodRequest {
            name: "llm-serving-pod".to_string(),
            gpu_type_id: plan.gpu.provider_id.clone(),
            gpu_count: plan.gpu_count,
            source,
            container_disk_gb: 50,
            ports: "8000/http".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodHandle {
    pub id: String,
    #[serde(default, rename = "desiredStatus")]
    pub desired_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub is_ip_public: bool,
    pub private_port: u16,
    #[serde(default)]
    pub public_port: Option<u16>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PodStatus {
    /// Pod not found or no status reported yet.
    Unknown,
    Running { address: String, ports: Vec<PortMapping> },
    /// Any other lifecycle state, e.g. "CREATED" or "EXITED".
    Other { state: String },
}

impl PodStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, PodStatus::Running { .. })
    }
}

/// Creates GPU pods and reports on them.
pub trait CloudProvider {
    fn name(&self) -> &str;

    fn create_pod(&self, request: &PodRequest) -> Result<PodHandle, ProvisionError>;

    fn pod_status(&self, pod_id: &str) -> Result<PodStatus, ProvisionError>;
}

/// RunPod GraphQL API.
pub struct RunpodProvider {
    api_url: String,
    api_key: Option<String>,
}

impl Default for RunpodProvider {
    fn default() -> Self {
        Self {
            api_url: std::env::var("RUNPOD_API_URL")
                .unwrap_or_else(|_| "https://api.runpod.io/graphql".to_string()),
            api_key: std::env::var("RUNPOD_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

impl RunpodProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer an explicit key over `RUNPOD_API_KEY`.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if api_key.is_some() {
            self.api_key = api_key;
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn graphql(&self, query: &str) -> Result<Value, ProvisionError> {
        let key = self.api_key.as_deref().ok_or(ProvisionError::MissingApiKey)?;
        let body = serde_json::json!({ "query": query });

        let resp = ureq::post(&self.api_url)
            .header("Authorization", &format!("Bearer {key}"))
            .config()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build()
            .send_json(&body)
            .map_err(|e| ProvisionError::Http(e.to_string()))?;
        let json: Value = resp
            .into_body()
            .read_json()
            .map_err(|e| ProvisionError::Response(e.to_string()))?;

        if let Some(errors) = json.get("errors").and_then(Value::as_array)
            && !errors.is_empty()
        {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            return Err(ProvisionError::Api(messages.join("; ")));
        }
        json.get("data")
            .cloned()
            .ok_or_else(|| ProvisionError::Response("missing data field".to_string()))
    }
}

impl CloudProvider for RunpodProvider {
    fn name(&self) -> &str {
        "RunPod"
    }

    fn create_pod(&self, request: &PodRequest) -> Result<PodHandle, ProvisionError> {
        let data = self.graphql(&deploy_mutation(request))?;
        let pod = data
            .get("podFindAndDeployOnDemand")
            .filter(|p| !p.is_null())
            .ok_or_else(|| {
                ProvisionError::Api("no capacity for the requested GPU type".to_string())
            })?;
        let handle: PodHandle = serde_json::from_value(pod.clone())
            .map_err(|e| ProvisionError::Response(e.to_string()))?;
        tracing::info!(
            pod_id = %handle.id,
            gpu = %request.gpu_type_id,
            count = request.gpu_count,
            "pod created"
        );
        Ok(handle)
    }

    fn pod_status(&self, pod_id: &str) -> Result<PodStatus, ProvisionError> {
        let query = format!(
            "query {{ pod(input: {{podId: {}}}) {{ id desiredStatus runtime {{ uptimeInSeconds \
             ports {{ ip isIpPublic privatePort publicPort type }} }} }} }}",
            gql_string(pod_id)
        );
        let data = self.graphql(&query)?;
        parse_pod_status(data.get("pod").unwrap_or(&Value::Null))
    }
}

/// GraphQL string literal. JSON string escaping is a valid subset.
fn gql_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// `podFindAndDeployOnDemand` mutation for `request`.
pub fn deploy_mutation(request: &PodRequest) -> String {
    let mut fields = vec![
        format!("name: {}", gql_string(&request.name)),
        format!("gpuTypeId: {}", gql_string(&request.gpu_type_id)),
        format!("gpuCount: {}", request.gpu_count),
        "cloudType: ALL".to_string(),
        format!("containerDiskInGb: {}", request.container_disk_gb),
        format!("ports: {}", gql_string(&request.ports)),
    ];
    match &request.source {
        PodSource::Template { template_id } => {
            fields.push(format!("templateId: {}", gql_string(template_id)));
        }
        PodSource::Container { image, args } => {
            fields.push(format!("imageName: {}", gql_string(image)));
            fields.push(format!("dockerArgs: {}", gql_string(&args.join(" "))));
        }
    }
    format!(
        "mutation {{ podFindAndDeployOnDemand(input: {{ {} }}) {{ id desiredStatus imageName machineId }} }}",
        fields.join(", ")
    )
}

/// Interpret the `pod` object of a status query.
pub fn parse_pod_status(pod: &Value) -> Result<PodStatus, ProvisionError> {
    if pod.is_null() {
        return Ok(PodStatus::Unknown);
    }
    let id = pod.get("id").and_then(Value::as_str).unwrap_or_default();
    let desired = pod.get("desiredStatus").and_then(Value::as_str);

    let runtime = pod.get("runtime").filter(|r| !r.is_null());
    let Some(runtime) = runtime else {
        return Ok(match desired {
            Some(state) => PodStatus::Other {
                state: state.to_string(),
            },
            None => PodStatus::Unknown,
        });
    };

    let ports: Vec<PortMapping> = match runtime.get("ports").filter(|p| !p.is_null()) {
        Some(p) => serde_json::from_value(p.clone())
            .map_err(|e| ProvisionError::Response(e.to_string()))?,
        None => Vec::new(),
    };

    let public = ports.iter().find_map(|p| match (&p.ip, p.public_port) {
        (Some(ip), Some(port)) if p.is_ip_public => Some(format!("{ip}:{port}")),
        _ => None,
    });
    let proxied = ports
        .iter()
        .find(|p| p.kind.as_deref() == Some("http"))
        .map(|p| format!("https://{id}-{}.proxy.runpod.net", p.private_port));

    match public.or(proxied) {
        Some(address) => Ok(PodStatus::Running { address, ports }),
        None => Ok(PodStatus::Other {
            state: desired.unwrap_or("STARTING").to_string(),
        }),
    }
}

/// vLLM OpenAI-server arguments for serving `model_id` on `plan`.
pub fn vllm_launch_args(model_id: &str, plan: &AllocationPlan, workload: &Workload) -> Vec<String> {
    let mut args = vec![
        "--model".to_string(),
        model_id.to_string(),
        "--tensor-parallel-size".to_string(),
        plan.gpu_count.to_string(),
        "--max-model-len".to_string(),
        workload.max_context_tokens.to_string(),
        "--gpu-memory-utilization".to_string(),
        workload.gpu_utilization.to_string(),
        "--max-num-seqs".to_string(),
        workload.users.to_string(),
    ];
    // int8/int4 checkpoints carry their own quantization config
    match workload.weight_quant {
        QuantScheme::Fp16 => args.extend(["--dtype".to_string(), "float16".to_string()]),
        QuantScheme::Fp8 => args.extend(["--quantization".to_string(), "fp8".to_string()]),
        QuantScheme::Int8 | QuantScheme::Int4 => {}
    }
    if workload.kv_quant == QuantScheme::Fp8 {
        args.extend(["--kv-cache-dtype".to_string(), "fp8".to_string()]);
    }
    args.extend([
        "--host".to_string(),
        "0.0.0.0".to_string(),
        "--port".to_string(),
        "8000".to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GpuCatalog;
    use crate::plan::{self, AllocationRequest};

    // ────────────────────────────────────────────────────────────────────
    // config.json parsing
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_llama_config() {
        let config = serde_json::json!({
            "num_hidden_layers": 32,
            "num_attention_heads": 32,
            "num_key_value_heads": 8,
            "hidden_size": 4096,
        });
        let arch = architecture_from_config("meta-llama/Llama-3.1-8B-Instruct", &config, None);
        assert_eq!(arch.layers, 32);
        assert_eq!(arch.kv_heads, 8);
        assert_eq!(arch.head_dim, 128);
        assert_eq!(arch.total_params_b, 8.0);
        assert_eq!(arch.param_source, ParamSource::NameGuess);
        assert_eq!(arch.active_params_b, arch.total_params_b);
    }

    #[test]
    fn test_param_sources_in_priority_order() {
        let with_count = serde_json::json!({"num_parameters": 13_000_000_000u64});
        let arch = architecture_from_config("x/model-7b", &with_count, Some(9_000_000_000));
        assert_eq!((arch.total_params_b, arch.param_source), (13.0, ParamSource::Config));

        let arch =
            architecture_from_config("x/model-7b", &serde_json::json!({}), Some(9_000_000_000));
        assert_eq!((arch.total_params_b, arch.param_source), (9.0, ParamSource::Safetensors));

        let arch = architecture_from_config("x/mystery", &serde_json::json!({}), None);
        assert_eq!((arch.total_params_b, arch.param_source), (7.0, ParamSource::Default));
        assert_eq!((arch.layers, arch.kv_heads, arch.head_dim), (32, 32, 128));
    }

    #[test]
    fn test_head_dim_defaults_without_attention_heads() {
        let config = serde_json::json!({"num_hidden_layers": 32, "hidden_size": 5120});
        let arch = architecture_from_config("org/mystery-7b", &config, None);
        assert_eq!((arch.layers, arch.kv_heads, arch.head_dim), (32, 32, 128));

        // one 8k fp8 context stays at 2 GiB
        let kv = crate::memory::kv_cache_per_context_gb(
            arch.layers,
            arch.kv_heads,
            arch.head_dim,
            8192,
            QuantScheme::Fp8,
        );
        assert!((kv - 2.0).abs() < 1e-9);

        let derived = serde_json::json!({"hidden_size": 5120, "num_attention_heads": 40});
        let arch = architecture_from_config("org/mystery-7b", &derived, None);
        assert_eq!((arch.kv_heads, arch.head_dim), (40, 128));
    }

    #[test]
    fn test_float_num_parameters_is_read() {
        let config = serde_json::json!({"num_parameters": 7.24e9});
        let arch = architecture_from_config("org/mystery", &config, Some(9_000_000_000));
        assert_eq!(arch.param_source, ParamSource::Config);
        assert!((arch.total_params_b - 7.24).abs() < 1e-9);

        let zero = serde_json::json!({"num_parameters": 0.0});
        let arch = architecture_from_config("org/mystery", &zero, None);
        assert_eq!(arch.param_source, ParamSource::Default);
    }

    #[test]
    fn test_nested_text_config_and_moe() {
        let config = serde_json::json!({
            "thinker_config": {
                "text_config": {
                    "num_hidden_layers": 48,
                    "num_attention_heads": 32,
                    "num_key_value_heads": 4,
                    "head_dim": 128,
                    "num_experts": 128,
                    "num_experts_per_tok": 8,
                }
            }
        });
        let arch = architecture_from_config(
            "Qwen/Qwen3-Omni-30B-A3B-Instruct",
            &config,
            Some(32_000_000_000),
        );
        assert_eq!(arch.layers, 48);
        assert_eq!(arch.kv_heads, 4);
        assert_eq!(arch.total_params_b, 32.0);
        assert_eq!(arch.active_params_b, 2.0);
        assert!(arch.is_moe());
        assert!(arch.validate().is_ok());
    }

    #[test]
    fn test_kv_heads_fall_back_to_attention_heads() {
        let config = serde_json::json!({
            "text_config": {"n_layer": 24, "n_head": 16, "hidden_size": 2048}
        });
        let arch = architecture_from_config("x/gpt-1.5b", &config, None);
        assert_eq!((arch.layers, arch.kv_heads, arch.head_dim), (24, 16, 128));
        assert_eq!(arch.total_params_b, 1.5);
    }

    struct Offline;

    impl MetadataProvider for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        fn fetch_architecture(&self, model_id: &str) -> Result<ModelArchitecture, MetadataError> {
            Err(MetadataError::Http {
                url: format!("offline://{model_id}"),
                message: "unreachable".to_string(),
            })
        }
    }

    #[test]
    fn test_fetch_or_fallback() {
        let arch = fetch_or_fallback(&Offline, "org/model-14b");
        assert_eq!(arch, ModelArchitecture::fallback("org/model-14b"));
        assert_eq!(arch.total_params_b, 14.0);
    }

    // ────────────────────────────────────────────────────────────────────
    // Provisioning payloads
    // ────────────────────────────────────────────────────────────────────

    fn sample_plan() -> (AllocationPlan, Workload) {
        let arch = ModelArchitecture::dense("m", 7.0, 32, 8, 128);
        let request = AllocationRequest::new(Workload::new(arch).with_users(4));
        let catalog = GpuCatalog::builtin().filter_by_name("RTX 4090").unwrap();
        let plan = plan::find_best_allocation(&request, &catalog).unwrap();
        (plan, request.workload)
    }

    #[test]
    fn test_deploy_mutation_template() {
        let (plan, _) = sample_plan();
        let req = PodRequest::from_plan(
            &plan,
            PodSource::Template {
                template_id: "tpl-123".to_string(),
            },
        );
        let m = deploy_mutation(&req);
        assert!(m.starts_with("mutation { podFindAndDeployOnDemand(input: {"));
        assert!(m.contains(r#"gpuTypeId: "NVIDIA GeForce RTX 4090""#));
        assert!(m.contains("gpuCount: 1"));
        assert!(m.contains(r#"templateId: "tpl-123""#));
        assert!(!m.contains("imageName:"));
    }

    #[test]
    fn test_deploy_mutation_container_escapes_args() {
        let (plan, _) = sample_plan();
        let req = PodRequest::from_plan(
            &plan,
            PodSource::Container {
                image: "vllm/vllm-openai:latest".to_string(),
                args: vec!["--model".to_string(), "a\"b".to_string()],
            },
        );
        let m = deploy_mutation(&req);
        assert!(m.contains(r#"imageName: "vllm/vllm-openai:latest""#));
        assert!(m.contains(r#"dockerArgs: "--model a\"b""#));
    }

    #[test]
    fn test_vllm_args() {
        let (plan, workload) = sample_plan();
        let args = vllm_launch_args("meta-llama/Llama-3.1-8B-Instruct", &plan, &workload);
        let joined = args.join(" ");
        assert!(joined.contains("--model meta-llama/Llama-3.1-8B-Instruct"));
        assert!(joined.contains("--tensor-parallel-size 1"));
        assert!(joined.contains("--max-model-len 8192"));
        assert!(joined.contains("--gpu-memory-utilization 0.9"));
        assert!(joined.contains("--max-num-seqs 4"));
        assert!(joined.contains("--kv-cache-dtype fp8"));
        assert!(!joined.contains("--quantization"));
    }

    // ────────────────────────────────────────────────────────────────────
    // Pod status
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_status_unknown_and_pending() {
        assert_eq!(parse_pod_status(&Value::Null).unwrap(), PodStatus::Unknown);

        let pending = serde_json::json!({"id": "abc", "desiredStatus": "RUNNING", "runtime": null});
        assert_eq!(
            parse_pod_status(&pending).unwrap(),
            PodStatus::Other {
                state: "RUNNING".to_string()
            }
        );
    }

    #[test]
    fn test_status_running_prefers_public_ip() {
        let pod = serde_json::json!({
            "id": "abc",
            "desiredStatus": "RUNNING",
            "runtime": {"uptimeInSeconds": 12, "ports": [
                {"ip": "100.65.0.2", "isIpPublic": false, "privatePort": 8000,
                 "publicPort": 60123, "type": "http"},
                {"ip": "203.0.113.9", "isIpPublic": true, "privatePort": 22,
                 "publicPort": 40022, "type": "tcp"}
            ]}
        });
        let status = parse_pod_status(&pod).unwrap();
        assert!(status.is_running());
        match status {
            PodStatus::Running { address, ports } => {
                assert_eq!(address, "203.0.113.9:40022");
                assert_eq!(ports.len(), 2);
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn test_status_running_via_proxy() {
        let pod = serde_json::json!({
            "id": "abc",
            "runtime": {"ports": [
                {"ip": "100.65.0.2", "isIpPublic": false, "privatePort": 8000,
                 "publicPort": 60123, "type": "http"}
            ]}
        });
        match parse_pod_status(&pod).unwrap() {
            PodStatus::Running { address, .. } => {
                assert_eq!(address, "https://abc-8000.proxy.runpod.net")
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn test_missing_api_key() {
        let provider = RunpodProvider {
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
        };
        assert!(matches!(
            provider.pod_status("abc"),
            Err(ProvisionError::MissingApiKey)
        ));
    }
}
