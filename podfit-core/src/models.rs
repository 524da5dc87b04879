use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Parameter count assumed when nothing better is known.
pub const DEFAULT_PARAMS_B: f64 = 7.0;
pub const DEFAULT_LAYERS: u32 = 32;
pub const DEFAULT_KV_HEADS: u32 = 32;
pub const DEFAULT_HEAD_DIM: u32 = 128;

/// First size token like "7b", "70B", "1.5b" or "8x7b" in a model id.
static SIZE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9a-z.])(?:\d+x)?(\d+(?:\.\d+)?)b(?:[^a-z]|$)")
        .expect("size token pattern is valid")
});

/// Where the parameter count of an architecture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    /// `num_parameters` in the model config.
    Config,
    /// Safetensors index reported by the model hub.
    Safetensors,
    /// Size token in the model id, e.g. "-70B-".
    NameGuess,
    /// Nothing found; `DEFAULT_PARAMS_B` assumed.
    Default,
}

impl ParamSource {
    pub fn label(&self) -> &'static str {
        match self {
            ParamSource::Config => "config",
            ParamSource::Safetensors => "safetensors",
            ParamSource::NameGuess => "guessed from name",
            ParamSource::Default => "unknown (default)",
        }
    }

    pub fn is_estimate(&self) -> bool {
        matches!(self, ParamSource::NameGuess | ParamSource::Default)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArchitectureError {
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("active parameters ({active}B) exceed total parameters ({total}B)")]
    ActiveExceedsTotal { active: f64, total: f64 },
}

/// Transformer shape needed for capacity planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    pub name: String,
    pub total_params_b: f64,
    /// Equal to `total_params_b` for dense models.
    pub active_params_b: f64,
    pub layers: u32,
    pub kv_heads: u32,
    pub head_dim: u32,
    pub param_source: ParamSource,
}

impl ModelArchitecture {
    /// Dense model with an exactly known parameter count.
    pub fn dense(name: &str, params_b: f64, layers: u32, kv_heads: u32, head_dim: u32) -> Self {
        ModelArchitecture {
            name: name.to_string(),
            total_params_b: params_b,
            active_params_b: params_b,
            layers,
            kv_heads,
            head_dim,
            param_source: ParamSource::Config,
        }
    }

    /// Best-effort architecture used when metadata cannot be fetched.
    pub fn fallback(model_id: &str) -> Self {
        let (params, source) = guess_params_from_name(model_id);
        ModelArchitecture {
            name: model_id.to_string(),
            total_params_b: params,
            active_params_b: params,
            layers: DEFAULT_LAYERS,
            kv_heads: DEFAULT_KV_HEADS,
            head_dim: DEFAULT_HEAD_DIM,
            param_source: source,
        }
    }

    pub fn with_active_params(mut self, active_params_b: f64) -> Self {
        self.active_params_b = active_params_b;
        self
    }

    pub fn is_moe(&self) -> bool {
        self.active_params_b < self.total_params_b
    }

    pub fn validate(&self) -> Result<(), ArchitectureError> {
        let positive = [
            ("total parameters", self.total_params_b),
            ("active parameters", self.active_params_b),
            ("layer count", self.layers as f64),
            ("KV head count", self.kv_heads as f64),
            ("head dimension", self.head_dim as f64),
        ];
        for (field, value) in positive {
            if !(value > 0.0) {
                return Err(ArchitectureError::NonPositive { field });
            }
        }
        if self.active_params_b > self.total_params_b {
            return Err(ArchitectureError::ActiveExceedsTotal {
                active: self.active_params_b,
                total: self.total_params_b,
            });
        }
        Ok(())
    }
}

/// Parameter count (billions) from a size token in the model id.
/// Returns `DEFAULT_PARAMS_B` tagged `ParamSource::Default` when none is found.
pub fn guess_params_from_name(model_id: &str) -> (f64, ParamSource) {
    let name = model_id.rsplit('/').next().unwrap_or(model_id);
    SIZE_TOKEN
        .captures(name)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|p| *p > 0.0)
        .map(|p| (p, ParamSource::NameGuess))
        .unwrap_or((DEFAULT_PARAMS_B, ParamSource::Default))
}
