use std::fmt;
use std::str::FromStr;

/// Safety factor for grouped low-bit formats: each 0.5-byte value carries
/// roughly 3/32 bytes of scale/index data per group.
pub const GROUPED_QUANT_SAFETY: f64 = (0.5 + 3.0 / 32.0) / 0.5;

/// Numeric precision used for model weights or the KV cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantScheme {
    Fp16,
    Fp8,
    Int8,
    Int4,
}

impl QuantScheme {
    pub const ALL: [QuantScheme; 4] = [
        QuantScheme::Fp16,
        QuantScheme::Fp8,
        QuantScheme::Int8,
        QuantScheme::Int4,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            QuantScheme::Fp16 => "fp16",
            QuantScheme::Fp8 => "fp8",
            QuantScheme::Int8 => "int8",
            QuantScheme::Int4 => "int4",
        }
    }

    /// Lenient lookup. Anything unrecognized is treated as fp16.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(QuantScheme::Fp16)
    }

    /// Bytes per stored value.
    pub fn bytes_per_param(&self) -> f64 {
        match self {
            QuantScheme::Fp16 => 2.0,
            QuantScheme::Fp8 | QuantScheme::Int8 => 1.0,
            QuantScheme::Int4 => 0.5,
        }
    }

    /// Multiplier applied to weight memory only.
    pub fn weight_safety_factor(&self) -> f64 {
        match self {
            QuantScheme::Fp8 | QuantScheme::Int4 => GROUPED_QUANT_SAFETY,
            QuantScheme::Fp16 | QuantScheme::Int8 => 1.0,
        }
    }
}

impl fmt::Display for QuantScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quantization '{0}' (expected fp16, fp8, int8 or int4)")]
pub struct UnknownQuant(pub String);

impl FromStr for QuantScheme {
    type Err = UnknownQuant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fp16" | "f16" | "bf16" => Ok(QuantScheme::Fp16),
            "fp8" | "f8" => Ok(QuantScheme::Fp8),
            "int8" | "i8" => Ok(QuantScheme::Int8),
            "int4" | "i4" => Ok(QuantScheme::Int4),
            _ => Err(UnknownQuant(s.to_string())),
        }
    }
}
