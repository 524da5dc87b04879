//! Rentable GPU types and their on-demand prices.
//!
//! The built-in table is embedded at compile time; a catalog can also be
//! loaded from JSON or assembled from cards directly, so the search never
//! depends on a global.

use std::path::Path;

use regex::RegexBuilder;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CatalogError;
use crate::quant::QuantScheme;

const GPU_CATALOG_JSON: &str = include_str!("../data/gpu_catalog.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuCard {
    /// Display name, e.g. "NVIDIA RTX 4090".
    pub name: String,
    /// GPU type id understood by the provisioning API.
    pub provider_id: String,
    pub vram_gb: f64,
    pub memory_bandwidth_gbs: f64,
    /// Relative fp16 compute, used as a prefill speed proxy.
    pub fp16_compute: f64,
    /// KV cache precision the card handles natively.
    /// Unrecognized labels are read as fp16.
    #[serde(default = "default_kv_quant", deserialize_with = "lenient_quant")]
    pub kv_quant: QuantScheme,
    pub price_hr: f64,
}

fn default_kv_quant() -> QuantScheme {
    QuantScheme::Fp8
}

fn lenient_quant<'de, D>(deserializer: D) -> Result<QuantScheme, D::Error>
where
    D: Deserializer<'de>,
{
    let label = String::deserialize(deserializer)?;
    Ok(QuantScheme::from_label(&label))
}

impl GpuCard {
    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |field: &'static str, value: f64| CatalogError::InvalidCard {
            name: self.name.clone(),
            field,
            value,
        };
        if !(self.vram_gb > 0.0) {
            return Err(invalid("vram_gb", self.vram_gb));
        }
        if !(self.price_hr >= 0.0) {
            return Err(invalid("price_hr", self.price_hr));
        }
        if !(self.memory_bandwidth_gbs >= 0.0) {
            return Err(invalid("memory_bandwidth_gbs", self.memory_bandwidth_gbs));
        }
        if !(self.fp16_compute >= 0.0) {
            return Err(invalid("fp16_compute", self.fp16_compute));
        }
        Ok(())
    }
}

/// Immutable, ordered set of GPU cards. Order matters only for display;
/// allocation never breaks ties on catalog position.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuCatalog {
    cards: Vec<GpuCard>,
}

impl GpuCatalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_json(GPU_CATALOG_JSON).expect("embedded gpu_catalog.json is valid")
    }

    pub fn from_cards(cards: Vec<GpuCard>) -> Result<Self, CatalogError> {
        for card in &cards {
            card.validate()?;
        }
        Ok(GpuCatalog { cards })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let cards: Vec<GpuCard> = serde_json::from_str(json)?;
        Self::from_cards(cards)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn cards(&self) -> &[GpuCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Keep cards whose display name matches `pattern` (case-insensitive).
    /// A pattern that is not a valid regex is matched as a literal substring.
    pub fn filter_by_name(&self, pattern: &str) -> Result<GpuCatalog, CatalogError> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()
            })
            .map_err(|_| CatalogError::NoMatch(pattern.to_string()))?;

        let cards: Vec<GpuCard> = self
            .cards
            .iter()
            .filter(|c| re.is_match(&c.name))
            .cloned()
            .collect();

        if cards.is_empty() {
            return Err(CatalogError::NoMatch(pattern.to_string()));
        }
        tracing::debug!(pattern, matched = cards.len(), "filtered GPU catalog");
        Ok(GpuCatalog { cards })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str, vram: f64, price: f64) -> GpuCard {
        GpuCard {
            name: name.to_string(),
            provider_id: name.to_string(),
            vram_gb: vram,
            memory_bandwidth_gbs: 1000.0,
            fp16_compute: 80.0,
            kv_quant: QuantScheme::Fp8,
            price_hr: price,
        }
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = GpuCatalog::builtin();
        assert!(catalog.len() > 20);
        assert!(catalog.cards().iter().all(|c| c.vram_gb > 0.0 && c.price_hr >= 0.0));

        let v100 = catalog.filter_by_name("nvidia v100 32g").unwrap();
        assert_eq!(v100.len(), 1);
        let v100 = &v100.cards()[0];
        assert_eq!(v100.kv_quant, QuantScheme::Fp16);
        assert_eq!(v100.provider_id, "Tesla V100-SXM2-32GB");
    }

    #[test]
    fn test_from_json_defaults_kv_quant() {
        let json = r#"[{"name": "X", "provider_id": "x", "vram_gb": 24,
            "memory_bandwidth_gbs": 900.0, "fp16_compute": 40.0, "price_hr": 0.3}]"#;
        let catalog = GpuCatalog::from_json(json).unwrap();
        assert_eq!(catalog.cards()[0].kv_quant, QuantScheme::Fp8);
        assert_eq!(catalog.cards()[0].vram_gb, 24.0);
    }

    #[test]
    fn test_from_json_reads_kv_quant_leniently() {
        let json = r#"[
            {"name": "A", "provider_id": "a", "vram_gb": 24, "memory_bandwidth_gbs": 900.0,
             "fp16_compute": 40.0, "kv_quant": "INT8", "price_hr": 0.3},
            {"name": "B", "provider_id": "b", "vram_gb": 24, "memory_bandwidth_gbs": 900.0,
             "fp16_compute": 40.0, "kv_quant": "bf16-ish", "price_hr": 0.3}
        ]"#;
        let catalog = GpuCatalog::from_json(json).unwrap();
        assert_eq!(catalog.cards()[0].kv_quant, QuantScheme::Int8);
        assert_eq!(catalog.cards()[1].kv_quant, QuantScheme::Fp16);
    }

    #[test]
    fn test_rejects_invalid_cards() {
        let err = GpuCatalog::from_cards(vec![card("Zero", 0.0, 0.5)]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCard { field: "vram_gb", .. }));

        let err = GpuCatalog::from_cards(vec![card("Neg", 24.0, -1.0)]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCard { field: "price_hr", .. }));

        assert!(matches!(
            GpuCatalog::from_json("{not json"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_filter_substring_case_insensitive() {
        let catalog = GpuCatalog::builtin();
        let h100 = catalog.filter_by_name("h100").unwrap();
        assert_eq!(h100.len(), 3);
        assert!(h100.cards().iter().all(|c| c.name.contains("H100")));
    }

    #[test]
    fn test_filter_regex_and_literal_fallback() {
        let catalog = GpuCatalog::builtin();
        let re = catalog.filter_by_name("^amd").unwrap();
        assert_eq!(re.len(), 2);

        let odd = GpuCatalog::from_cards(vec![
            card("Lab [beta] 24G", 24.0, 0.4),
            card("Other", 24.0, 0.4),
        ])
            .unwrap();
        // unclosed class, matched literally
        let lit = odd.filter_by_name("[BETA").unwrap();
        assert_eq!(lit.len(), 1);
        assert_eq!(lit.cards()[0].name, "Lab [beta] 24G");
    }

    #[test]
    fn test_filter_preserves_order_and_reports_no_match() {
        let catalog = GpuCatalog::from_cards(vec![
            card("Alpha 24", 24.0, 0.5),
            card("Beta", 48.0, 0.7),
            card("Alpha 48", 48.0, 0.9),
        ])
        .unwrap();
        let alpha = catalog.filter_by_name("alpha").unwrap();
        let names: Vec<&str> = alpha.cards().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Alpha 24", "Alpha 48"]);

        assert!(matches!(
            catalog.filter_by_name("gamma"),
            Err(CatalogError::NoMatch(_))
        ));
    }
}
