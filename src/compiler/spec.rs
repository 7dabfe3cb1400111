//! Flattened execution pipeline model
//!
//! The compute engine consumes this document; it knows nothing about the
//! user-facing node graph it was compiled from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The flattened, reference-resolved pipeline handed to the compute engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpec {
    /// Message transport the pipeline publishes through
    pub transport_url: String,
    /// Expanded data feed nodes, one per (source, token) pair
    pub data_sources: Vec<CompiledDataSource>,
    /// Agent nodes with rewritten input channels
    pub agents: Vec<CompiledAgent>,
    /// Synthesized risk policy
    pub portfolio: CompiledPortfolioPolicy,
    /// Top-level decision wiring
    pub cortex: Cortex,
}

impl ExecutionSpec {
    /// Serialize the spec as the configuration document sent to the
    /// compute service
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Ids of every node present in the pipeline, in document order
    pub fn node_ids(&self) -> Vec<&str> {
        self.data_sources
            .iter()
            .map(|ds| ds.id.as_str())
            .chain(self.agents.iter().map(|a| a.id.as_str()))
            .collect()
    }
}

/// A single-asset kline feed in the compiled pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledDataSource {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub config: DataSourceSettings,
}

/// Feed parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSettings {
    pub base_asset: String,
    pub quote_asset: String,
    pub interval: String,
}

/// An agent in the compiled pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledAgent {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    /// Fully resolved producer channels, expansion already spliced in
    pub input_channels: Vec<String>,
    pub prompt: String,
    pub system_prompt: String,
    pub model: String,
    pub config: ModelSettings,
}

/// Inference endpoint parameters shared by agents and the risk agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    pub model_url: String,
}

/// Synthesized portfolio policy wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPortfolioPolicy {
    pub risk_management_agent: RiskManagementAgent,
}

/// The risk agent guarding the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskManagementAgent {
    pub policy: ExposurePolicy,
    pub model: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub config: ModelSettings,
}

/// Hard limits the risk agent enforces
///
/// `max_exposure_per_asset` is a `BTreeMap` so that repeated compilation of
/// the same configuration serializes byte-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposurePolicy {
    pub max_volatility: f64,
    pub max_exposure_per_asset: BTreeMap<String, f64>,
}

/// Top-level decision input wiring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cortex {
    pub input_channels: Vec<String>,
}
