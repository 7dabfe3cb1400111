//! Bot configuration graph types

use serde::{Deserialize, Serialize};

/// A user-owned trading bot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    /// Unique bot identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Owning user
    pub user_id: String,
    /// Lifecycle status
    pub status: BotStatus,
    /// The node graph describing the strategy
    pub configuration: BotConfiguration,
}

/// Bot lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BotStatus {
    Active,
    Inactive,
    Paused,
    Error,
    Backtesting,
    LivePreview,
    Idle,
    Live,
}

/// The node graph a user authors in the strategy builder
///
/// Node `inputs` reference other node ids; producer/consumer edges are the
/// only connectivity in the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfiguration {
    /// Tokens the strategy trades
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Data feed nodes
    #[serde(default)]
    pub data_sources: Vec<DataSourceNode>,
    /// Optional order executer node
    #[serde(default)]
    pub executer: Option<ExecuterNode>,
    /// Optional portfolio-risk node
    #[serde(default)]
    pub portfolio: Option<PortfolioNode>,
    /// AI agent nodes
    #[serde(default)]
    pub agents: Vec<AgentNode>,
}

/// Closed set of node type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Data,
    Agent,
    Portfolio,
    Executer,
    Currency,
}

/// Data feed kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    /// Multi-asset kline feed, expanded per configured token at compile time
    Kucoin,
    News,
    Twitter,
}

impl DataSourceKind {
    /// Whether this feed produces one channel per configured token
    pub fn is_multi_asset(&self) -> bool {
        matches!(self, DataSourceKind::Kucoin)
    }
}

/// A data feed node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub data_source_type: DataSourceKind,
    /// Candle interval, e.g. "12h"
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub market_type: Option<String>,
}

/// An AI agent node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Role tag selecting the synthesized system prompt
    #[serde(default)]
    pub role: String,
    /// User prompt forwarded to the model
    #[serde(default)]
    pub prompt: String,
    /// Model provider requested by the user
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
}

/// The portfolio-risk node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    /// Maximum tolerated drawdown, becomes the pipeline's volatility cap
    #[serde(default)]
    pub max_drawdown: Option<f64>,
    #[serde(default)]
    pub max_exposure_per_asset: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

/// The order executer node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuterNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub exchange: String,
}

/// A currency selector node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub selected_token: TokenInfo,
}

/// Token metadata carried by currency nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_deserialize() {
        let json = r#"{
            "id": "ds1",
            "name": "KuCoin Feed",
            "type": "data",
            "inputs": [],
            "dataSourceType": "kucoin",
            "timeframe": "4h"
        }"#;

        let node: DataSourceNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.id, "ds1");
        assert_eq!(node.kind, NodeKind::Data);
        assert_eq!(node.data_source_type, DataSourceKind::Kucoin);
        assert!(node.data_source_type.is_multi_asset());
        assert_eq!(node.timeframe.as_deref(), Some("4h"));
    }

    #[test]
    fn test_unknown_node_kind_rejected() {
        let json = r#"{
            "id": "ds1",
            "name": "Feed",
            "type": "mystery",
            "dataSourceType": "kucoin"
        }"#;

        let result: Result<DataSourceNode, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_data_source_kind_rejected() {
        let json = r#"{
            "id": "ds1",
            "name": "Feed",
            "type": "data",
            "dataSourceType": "telegram"
        }"#;

        let result: Result<DataSourceNode, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_agent_deserialize_defaults() {
        let json = r#"{
            "id": "agent1",
            "name": "Analyzer",
            "type": "agent",
            "inputs": ["ds1"]
        }"#;

        let node: AgentNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.kind, NodeKind::Agent);
        assert!(node.role.is_empty());
        assert!(node.prompt.is_empty());
        assert!(node.tools.is_none());
    }

    #[test]
    fn test_configuration_deserialize() {
        let json = r#"{
            "tokens": ["ETH", "BTC"],
            "dataSources": [{
                "id": "ds1",
                "name": "KuCoin Feed",
                "type": "data",
                "dataSourceType": "kucoin"
            }],
            "executer": null,
            "portfolio": {
                "id": "p1",
                "name": "Risk",
                "type": "portfolio",
                "inputs": ["agent1"],
                "maxDrawdown": 0.1
            },
            "agents": [{
                "id": "agent1",
                "name": "Analyzer",
                "type": "agent",
                "inputs": ["ds1"],
                "role": "portfolio_optimizer",
                "prompt": "Predict the next move"
            }]
        }"#;

        let config: BotConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.tokens, vec!["ETH", "BTC"]);
        assert_eq!(config.data_sources.len(), 1);
        assert!(config.executer.is_none());
        assert_eq!(config.portfolio.as_ref().unwrap().max_drawdown, Some(0.1));
        assert_eq!(config.agents[0].role, "portfolio_optimizer");
    }

    #[test]
    fn test_bot_status_roundtrip() {
        let status: BotStatus = serde_json::from_str("\"livePreview\"").unwrap();
        assert_eq!(status, BotStatus::LivePreview);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"livePreview\"");
    }
}
