//! Persistence record types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRun {
    pub id: String,
    pub bot_id: String,
    pub user_id: String,
    pub status: RunStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub metadata: RunMetadata,
}

/// Run lifecycle states
///
/// `Completed` and `Failed` are terminal: no further transitions, and no
/// further record persistence is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Created,
    Preparing,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether the run accepts no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Caller-supplied run annotations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    /// Display name for this run
    pub name: String,
    /// Failure or cancellation note, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One persisted stream event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub backtest_id: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub sequence_number: u64,
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A trade as the compute service reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFill {
    pub base_asset: String,
    pub quote_asset: String,
    pub side: TradeSide,
    pub executed_amount: Decimal,
    pub executed_price: Decimal,
    pub total_cost: Decimal,
    pub fee: Decimal,
    pub fee_currency: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// One persisted trade, keyed by (run, sequence number)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub backtest_id: String,
    pub sequence_number: u64,
    #[serde(flatten)]
    pub fill: TradeFill,
}

/// A portfolio snapshot as the compute service reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub positions: Vec<Position>,
    pub total_value: Decimal,
    /// Asset symbol -> share of total value
    pub weights: BTreeMap<String, f64>,
    /// Asset symbol -> realized profit and loss
    #[serde(default, rename = "realizedPnL")]
    pub realized_pnl: BTreeMap<String, f64>,
    pub risk_metrics: RiskMetrics,
    /// Snapshot time as reported by the engine; the enclosing record
    /// carries the authoritative timestamp
    #[serde(default, skip_serializing)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One open position inside a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub asset: String,
    pub amount: Decimal,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub value: Decimal,
    pub pnl: Decimal,
}

/// Risk figures reported with each snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub volatility: f64,
    /// Base-asset exposure shares
    #[serde(default)]
    pub exposure: BTreeMap<String, f64>,
}

/// One persisted snapshot, keyed by (run, sequence number)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRecord {
    pub backtest_id: String,
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: PortfolioSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_run_status_terminal() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Created.is_terminal());
        assert!(!RunStatus::Preparing.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_trade_fill_deserialize_wire_payload() {
        let json = r#"{
            "baseAsset": "ETH",
            "quoteAsset": "USDT",
            "side": "buy",
            "executedAmount": 0.5,
            "executedPrice": 3200.5,
            "totalCost": 1600.25,
            "fee": 1.6,
            "feeCurrency": "USDT",
            "success": true,
            "timestamp": "2024-03-01T12:00:00Z"
        }"#;

        let fill: TradeFill = serde_json::from_str(json).unwrap();
        assert_eq!(fill.base_asset, "ETH");
        assert_eq!(fill.side, TradeSide::Buy);
        assert_eq!(fill.executed_price, dec!(3200.5));
        assert!(fill.success);
    }

    #[test]
    fn test_portfolio_snapshot_deserialize() {
        let json = r#"{
            "positions": [{
                "asset": "ETH",
                "amount": 1.2,
                "avgPrice": 3000,
                "currentPrice": 3100,
                "value": 3720,
                "pnl": 120
            }],
            "totalValue": 10000,
            "weights": {"ETH": 0.37, "USDT": 0.63},
            "realizedPnL": {"ETH": 54.2},
            "riskMetrics": {"volatility": 0.04, "exposure": {"ETH": 0.37}}
        }"#;

        let snapshot: PortfolioSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.positions[0].pnl, dec!(120));
        assert_eq!(snapshot.weights["ETH"], 0.37);
        assert_eq!(snapshot.realized_pnl["ETH"], 54.2);
        assert_eq!(snapshot.risk_metrics.volatility, 0.04);
        assert!(snapshot.timestamp.is_none());
    }

    #[test]
    fn test_trade_record_flattens_fill() {
        let record = TradeRecord {
            backtest_id: "run-1".to_string(),
            sequence_number: 7,
            fill: TradeFill {
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                side: TradeSide::Sell,
                executed_amount: dec!(0.1),
                executed_price: dec!(60000),
                total_cost: dec!(6000),
                fee: dec!(6),
                fee_currency: "USDT".to_string(),
                success: true,
                timestamp: Utc::now(),
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["backtestId"], "run-1");
        assert_eq!(json["sequenceNumber"], 7);
        assert_eq!(json["baseAsset"], "BTC");
        assert_eq!(json["side"], "sell");
    }
}
