//! Inbound payload normalization
//!
//! The transport is loose about shapes: a trades event may carry a single
//! fill, a bare array, or a `{"trades": [...]}` wrapper; portfolio events
//! wrap their snapshots the same way. Normalization flattens all of them to
//! lists so every element can consume its own sequence number.

use crate::store::{PortfolioSnapshot, TradeFill};
use serde_json::Value;

/// Normalize a trades payload into individual fills
pub fn normalize_trades(payload: &Value) -> Result<Vec<TradeFill>, serde_json::Error> {
    if let Some(trades) = payload.get("trades") {
        return serde_json::from_value(trades.clone());
    }
    if payload.is_array() {
        return serde_json::from_value(payload.clone());
    }
    serde_json::from_value::<TradeFill>(payload.clone()).map(|fill| vec![fill])
}

/// Normalize a portfolio payload into individual snapshots
pub fn normalize_portfolio(payload: &Value) -> Result<Vec<PortfolioSnapshot>, serde_json::Error> {
    if let Some(entries) = payload.get("portfolio") {
        return serde_json::from_value(entries.clone());
    }
    if payload.is_array() {
        return serde_json::from_value(payload.clone());
    }
    serde_json::from_value::<PortfolioSnapshot>(payload.clone()).map(|snapshot| vec![snapshot])
}

/// Best-effort error message out of a compute error payload
pub fn error_message(payload: &Value) -> String {
    payload
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TradeSide;
    use serde_json::json;

    fn trade_json() -> Value {
        json!({
            "baseAsset": "ETH",
            "quoteAsset": "USDT",
            "side": "buy",
            "executedAmount": 0.5,
            "executedPrice": 3200.0,
            "totalCost": 1600.0,
            "fee": 1.6,
            "feeCurrency": "USDT",
            "success": true,
            "timestamp": "2024-03-01T12:00:00Z"
        })
    }

    fn snapshot_json() -> Value {
        json!({
            "positions": [],
            "totalValue": 10000,
            "weights": {"USDT": 1.0},
            "realizedPnL": {},
            "riskMetrics": {"volatility": 0.02, "exposure": {}}
        })
    }

    #[test]
    fn test_single_trade_normalized_to_list() {
        let fills = normalize_trades(&trade_json()).unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].side, TradeSide::Buy);
    }

    #[test]
    fn test_wrapped_trade_batch() {
        let payload = json!({ "trades": [trade_json(), trade_json(), trade_json()] });
        let fills = normalize_trades(&payload).unwrap();
        assert_eq!(fills.len(), 3);
    }

    #[test]
    fn test_bare_trade_array() {
        let payload = json!([trade_json(), trade_json()]);
        let fills = normalize_trades(&payload).unwrap();
        assert_eq!(fills.len(), 2);
    }

    #[test]
    fn test_malformed_trade_payload_is_error() {
        let payload = json!({"unexpected": true});
        assert!(normalize_trades(&payload).is_err());
    }

    #[test]
    fn test_wrapped_portfolio_entries() {
        let payload = json!({ "portfolio": [snapshot_json(), snapshot_json()] });
        let snapshots = normalize_portfolio(&payload).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].weights["USDT"], 1.0);
    }

    #[test]
    fn test_single_portfolio_entry() {
        let snapshots = normalize_portfolio(&snapshot_json()).unwrap();
        assert_eq!(snapshots.len(), 1);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(&json!({"error": "engine crashed"})), "engine crashed");
        assert_eq!(error_message(&json!({"code": 7})), r#"{"code":7}"#);
    }
}
