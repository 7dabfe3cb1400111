//! Bot graph model
//!
//! User-authored trading strategies are graphs of typed nodes: data feeds,
//! AI agents, a portfolio-risk node, an executer and currency selectors.

mod types;

pub use types::{
    AgentNode, Bot, BotConfiguration, BotStatus, CurrencyNode, DataSourceKind, DataSourceNode,
    ExecuterNode, NodeKind, PortfolioNode, TokenInfo,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for bot lookup implementations
#[async_trait]
pub trait BotStore: Send + Sync {
    /// Fetch a bot by id, `None` if it does not exist
    async fn bot(&self, id: &str) -> anyhow::Result<Option<Bot>>;
}

/// In-memory bot store
#[derive(Default, Clone)]
pub struct MemoryBotStore {
    bots: Arc<RwLock<HashMap<String, Bot>>>,
}

impl MemoryBotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a bot
    pub async fn insert(&self, bot: Bot) {
        let mut bots = self.bots.write().await;
        bots.insert(bot.id.clone(), bot);
    }
}

#[async_trait]
impl BotStore for MemoryBotStore {
    async fn bot(&self, id: &str) -> anyhow::Result<Option<Bot>> {
        let bots = self.bots.read().await;
        Ok(bots.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bot(id: &str) -> Bot {
        Bot {
            id: id.to_string(),
            name: "momentum".to_string(),
            user_id: "user-1".to_string(),
            status: BotStatus::Idle,
            configuration: BotConfiguration::default(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryBotStore::new();
        store.insert(sample_bot("bot-1")).await;

        let bot = store.bot("bot-1").await.unwrap();
        assert!(bot.is_some());
        assert_eq!(bot.unwrap().user_id, "user-1");
    }

    #[tokio::test]
    async fn test_memory_store_missing() {
        let store = MemoryBotStore::new();
        let bot = store.bot("nope").await.unwrap();
        assert!(bot.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_replace() {
        let store = MemoryBotStore::new();
        store.insert(sample_bot("bot-1")).await;

        let mut updated = sample_bot("bot-1");
        updated.name = "renamed".to_string();
        store.insert(updated).await;

        let bot = store.bot("bot-1").await.unwrap().unwrap();
        assert_eq!(bot.name, "renamed");
    }
}
