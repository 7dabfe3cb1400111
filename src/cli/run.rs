//! Run command implementation

use crate::bot::{Bot, MemoryBotStore};
use crate::compute::WsComputeClient;
use crate::config::Config;
use crate::orchestrator::{Orchestrator, RelayEvent, StartRequest};
use crate::store::MemoryStore;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Bot definition file (JSON)
    #[arg(long)]
    pub bot: PathBuf,

    /// Historical window start (ISO 8601)
    #[arg(long)]
    pub start: String,

    /// Historical window end (ISO 8601)
    #[arg(long)]
    pub end: String,

    /// Display name for the run
    #[arg(long, default_value = "cli run")]
    pub name: String,

    /// Deadline override in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(&self.bot)?;
        let bot: Bot = serde_json::from_str(&content)?;
        let bot_id = bot.id.clone();
        let user_id = bot.user_id.clone();

        let start: DateTime<Utc> = self.start.parse()?;
        let end: DateTime<Utc> = self.end.parse()?;

        let bots = Arc::new(MemoryBotStore::new());
        bots.insert(bot).await;
        let compute = Arc::new(WsComputeClient::new(config.compute.url.clone()));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::new(bots, compute, store, config);

        let (tx, mut rx) = mpsc::unbounded_channel::<RelayEvent>();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                println!("[{}] {}", event.event_type, event.data);
            }
        });

        let result = orchestrator
            .start(
                StartRequest {
                    bot_id: bot_id.clone(),
                    user_id: user_id.clone(),
                    start,
                    end,
                    name: self.name.clone(),
                    deadline: self.deadline_secs.map(Duration::from_secs),
                },
                tx,
            )
            .await;
        // The sink is dropped once the run ends; flush everything relayed
        // (including a final error event) before reporting the outcome.
        printer.await?;
        let outcome = result?;

        println!("Run {} finished: {:?}", outcome.run_id, outcome.status);
        println!("  Records persisted: {}", outcome.records);

        for run in orchestrator.history(&user_id, &bot_id).await? {
            println!(
                "  {} {:?} [{} .. {}] {}",
                run.id, run.status, run.start_date, run.end_date, run.metadata.name
            );
        }
        Ok(())
    }
}
