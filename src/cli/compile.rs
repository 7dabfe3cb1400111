//! Compile command implementation

use crate::bot::Bot;
use crate::compiler::compile;
use crate::config::Config;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Bot definition file (JSON)
    #[arg(long)]
    pub bot: PathBuf,

    /// Pretty-print the execution spec
    #[arg(long)]
    pub pretty: bool,
}

impl CompileArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(&self.bot)?;
        let bot: Bot = serde_json::from_str(&content)?;

        let spec = compile(&bot.configuration, &config.pipeline)?;
        let json = if self.pretty {
            serde_json::to_string_pretty(&spec)?
        } else {
            spec.to_json()?
        };
        println!("{}", json);
        Ok(())
    }
}
