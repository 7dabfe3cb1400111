//! Graph compiler
//!
//! Transforms a user-authored bot configuration graph into the flattened
//! [`ExecutionSpec`] the compute engine consumes: multi-asset feeds are
//! expanded per token, node references are rewritten to the expanded ids,
//! system prompts and the exposure policy are synthesized.
//!
//! Compilation is a pure function: no I/O, and the same configuration always
//! compiles to a byte-identical document.

mod exposure;
mod prompts;
mod spec;

pub use exposure::build_exposure_policy;
pub use prompts::{system_prompt, user_prompt, AgentRole};
pub use spec::{
    CompiledAgent, CompiledDataSource, CompiledPortfolioPolicy, Cortex, DataSourceSettings,
    ExecutionSpec, ExposurePolicy, ModelSettings, RiskManagementAgent,
};

use crate::bot::{BotConfiguration, NodeKind};
use crate::config::PipelineConfig;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Compiled node type tag for kline feeds
const KLINES_KIND: &str = "binance-klines";

/// Compiled node type tag for model-backed agents
const MODEL_KIND: &str = "ollama";

/// Volatility cap used when the portfolio node does not set a drawdown
const DEFAULT_MAX_VOLATILITY: f64 = 0.05;

/// Compilation errors
///
/// These are structural impossibilities in an already schema-validated
/// graph; none of them are recoverable by retrying.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A node landed in a collection reserved for a different kind
    #[error("node '{id}' has kind {found:?}, expected {expected:?}")]
    MisplacedNode {
        id: String,
        expected: NodeKind,
        found: NodeKind,
    },
    /// A rewritten reference does not resolve inside the compiled pipeline
    #[error("input '{input}' on node '{node}' does not resolve to a compiled node")]
    DanglingReference { node: String, input: String },
}

/// Compile a bot configuration into an execution spec
pub fn compile(
    config: &BotConfiguration,
    pipeline: &PipelineConfig,
) -> Result<ExecutionSpec, CompileError> {
    // Expansion: multi-asset feeds become one compiled node per token.
    // The mapping records originalId -> [expandedId...] in token order.
    let mut expansion: HashMap<String, Vec<String>> = HashMap::new();
    let mut data_sources = Vec::new();

    for ds in &config.data_sources {
        if ds.kind != NodeKind::Data {
            return Err(CompileError::MisplacedNode {
                id: ds.id.clone(),
                expected: NodeKind::Data,
                found: ds.kind,
            });
        }

        let interval = ds
            .timeframe
            .clone()
            .unwrap_or_else(|| pipeline.default_interval.clone());

        if ds.data_source_type.is_multi_asset() {
            let expanded: Vec<String> = config
                .tokens
                .iter()
                .map(|token| format!("{}-{}", ds.id, token))
                .collect();
            expansion.insert(ds.id.clone(), expanded.clone());

            for (token, id) in config.tokens.iter().zip(expanded) {
                data_sources.push(CompiledDataSource {
                    name: "Binance KLines".to_string(),
                    id,
                    kind: KLINES_KIND.to_string(),
                    config: DataSourceSettings {
                        base_asset: token.clone(),
                        quote_asset: pipeline.quote_asset.clone(),
                        interval: interval.clone(),
                    },
                });
            }
        } else {
            expansion.insert(ds.id.clone(), vec![ds.id.clone()]);
            data_sources.push(CompiledDataSource {
                name: ds.name.clone(),
                id: ds.id.clone(),
                kind: KLINES_KIND.to_string(),
                config: DataSourceSettings {
                    base_asset: pipeline.fallback_asset.clone(),
                    quote_asset: pipeline.quote_asset.clone(),
                    interval,
                },
            });
        }
    }

    // Reference rewrite plus prompt synthesis for every agent node.
    let mut agents = Vec::new();
    for agent in &config.agents {
        if agent.kind != NodeKind::Agent {
            return Err(CompileError::MisplacedNode {
                id: agent.id.clone(),
                expected: NodeKind::Agent,
                found: agent.kind,
            });
        }

        let role = AgentRole::parse(&agent.role);
        agents.push(CompiledAgent {
            name: agent.name.clone(),
            id: agent.id.clone(),
            kind: MODEL_KIND.to_string(),
            tools: agent.tools.clone(),
            input_channels: rewrite_inputs(&agent.inputs, &expansion),
            prompt: user_prompt(&agent.prompt).to_string(),
            system_prompt: system_prompt(&role).to_string(),
            model: pipeline.model.clone(),
            config: ModelSettings {
                model_url: pipeline.model_url.clone(),
            },
        });
    }

    // Exposure-policy synthesis.
    let max_volatility = config
        .portfolio
        .as_ref()
        .and_then(|p| p.max_drawdown)
        .unwrap_or(DEFAULT_MAX_VOLATILITY);

    let portfolio = CompiledPortfolioPolicy {
        risk_management_agent: RiskManagementAgent {
            policy: ExposurePolicy {
                max_volatility,
                max_exposure_per_asset: build_exposure_policy(
                    &config.tokens,
                    &pipeline.quote_asset,
                    &pipeline.fallback_asset,
                ),
            },
            model: pipeline.model.clone(),
            kind: MODEL_KIND.to_string(),
            config: ModelSettings {
                model_url: pipeline.model_url.clone(),
            },
        },
    };

    // Cortex wiring: the portfolio node's rewritten inputs become the
    // pipeline's top-level input channels.
    let cortex = Cortex {
        input_channels: config
            .portfolio
            .as_ref()
            .map(|p| rewrite_inputs(&p.inputs, &expansion))
            .unwrap_or_default(),
    };

    let spec = ExecutionSpec {
        transport_url: pipeline.transport_url.clone(),
        data_sources,
        agents,
        portfolio,
        cortex,
    };

    check_references(&spec)?;
    Ok(spec)
}

/// Splice expanded ids into a consumer's input list
///
/// Ids present in the expansion mapping are replaced in place by the full
/// ordered expansion; everything else passes through unchanged.
fn rewrite_inputs(inputs: &[String], expansion: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut rewritten = Vec::with_capacity(inputs.len());
    for input in inputs {
        match expansion.get(input) {
            Some(expanded) => rewritten.extend(expanded.iter().cloned()),
            None => rewritten.push(input.clone()),
        }
    }
    rewritten
}

/// Verify that every reference in the compiled pipeline resolves to a node
/// that exists in the pipeline itself
fn check_references(spec: &ExecutionSpec) -> Result<(), CompileError> {
    let known: HashSet<&str> = spec.node_ids().into_iter().collect();

    for agent in &spec.agents {
        for input in &agent.input_channels {
            if !known.contains(input.as_str()) {
                return Err(CompileError::DanglingReference {
                    node: agent.id.clone(),
                    input: input.clone(),
                });
            }
        }
    }

    for input in &spec.cortex.input_channels {
        if !known.contains(input.as_str()) {
            return Err(CompileError::DanglingReference {
                node: "cortex".to_string(),
                input: input.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{AgentNode, DataSourceKind, DataSourceNode, PortfolioNode};

    fn kucoin_source(id: &str) -> DataSourceNode {
        DataSourceNode {
            id: id.to_string(),
            name: "KuCoin Feed".to_string(),
            kind: NodeKind::Data,
            inputs: vec![],
            data_source_type: DataSourceKind::Kucoin,
            timeframe: None,
            market_type: None,
        }
    }

    fn agent(id: &str, inputs: &[&str]) -> AgentNode {
        AgentNode {
            id: id.to_string(),
            name: format!("agent {}", id),
            kind: NodeKind::Agent,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            role: String::new(),
            prompt: String::new(),
            provider: String::new(),
            tools: None,
        }
    }

    fn portfolio(inputs: &[&str]) -> PortfolioNode {
        PortfolioNode {
            id: "p1".to_string(),
            name: "Risk".to_string(),
            kind: NodeKind::Portfolio,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            risk_level: None,
            max_drawdown: None,
            max_exposure_per_asset: None,
            stop_loss: None,
            take_profit: None,
        }
    }

    fn two_token_config() -> BotConfiguration {
        BotConfiguration {
            tokens: vec!["ETH".to_string(), "BTC".to_string()],
            data_sources: vec![kucoin_source("ds1")],
            executer: None,
            portfolio: Some(portfolio(&["ds1"])),
            agents: vec![agent("agent1", &["ds1"])],
        }
    }

    #[test]
    fn test_multi_asset_expansion() {
        let spec = compile(&two_token_config(), &PipelineConfig::default()).unwrap();

        assert_eq!(spec.data_sources.len(), 2);
        assert_eq!(spec.data_sources[0].id, "ds1-ETH");
        assert_eq!(spec.data_sources[1].id, "ds1-BTC");
        assert_eq!(spec.data_sources[0].config.base_asset, "ETH");
        assert_eq!(spec.data_sources[0].config.quote_asset, "USDT");
        assert_eq!(spec.data_sources[0].config.interval, "12h");
    }

    #[test]
    fn test_reference_rewrite_preserves_token_order() {
        let spec = compile(&two_token_config(), &PipelineConfig::default()).unwrap();

        assert_eq!(spec.agents[0].input_channels, vec!["ds1-ETH", "ds1-BTC"]);
        assert_eq!(spec.cortex.input_channels, vec!["ds1-ETH", "ds1-BTC"]);
    }

    #[test]
    fn test_agent_references_pass_through() {
        let mut config = two_token_config();
        config.agents.push(agent("agent2", &["agent1", "ds1"]));

        let spec = compile(&config, &PipelineConfig::default()).unwrap();
        assert_eq!(
            spec.agents[1].input_channels,
            vec!["agent1", "ds1-ETH", "ds1-BTC"]
        );
    }

    #[test]
    fn test_exposure_policy_example() {
        let spec = compile(&two_token_config(), &PipelineConfig::default()).unwrap();
        let policy = &spec.portfolio.risk_management_agent.policy;

        assert_eq!(policy.max_exposure_per_asset["USDT"], 0.6);
        assert_eq!(policy.max_exposure_per_asset["ETH"], 0.2);
        assert_eq!(policy.max_exposure_per_asset["BTC"], 0.2);
        assert_eq!(policy.max_volatility, 0.05);
    }

    #[test]
    fn test_max_volatility_from_portfolio_node() {
        let mut config = two_token_config();
        config.portfolio.as_mut().unwrap().max_drawdown = Some(0.12);

        let spec = compile(&config, &PipelineConfig::default()).unwrap();
        assert_eq!(spec.portfolio.risk_management_agent.policy.max_volatility, 0.12);
    }

    #[test]
    fn test_prompt_synthesis() {
        let mut config = two_token_config();
        config.agents[0].role = "portfolio_optimizer".to_string();
        config.agents[0].prompt = "Summarize the reports".to_string();

        let spec = compile(&config, &PipelineConfig::default()).unwrap();
        assert!(spec.agents[0].system_prompt.contains("RISE or FALL"));
        assert_eq!(spec.agents[0].prompt, "Summarize the reports");
    }

    #[test]
    fn test_empty_prompt_gets_default() {
        let spec = compile(&two_token_config(), &PipelineConfig::default()).unwrap();
        assert_eq!(spec.agents[0].prompt, "Analyze the current kline data");
    }

    #[test]
    fn test_single_asset_source_passes_through() {
        let mut config = two_token_config();
        config.data_sources.push(DataSourceNode {
            id: "news1".to_string(),
            name: "News Feed".to_string(),
            kind: NodeKind::Data,
            inputs: vec![],
            data_source_type: DataSourceKind::News,
            timeframe: Some("1h".to_string()),
            market_type: None,
        });
        config.agents[0].inputs.push("news1".to_string());

        let spec = compile(&config, &PipelineConfig::default()).unwrap();
        assert_eq!(spec.data_sources.len(), 3);
        assert_eq!(spec.data_sources[2].id, "news1");
        assert_eq!(spec.data_sources[2].config.interval, "1h");
        assert_eq!(
            spec.agents[0].input_channels,
            vec!["ds1-ETH", "ds1-BTC", "news1"]
        );
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let config = two_token_config();
        let pipeline = PipelineConfig::default();

        let first = compile(&config, &pipeline).unwrap().to_json().unwrap();
        let second = compile(&config, &pipeline).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_portfolio_empty_cortex() {
        let mut config = two_token_config();
        config.portfolio = None;

        let spec = compile(&config, &PipelineConfig::default()).unwrap();
        assert!(spec.cortex.input_channels.is_empty());
    }

    #[test]
    fn test_misplaced_node_rejected() {
        let mut config = two_token_config();
        config.agents[0].kind = NodeKind::Executer;

        let err = compile(&config, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, CompileError::MisplacedNode { .. }));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut config = two_token_config();
        config.agents[0].inputs.push("ghost".to_string());

        let err = compile(&config, &PipelineConfig::default()).unwrap_err();
        match err {
            CompileError::DanglingReference { node, input } => {
                assert_eq!(node, "agent1");
                assert_eq!(input, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_expansion_with_no_tokens() {
        let mut config = two_token_config();
        config.tokens.clear();
        config.agents[0].inputs.clear();
        config.portfolio.as_mut().unwrap().inputs = vec!["agent1".to_string()];

        let spec = compile(&config, &PipelineConfig::default()).unwrap();
        // A multi-asset source with zero tokens expands to nothing.
        assert!(spec.data_sources.is_empty());
        let policy = &spec.portfolio.risk_management_agent.policy;
        assert_eq!(policy.max_exposure_per_asset["ETH"], 0.4);
        assert_eq!(policy.max_exposure_per_asset["USDT"], 0.6);
    }
}
