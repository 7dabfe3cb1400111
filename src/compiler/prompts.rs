//! System prompt synthesis
//!
//! Each agent node's `role` tag selects a system prompt template through a
//! closed lookup. Unrecognized roles get the generic analyzer template.

/// Generic kline-analyzer system prompt
const ANALYZER_PROMPT: &str = "You are a crypto kline analyzer expert, predict what will happen \
     next, make sure to specify the time of the data, and always include the asset you are \
     predicting";

/// Specialized template for the portfolio optimizer role
const OPTIMIZER_PROMPT: &str = "You are a professional cryptocurrency predictor, specializing in \
     predicting based on the provided report. Your output should be in the form of RISE or FALL";

/// Fallback user prompt when the node leaves it empty
const DEFAULT_USER_PROMPT: &str = "Analyze the current kline data";

/// Recognized agent roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRole {
    /// Aggregates agent reports into a RISE/FALL call
    PortfolioOptimizer,
    /// Anything else: a plain kline analyzer
    Other(String),
}

impl AgentRole {
    /// Parse the role tag off an agent node
    pub fn parse(tag: &str) -> Self {
        match tag {
            "portfolio_optimizer" => AgentRole::PortfolioOptimizer,
            other => AgentRole::Other(other.to_string()),
        }
    }
}

/// System prompt for a role
pub fn system_prompt(role: &AgentRole) -> &'static str {
    match role {
        AgentRole::PortfolioOptimizer => OPTIMIZER_PROMPT,
        AgentRole::Other(_) => ANALYZER_PROMPT,
    }
}

/// User prompt, falling back to the default when the node leaves it empty
pub fn user_prompt(prompt: &str) -> &str {
    if prompt.is_empty() {
        DEFAULT_USER_PROMPT
    } else {
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_role_gets_specialized_prompt() {
        let role = AgentRole::parse("portfolio_optimizer");
        assert_eq!(role, AgentRole::PortfolioOptimizer);
        assert!(system_prompt(&role).contains("RISE or FALL"));
    }

    #[test]
    fn test_unknown_role_gets_analyzer_prompt() {
        let role = AgentRole::parse("sentiment_scanner");
        assert_eq!(role, AgentRole::Other("sentiment_scanner".to_string()));
        assert!(system_prompt(&role).contains("kline analyzer"));
    }

    #[test]
    fn test_empty_role_gets_analyzer_prompt() {
        let role = AgentRole::parse("");
        assert!(system_prompt(&role).contains("kline analyzer"));
    }

    #[test]
    fn test_user_prompt_fallback() {
        assert_eq!(user_prompt(""), DEFAULT_USER_PROMPT);
        assert_eq!(user_prompt("Predict ETH"), "Predict ETH");
    }
}
