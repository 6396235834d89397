//! CLI 参数定义
//!
//! 命令行参数优先，缺省时回退到 `engine` 配置段。

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use ruleflow_shared::config::EngineConfig;

/// 规则引擎命令行工具
///
/// 加载规则定义和事实，执行一次评估，把结果以 JSON 输出到 stdout。
#[derive(Parser, Debug)]
#[command(name = "rule-engine")]
#[command(version, about = "前向规则引擎：对一份事实执行一次规则评估")]
pub struct Cli {
    /// 规则定义文件（JSON 数组）
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// 事实文件（JSON 对象）
    #[arg(short, long)]
    pub facts: Option<PathBuf>,

    /// 冲突消解策略，可重复，按出现顺序应用
    #[arg(short, long = "strategy")]
    pub strategies: Vec<String>,

    /// 输出上下文访问记录
    #[arg(long)]
    pub trace: bool,
}

/// 合并后的运行参数
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub rules: PathBuf,
    pub facts: PathBuf,
    pub strategies: Vec<String>,
    pub trace: bool,
}

impl Cli {
    pub fn into_options(self, config: &EngineConfig) -> Result<RunOptions> {
        let Some(rules) = self
            .rules
            .or_else(|| config.rules_path.as_ref().map(PathBuf::from))
        else {
            bail!("未指定规则文件：使用 --rules 或配置 engine.rules_path");
        };

        let Some(facts) = self
            .facts
            .or_else(|| config.facts_path.as_ref().map(PathBuf::from))
        else {
            bail!("未指定事实文件：使用 --facts 或配置 engine.facts_path");
        };

        let strategies = if self.strategies.is_empty() {
            config.strategies.clone()
        } else {
            self.strategies
        };

        Ok(RunOptions {
            rules,
            facts,
            strategies,
            trace: self.trace || config.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::parse_from([
            "rule-engine",
            "--rules",
            "rules.json",
            "-f",
            "facts.json",
            "--strategy",
            "priority",
            "-s",
            "order",
            "--trace",
        ]);

        assert_eq!(cli.rules, Some(PathBuf::from("rules.json")));
        assert_eq!(cli.facts, Some(PathBuf::from("facts.json")));
        assert_eq!(cli.strategies, vec!["priority", "order"]);
        assert!(cli.trace);
    }

    #[test]
    fn test_falls_back_to_config() {
        let config = EngineConfig {
            rules_path: Some("config-rules.json".to_string()),
            facts_path: Some("config-facts.json".to_string()),
            trace: true,
            ..Default::default()
        };

        let options = Cli::parse_from(["rule-engine"]).into_options(&config).unwrap();

        assert_eq!(options.rules, PathBuf::from("config-rules.json"));
        assert_eq!(options.facts, PathBuf::from("config-facts.json"));
        assert_eq!(options.strategies, vec!["specificity", "priority", "order"]);
        assert!(options.trace);
    }

    #[test]
    fn test_flags_override_config() {
        let config = EngineConfig {
            rules_path: Some("config-rules.json".to_string()),
            ..Default::default()
        };

        let options = Cli::parse_from([
            "rule-engine",
            "-r",
            "cli-rules.json",
            "-f",
            "facts.json",
            "-s",
            "priority",
        ])
        .into_options(&config)
        .unwrap();

        assert_eq!(options.rules, PathBuf::from("cli-rules.json"));
        assert_eq!(options.strategies, vec!["priority"]);
        assert!(!options.trace);
    }

    #[test]
    fn test_missing_paths_fail() {
        let err = Cli::parse_from(["rule-engine", "-r", "rules.json"])
            .into_options(&EngineConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("--facts"));
    }
}
