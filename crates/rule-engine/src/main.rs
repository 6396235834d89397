//! 规则引擎命令行入口
//!
//! 对一份事实执行一次规则评估，结果以 JSON 输出。

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use rule_engine::Engine;
use ruleflow_shared::config::AppConfig;
use ruleflow_shared::observability;
use serde_json::Value;
use tracing::info;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 统一加载配置：从 config/{service_name}.toml 加载，包含可观测性配置
    let config = AppConfig::load("ruleflow-rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    let options = cli.into_options(&config.engine)?;

    let rules = tokio::fs::read_to_string(&options.rules)
        .await
        .with_context(|| format!("读取规则文件失败: {}", options.rules.display()))?;
    let facts = tokio::fs::read_to_string(&options.facts)
        .await
        .with_context(|| format!("读取事实文件失败: {}", options.facts.display()))?;
    let facts: Value = serde_json::from_str(&facts)
        .with_context(|| format!("事实文件不是合法 JSON: {}", options.facts.display()))?;

    let mut engine = Engine::new();
    if options.trace {
        engine = engine.with_trace();
    }
    let ids = engine
        .add_rules_from_json(&rules)
        .with_context(|| format!("规则加载失败: {}", options.rules.display()))?;

    info!(
        rules = ids.len(),
        strategies = ?options.strategies,
        "Starting evaluation pass"
    );

    let result = engine.evaluate(facts, &options.strategies).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
