//! 评估会话
//!
//! 每次评估新建一个会话，记录条件结果、动作结果以及触发和丢弃列表。
//! 一条规则最多进入 `fired` 或 `discarded` 之一，且仅当其条件为真。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rule::Rule;

/// 单条规则的执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub name: String,
    pub fired: bool,
    pub discarded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Value>>,
}

impl OutcomeRecord {
    pub fn fired(rule: &Rule, actions: Vec<Value>) -> Self {
        Self {
            rule_id: Some(rule.id().to_string()),
            name: rule.name().to_string(),
            fired: true,
            discarded: false,
            actions: Some(actions),
        }
    }

    pub fn discarded(rule: &Rule) -> Self {
        Self {
            rule_id: Some(rule.id().to_string()),
            name: rule.name().to_string(),
            fired: false,
            discarded: true,
            actions: None,
        }
    }
}

/// 一次评估的可变状态
#[derive(Debug, Default)]
pub struct Session {
    /// `None` 表示条件求值失败
    condition_results: HashMap<String, Option<bool>>,
    action_results: HashMap<String, OutcomeRecord>,
    fired: Vec<OutcomeRecord>,
    discarded: Vec<OutcomeRecord>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_condition(&mut self, rule: &Rule, result: Option<bool>) {
        self.condition_results.insert(rule.id().to_string(), result);
    }

    pub fn condition_result(&self, rule_id: &str) -> Option<Option<bool>> {
        self.condition_results.get(rule_id).copied()
    }

    /// 条件结果恰为 `true` 的规则，保持传入顺序
    pub fn true_rules<'a>(&self, rules: &'a [Rule]) -> Vec<&'a Rule> {
        rules
            .iter()
            .filter(|rule| self.condition_result(rule.id()) == Some(Some(true)))
            .collect()
    }

    /// 记录动作结果
    ///
    /// 条件不为真、或已有结果的规则被忽略，返回 `false`。
    pub fn record_outcome(&mut self, outcome: OutcomeRecord) -> bool {
        let Some(rule_id) = outcome.rule_id.clone() else {
            return false;
        };
        if self.condition_result(&rule_id) != Some(Some(true))
            || self.action_results.contains_key(&rule_id)
        {
            return false;
        }

        if outcome.fired {
            self.fired.push(outcome.clone());
        } else {
            self.discarded.push(outcome.clone());
        }
        self.action_results.insert(rule_id, outcome);
        true
    }

    pub fn action_result(&self, rule_id: &str) -> Option<&OutcomeRecord> {
        self.action_results.get(rule_id)
    }

    pub fn fired(&self) -> &[OutcomeRecord] {
        &self.fired
    }

    pub fn discarded(&self) -> &[OutcomeRecord] {
        &self.discarded
    }

    /// 消耗会话，取出触发和丢弃列表
    pub fn into_outcomes(self) -> (Vec<OutcomeRecord>, Vec<OutcomeRecord>) {
        (self.fired, self.discarded)
    }
}
