//! 规则定义与编译后的规则
//!
//! `RuleDefinition` 是声明式的输入格式；`Rule` 在构造时把条件和动作编译成命令树，
//! 之后不可变。原始的声明式对象保留下来，用于特异性计分和诊断。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::command::{BoxedCommand, Command};
use crate::error::{Result, RuleError};
use crate::parser::ExpressionParser;

/// 规则定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub condition: Value,
    #[serde(default)]
    pub pre_actions: Vec<Value>,
    #[serde(default)]
    pub post_actions: Vec<Value>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_group: Option<String>,
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>, condition: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            condition,
            pre_actions: Vec::new(),
            post_actions: Vec::new(),
            priority: 0,
            is_final: false,
            activation_group: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_pre_action(mut self, action: Value) -> Self {
        self.pre_actions.push(action);
        self
    }

    pub fn with_post_action(mut self, action: Value) -> Self {
        self.post_actions.push(action);
        self
    }
}

/// 编译后的规则
#[derive(Debug)]
pub struct Rule {
    id: String,
    definition: RuleDefinition,
    condition: BoxedCommand,
    pre_actions: Vec<BoxedCommand>,
    post_actions: Vec<BoxedCommand>,
}

impl Rule {
    /// 从定义编译规则，生成新的唯一 ID
    pub fn compile(definition: RuleDefinition, parser: &ExpressionParser<'_>) -> Result<Self> {
        if definition.name.trim().is_empty() {
            return Err(RuleError::InvalidDefinition("规则名称不能为空".to_string()));
        }

        let condition = parser.parse_condition(&definition.condition)?;
        let pre_actions = definition
            .pre_actions
            .iter()
            .map(|action| parser.parse_action(action))
            .collect::<Result<Vec<_>>>()?;
        let post_actions = definition
            .post_actions
            .iter()
            .map(|action| parser.parse_action(action))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            definition,
            condition,
            pre_actions,
            post_actions,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> Option<&str> {
        self.definition.description.as_deref()
    }

    pub fn priority(&self) -> i32 {
        self.definition.priority
    }

    /// 保留字段，当前不参与调度
    pub fn is_final(&self) -> bool {
        self.definition.is_final
    }

    /// 保留字段，当前不参与冲突消解
    pub fn activation_group(&self) -> Option<&str> {
        self.definition.activation_group.as_deref()
    }

    /// 原始声明式定义
    pub fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    pub fn condition(&self) -> &dyn Command {
        self.condition.as_ref()
    }

    pub fn pre_actions(&self) -> &[BoxedCommand] {
        &self.pre_actions
    }

    pub fn post_actions(&self) -> &[BoxedCommand] {
        &self.post_actions
    }

    /// 条件的结构权重，见 [`specificity`]
    pub fn specificity(&self) -> usize {
        specificity(&self.definition.condition)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<String> = self.post_actions.iter().map(|a| a.render()).collect();
        write!(
            f,
            "rule \"{}\" (priority {}): IF {} THEN [{}]",
            self.name(),
            self.priority(),
            self.condition.render(),
            actions.join(", ")
        )
    }
}

/// 声明式条件的结构权重
///
/// 对象中每个键贡献其字符长度，数组值中的每个元素递归计分。
/// 引用字段越多、名字越长的条件权重越高。
pub fn specificity(node: &Value) -> usize {
    let Value::Object(map) = node else {
        return 0;
    };

    map.iter()
        .map(|(key, value)| {
            let nested = match value {
                Value::Array(items) => items.iter().map(specificity).sum(),
                _ => 0,
            };
            key.chars().count() + nested
        })
        .sum()
}
