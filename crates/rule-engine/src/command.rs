//! 命令抽象
//!
//! 条件和动作都被编译成命令树。叶子是字面量或上下文访问，内部节点是操作符和函数。
//! 求值统一为异步接口，不需要挂起的命令直接返回。

use async_trait::async_trait;
use serde_json::Value;

use crate::context::FactContext;
use crate::error::{Result, RuleError};

/// 可执行、可渲染的命令
#[async_trait]
pub trait Command: Send + Sync + std::fmt::Debug {
    /// 稳定标识，形如 `op.greaterThan`；字面量为 `literal`
    fn id(&self) -> &str;

    /// 在上下文上求值
    async fn execute(&self, ctx: &FactContext) -> Result<Value>;

    /// 人类可读的表达式形式
    fn render(&self) -> String;
}

pub type BoxedCommand = Box<dyn Command>;

/// 字面量命令
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    value: Value,
}

impl Literal {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[async_trait]
impl Command for Literal {
    fn id(&self) -> &str {
        "literal"
    }

    async fn execute(&self, _ctx: &FactContext) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn render(&self) -> String {
        self.value.to_string()
    }
}

/// 按声明顺序依次执行，收集返回值
pub async fn execute_all(commands: &[BoxedCommand], ctx: &FactContext) -> Result<Vec<Value>> {
    let mut results = Vec::with_capacity(commands.len());
    for command in commands {
        results.push(command.execute(ctx).await?);
    }
    Ok(results)
}

/// 求值并要求结果为布尔值
pub async fn execute_bool(command: &dyn Command, ctx: &FactContext) -> Result<bool> {
    match command.execute(ctx).await? {
        Value::Bool(b) => Ok(b),
        other => Err(RuleError::type_mismatch("boolean", &other)),
    }
}

/// 渲染参数列表，如 `(a, b)`
pub(crate) fn render_args(args: &[BoxedCommand]) -> String {
    let parts: Vec<String> = args.iter().map(|a| a.render()).collect();
    format!("({})", parts.join(", "))
}
