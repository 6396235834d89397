//! 操作符命令
//!
//! 逻辑、比较、包含、字符串、时间和算术操作符。`and`/`or` 短路求值，
//! 其余操作符先按顺序求出全部操作数再计算。

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::fmt;

use super::{Arity, as_f64, expect_f64, expect_str, number_value, parse_datetime};
use crate::command::{BoxedCommand, Command, execute_all, execute_bool, render_args};
use crate::context::FactContext;
use crate::error::{Result, RuleError, type_name};

/// 操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // 逻辑
    And,
    Or,
    Not,

    // 通用比较
    Eq,
    Neq,

    // 数值比较
    Gt,
    Gte,
    Lt,
    Lte,
    Between,

    // 包含检查
    In,
    NotIn,
    Contains,
    ContainsAny,
    ContainsAll,

    // 字符串操作
    StartsWith,
    EndsWith,
    Matches,

    // 时间操作
    Before,
    After,

    // 空值检查
    IsEmpty,
    IsNotEmpty,

    // 算术
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl Operator {
    pub const ALL: [Operator; 27] = [
        Self::And,
        Self::Or,
        Self::Not,
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Between,
        Self::In,
        Self::NotIn,
        Self::Contains,
        Self::ContainsAny,
        Self::ContainsAll,
        Self::StartsWith,
        Self::EndsWith,
        Self::Matches,
        Self::Before,
        Self::After,
        Self::IsEmpty,
        Self::IsNotEmpty,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Modulo,
    ];

    /// 注册编码
    pub fn code(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Eq => "equal",
            Self::Neq => "notEqual",
            Self::Gt => "greaterThan",
            Self::Gte => "greaterThanOrEqual",
            Self::Lt => "lessThan",
            Self::Lte => "lessThanOrEqual",
            Self::Between => "between",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Contains => "contains",
            Self::ContainsAny => "containsAny",
            Self::ContainsAll => "containsAll",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Matches => "matches",
            Self::Before => "before",
            Self::After => "after",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Modulo => "modulo",
        }
    }

    fn arity(&self) -> Arity {
        match self {
            Self::And | Self::Or => Arity::AtLeast(1),
            Self::Add | Self::Multiply => Arity::AtLeast(2),
            Self::Not | Self::IsEmpty | Self::IsNotEmpty => Arity::Exactly(1),
            Self::Between => Arity::Exactly(3),
            _ => Arity::Exactly(2),
        }
    }

    /// 在已求值的操作数上计算结果
    ///
    /// `and`/`or` 在这里是非短路版本，命令执行时走短路路径。
    pub fn apply(&self, args: &[Value]) -> Result<Value> {
        self.arity().check(self.code(), args.len())?;
        let bool_value = |b: bool| -> Result<Value> { Ok(Value::Bool(b)) };

        match self {
            Self::And => {
                let mut result = true;
                for v in args {
                    result &= as_bool(v)?;
                }
                bool_value(result)
            }
            Self::Or => {
                let mut result = false;
                for v in args {
                    result |= as_bool(v)?;
                }
                bool_value(result)
            }
            Self::Not => bool_value(!as_bool(&args[0])?),
            Self::Eq => bool_value(eq(&args[0], &args[1])),
            Self::Neq => bool_value(!eq(&args[0], &args[1])),
            Self::Gt => compare(&args[0], &args[1], |a, b| a > b),
            Self::Gte => compare(&args[0], &args[1], |a, b| a >= b),
            Self::Lt => compare(&args[0], &args[1], |a, b| a < b),
            Self::Lte => compare(&args[0], &args[1], |a, b| a <= b),
            Self::Between => {
                let value = expect_f64(&args[0])?;
                let min = expect_f64(&args[1])?;
                let max = expect_f64(&args[2])?;
                bool_value(value >= min && value <= max)
            }
            Self::In => in_list(&args[0], &args[1]).map(Value::Bool),
            Self::NotIn => in_list(&args[0], &args[1]).map(|r| Value::Bool(!r)),
            Self::Contains => contains(&args[0], &args[1]).map(Value::Bool),
            Self::ContainsAny => {
                let (haystack, needles) = (expect_array(&args[0])?, expect_array(&args[1])?);
                bool_value(needles.iter().any(|n| haystack.iter().any(|h| eq(h, n))))
            }
            Self::ContainsAll => {
                let (haystack, needles) = (expect_array(&args[0])?, expect_array(&args[1])?);
                bool_value(needles.iter().all(|n| haystack.iter().any(|h| eq(h, n))))
            }
            Self::StartsWith => {
                bool_value(expect_str(&args[0])?.starts_with(expect_str(&args[1])?))
            }
            Self::EndsWith => bool_value(expect_str(&args[0])?.ends_with(expect_str(&args[1])?)),
            Self::Matches => regex_match(&args[0], &args[1]).map(Value::Bool),
            Self::Before => bool_value(parse_datetime(&args[0])? < parse_datetime(&args[1])?),
            Self::After => bool_value(parse_datetime(&args[0])? > parse_datetime(&args[1])?),
            Self::IsEmpty => bool_value(is_empty(&args[0])),
            Self::IsNotEmpty => bool_value(!is_empty(&args[0])),
            Self::Add => number_value(args.iter().map(expect_f64).sum::<Result<f64>>()?),
            Self::Subtract => number_value(expect_f64(&args[0])? - expect_f64(&args[1])?),
            Self::Multiply => number_value(args.iter().map(expect_f64).product::<Result<f64>>()?),
            Self::Divide => {
                let divisor = non_zero(&args[1])?;
                number_value(expect_f64(&args[0])? / divisor)
            }
            Self::Modulo => {
                let divisor = non_zero(&args[1])?;
                number_value(expect_f64(&args[0])? % divisor)
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 操作符命令
#[derive(Debug)]
pub struct OperatorCommand {
    id: String,
    op: Operator,
    args: Vec<BoxedCommand>,
}

impl OperatorCommand {
    pub fn new(op: Operator, args: Vec<BoxedCommand>) -> Result<Self> {
        let id = format!("op.{}", op.code());
        op.arity().check(&id, args.len())?;
        Ok(Self { id, op, args })
    }
}

#[async_trait]
impl Command for OperatorCommand {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &FactContext) -> Result<Value> {
        match self.op {
            // AND: 遇到 false 立即返回
            Operator::And => {
                for arg in &self.args {
                    if !execute_bool(arg.as_ref(), ctx).await? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            // OR: 遇到 true 立即返回
            Operator::Or => {
                for arg in &self.args {
                    if execute_bool(arg.as_ref(), ctx).await? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            op => {
                let values = execute_all(&self.args, ctx).await?;
                op.apply(&values)
            }
        }
    }

    fn render(&self) -> String {
        format!("{}{}", self.id, render_args(&self.args))
    }
}

fn as_bool(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| RuleError::type_mismatch("boolean", value))
}

fn expect_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| RuleError::type_mismatch("array", value))
}

fn non_zero(value: &Value) -> Result<f64> {
    let n = expect_f64(value)?;
    if n == 0.0 {
        return Err(RuleError::ExecutionError("除数不能为 0".to_string()));
    }
    Ok(n)
}

/// 判断值是否为空
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

/// 相等比较
fn eq(left: &Value, right: &Value) -> bool {
    // 数值统一转为浮点数，避免 100 和 100.0 比较失败
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return (l - r).abs() < f64::EPSILON;
    }
    left == right
}

/// 数值比较
fn compare<F>(left: &Value, right: &Value, cmp: F) -> Result<Value>
where
    F: Fn(f64, f64) -> bool,
{
    Ok(Value::Bool(cmp(expect_f64(left)?, expect_f64(right)?)))
}

/// 列表包含检查 (in)
fn in_list(value: &Value, list: &Value) -> Result<bool> {
    Ok(expect_array(list)?.iter().any(|item| eq(value, item)))
}

/// 字符串子串或数组成员检查
fn contains(haystack: &Value, needle: &Value) -> Result<bool> {
    match haystack {
        Value::String(s) => Ok(s.contains(expect_str(needle)?)),
        Value::Array(arr) => Ok(arr.iter().any(|item| eq(item, needle))),
        _ => Err(RuleError::TypeMismatch {
            expected: "string or array".to_string(),
            actual: type_name(haystack).to_string(),
        }),
    }
}

/// 正则表达式匹配
fn regex_match(value: &Value, pattern: &Value) -> Result<bool> {
    let s = expect_str(value)?;
    let pattern = pattern
        .as_str()
        .ok_or_else(|| RuleError::type_mismatch("string (regex pattern)", pattern))?;

    let regex = Regex::new(pattern).map_err(|e| {
        RuleError::ExecutionError(format!("无效的正则表达式 '{}': {}", pattern, e))
    })?;

    Ok(regex.is_match(s))
}
