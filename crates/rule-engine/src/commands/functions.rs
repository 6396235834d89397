//! 函数命令
//!
//! 无副作用的值变换：字符串、数值、集合和日期。

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;

use super::{Arity, expect_f64, expect_str, number_value, parse_datetime};
use crate::command::{BoxedCommand, Command, execute_all, render_args};
use crate::context::FactContext;
use crate::error::{Result, RuleError};

/// 函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    UpperCase,
    LowerCase,
    Trim,
    Length,
    Concat,
    Abs,
    Round,
    Min,
    Max,
    Coalesce,
    Now,
    AddDays,
}

impl Function {
    pub const ALL: [Function; 12] = [
        Self::UpperCase,
        Self::LowerCase,
        Self::Trim,
        Self::Length,
        Self::Concat,
        Self::Abs,
        Self::Round,
        Self::Min,
        Self::Max,
        Self::Coalesce,
        Self::Now,
        Self::AddDays,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::UpperCase => "upperCase",
            Self::LowerCase => "lowerCase",
            Self::Trim => "trim",
            Self::Length => "length",
            Self::Concat => "concat",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Min => "min",
            Self::Max => "max",
            Self::Coalesce => "coalesce",
            Self::Now => "now",
            Self::AddDays => "addDays",
        }
    }

    fn arity(&self) -> Arity {
        match self {
            Self::Now => Arity::Exactly(0),
            Self::Round => Arity::Range(1, 2),
            Self::AddDays => Arity::Exactly(2),
            Self::Concat | Self::Min | Self::Max | Self::Coalesce => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    /// 在已求值的参数上计算结果
    pub fn apply(&self, args: &[Value]) -> Result<Value> {
        self.arity().check(self.code(), args.len())?;

        match self {
            Self::UpperCase => Ok(Value::from(expect_str(&args[0])?.to_uppercase())),
            Self::LowerCase => Ok(Value::from(expect_str(&args[0])?.to_lowercase())),
            Self::Trim => Ok(Value::from(expect_str(&args[0])?.trim())),
            Self::Length => length(&args[0]),
            Self::Concat => concat(args),
            Self::Abs => number_value(expect_f64(&args[0])?.abs()),
            Self::Round => {
                let value = expect_f64(&args[0])?;
                let digits = match args.get(1) {
                    Some(d) => expect_f64(d)? as i32,
                    None => 0,
                };
                let factor = 10f64.powi(digits);
                number_value((value * factor).round() / factor)
            }
            Self::Min => fold_numbers(args, f64::min),
            Self::Max => fold_numbers(args, f64::max),
            Self::Coalesce => Ok(args
                .iter()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null)),
            Self::Now => Ok(Value::from(
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            )),
            Self::AddDays => {
                let date = parse_datetime(&args[0])?;
                let days = expect_f64(&args[1])? as i64;
                let shifted = Duration::try_days(days)
                    .and_then(|delta| date.checked_add_signed(delta))
                    .ok_or_else(|| RuleError::ExecutionError(format!("日期溢出: {} 天", days)))?;
                Ok(Value::from(
                    shifted.to_rfc3339_opts(SecondsFormat::Secs, true),
                ))
            }
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 函数命令
#[derive(Debug)]
pub struct FunctionCommand {
    id: String,
    func: Function,
    args: Vec<BoxedCommand>,
}

impl FunctionCommand {
    pub fn new(func: Function, args: Vec<BoxedCommand>) -> Result<Self> {
        let id = format!("fn.{}", func.code());
        func.arity().check(&id, args.len())?;
        Ok(Self { id, func, args })
    }
}

#[async_trait]
impl Command for FunctionCommand {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &FactContext) -> Result<Value> {
        if self.func == Function::Coalesce {
            // 找到第一个非空值即停止
            for arg in &self.args {
                let value = arg.execute(ctx).await?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            return Ok(Value::Null);
        }

        let values = execute_all(&self.args, ctx).await?;
        self.func.apply(&values)
    }

    fn render(&self) -> String {
        format!("{}{}", self.id, render_args(&self.args))
    }
}

fn length(value: &Value) -> Result<Value> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(arr) => arr.len(),
        Value::Object(obj) => obj.len(),
        other => return Err(RuleError::type_mismatch("string, array or object", other)),
    };
    Ok(Value::from(len))
}

/// 首个参数是数组时拼接数组，否则拼接字符串
fn concat(args: &[Value]) -> Result<Value> {
    if args[0].is_array() {
        let mut joined = Vec::new();
        for arg in args {
            let items = arg
                .as_array()
                .ok_or_else(|| RuleError::type_mismatch("array", arg))?;
            joined.extend(items.iter().cloned());
        }
        return Ok(Value::Array(joined));
    }

    let mut joined = String::new();
    for arg in args {
        match arg {
            Value::String(s) => joined.push_str(s),
            Value::Number(_) | Value::Bool(_) => joined.push_str(&arg.to_string()),
            Value::Null => {}
            other => return Err(RuleError::type_mismatch("string", other)),
        }
    }
    Ok(Value::from(joined))
}

fn fold_numbers(args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value> {
    let mut acc = expect_f64(&args[0])?;
    for arg in &args[1..] {
        acc = f(acc, expect_f64(arg)?);
    }
    number_value(acc)
}
