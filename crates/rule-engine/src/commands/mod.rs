//! 内置命令库
//!
//! 操作符、函数和上下文访问三类叶子命令。每个命令只是 [`Command`](crate::Command)
//! 的一个实现，通过 [`register_builtins`] 注册到注册表。

pub mod accessors;
pub mod functions;
pub mod operators;

pub use accessors::{Accessor, AccessorCommand};
pub use functions::{Function, FunctionCommand};
pub use operators::{Operator, OperatorCommand};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Number, Value};

use crate::command::BoxedCommand;
use crate::error::{Result, RuleError};
use crate::registry::{Category, CommandRegistry};

/// 注册全部内置命令
pub fn register_builtins(registry: &mut CommandRegistry) -> Result<()> {
    for op in Operator::ALL {
        registry.register(Category::Operator, op.code(), move |args| {
            Ok(Box::new(OperatorCommand::new(op, args)?) as BoxedCommand)
        })?;
    }

    for func in Function::ALL {
        registry.register(Category::Function, func.code(), move |args| {
            Ok(Box::new(FunctionCommand::new(func, args)?) as BoxedCommand)
        })?;
    }

    for accessor in Accessor::ALL {
        registry.register(Category::Context, accessor.code(), move |args| {
            Ok(Box::new(AccessorCommand::new(accessor, args)?) as BoxedCommand)
        })?;
    }

    Ok(())
}

/// 参数个数约束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Exactly(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub(crate) fn check(self, id: &str, actual: usize) -> Result<()> {
        let (ok, expected) = match self {
            Self::Exactly(n) => (actual == n, n.to_string()),
            Self::Range(min, max) => (
                (min..=max).contains(&actual),
                format!("{} 到 {}", min, max),
            ),
            Self::AtLeast(n) => (actual >= n, format!("至少 {}", n)),
        };

        if ok {
            Ok(())
        } else {
            Err(RuleError::Arity {
                code: id.to_string(),
                expected,
                actual,
            })
        }
    }
}

/// 尝试将 Value 转换为 f64，数字字符串也视为数字
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn expect_f64(value: &Value) -> Result<f64> {
    as_f64(value).ok_or_else(|| RuleError::type_mismatch("number", value))
}

pub(crate) fn expect_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| RuleError::type_mismatch("string", value))
}

/// 整数结果保留为整数，其余为浮点数
pub(crate) fn number_value(n: f64) -> Result<Value> {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;

    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        return Ok(Value::from(n as i64));
    }

    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| RuleError::ExecutionError(format!("数值结果无效: {}", n)))
}

/// 解析日期时间，支持 RFC 3339 和 `YYYY-MM-DD`
pub(crate) fn parse_datetime(value: &Value) -> Result<DateTime<Utc>> {
    let s = value
        .as_str()
        .ok_or_else(|| RuleError::type_mismatch("datetime string", value))?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    Err(RuleError::TypeMismatch {
        expected: "datetime string".to_string(),
        actual: format!("'{}'", s),
    })
}
