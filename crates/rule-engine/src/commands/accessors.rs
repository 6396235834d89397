//! 上下文访问命令
//!
//! `ctx.get`、`ctx.set`、`ctx.delete`、`ctx.has`，全部经由 [`FactContext`] 的显式接口，
//! 因此每次访问都会被当前观察者看到。

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use super::{Arity, expect_str};
use crate::command::{BoxedCommand, Command, render_args};
use crate::context::FactContext;
use crate::error::Result;

/// 上下文访问方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    /// `[path]` 或 `[path, default]`
    Get,
    /// `[path, value]` 或 `[target, path, value]`，`target` 仅为占位
    Set,
    /// `[path]`
    Delete,
    /// `[path]`
    Has,
}

impl Accessor {
    pub const ALL: [Accessor; 4] = [Self::Get, Self::Set, Self::Delete, Self::Has];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Delete => "delete",
            Self::Has => "has",
        }
    }

    fn arity(&self) -> Arity {
        match self {
            Self::Get => Arity::Range(1, 2),
            Self::Set => Arity::Range(2, 3),
            Self::Delete | Self::Has => Arity::Exactly(1),
        }
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 上下文访问命令
#[derive(Debug)]
pub struct AccessorCommand {
    id: String,
    accessor: Accessor,
    args: Vec<BoxedCommand>,
}

impl AccessorCommand {
    pub fn new(accessor: Accessor, args: Vec<BoxedCommand>) -> Result<Self> {
        let id = format!("ctx.{}", accessor.code());
        accessor.arity().check(&id, args.len())?;
        Ok(Self { id, accessor, args })
    }

    async fn path(&self, index: usize, ctx: &FactContext) -> Result<String> {
        let value = self.args[index].execute(ctx).await?;
        Ok(expect_str(&value)?.to_string())
    }
}

#[async_trait]
impl Command for AccessorCommand {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &FactContext) -> Result<Value> {
        match self.accessor {
            Accessor::Get => {
                let path = self.path(0, ctx).await?;
                match ctx.get(&path)? {
                    Some(value) => Ok(value),
                    None => match self.args.get(1) {
                        Some(default) => default.execute(ctx).await,
                        None => Ok(Value::Null),
                    },
                }
            }
            Accessor::Set => {
                // 三参数形式的首个参数是占位符，不求值
                let offset = self.args.len() - 2;
                let path = self.path(offset, ctx).await?;
                let value = self.args[offset + 1].execute(ctx).await?;
                ctx.set(&path, value.clone())?;
                Ok(value)
            }
            Accessor::Delete => {
                let path = self.path(0, ctx).await?;
                Ok(ctx.delete(&path)?.unwrap_or(Value::Null))
            }
            Accessor::Has => {
                let path = self.path(0, ctx).await?;
                Ok(Value::Bool(ctx.has(&path)?))
            }
        }
    }

    fn render(&self) -> String {
        format!("{}{}", self.id, render_args(&self.args))
    }
}
