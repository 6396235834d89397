//! 前向规则引擎
//!
//! 提供可复用的规则评估能力，支持：
//! - JSON 表达式树解析为命令树
//! - 按类别注册的命令库（操作符、函数、上下文访问）
//! - 带访问拦截的事实上下文
//! - 可插拔的冲突消解策略
//! - 按规则、按阶段隔离失败的评估流程

pub mod command;
pub mod commands;
pub mod conflict;
pub mod context;
pub mod engine;
pub mod error;
pub mod parser;
pub mod registry;
pub mod rule;
pub mod session;

pub use command::{BoxedCommand, Command, Literal};
pub use conflict::{
    ConflictResolver, OrderStrategy, PriorityStrategy, ResolutionStrategy, SpecificityStrategy,
};
pub use context::{ContextAccess, ContextObserver, FactContext, ObserverGuard};
pub use engine::{AccessRecord, Engine, EvaluationResult, Phase};
pub use error::{ErrorKind, Result, RuleError};
pub use parser::ExpressionParser;
pub use registry::{Category, CommandFactory, CommandRegistry};
pub use rule::{Rule, RuleDefinition};
pub use session::{OutcomeRecord, Session};
