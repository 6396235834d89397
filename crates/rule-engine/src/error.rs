//! 规则引擎错误类型
//!
//! 错误分为三类：构造期错误（注册冲突、未知标识符、参数形状错误）在解析或注册时
//! 直接返回给调用方；校验错误（操作数类型不符）和运行期错误在命令求值时抛出，
//! 由引擎按规则、按阶段捕获。

use thiserror::Error;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 注册或解析阶段，调用方必须处理
    Construction,
    /// 操作数不满足类型要求
    Validation,
    /// 其他求值期失败
    Runtime,
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("命令编码重复注册: {category}.{code}")]
    DuplicateCode { category: String, code: String },

    #[error("未知的标识符: {category}.{code}")]
    UnknownIdentifier { category: String, code: String },

    #[error("参数必须是数组: {token}")]
    ArgumentsNotArray { token: String },

    #[error("参数个数错误: {code} 期望 {expected}, 实际 {actual}")]
    Arity {
        code: String,
        expected: String,
        actual: usize,
    },

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("无效的路径: {0}")]
    InvalidPath(String),

    #[error("无效的规则定义: {0}")]
    InvalidDefinition(String),

    #[error("规则执行失败: {0}")]
    ExecutionError(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateCode { .. } => "DUPLICATE_CODE",
            Self::UnknownIdentifier { .. } => "UNKNOWN_IDENTIFIER",
            Self::ArgumentsNotArray { .. } => "ARGUMENTS_NOT_ARRAY",
            Self::Arity { .. } => "ARITY_MISMATCH",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::InvalidDefinition(_) => "INVALID_DEFINITION",
            Self::ExecutionError(_) => "EXECUTION_ERROR",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateCode { .. }
            | Self::UnknownIdentifier { .. }
            | Self::ArgumentsNotArray { .. }
            | Self::Arity { .. }
            | Self::InvalidDefinition(_)
            | Self::JsonError(_) => ErrorKind::Construction,
            Self::TypeMismatch { .. } => ErrorKind::Validation,
            Self::InvalidPath(_) | Self::ExecutionError(_) | Self::RuleNotFound(_) => {
                ErrorKind::Runtime
            }
        }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, actual: &serde_json::Value) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: type_name(actual).to_string(),
        }
    }
}

/// 获取值的类型名称
pub(crate) fn type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
