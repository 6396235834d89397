//! 命令注册表
//!
//! 按类别（操作符、函数、上下文访问）把字符串编码映射到命令构造器。
//! 注册只在启动时发生，同一类别内编码不可重复。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use crate::command::BoxedCommand;
use crate::commands;
use crate::error::{Result, RuleError};

/// 命令类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 算术、逻辑、比较
    Operator,
    /// 纯函数变换
    Function,
    /// 事实上下文读写
    Context,
}

impl Category {
    pub const ALL: [Category; 3] = [Self::Operator, Self::Function, Self::Context];

    /// 表达式键中的类别前缀
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Operator => "op",
            Self::Function => "fn",
            Self::Context => "ctx",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.prefix() == prefix)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl FromStr for Category {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_prefix(s)
            .ok_or_else(|| RuleError::InvalidDefinition(format!("未知的命令类别: {}", s)))
    }
}

/// 命令构造器：接收已解析的参数列表，参数个数在这里校验
pub type CommandFactory = Arc<dyn Fn(Vec<BoxedCommand>) -> Result<BoxedCommand> + Send + Sync>;

static GLOBAL: LazyLock<Arc<CommandRegistry>> = LazyLock::new(|| {
    let registry = CommandRegistry::builtin()
        .unwrap_or_else(|e| panic!("内置命令注册失败: {}", e));
    Arc::new(registry)
});

/// 命令注册表
#[derive(Clone, Default)]
pub struct CommandRegistry {
    factories: HashMap<Category, HashMap<String, CommandFactory>>,
}

impl CommandRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含全部内置命令的注册表
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        commands::register_builtins(&mut registry)?;
        Ok(registry)
    }

    /// 进程级共享注册表，首次访问时初始化
    pub fn global() -> Arc<CommandRegistry> {
        GLOBAL.clone()
    }

    /// 注册命令构造器，编码已存在时返回错误
    pub fn register<F>(&mut self, category: Category, code: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(Vec<BoxedCommand>) -> Result<BoxedCommand> + Send + Sync + 'static,
    {
        let code = code.into();
        let entries = self.factories.entry(category).or_default();

        if entries.contains_key(&code) {
            return Err(RuleError::DuplicateCode {
                category: category.to_string(),
                code,
            });
        }

        entries.insert(code, Arc::new(factory));
        Ok(())
    }

    /// 查找构造器
    pub fn lookup(&self, category: Category, code: &str) -> Option<&CommandFactory> {
        self.factories.get(&category)?.get(code)
    }

    pub fn contains(&self, category: Category, code: &str) -> bool {
        self.lookup(category, code).is_some()
    }

    /// 某类别下已注册的编码（已排序）
    pub fn codes(&self, category: Category) -> Vec<&str> {
        let mut codes: Vec<&str> = self
            .factories
            .get(&category)
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default();
        codes.sort_unstable();
        codes
    }

    pub fn len(&self) -> usize {
        self.factories.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for category in Category::ALL {
            map.entry(&category.prefix(), &self.codes(category));
        }
        map.finish()
    }
}
