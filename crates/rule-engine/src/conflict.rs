//! 冲突消解
//!
//! 条件为真的规则按策略名依次排序。策略只改变顺序，不淘汰规则：
//! 排序后的所有规则都会触发。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::rule::Rule;

/// 冲突消解策略
pub trait ResolutionStrategy: Send + Sync {
    /// 策略名，在策略列表中引用
    fn name(&self) -> &str;

    /// 把候选列表转换为新的候选列表
    fn resolve<'a>(&self, rules: Vec<&'a Rule>) -> Vec<&'a Rule>;
}

/// 按优先级降序，稳定排序
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityStrategy;

impl ResolutionStrategy for PriorityStrategy {
    fn name(&self) -> &str {
        "priority"
    }

    fn resolve<'a>(&self, mut rules: Vec<&'a Rule>) -> Vec<&'a Rule> {
        rules.sort_by_key(|rule| std::cmp::Reverse(rule.priority()));
        rules
    }
}

/// 按条件结构权重降序，稳定排序
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecificityStrategy;

impl ResolutionStrategy for SpecificityStrategy {
    fn name(&self) -> &str {
        "specificity"
    }

    fn resolve<'a>(&self, mut rules: Vec<&'a Rule>) -> Vec<&'a Rule> {
        rules.sort_by_cached_key(|rule| std::cmp::Reverse(rule.specificity()));
        rules
    }
}

/// 保持声明顺序
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderStrategy;

impl ResolutionStrategy for OrderStrategy {
    fn name(&self) -> &str {
        "order"
    }

    fn resolve<'a>(&self, rules: Vec<&'a Rule>) -> Vec<&'a Rule> {
        rules
    }
}

/// 策略管道
#[derive(Clone)]
pub struct ConflictResolver {
    strategies: HashMap<String, Arc<dyn ResolutionStrategy>>,
}

impl ConflictResolver {
    /// 不含任何策略
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// 注册策略，同名策略被替换
    pub fn register(mut self, strategy: impl ResolutionStrategy + 'static) -> Self {
        self.strategies
            .insert(strategy.name().to_string(), Arc::new(strategy));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// 按给定顺序依次应用策略
    ///
    /// 少于两条规则时原样返回；未知策略名跳过。
    pub fn resolve<'a, S: AsRef<str>>(&self, rules: Vec<&'a Rule>, names: &[S]) -> Vec<&'a Rule> {
        if rules.len() < 2 {
            return rules;
        }

        names.iter().fold(rules, |rules, name| {
            let name = name.as_ref();
            match self.strategies.get(name) {
                Some(strategy) => strategy.resolve(rules),
                None => {
                    debug!(strategy = %name, "未知的冲突消解策略，已跳过");
                    rules
                }
            }
        })
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::empty()
            .register(PriorityStrategy)
            .register(SpecificityStrategy)
            .register(OrderStrategy)
    }
}

impl fmt::Debug for ConflictResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ConflictResolver")
            .field("strategies", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ExpressionParser;
    use crate::registry::CommandRegistry;
    use crate::rule::RuleDefinition;
    use serde_json::{Value, json};

    fn rule(name: &str, condition: Value, priority: i32) -> Rule {
        let registry = CommandRegistry::global();
        Rule::compile(
            RuleDefinition::new(name, condition).with_priority(priority),
            &ExpressionParser::new(&registry),
        )
        .unwrap()
    }

    fn names(rules: &[&Rule]) -> Vec<String> {
        rules.iter().map(|r| r.name().to_string()).collect()
    }

    #[test]
    fn test_priority_is_stable() {
        let rules = [
            rule("first", json!(true), 1),
            rule("high", json!(true), 5),
            rule("second", json!(true), 1),
        ];

        let resolved = ConflictResolver::default().resolve(rules.iter().collect(), &["priority"]);
        assert_eq!(names(&resolved), vec!["high", "first", "second"]);
    }

    #[test]
    fn test_specificity_prefers_heavier_conditions() {
        let rules = [
            rule("light", json!({"a": 1}), 0),
            rule("heavy", json!({"aaa": 1, "b": [1, 2]}), 0),
        ];

        let resolved =
            ConflictResolver::default().resolve(rules.iter().collect(), &["specificity"]);
        assert_eq!(names(&resolved), vec!["heavy", "light"]);
    }

    #[test]
    fn test_strategies_apply_in_sequence() {
        let rules = [
            rule("short", json!({"op.not": [false]}), 1),
            rule("long", json!({"op.equal": [{"ctx.get": ["x"]}, 1]}), 1),
            rule("urgent", json!(true), 9),
        ];
        let resolver = ConflictResolver::default();

        // 后应用的策略决定主序，先应用的策略在并列时保留
        let resolved = resolver.resolve(rules.iter().collect(), &["specificity", "priority"]);
        assert_eq!(names(&resolved), vec!["urgent", "long", "short"]);

        let resolved = resolver.resolve(rules.iter().collect(), &["priority", "order"]);
        assert_eq!(names(&resolved), vec!["urgent", "short", "long"]);
    }

    #[test]
    fn test_unknown_strategy_is_skipped() {
        let rules = [rule("a", json!(true), 0), rule("b", json!(true), 3)];

        let resolved =
            ConflictResolver::default().resolve(rules.iter().collect(), &["random", "order"]);
        assert_eq!(names(&resolved), vec!["a", "b"]);
    }

    #[test]
    fn test_single_candidate_returned_as_is() {
        let rules = [rule("only", json!(true), 0)];
        let resolved = ConflictResolver::empty().resolve(rules.iter().collect(), &["priority"]);
        assert_eq!(names(&resolved), vec!["only"]);
    }

    #[test]
    fn test_custom_strategy() {
        struct Reverse;

        impl ResolutionStrategy for Reverse {
            fn name(&self) -> &str {
                "reverse"
            }

            fn resolve<'a>(&self, mut rules: Vec<&'a Rule>) -> Vec<&'a Rule> {
                rules.reverse();
                rules
            }
        }

        let resolver = ConflictResolver::default().register(Reverse);
        assert!(resolver.contains("reverse"));

        let rules = [rule("a", json!(true), 0), rule("b", json!(true), 0)];
        let resolved = resolver.resolve(rules.iter().collect(), &["reverse"]);
        assert_eq!(names(&resolved), vec!["b", "a"]);
    }
}
