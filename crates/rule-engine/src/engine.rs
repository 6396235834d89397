//! 规则引擎
//!
//! 持有编译后的规则集，按阶段驱动一次完整评估：
//! 前置动作 → 条件 → 冲突消解 → 后置动作。
//! 单条规则的任何失败都被隔离在所属阶段内，不会中断整次评估。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use ruleflow_shared::observability::metrics;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::command::{execute_all, execute_bool};
use crate::conflict::ConflictResolver;
use crate::context::{ContextAccess, ContextObserver, FactContext, ObserverGuard};
use crate::error::{Result, RuleError};
use crate::parser::ExpressionParser;
use crate::registry::CommandRegistry;
use crate::rule::{Rule, RuleDefinition};
use crate::session::{OutcomeRecord, Session};

/// 评估阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreAction,
    Condition,
    PostAction,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreAction => "pre_action",
            Self::Condition => "condition",
            Self::PostAction => "post_action",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 一条归属到规则和阶段的上下文访问记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    pub rule: String,
    pub rule_id: String,
    pub phase: Phase,
    pub access: ContextAccess,
}

/// 一次评估的汇总结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// 耗时（毫秒）
    pub elapsed: u64,
    pub fired: Vec<OutcomeRecord>,
    pub discarded: Vec<OutcomeRecord>,
    /// 评估结束时的事实快照
    pub context: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<AccessRecord>,
}

/// 按规则安装的上下文观察者
struct RuleObserver {
    rule: String,
    rule_id: String,
    phase: Phase,
    trail: Option<Arc<Mutex<Vec<AccessRecord>>>>,
}

impl ContextObserver for RuleObserver {
    fn observe(&self, access: &ContextAccess) {
        debug!(
            rule = %self.rule,
            phase = %self.phase,
            path = %access.path(),
            access = ?access,
            "上下文访问"
        );

        if let Some(trail) = &self.trail {
            trail.lock().push(AccessRecord {
                rule: self.rule.clone(),
                rule_id: self.rule_id.clone(),
                phase: self.phase,
                access: access.clone(),
            });
        }
    }
}

/// 规则引擎
pub struct Engine {
    registry: Arc<CommandRegistry>,
    resolver: ConflictResolver,
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    trace_enabled: bool,
}

impl Engine {
    /// 使用进程级内置注册表
    pub fn new() -> Self {
        Self::with_registry(CommandRegistry::global())
    }

    pub fn with_registry(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            resolver: ConflictResolver::default(),
            rules: Vec::new(),
            index: HashMap::new(),
            trace_enabled: false,
        }
    }

    pub fn with_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// 在结果中附带上下文访问记录
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 编译并追加规则，返回新规则的 ID
    ///
    /// 全部编译成功才追加，任何一条失败时规则集保持不变。
    pub fn add_rules<I>(&mut self, definitions: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = RuleDefinition>,
    {
        let parser = ExpressionParser::new(&self.registry);
        let compiled = definitions
            .into_iter()
            .map(|def| Rule::compile(def, &parser))
            .collect::<Result<Vec<_>>>()?;

        let mut ids = Vec::with_capacity(compiled.len());
        for rule in compiled {
            debug!(rule = %rule.name(), rule_id = %rule.id(), "规则已加载");
            ids.push(rule.id().to_string());
            self.index.insert(rule.id().to_string(), self.rules.len());
            self.rules.push(rule);
        }

        Ok(ids)
    }

    /// 从 JSON 数组加载规则定义
    pub fn add_rules_from_json(&mut self, json: &str) -> Result<Vec<String>> {
        let definitions: Vec<RuleDefinition> = serde_json::from_str(json)?;
        self.add_rules(definitions)
    }

    pub fn rule(&self, id: &str) -> Result<&Rule> {
        self.index
            .get(id)
            .map(|&i| &self.rules[i])
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))
    }

    /// 按声明顺序的规则集
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 对一份事实执行一次完整评估
    ///
    /// 每次评估使用独立的上下文和会话；规则严格按声明顺序串行执行。
    pub async fn evaluate<S: AsRef<str>>(&self, facts: Value, strategies: &[S]) -> EvaluationResult {
        let start = Instant::now();
        let ctx = FactContext::new(facts);
        let trail = self
            .trace_enabled
            .then(|| Arc::new(Mutex::new(Vec::new())));
        let mut session = Session::new();
        let mut failed_pre_actions = HashSet::new();

        for rule in &self.rules {
            if rule.pre_actions().is_empty() {
                continue;
            }
            let _guard = self.instrument(&ctx, rule, Phase::PreAction, &trail);
            if let Err(e) = execute_all(rule.pre_actions(), &ctx).await {
                self.report_failure(rule, Phase::PreAction, &e);
                failed_pre_actions.insert(rule.id());
            }
        }

        for rule in &self.rules {
            // 前置动作失败的规则本次不参与匹配
            if failed_pre_actions.contains(rule.id()) {
                session.record_condition(rule, None);
                continue;
            }
            let _guard = self.instrument(&ctx, rule, Phase::Condition, &trail);
            let result = match execute_bool(rule.condition(), &ctx).await {
                Ok(matched) => Some(matched),
                Err(e) => {
                    self.report_failure(rule, Phase::Condition, &e);
                    None
                }
            };
            session.record_condition(rule, result);
        }

        let resolved = self
            .resolver
            .resolve(session.true_rules(&self.rules), strategies);

        for rule in resolved {
            let _guard = self.instrument(&ctx, rule, Phase::PostAction, &trail);
            let outcome = match execute_all(rule.post_actions(), &ctx).await {
                Ok(actions) => OutcomeRecord::fired(rule, actions),
                Err(e) => {
                    self.report_failure(rule, Phase::PostAction, &e);
                    OutcomeRecord::discarded(rule)
                }
            };
            if !session.record_outcome(outcome) {
                warn!(rule = %rule.name(), rule_id = %rule.id(), "动作结果未被会话接受");
            }
        }

        let (fired, discarded) = session.into_outcomes();
        let elapsed = start.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        metrics::record_evaluation_pass(fired.len(), discarded.len(), elapsed.as_secs_f64());

        info!(
            rules = self.rules.len(),
            fired = fired.len(),
            discarded = discarded.len(),
            elapsed_ms,
            "规则评估完成"
        );

        let trace = match trail {
            Some(trail) => {
                let mut records = trail.lock();
                std::mem::take(&mut *records)
            }
            None => Vec::new(),
        };

        EvaluationResult {
            elapsed: elapsed_ms,
            fired,
            discarded,
            context: ctx.into_inner(),
            trace,
        }
    }

    fn instrument<'c>(
        &self,
        ctx: &'c FactContext,
        rule: &Rule,
        phase: Phase,
        trail: &Option<Arc<Mutex<Vec<AccessRecord>>>>,
    ) -> ObserverGuard<'c> {
        ctx.observe(Arc::new(RuleObserver {
            rule: rule.name().to_string(),
            rule_id: rule.id().to_string(),
            phase,
            trail: trail.clone(),
        }))
    }

    fn report_failure(&self, rule: &Rule, phase: Phase, error: &RuleError) {
        warn!(
            rule = %rule.name(),
            rule_id = %rule.id(),
            phase = %phase,
            error = %error,
            error_code = error.code(),
            "规则执行失败"
        );
        metrics::record_rule_failure(phase.as_str());
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("rules", &self.rules.len())
            .field("resolver", &self.resolver)
            .field("trace_enabled", &self.trace_enabled)
            .finish()
    }
}
