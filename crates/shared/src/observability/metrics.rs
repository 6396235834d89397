//! 规则评估指标
//!
//! 基于 metrics crate 门面记录。导出器由宿主安装，未安装 recorder 时记录是空操作。

/// 登记指标描述
pub fn describe_metrics() {
    metrics::describe_counter!(
        "rule_evaluation_passes_total",
        "Total number of rule evaluation passes"
    );
    metrics::describe_histogram!(
        "rule_evaluation_pass_duration_seconds",
        "Rule evaluation pass duration in seconds"
    );
    metrics::describe_counter!("rules_fired_total", "Total number of fired rules");
    metrics::describe_counter!("rules_discarded_total", "Total number of discarded rules");
    metrics::describe_counter!(
        "rule_failures_total",
        "Total number of rule failures by phase"
    );
}

/// 记录一次完整评估
#[inline]
pub fn record_evaluation_pass(fired: usize, discarded: usize, duration_secs: f64) {
    metrics::counter!("rule_evaluation_passes_total").increment(1);
    metrics::histogram!("rule_evaluation_pass_duration_seconds").record(duration_secs);
    metrics::counter!("rules_fired_total").increment(fired as u64);
    metrics::counter!("rules_discarded_total").increment(discarded as u64);
}

/// 记录单条规则在某阶段的失败
#[inline]
pub fn record_rule_failure(phase: &str) {
    metrics::counter!(
        "rule_failures_total",
        "phase" => phase.to_string()
    )
    .increment(1);
}
