//! 规则引擎集成测试
//!
//! 测试完整的规则加载、编译、评估工作流。

use std::sync::Arc;

use rule_engine::{
    BoxedCommand, Category, CommandRegistry, ConflictResolver, ContextAccess, Engine,
    ExpressionParser, Literal, Phase, ResolutionStrategy, Rule, RuleDefinition, RuleError,
};
use serde_json::{Value, json};

/// 创建测试事实：模拟一个购买事件
fn create_purchase_facts() -> Value {
    json!({
        "event": {
            "type": "PURCHASE",
            "timestamp": "2024-01-15T10:00:00Z",
            "source": "mobile_app"
        },
        "order": {
            "id": "order-12345",
            "amount": 1500,
            "currency": "CNY",
            "items": [
                {"sku": "TICKET-001", "name": "门票", "price": 500, "quantity": 2},
                {"sku": "FOOD-001", "name": "餐饮", "price": 500, "quantity": 1}
            ],
            "category": "park_visit"
        },
        "user": {
            "id": "user-67890",
            "level": "gold",
            "is_vip": true,
            "tags": ["frequent_visitor", "annual_pass"],
            "registered_at": "2023-01-01T00:00:00Z",
            "total_purchases": 15000
        }
    })
}

/// 创建测试事实：模拟一个退款事件
fn create_refund_facts() -> Value {
    json!({
        "event": {"type": "REFUND", "timestamp": "2024-01-16T14:30:00Z"},
        "order": {"id": "order-12345", "amount": 500},
        "user": {"id": "user-67890", "level": "silver", "is_vip": false, "tags": []}
    })
}

/// 购买场景的规则集（JSON 格式，与规则文件一致）
const PURCHASE_RULES: &str = r#"
[
    {
        "name": "vip_big_spender",
        "description": "VIP 用户大额消费",
        "condition": {
            "op.and": [
                {"op.equal": [{"ctx.get": ["event.type"]}, "PURCHASE"]},
                {"op.equal": [{"ctx.get": ["user.is_vip"]}, true]},
                {"op.greaterThanOrEqual": [{"ctx.get": ["order.amount"]}, 1000]}
            ]
        },
        "postActions": [
            {"ctx.set": [{}, "rewards.points", {"op.multiply": [{"ctx.get": ["order.amount"]}, 2]}]}
        ],
        "priority": 10
    },
    {
        "name": "ticket_buyer",
        "condition": {"op.startsWith": [{"ctx.get": ["order.items[0].sku"]}, "TICKET"]},
        "postActions": [
            {"ctx.set": [{}, "rewards.badge", {"fn.upperCase": [{"ctx.get": ["order.category"]}]}]}
        ]
    },
    {
        "name": "regular_purchase",
        "condition": {"op.equal": [{"ctx.get": ["event.type"]}, "PURCHASE"]},
        "postActions": [
            {"ctx.set": [{}, "rewards.points", 10]}
        ],
        "priority": 1
    },
    {
        "name": "refund_only",
        "condition": {"op.equal": [{"ctx.get": ["event.type"]}, "REFUND"]},
        "postActions": [
            {"ctx.set": [{}, "rewards.revoked", true]}
        ]
    }
]
"#;

fn load_engine(json: &str) -> Engine {
    let mut engine = Engine::new();
    engine.add_rules_from_json(json).unwrap();
    engine
}

fn fired_names(result: &rule_engine::EvaluationResult) -> Vec<&str> {
    result.fired.iter().map(|o| o.name.as_str()).collect()
}

#[tokio::test]
async fn test_adult_end_to_end() {
    let mut engine = Engine::new();
    engine
        .add_rules(vec![
            RuleDefinition::new(
                "adult",
                json!({"op.greaterThan": [{"ctx.get": ["age"]}, 18]}),
            )
            .with_post_action(json!({"ctx.set": [{}, "status", "adult"]})),
        ])
        .unwrap();

    let result = engine.evaluate(json!({"age": 20}), &["specificity"]).await;

    assert_eq!(fired_names(&result), vec!["adult"]);
    assert!(result.fired[0].fired);
    assert!(!result.fired[0].discarded);
    assert!(result.discarded.is_empty());
    assert_eq!(result.context, json!({"age": 20, "status": "adult"}));
}

#[tokio::test]
async fn test_purchase_workflow() {
    let engine = load_engine(PURCHASE_RULES);
    assert_eq!(engine.len(), 4);

    let result = engine
        .evaluate(create_purchase_facts(), &["priority"])
        .await;

    assert_eq!(
        fired_names(&result),
        vec!["vip_big_spender", "regular_purchase", "ticket_buyer"]
    );
    // 低优先级规则后触发，覆盖积分
    assert_eq!(result.context["rewards"]["points"], 10);
    assert_eq!(result.context["rewards"]["badge"], "PARK_VISIT");
    assert_eq!(result.fired[0].actions, Some(vec![json!(3000)]));
}

#[tokio::test]
async fn test_refund_workflow() {
    let engine = load_engine(PURCHASE_RULES);

    let result = engine.evaluate(create_refund_facts(), &["priority"]).await;

    // 退款事件没有 items，ticket_buyer 的条件读到 null 并失败，被排除
    assert_eq!(fired_names(&result), vec!["refund_only"]);
    assert!(result.discarded.is_empty());
    assert_eq!(result.context["rewards"], json!({"revoked": true}));
}

#[tokio::test]
async fn test_failure_isolation() {
    let engine = load_engine(
        r#"[
            {"name": "one", "condition": true, "postActions": [{"ctx.set": ["one", 1]}]},
            {"name": "two", "condition": {"op.lessThan": [{"ctx.get": ["missing"]}, "abc"]}},
            {"name": "three", "condition": true, "postActions": [{"op.divide": [1, 0]}]},
            {"name": "four", "condition": true, "postActions": [{"ctx.set": ["four", 4]}]}
        ]"#,
    );

    let result = engine.evaluate(json!({}), &["order"]).await;

    assert_eq!(fired_names(&result), vec!["one", "four"]);
    assert_eq!(result.discarded.len(), 1);
    assert_eq!(result.discarded[0].name, "three");
    assert!(
        result
            .fired
            .iter()
            .chain(result.discarded.iter())
            .all(|o| o.name != "two")
    );
    assert_eq!(result.context, json!({"one": 1, "four": 4}));
}

#[tokio::test]
async fn test_pre_action_failure_excludes_only_that_rule() {
    let engine = load_engine(
        r#"[
            {
                "name": "bad_setup",
                "condition": true,
                "preActions": [{"ctx.set": ["setup", "started"]}, {"op.divide": [1, 0]}],
                "postActions": [{"ctx.set": ["bad_setup", true]}]
            },
            {
                "name": "good_setup",
                "condition": {"op.equal": [{"ctx.get": ["setup"]}, "started"]},
                "preActions": [{"ctx.set": ["ready", true]}],
                "postActions": [{"ctx.set": ["good_setup", true]}]
            }
        ]"#,
    );

    let result = engine.evaluate(json!({}), &["order"]).await;

    assert_eq!(fired_names(&result), vec!["good_setup"]);
    assert!(result.discarded.is_empty());
    // 失败前已生效的前置写入保留
    assert_eq!(
        result.context,
        json!({"setup": "started", "ready": true, "good_setup": true})
    );
}

#[tokio::test]
async fn test_priority_resolution_is_stable() {
    let engine = load_engine(
        r#"[
            {"name": "first", "condition": true, "priority": 1},
            {"name": "urgent", "condition": true, "priority": 5},
            {"name": "second", "condition": true, "priority": 1}
        ]"#,
    );

    let result = engine.evaluate(json!({}), &["priority"]).await;
    assert_eq!(fired_names(&result), vec!["urgent", "first", "second"]);
}

#[tokio::test]
async fn test_specificity_resolution() {
    let mut engine = Engine::new();
    engine
        .add_rules(vec![
            RuleDefinition::new("general", json!({"op.not": [false]})),
            RuleDefinition::new(
                "specific",
                json!({"op.and": [
                    {"ctx.has": ["user.id"]},
                    {"op.isNotEmpty": [{"ctx.get": ["user.tags"]}]}
                ]}),
            ),
        ])
        .unwrap();

    assert!(engine.rules()[1].specificity() > engine.rules()[0].specificity());

    let result = engine
        .evaluate(create_purchase_facts(), &["specificity"])
        .await;
    assert_eq!(fired_names(&result), vec!["specific", "general"]);

    // 不排序时保持声明顺序
    let result = engine.evaluate(create_purchase_facts(), &["order"]).await;
    assert_eq!(fired_names(&result), vec!["general", "specific"]);
}

#[tokio::test]
async fn test_custom_strategy_and_registry() {
    struct VipFirst;

    impl ResolutionStrategy for VipFirst {
        fn name(&self) -> &str {
            "vip_first"
        }

        fn resolve<'a>(&self, mut rules: Vec<&'a Rule>) -> Vec<&'a Rule> {
            rules.sort_by_key(|rule| !rule.name().starts_with("vip"));
            rules
        }
    }

    let mut registry = CommandRegistry::builtin().unwrap();
    registry
        .register(Category::Function, "bonus", |_args: Vec<BoxedCommand>| {
            Ok(Box::new(Literal::new(50)) as BoxedCommand)
        })
        .unwrap();

    let mut engine = Engine::with_registry(Arc::new(registry))
        .with_resolver(ConflictResolver::default().register(VipFirst));
    engine
        .add_rules(vec![
            RuleDefinition::new("regular", json!(true))
                .with_post_action(json!({"ctx.set": ["bonus", 0]})),
            RuleDefinition::new("vip_bonus", json!(true))
                .with_post_action(json!({"ctx.set": ["bonus", {"fn.bonus": []}]})),
        ])
        .unwrap();

    let result = engine.evaluate(json!({}), &["vip_first"]).await;

    assert_eq!(fired_names(&result), vec!["vip_bonus", "regular"]);
    assert_eq!(result.context["bonus"], 0);
}

#[tokio::test]
async fn test_trace_records_every_access() {
    let mut engine = Engine::new().with_trace();
    engine
        .add_rules(vec![
            RuleDefinition::new("counter", json!({"ctx.has": ["visits"]}))
                .with_pre_action(json!({"ctx.set": ["visits", 0]}))
                .with_post_action(json!({"ctx.delete": ["visits"]})),
        ])
        .unwrap();

    let result = engine.evaluate(json!({}), &["order"]).await;

    let phases: Vec<Phase> = result.trace.iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::PreAction, Phase::Condition, Phase::PostAction]
    );
    assert!(matches!(result.trace[0].access, ContextAccess::Set { .. }));
    assert!(matches!(result.trace[1].access, ContextAccess::Get { .. }));
    assert!(matches!(result.trace[2].access, ContextAccess::Delete { .. }));
    assert_eq!(result.context, json!({}));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["trace"][0]["phase"], "pre_action");
    assert_eq!(json["trace"][0]["access"]["kind"], "set");
}

#[test]
fn test_construction_errors_surface_immediately() {
    let mut engine = Engine::new();

    let err = engine
        .add_rules_from_json(r#"[{"name": "bad", "condition": {"op.and": {"not": "an array"}}}]"#)
        .unwrap_err();
    assert!(matches!(err, RuleError::ArgumentsNotArray { .. }));

    let err = engine
        .add_rules_from_json(r#"[{"name": "bad", "condition": {"op.doesNotExist": []}}]"#)
        .unwrap_err();
    assert!(matches!(err, RuleError::UnknownIdentifier { .. }));

    let err = engine.add_rules_from_json(r#"{"name": "not a list"}"#).unwrap_err();
    assert_eq!(err.code(), "JSON_ERROR");

    assert!(engine.is_empty());
}

#[test]
fn test_rule_rendering() {
    let registry = CommandRegistry::global();
    let rule = Rule::compile(
        RuleDefinition::new(
            "vip",
            json!({"op.and": [{"ctx.get": ["user.is_vip"]}, {"op.in": [{"ctx.get": ["user.level"]}, ["gold", "platinum"]]}]}),
        )
        .with_post_action(json!({"ctx.set": [{}, "tier", "premium"]})),
        &ExpressionParser::new(&registry),
    )
    .unwrap();

    assert_eq!(
        rule.to_string(),
        r#"rule "vip" (priority 0): IF op.and(ctx.get("user.is_vip"), op.in(ctx.get("user.level"), ["gold","platinum"])) THEN [ctx.set({}, "tier", "premium")]"#
    );
}
