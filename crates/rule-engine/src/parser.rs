//! 表达式解析器
//!
//! 把 `{"<category>.<code>": [args...]}` 形式的 JSON 递归转换为命令树。
//! 条件和动作共用同一套解析逻辑。

use serde_json::Value;

use crate::command::{BoxedCommand, Literal};
use crate::error::{Result, RuleError};
use crate::registry::{Category, CommandRegistry};

/// 表达式解析器
pub struct ExpressionParser<'r> {
    registry: &'r CommandRegistry,
}

impl<'r> ExpressionParser<'r> {
    pub fn new(registry: &'r CommandRegistry) -> Self {
        Self { registry }
    }

    /// 解析条件表达式，结果约定为布尔值
    pub fn parse_condition(&self, node: &Value) -> Result<BoxedCommand> {
        self.parse(node)
    }

    /// 解析动作表达式
    pub fn parse_action(&self, node: &Value) -> Result<BoxedCommand> {
        self.parse(node)
    }

    /// 解析任意表达式节点
    ///
    /// 多键对象只看第一个键（按声明顺序），其余键被忽略。
    pub fn parse(&self, node: &Value) -> Result<BoxedCommand> {
        let Value::Object(map) = node else {
            return Ok(Box::new(Literal::new(node.clone())));
        };

        let Some((token, args)) = map.iter().next() else {
            return Ok(Box::new(Literal::new(node.clone())));
        };

        // 类别未知时整个对象视为字面量
        let Some((category, code)) = token
            .split_once('.')
            .and_then(|(prefix, code)| Some((Category::from_prefix(prefix)?, code)))
        else {
            return Ok(Box::new(Literal::new(node.clone())));
        };

        let factory =
            self.registry
                .lookup(category, code)
                .ok_or_else(|| RuleError::UnknownIdentifier {
                    category: category.to_string(),
                    code: code.to_string(),
                })?;

        let Value::Array(items) = args else {
            return Err(RuleError::ArgumentsNotArray {
                token: token.clone(),
            });
        };

        let parsed = items
            .iter()
            .map(|item| self.parse(item))
            .collect::<Result<Vec<_>>>()?;

        factory(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FactContext;
    use serde_json::json;

    fn parse(node: Value) -> Result<BoxedCommand> {
        let registry = CommandRegistry::global();
        ExpressionParser::new(&registry).parse(&node)
    }

    #[tokio::test]
    async fn test_literals_pass_through() {
        let ctx = FactContext::default();

        for literal in [
            json!(42),
            json!("text"),
            json!(true),
            json!(null),
            json!([1, 2, 3]),
            json!({}),
            json!({"name": "plain object"}),
            json!({"unknown.code": [1]}),
        ] {
            let command = parse(literal.clone()).unwrap();
            assert_eq!(command.id(), "literal");
            assert_eq!(command.execute(&ctx).await.unwrap(), literal);
        }
    }

    #[test]
    fn test_arguments_must_be_array() {
        let err = parse(json!({"op.and": {"not": "an array"}})).unwrap_err();
        assert!(matches!(err, RuleError::ArgumentsNotArray { .. }));
        assert_eq!(err.to_string(), "参数必须是数组: op.and");
    }

    #[test]
    fn test_unknown_identifier() {
        let err = parse(json!({"op.doesNotExist": []})).unwrap_err();
        assert!(matches!(
            err,
            RuleError::UnknownIdentifier { ref category, ref code }
                if category == "op" && code == "doesNotExist"
        ));
    }

    #[test]
    fn test_nested_errors_propagate() {
        let err = parse(json!({"op.and": [true, {"fn.nope": []}]})).unwrap_err();
        assert!(matches!(err, RuleError::UnknownIdentifier { .. }));
    }

    #[tokio::test]
    async fn test_parse_nested_expression() {
        let ctx = FactContext::new(json!({"age": 20}));
        let command = parse(json!({
            "op.greaterThan": [{"ctx.get": ["age"]}, 18]
        }))
        .unwrap();

        assert_eq!(command.id(), "op.greaterThan");
        assert_eq!(command.render(), r#"op.greaterThan(ctx.get("age"), 18)"#);
        assert_eq!(command.execute(&ctx).await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_multi_key_node_uses_first_key() {
        let ctx = FactContext::default();
        let command = parse(json!({
            "op.equal": [1, 1],
            "op.notEqual": [1, 1]
        }))
        .unwrap();

        assert_eq!(command.id(), "op.equal");
        assert_eq!(command.execute(&ctx).await.unwrap(), json!(true));
    }

    #[test]
    fn test_custom_registry() {
        let mut registry = CommandRegistry::new();
        registry
            .register(Category::Function, "answer", |_args| {
                Ok(Box::new(Literal::new(42)) as BoxedCommand)
            })
            .unwrap();

        let parser = ExpressionParser::new(&registry);
        assert!(parser.parse(&json!({"fn.answer": []})).is_ok());
        assert!(parser.parse(&json!({"op.and": []})).is_err());
    }
}
