//! 规则评估器
//!
//! 递归遍历语法树并对属性记录求值。AND/OR 短路求值，未访问的子树不会报错；
//! 合并规则时被多个父节点共享的子树，在同一次评估中只计算一次。

use crate::ast::{Comparison, Literal, Node};
use crate::catalog::AttributeCatalog;
use crate::error::{Result, RuleError};
use crate::models::{Record, Value};
use crate::operators::{Comparator, LogicalOperator};
use std::collections::HashMap;
use std::sync::Arc;

/// 使用默认设置评估规则
pub fn evaluate(node: &Node, record: &Record) -> Result<bool> {
    Evaluator::new(record).evaluate(node)
}

/// 条件评估器：对单个比较节点求值
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估比较
    ///
    /// # Arguments
    /// * `attribute` - 属性名，仅用于错误信息
    /// * `value` - 记录中的属性值
    /// * `comparator` - 比较符
    /// * `literal` - 规则中的字面量
    pub fn evaluate(
        attribute: &str,
        value: &Value,
        comparator: Comparator,
        literal: &Literal,
    ) -> Result<bool> {
        match comparator {
            Comparator::Eq => Ok(Self::equals(value, literal)),
            Comparator::Neq => Ok(!Self::equals(value, literal)),
            Comparator::In => Self::in_list(attribute, value, comparator, literal),
            Comparator::NotIn => {
                Self::in_list(attribute, value, comparator, literal).map(|r| !r)
            }
            Comparator::Gt => Self::compare(attribute, value, comparator, literal, |a, b| a > b),
            Comparator::Gte => Self::compare(attribute, value, comparator, literal, |a, b| a >= b),
            Comparator::Lt => Self::compare(attribute, value, comparator, literal, |a, b| a < b),
            Comparator::Lte => Self::compare(attribute, value, comparator, literal, |a, b| a <= b),
        }
    }

    /// 相等比较，类型不同时视为不相等
    fn equals(value: &Value, literal: &Literal) -> bool {
        match (value, literal) {
            (Value::Number(a), Literal::Number(b)) => a == b,
            (Value::String(a), Literal::String(b)) => a == b,
            (Value::Boolean(a), Literal::Boolean(b)) => a == b,
            _ => false,
        }
    }

    /// 数值顺序比较，任一侧非数值即类型不匹配
    fn compare<F>(
        attribute: &str,
        value: &Value,
        comparator: Comparator,
        literal: &Literal,
        cmp: F,
    ) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        match (value, literal) {
            (Value::Number(a), Literal::Number(b)) => Ok(cmp(*a, *b)),
            _ => Err(Self::mismatch(attribute, value, comparator, literal)),
        }
    }

    fn in_list(
        attribute: &str,
        value: &Value,
        comparator: Comparator,
        literal: &Literal,
    ) -> Result<bool> {
        match literal {
            Literal::List(items) => Ok(items.iter().any(|item| Self::equals(value, item))),
            _ => Err(Self::mismatch(attribute, value, comparator, literal)),
        }
    }

    fn mismatch(
        attribute: &str,
        value: &Value,
        comparator: Comparator,
        literal: &Literal,
    ) -> RuleError {
        RuleError::TypeMismatch {
            attribute: attribute.to_string(),
            comparator,
            actual: value.type_name(),
            expected: literal.type_name(),
        }
    }
}

/// 语法树评估器
///
/// 每次评估创建一个实例，持有共享子树的结果缓存和可选的追踪信息。
pub struct Evaluator<'a> {
    record: &'a Record,
    catalog: Option<&'a AttributeCatalog>,
    memo: HashMap<*const Node, bool>,
    trace: Option<Trace>,
}

/// 评估追踪
#[derive(Debug, Default)]
pub struct Trace {
    pub matched_conditions: Vec<String>,
    pub steps: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self {
            record,
            catalog: None,
            memo: HashMap::new(),
            trace: None,
        }
    }

    /// 使用属性目录判断可选属性
    pub fn with_catalog(mut self, catalog: &'a AttributeCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Trace::default());
        self
    }

    /// 取出追踪信息
    pub fn take_trace(&mut self) -> Option<Trace> {
        self.trace.take()
    }

    /// 评估语法树
    pub fn evaluate(&mut self, node: &Node) -> Result<bool> {
        self.evaluate_node(node, "root")
    }

    /// 子节点的追踪路径，未启用追踪时不分配
    fn child_path(&self, path: &str, side: &str) -> String {
        if self.trace.is_some() {
            format!("{}.{}", path, side)
        } else {
            String::new()
        }
    }

    fn record_step(&mut self, step: impl FnOnce() -> String) {
        if let Some(trace) = self.trace.as_mut() {
            trace.steps.push(step());
        }
    }

    /// 共享子树按地址缓存结果
    fn evaluate_child(&mut self, child: &Arc<Node>, path: &str) -> Result<bool> {
        if Arc::strong_count(child) < 2 {
            return self.evaluate_node(child, path);
        }

        let key = Arc::as_ptr(child);
        if let Some(&cached) = self.memo.get(&key) {
            self.record_step(|| format!("{}: 复用共享子树结果 => {}", path, cached));
            return Ok(cached);
        }

        let result = self.evaluate_node(child, path)?;
        self.memo.insert(key, result);
        Ok(result)
    }

    fn evaluate_node(&mut self, node: &Node, path: &str) -> Result<bool> {
        match node {
            Node::Comparison(cmp) => self.evaluate_comparison(cmp, path),
            Node::Operator {
                operator,
                left,
                right,
            } => {
                let left_path = self.child_path(path, "left");
                let left_matched = self.evaluate_child(left, &left_path)?;

                // 短路求值：AND 左侧为 false 或 OR 左侧为 true 时跳过右侧
                let short_circuit = match operator {
                    LogicalOperator::And => !left_matched,
                    LogicalOperator::Or => left_matched,
                };
                if short_circuit {
                    self.record_step(|| format!("{}: {} 短路 => {}", path, operator, left_matched));
                    return Ok(left_matched);
                }

                let right_path = self.child_path(path, "right");
                self.evaluate_child(right, &right_path)
            }
        }
    }

    fn evaluate_comparison(&mut self, cmp: &Comparison, path: &str) -> Result<bool> {
        let matched = match self.record.get(&cmp.attribute) {
            Some(value) => {
                ConditionEvaluator::evaluate(&cmp.attribute, value, cmp.comparator, &cmp.literal)?
            }
            None if self.catalog.is_some_and(|c| c.is_optional(&cmp.attribute)) => false,
            None => return Err(RuleError::MissingAttribute(cmp.attribute.clone())),
        };

        if let Some(trace) = self.trace.as_mut() {
            trace.steps.push(format!(
                "{}: {} => {}",
                path,
                cmp,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
            if matched {
                trace.matched_conditions.push(cmp.to_string());
            }
        }

        Ok(matched)
    }
}
