//! 资格规则引擎
//!
//! 将人类可读的布尔规则（如 `age > 30 AND department = 'Sales'`）编译为语法树，支持：
//! - 分词与基于优先级的递归下降解析
//! - 多条规则合并与结构去重
//! - 短路求值与类型感知的比较
//! - 属性目录校验

pub mod ast;
pub mod catalog;
pub mod combinator;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod parser;
pub mod tokenizer;

pub use ast::{Comparison, Literal, Node};
pub use catalog::{AttributeCatalog, AttributeDefinition, ValueType};
pub use engine::{EngineConfig, RuleEngine};
pub use error::{Result, RuleError, SyntaxErrorKind};
pub use evaluator::{ConditionEvaluator, Evaluator};
pub use executor::RuleExecutor;
pub use models::{EvaluationResult, Record, Rule, Value};
pub use operators::{Comparator, LogicalOperator};
pub use tokenizer::{Token, TokenKind, tokenize};

use std::sync::Arc;

/// 使用默认配置将规则字符串编译为语法树
pub fn create_rule(source: &str) -> Result<Arc<Node>> {
    RuleEngine::default().create_rule(source)
}

/// 使用默认配置（OR 合并）合并多条规则
pub fn combine_rules<S: AsRef<str>>(sources: &[S]) -> Result<Arc<Node>> {
    RuleEngine::default().combine_rules(sources)
}

/// 对属性记录评估语法树
pub fn evaluate_rule(node: &Node, record: &Record) -> Result<bool> {
    RuleEngine::default().evaluate_rule(node, record)
}
