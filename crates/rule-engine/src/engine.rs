//! 规则引擎入口
//!
//! 组合分词、解析、属性目录校验、合并与评估，对外提供创建、合并、评估规则的操作。

use crate::ast::Node;
use crate::catalog::{AttributeCatalog, AttributeDefinition};
use crate::combinator;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::executor::RuleExecutor;
use crate::models::{Record, Rule};
use crate::operators::LogicalOperator;
use crate::parser::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_TREE_DEPTH, Parser};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_tree_depth() -> usize {
    DEFAULT_MAX_TREE_DEPTH
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 合并多条规则时使用的顶层逻辑操作符，默认 OR（任一规则满足即合格）
    #[serde(default)]
    pub combine_policy: LogicalOperator,
    /// 最大括号嵌套深度
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// 最大树高，同时约束单条规则与合并结果
    #[serde(default = "default_max_tree_depth")]
    pub max_tree_depth: usize,
    /// 属性目录，为空时不校验属性
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            combine_policy: LogicalOperator::default(),
            max_depth: default_max_depth(),
            max_tree_depth: default_max_tree_depth(),
            attributes: Vec::new(),
        }
    }
}

/// 规则引擎
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: EngineConfig,
    catalog: AttributeCatalog,
}

impl RuleEngine {
    pub fn new(config: EngineConfig) -> Self {
        let catalog = config.attributes.iter().cloned().collect();
        Self { config, catalog }
    }

    /// 替换属性目录
    pub fn with_catalog(mut self, catalog: AttributeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// 登记属性定义
    pub fn register_attribute(&mut self, definition: AttributeDefinition) {
        self.catalog.register(definition);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    /// 分词、解析并按属性目录校验
    fn parse(&self, source: &str) -> Result<Node> {
        let tokens = tokenize(source)?;
        let node = Parser::new(&tokens)
            .with_max_depth(self.config.max_depth)
            .with_max_tree_depth(self.config.max_tree_depth)
            .parse()?;
        self.catalog.validate(&node)?;
        Ok(node)
    }

    /// 将规则字符串编译为语法树
    #[instrument(skip(self))]
    pub fn create_rule(&self, source: &str) -> Result<Arc<Node>> {
        let node = self.parse(source).inspect_err(|e| {
            debug!(error = %e, "规则编译失败");
        })?;

        metrics::counter!("rule_engine_rules_compiled_total").increment(1);
        debug!(depth = node.depth(), "规则已编译");
        Ok(Arc::new(node))
    }

    /// 编译具名规则
    #[instrument(skip(self, source))]
    pub fn compile(&self, name: &str, source: &str) -> Result<Rule> {
        let root = self.create_rule(source)?;
        Ok(Rule::new(name, source, root))
    }

    /// 合并多条规则，任一规则语法错误即失败
    #[instrument(skip_all, fields(count = sources.len(), policy = %self.config.combine_policy))]
    pub fn combine_rules<S: AsRef<str>>(&self, sources: &[S]) -> Result<Arc<Node>> {
        let roots = sources
            .iter()
            .map(|source| self.parse(source.as_ref()))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| {
                debug!(error = %e, "规则合并失败");
            })?;

        metrics::counter!("rule_engine_rules_compiled_total").increment(roots.len() as u64);
        combinator::combine_with_limit(
            roots,
            self.config.combine_policy,
            self.config.max_tree_depth,
        )
    }

    /// 对属性记录评估语法树
    pub fn evaluate_rule(&self, node: &Node, record: &Record) -> Result<bool> {
        let result = Evaluator::new(record)
            .with_catalog(&self.catalog)
            .evaluate(node);

        let label = match &result {
            Ok(true) => "matched",
            Ok(false) => "not_matched",
            Err(_) => "error",
        };
        metrics::counter!("rule_engine_evaluations_total", "result" => label).increment(1);

        result
    }

    /// 创建使用本引擎属性目录的执行器
    pub fn executor(&self) -> RuleExecutor<'_> {
        RuleExecutor::new().with_catalog(&self.catalog)
    }
}
