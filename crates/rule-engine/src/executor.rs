//! 规则执行器
//!
//! 对具名规则执行评估，返回匹配结果、命中的条件和评估追踪信息。

use crate::catalog::AttributeCatalog;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::models::{EvaluationResult, Record, Rule};
use std::time::Instant;

/// 规则执行器
#[derive(Default)]
pub struct RuleExecutor<'a> {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
    catalog: Option<&'a AttributeCatalog>,
}

impl<'a> RuleExecutor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn with_catalog(mut self, catalog: &'a AttributeCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// 执行规则评估
    pub fn execute(&self, rule: &Rule, record: &Record) -> Result<EvaluationResult> {
        let start = Instant::now();

        let mut result = EvaluationResult::new(rule.id.clone(), rule.name.clone());

        let mut evaluator = Evaluator::new(record).with_trace();
        if let Some(catalog) = self.catalog {
            evaluator = evaluator.with_catalog(catalog);
        }

        result.matched = evaluator.evaluate(rule.root())?;

        if let Some(trace) = evaluator.take_trace() {
            result.matched_conditions = trace.matched_conditions;
            if self.trace_enabled {
                result.evaluation_trace = trace.steps;
            }
        }

        result.evaluation_time_us = start.elapsed().as_micros() as u64;

        Ok(result)
    }
}
