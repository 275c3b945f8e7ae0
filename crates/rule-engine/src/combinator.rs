//! 规则合并器
//!
//! 将多条独立解析的规则合并为一棵树。合并前自底向上驻留（intern）所有子树，
//! 结构相同的子树只保留一个共享实例，评估时同一比较最多计算一次。

use crate::ast::{Comparison, Node};
use crate::error::{Result, RuleError, SyntaxErrorKind};
use crate::operators::LogicalOperator;
use crate::parser::DEFAULT_MAX_TREE_DEPTH;
use std::collections::HashMap;
use std::sync::Arc;

/// 子树驻留表的键
///
/// 子节点已被驻留，指针相同即结构相同，因此父节点只需按子节点地址比较。
#[derive(PartialEq, Eq, Hash)]
enum InternKey {
    Comparison(Comparison),
    Operator(LogicalOperator, usize, usize),
}

/// 结构去重器
#[derive(Default)]
pub struct Deduplicator {
    nodes: HashMap<InternKey, Arc<Node>>,
    reused: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 被复用的子树次数
    pub fn reused(&self) -> usize {
        self.reused
    }

    /// 不同子树的数量
    pub fn distinct(&self) -> usize {
        self.nodes.len()
    }

    /// 返回与 `node` 结构相同的共享实例
    pub fn intern(&mut self, node: &Node) -> Arc<Node> {
        match node {
            Node::Comparison(cmp) => {
                let key = InternKey::Comparison(cmp.clone());
                self.lookup_or_insert(key, || Node::Comparison(cmp.clone()))
            }
            Node::Operator {
                operator,
                left,
                right,
            } => {
                let left = self.intern(left);
                let right = self.intern(right);
                let key = InternKey::Operator(
                    *operator,
                    Arc::as_ptr(&left) as usize,
                    Arc::as_ptr(&right) as usize,
                );
                self.lookup_or_insert(key, move || Node::operator(*operator, left, right))
            }
        }
    }

    fn lookup_or_insert(&mut self, key: InternKey, build: impl FnOnce() -> Node) -> Arc<Node> {
        if let Some(existing) = self.nodes.get(&key) {
            self.reused += 1;
            return existing.clone();
        }

        let interned = Arc::new(build());
        self.nodes.insert(key, interned.clone());
        interned
    }
}

/// 合并已解析的规则树，树高上限为 [`DEFAULT_MAX_TREE_DEPTH`]
pub fn combine(roots: Vec<Node>, policy: LogicalOperator) -> Result<Arc<Node>> {
    combine_with_limit(roots, policy, DEFAULT_MAX_TREE_DEPTH)
}

/// 合并已解析的规则树
///
/// 单条规则原样返回；多条规则先去重，再按输入顺序以 `policy` 左结合折叠。
/// 折叠后的树高超过 `max_tree_depth` 时返回 `NestingTooDeep`。
pub fn combine_with_limit(
    roots: Vec<Node>,
    policy: LogicalOperator,
    max_tree_depth: usize,
) -> Result<Arc<Node>> {
    let mut roots = roots.into_iter();
    let first = roots
        .next()
        .ok_or_else(|| RuleError::syntax(0, SyntaxErrorKind::EmptyRuleSet))?;

    let Some(second) = roots.next() else {
        return Ok(Arc::new(first));
    };

    let mut height = first.depth();
    let mut dedup = Deduplicator::new();
    let mut combined = dedup.intern(&first);
    for root in std::iter::once(second).chain(roots) {
        height = height.max(root.depth()) + 1;
        if height > max_tree_depth {
            return Err(RuleError::syntax(
                0,
                SyntaxErrorKind::NestingTooDeep(max_tree_depth),
            ));
        }
        let right = dedup.intern(&root);
        combined = Arc::new(Node::operator(policy, combined, right));
    }

    tracing::debug!(
        distinct = dedup.distinct(),
        reused = dedup.reused(),
        depth = height,
        "规则合并完成"
    );

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Comparator;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;

    fn parse_str(source: &str) -> Node {
        parse(&tokenize(source).unwrap()).unwrap()
    }

    fn children(node: &Node) -> (&Arc<Node>, &Arc<Node>) {
        match node {
            Node::Operator { left, right, .. } => (left, right),
            Node::Comparison(_) => panic!("expected operator node"),
        }
    }

    #[test]
    fn test_single_rule_unchanged() {
        let node = parse_str("age > 30 AND department = 'Sales'");
        let combined = combine(vec![node.clone()], LogicalOperator::Or).unwrap();
        assert_eq!(*combined, node);
    }

    #[test]
    fn test_empty_rule_set() {
        let err = combine(Vec::new(), LogicalOperator::Or).unwrap_err();
        assert_eq!(err, RuleError::syntax(0, SyntaxErrorKind::EmptyRuleSet));
    }

    #[test]
    fn test_shared_comparison_across_rules() {
        let combined = combine(
            vec![
                parse_str("age > 30 AND department = 'Sales'"),
                parse_str("age > 30 AND department = 'Marketing'"),
            ],
            LogicalOperator::Or,
        )
        .unwrap();

        let (first, second) = children(&combined);
        let (first_age, _) = children(first);
        let (second_age, _) = children(second);

        assert_eq!(**first_age, Node::comparison("age", Comparator::Gt, 30));
        assert!(Arc::ptr_eq(first_age, second_age));
    }

    #[test]
    fn test_shared_subtree_within_rule() {
        let combined = combine(
            vec![
                parse_str("(a = 1 AND b = 2) OR (a = 1 AND b = 2)"),
                parse_str("c = 3"),
            ],
            LogicalOperator::And,
        )
        .unwrap();

        let (rule, _) = children(&combined);
        let (left, right) = children(rule);
        assert!(Arc::ptr_eq(left, right));
    }

    #[test]
    fn test_fold_is_left_associative() {
        let rules = vec![parse_str("a = 1"), parse_str("b = 2"), parse_str("c = 3")];
        let combined = combine(rules, LogicalOperator::Or).unwrap();
        assert_eq!(*combined, parse_str("a = 1 OR b = 2 OR c = 3"));
    }

    #[test]
    fn test_and_policy() {
        let rules = vec![parse_str("a = 1"), parse_str("b = 2")];
        let combined = combine(rules, LogicalOperator::And).unwrap();
        assert_eq!(*combined, parse_str("a = 1 AND b = 2"));
    }

    #[test]
    fn test_deduplication_is_deterministic() {
        let build = || {
            combine(
                vec![
                    parse_str("x > 1 AND (y = 'a' OR z < 2)"),
                    parse_str("(y = 'a' OR z < 2) AND x > 1"),
                ],
                LogicalOperator::Or,
            )
            .unwrap()
        };
        assert_eq!(build(), build());
        assert_eq!(build().to_string(), build().to_string());
    }

    #[test]
    fn test_deduplicator_counts() {
        let mut dedup = Deduplicator::new();
        dedup.intern(&parse_str("a = 1 AND b = 2"));
        dedup.intern(&parse_str("a = 1 AND b = 2"));
        assert_eq!(dedup.distinct(), 3);
        assert_eq!(dedup.reused(), 3);
    }

    #[test]
    fn test_combined_height_limit() {
        let rules: Vec<Node> = (0..4).map(|i| parse_str(&format!("a = {i}"))).collect();

        let combined = combine_with_limit(rules.clone(), LogicalOperator::Or, 4).unwrap();
        assert_eq!(combined.depth(), 4);

        let err = combine_with_limit(rules, LogicalOperator::Or, 3).unwrap_err();
        assert_eq!(err, RuleError::syntax(0, SyntaxErrorKind::NestingTooDeep(3)));
    }

    #[test]
    fn test_many_rules_rejected_by_default() {
        let rules: Vec<Node> = (0..DEFAULT_MAX_TREE_DEPTH + 1)
            .map(|i| parse_str(&format!("a = {i}")))
            .collect();
        let err = combine(rules, LogicalOperator::Or).unwrap_err();
        assert_eq!(
            err,
            RuleError::syntax(0, SyntaxErrorKind::NestingTooDeep(DEFAULT_MAX_TREE_DEPTH))
        );
    }
}
