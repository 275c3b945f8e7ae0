//! 规则抽象语法树
//!
//! 节点在构造后不可变，子节点通过 `Arc` 持有，合并规则时结构相同的子树可被多个父节点共享。

use crate::operators::{Comparator, LogicalOperator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 比较节点中的字面量
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    List(Vec<Literal>),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Boolean(_) => "boolean",
            Self::List(_) => "list",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

// 数值按位比较，保证 Eq 与 Hash 一致，结构去重依赖这一点
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Number(n) => n.to_bits().hash(state),
            Self::String(s) => s.hash(state),
            Self::Boolean(b) => b.hash(state),
            Self::List(items) => items.hash(state),
        }
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

// 字符串按单引号输出，内容含单引号时改用双引号。记号器不支持转义，
// 同时含两种引号的字符串无法由规则文本产生，其输出也不能再解析。
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) if s.contains('\'') => write!(f, "\"{}\"", s),
            Self::String(s) => write!(f, "'{}'", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// 比较节点（叶子）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comparison {
    pub attribute: String,
    pub comparator: Comparator,
    pub literal: Literal,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.comparator, self.literal)
    }
}

/// 语法树节点
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Operator {
        operator: LogicalOperator,
        left: Arc<Node>,
        right: Arc<Node>,
    },
    Comparison(Comparison),
}

impl Node {
    pub fn operator(operator: LogicalOperator, left: Arc<Node>, right: Arc<Node>) -> Self {
        Self::Operator {
            operator,
            left,
            right,
        }
    }

    pub fn and(left: Node, right: Node) -> Self {
        Self::operator(LogicalOperator::And, Arc::new(left), Arc::new(right))
    }

    pub fn or(left: Node, right: Node) -> Self {
        Self::operator(LogicalOperator::Or, Arc::new(left), Arc::new(right))
    }

    pub fn comparison(
        attribute: impl Into<String>,
        comparator: Comparator,
        literal: impl Into<Literal>,
    ) -> Self {
        Self::Comparison(Comparison {
            attribute: attribute.into(),
            comparator,
            literal: literal.into(),
        })
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, Self::Comparison(_))
    }

    /// 树高（单个比较节点为 1）
    pub fn depth(&self) -> usize {
        match self {
            Self::Comparison(_) => 1,
            Self::Operator { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// 叶子数量（共享子树按出现次数计）
    pub fn comparison_count(&self) -> usize {
        match self {
            Self::Comparison(_) => 1,
            Self::Operator { left, right, .. } => {
                left.comparison_count() + right.comparison_count()
            }
        }
    }

    /// 规则引用的所有属性名
    pub fn attributes(&self) -> BTreeSet<&str> {
        let mut attributes = BTreeSet::new();
        self.collect_attributes(&mut attributes);
        attributes
    }

    fn collect_attributes<'a>(&'a self, attributes: &mut BTreeSet<&'a str>) {
        match self {
            Self::Comparison(cmp) => {
                attributes.insert(cmp.attribute.as_str());
            }
            Self::Operator { left, right, .. } => {
                left.collect_attributes(attributes);
                right.collect_attributes(attributes);
            }
        }
    }
}

// 输出完全加括号的规则文本，重新解析后得到相同的树（字符串字面量的限制见 Literal）。
// 每个操作符节点都加一层括号，树高超过解析器的括号嵌套上限时需相应调高 max_depth。
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparison(cmp) => write!(f, "{}", cmp),
            Self::Operator {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
        }
    }
}
