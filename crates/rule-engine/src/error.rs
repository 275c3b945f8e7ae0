//! 规则引擎错误类型

use crate::operators::Comparator;
use thiserror::Error;

/// 语法错误的具体类别
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("规则为空")]
    EmptyRule,

    #[error("规则列表为空")]
    EmptyRuleSet,

    #[error("无法识别的字符 '{0}'")]
    UnrecognizedCharacter(char),

    #[error("字符串字面量未闭合")]
    UnterminatedString,

    #[error("无效的关键字: {0}")]
    InvalidKeyword(String),

    #[error("意外的记号 '{found}'，期望 {expected}")]
    UnexpectedToken { found: String, expected: &'static str },

    #[error("缺少右操作数: 期望 {expected}")]
    MissingOperand { expected: &'static str },

    #[error("括号不匹配")]
    UnmatchedParenthesis,

    #[error("表达式结束后存在多余的记号 '{0}'")]
    TrailingInput(String),

    #[error("{0} 操作符需要列表值，如 ('a', 'b')")]
    ListExpected(Comparator),

    #[error("{0} 操作符不接受列表值")]
    ListNotAllowed(Comparator),

    #[error("嵌套超过最大深度 {0}")]
    NestingTooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("规则语法错误 (位置 {position}): {kind}")]
    Syntax {
        position: usize,
        kind: SyntaxErrorKind,
    },

    #[error("未知属性: {0}")]
    UnknownAttribute(String),

    #[error("属性 {attribute} 的字面量类型无效: 期望 {expected}, 实际 {actual}")]
    InvalidLiteral {
        attribute: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("字段不存在: {0}")]
    MissingAttribute(String),

    #[error("类型不匹配: {attribute} {comparator} 不支持 {actual} 与 {expected} 比较")]
    TypeMismatch {
        attribute: String,
        comparator: Comparator,
        actual: &'static str,
        expected: &'static str,
    },
}

impl RuleError {
    pub(crate) fn syntax(position: usize, kind: SyntaxErrorKind) -> Self {
        Self::Syntax { position, kind }
    }

    /// 分词、解析或规则校验阶段产生的错误
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            Self::Syntax { .. } | Self::UnknownAttribute(_) | Self::InvalidLiteral { .. }
        )
    }

    /// 评估阶段产生的错误
    pub fn is_evaluation(&self) -> bool {
        matches!(self, Self::MissingAttribute(_) | Self::TypeMismatch { .. })
    }

    /// 语法错误的位置（非语法错误返回 None）
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
