//! 规则解析器
//!
//! 基于优先级的递归下降解析，语法如下（优先级由低到高）：
//!
//! ```text
//! expression := orExpr
//! orExpr     := andExpr ( OR andExpr )*
//! andExpr    := primary ( AND primary )*
//! primary    := '(' expression ')' | comparison
//! comparison := IDENTIFIER comparator literal
//!             | IDENTIFIER (IN | NOT IN) '(' literal (',' literal)* ')'
//! ```
//!
//! AND 与 OR 均为左结合，`a OR b OR c` 解析为 `(a OR b) OR c`。
//!
//! 除括号嵌套深度外，解析时还限制整棵树的高度：不加括号的长链同样会产生很高的树，
//! 而求值、格式化与合并都按树高递归。

use crate::ast::{Comparison, Literal, Node};
use crate::error::{Result, RuleError, SyntaxErrorKind};
use crate::operators::{Comparator, LogicalOperator};
use crate::tokenizer::{Token, TokenKind};
use std::sync::Arc;

/// 默认最大括号嵌套深度
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// 默认最大树高（与 `Node::depth` 一致，单个比较为 1）
pub const DEFAULT_MAX_TREE_DEPTH: usize = 512;

const EXPECT_OPERAND: &str = "比较表达式或 '('";
const EXPECT_COMPARATOR: &str = "比较符";
const EXPECT_LITERAL: &str = "字面量";
const EXPECT_LIST: &str = "列表";

/// 使用默认嵌套深度解析记号序列
pub fn parse(tokens: &[Token]) -> Result<Node> {
    Parser::new(tokens).parse()
}

/// 记号序列解析器
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    max_depth: usize,
    max_tree_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_tree_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = max_tree_depth;
        self
    }

    /// 解析完整规则，要求消费全部记号
    pub fn parse(mut self) -> Result<Node> {
        if self.tokens.is_empty() {
            return Err(RuleError::syntax(0, SyntaxErrorKind::EmptyRule));
        }

        let (node, _) = self.expression()?;

        match self.peek() {
            None => Ok(node),
            Some(token) if token.kind == TokenKind::RParen => Err(RuleError::syntax(
                token.position,
                SyntaxErrorKind::UnmatchedParenthesis,
            )),
            Some(token) => Err(RuleError::syntax(
                token.position,
                SyntaxErrorKind::TrailingInput(token.text.clone()),
            )),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    /// 输入末尾的位置
    fn end_position(&self) -> usize {
        self.tokens.last().map(Token::end).unwrap_or(0)
    }

    fn missing(&self, expected: &'static str) -> RuleError {
        RuleError::syntax(
            self.end_position(),
            SyntaxErrorKind::MissingOperand { expected },
        )
    }

    fn unexpected(token: &Token, expected: &'static str) -> RuleError {
        RuleError::syntax(
            token.position,
            SyntaxErrorKind::UnexpectedToken {
                found: token.text.clone(),
                expected,
            },
        )
    }

    /// 生成操作符节点后的树高，超过上限即报错
    fn operator_height(&self, operator: &Token, left: usize, right: usize) -> Result<usize> {
        let height = left.max(right) + 1;
        if height > self.max_tree_depth {
            return Err(RuleError::syntax(
                operator.position,
                SyntaxErrorKind::NestingTooDeep(self.max_tree_depth),
            ));
        }
        Ok(height)
    }

    // 以下解析函数同时返回子树及其高度

    fn expression(&mut self) -> Result<(Node, usize)> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<(Node, usize)> {
        let (mut left, mut height) = self.and_expr()?;
        while let Some(op) = self.peek().filter(|t| t.kind == TokenKind::LogicalOr) {
            self.pos += 1;
            let (right, right_height) = self.and_expr()?;
            height = self.operator_height(op, height, right_height)?;
            left = Node::operator(LogicalOperator::Or, Arc::new(left), Arc::new(right));
        }
        Ok((left, height))
    }

    fn and_expr(&mut self) -> Result<(Node, usize)> {
        let (mut left, mut height) = self.primary()?;
        while let Some(op) = self.peek().filter(|t| t.kind == TokenKind::LogicalAnd) {
            self.pos += 1;
            let (right, right_height) = self.primary()?;
            height = self.operator_height(op, height, right_height)?;
            left = Node::operator(LogicalOperator::And, Arc::new(left), Arc::new(right));
        }
        Ok((left, height))
    }

    fn primary(&mut self) -> Result<(Node, usize)> {
        let token = self.peek().ok_or_else(|| self.missing(EXPECT_OPERAND))?;

        match token.kind {
            TokenKind::LParen => self.group(token),
            TokenKind::Identifier => Ok((self.comparison()?, 1)),
            _ => Err(Self::unexpected(token, EXPECT_OPERAND)),
        }
    }

    fn group(&mut self, open: &'a Token) -> Result<(Node, usize)> {
        if self.depth >= self.max_depth {
            return Err(RuleError::syntax(
                open.position,
                SyntaxErrorKind::NestingTooDeep(self.max_depth),
            ));
        }

        self.pos += 1;
        self.depth += 1;
        let inner = self.expression()?;
        self.depth -= 1;

        match self.advance() {
            Some(token) if token.kind == TokenKind::RParen => Ok(inner),
            Some(token) => Err(Self::unexpected(token, "')'")),
            None => Err(RuleError::syntax(
                open.position,
                SyntaxErrorKind::UnmatchedParenthesis,
            )),
        }
    }

    fn comparison(&mut self) -> Result<Node> {
        let attribute = self.advance().ok_or_else(|| self.missing(EXPECT_OPERAND))?;

        let op_token = self.advance().ok_or_else(|| self.missing(EXPECT_COMPARATOR))?;
        let comparator = match op_token.kind {
            TokenKind::Comparator => Comparator::from_symbol(&op_token.text),
            _ => None,
        }
        .ok_or_else(|| Self::unexpected(op_token, EXPECT_COMPARATOR))?;

        let literal = if comparator.takes_list() {
            self.list_literal(comparator)?
        } else {
            if let Some(token) = self.peek().filter(|t| t.kind == TokenKind::LParen) {
                return Err(RuleError::syntax(
                    token.position,
                    SyntaxErrorKind::ListNotAllowed(comparator),
                ));
            }
            self.scalar_literal()?
        };

        Ok(Node::Comparison(Comparison {
            attribute: attribute.text.clone(),
            comparator,
            literal,
        }))
    }

    fn scalar_literal(&mut self) -> Result<Literal> {
        let token = self.advance().ok_or_else(|| self.missing(EXPECT_LITERAL))?;

        match token.kind {
            TokenKind::LiteralNumber => token
                .text
                .parse::<f64>()
                .map(Literal::Number)
                .map_err(|_| Self::unexpected(token, EXPECT_LITERAL)),
            TokenKind::LiteralString => {
                // 去掉首尾引号
                let text = &token.text;
                Ok(Literal::String(text[1..text.len() - 1].to_string()))
            }
            TokenKind::LiteralBoolean => Ok(Literal::Boolean(
                token.text.eq_ignore_ascii_case("true"),
            )),
            _ => Err(Self::unexpected(token, EXPECT_LITERAL)),
        }
    }

    fn list_literal(&mut self, comparator: Comparator) -> Result<Literal> {
        let open = self.advance().ok_or_else(|| self.missing(EXPECT_LIST))?;
        match open.kind {
            TokenKind::LParen => {}
            TokenKind::LiteralNumber | TokenKind::LiteralString | TokenKind::LiteralBoolean => {
                return Err(RuleError::syntax(
                    open.position,
                    SyntaxErrorKind::ListExpected(comparator),
                ));
            }
            _ => return Err(Self::unexpected(open, EXPECT_LIST)),
        }

        let mut items = Vec::new();
        loop {
            items.push(self.scalar_literal()?);

            match self.advance() {
                Some(token) if token.kind == TokenKind::Comma => continue,
                Some(token) if token.kind == TokenKind::RParen => break,
                Some(token) => return Err(Self::unexpected(token, "',' 或 ')'")),
                None => {
                    return Err(RuleError::syntax(
                        open.position,
                        SyntaxErrorKind::UnmatchedParenthesis,
                    ));
                }
            }
        }

        Ok(Literal::List(items))
    }
}
