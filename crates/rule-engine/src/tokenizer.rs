//! 规则分词器
//!
//! 单遍从左到右扫描规则字符串，产出带位置信息的记号序列。

use crate::error::{Result, RuleError, SyntaxErrorKind};
use serde::Serialize;
use std::fmt;

/// 记号类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    LogicalAnd,
    LogicalOr,
    Comparator,
    Identifier,
    LiteralNumber,
    LiteralString,
    LiteralBoolean,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LogicalAnd => "AND",
            Self::LogicalOr => "OR",
            Self::Comparator => "comparator",
            Self::Identifier => "identifier",
            Self::LiteralNumber => "number",
            Self::LiteralString => "string",
            Self::LiteralBoolean => "boolean",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Comma => "','",
        };
        write!(f, "{}", s)
    }
}

/// 词法记号
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// 源字符串中匹配到的原始文本（字符串字面量包含引号）
    pub text: String,
    /// 在源字符串中的字节偏移
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, text: &str, position: usize) -> Self {
        Self {
            kind,
            text: text.to_string(),
            position,
        }
    }

    /// 记号结束位置（用于报告输入末尾的错误）
    pub fn end(&self) -> usize {
        self.position + self.text.len()
    }
}

/// 将规则字符串切分为记号序列
///
/// 空字符串返回空序列，由解析器负责报告空规则。
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Tokenizer::new(source).run()
}

struct Tokenizer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }

            let start = self.pos;
            match c {
                '(' => self.single(TokenKind::LParen, start),
                ')' => self.single(TokenKind::RParen, start),
                ',' => self.single(TokenKind::Comma, start),
                '>' | '<' | '=' | '!' => self.comparator(start)?,
                '\'' | '"' => self.string(c, start)?,
                '+' | '-' => self.number(start)?,
                c if c.is_ascii_digit() => self.number(start)?,
                c if c.is_ascii_alphabetic() => self.word(start)?,
                other => {
                    return Err(RuleError::syntax(
                        start,
                        SyntaxErrorKind::UnrecognizedCharacter(other),
                    ));
                }
            }
        }

        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn byte_at(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let token = Token::new(kind, &self.source[start..self.pos], start);
        self.tokens.push(token);
    }

    fn single(&mut self, kind: TokenKind, start: usize) {
        self.pos += 1;
        self.push(kind, start);
    }

    /// 双字符比较符优先于单字符
    fn comparator(&mut self, start: usize) -> Result<()> {
        let first = self.bytes[start];
        let second = self.byte_at(start + 1);

        let len = match (first, second) {
            (b'>' | b'<' | b'!', Some(b'=')) => 2,
            (b'>' | b'<' | b'=', _) => 1,
            _ => {
                return Err(RuleError::syntax(
                    start,
                    SyntaxErrorKind::UnrecognizedCharacter('!'),
                ));
            }
        };

        self.pos += len;
        self.push(TokenKind::Comparator, start);
        Ok(())
    }

    fn string(&mut self, quote: char, start: usize) -> Result<()> {
        let body = start + 1;
        match self.source[body..].find(quote) {
            Some(offset) => {
                self.pos = body + offset + 1;
                self.push(TokenKind::LiteralString, start);
                Ok(())
            }
            None => Err(RuleError::syntax(start, SyntaxErrorKind::UnterminatedString)),
        }
    }

    fn number(&mut self, start: usize) -> Result<()> {
        let mut pos = start;
        if matches!(self.byte_at(pos), Some(b'+' | b'-')) {
            pos += 1;
        }

        let digits_start = pos;
        while self.byte_at(pos).is_some_and(|b| b.is_ascii_digit()) {
            pos += 1;
        }
        if pos == digits_start {
            // 符号后没有数字
            return Err(RuleError::syntax(
                start,
                SyntaxErrorKind::UnrecognizedCharacter(self.bytes[start] as char),
            ));
        }

        // 小数点后至少一位数字才视为小数部分
        if self.byte_at(pos) == Some(b'.')
            && self.byte_at(pos + 1).is_some_and(|b| b.is_ascii_digit())
        {
            pos += 1;
            while self.byte_at(pos).is_some_and(|b| b.is_ascii_digit()) {
                pos += 1;
            }
        }

        self.pos = pos;
        self.push(TokenKind::LiteralNumber, start);
        Ok(())
    }

    fn scan_word(&self, from: usize) -> usize {
        let mut pos = from;
        while self
            .byte_at(pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            pos += 1;
        }
        pos
    }

    fn word(&mut self, start: usize) -> Result<()> {
        let end = self.scan_word(start);
        let word = &self.source[start..end];
        self.pos = end;

        let kind = if word.eq_ignore_ascii_case("AND") {
            TokenKind::LogicalAnd
        } else if word.eq_ignore_ascii_case("OR") {
            TokenKind::LogicalOr
        } else if word.eq_ignore_ascii_case("IN") {
            TokenKind::Comparator
        } else if word.eq_ignore_ascii_case("TRUE") || word.eq_ignore_ascii_case("FALSE") {
            TokenKind::LiteralBoolean
        } else if word.eq_ignore_ascii_case("NOT") {
            return self.not_in(start);
        } else {
            TokenKind::Identifier
        };

        self.push(kind, start);
        Ok(())
    }

    /// `NOT` 只能与紧随其后的 `IN` 组成一个比较符
    fn not_in(&mut self, start: usize) -> Result<()> {
        let mut pos = self.pos;
        while self.byte_at(pos).is_some_and(|b| b.is_ascii_whitespace()) {
            pos += 1;
        }

        let end = self.scan_word(pos);
        if pos > self.pos && self.source[pos..end].eq_ignore_ascii_case("IN") {
            self.pos = end;
            self.push(TokenKind::Comparator, start);
            Ok(())
        } else {
            Err(RuleError::syntax(
                start,
                SyntaxErrorKind::InvalidKeyword(self.source[start..self.pos].to_string()),
            ))
        }
    }
}
