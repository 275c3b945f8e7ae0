//! 属性目录
//!
//! 登记规则可引用的属性及其类型。目录非空时，编译规则会拒绝未知属性和类型不符的字面量；
//! 评估时，标记为可选的属性缺失视为不匹配而非错误。

use crate::ast::{Literal, Node};
use crate::error::{Result, RuleError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 属性值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
    String,
    Boolean,
}

impl ValueType {
    fn accepts(self, literal: &Literal) -> bool {
        matches!(
            (self, literal),
            (Self::Number, Literal::Number(_))
                | (Self::String, Literal::String(_))
                | (Self::Boolean, Literal::Boolean(_))
        )
    }

    fn name(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn default_required() -> bool {
    true
}

/// 属性定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub value_type: ValueType,
    /// 必填属性缺失时评估报错，可选属性缺失时比较结果为 false
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            required: true,
            description: String::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// 属性目录
#[derive(Debug, Clone, Default)]
pub struct AttributeCatalog {
    definitions: HashMap<String, AttributeDefinition>,
}

impl AttributeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记属性，同名属性会被覆盖
    pub fn register(&mut self, definition: AttributeDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// 属性是否登记为可选
    pub fn is_optional(&self, name: &str) -> bool {
        self.get(name).is_some_and(|d| !d.required)
    }

    /// 校验规则引用的属性和字面量类型
    pub fn validate(&self, node: &Node) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        match node {
            Node::Operator { left, right, .. } => {
                self.validate(left)?;
                self.validate(right)
            }
            Node::Comparison(cmp) => {
                let definition = self
                    .get(&cmp.attribute)
                    .ok_or_else(|| RuleError::UnknownAttribute(cmp.attribute.clone()))?;

                let invalid = |actual: &'static str, expected: &'static str| {
                    RuleError::InvalidLiteral {
                        attribute: cmp.attribute.clone(),
                        expected,
                        actual,
                    }
                };

                if cmp.comparator.is_ordering() && definition.value_type != ValueType::Number {
                    return Err(invalid(definition.value_type.name(), ValueType::Number.name()));
                }

                let items = match &cmp.literal {
                    Literal::List(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                for item in items {
                    if !definition.value_type.accepts(item) {
                        return Err(invalid(item.type_name(), definition.value_type.name()));
                    }
                }

                Ok(())
            }
        }
    }
}

impl FromIterator<AttributeDefinition> for AttributeCatalog {
    fn from_iter<I: IntoIterator<Item = AttributeDefinition>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for definition in iter {
            catalog.register(definition);
        }
        catalog
    }
}
