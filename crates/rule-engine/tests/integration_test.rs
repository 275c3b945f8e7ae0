//! 规则引擎集成测试
//!
//! 测试完整的规则创建、合并、评估工作流。

use rule_engine::parser::DEFAULT_MAX_TREE_DEPTH;
use rule_engine::{
    AttributeDefinition, Comparator, LogicalOperator, Node, Record, RuleEngine, RuleError,
    SyntaxErrorKind, ValueType, combine_rules, create_rule, evaluate_rule,
};
use std::sync::Arc;
use std::thread;

const COMPLEX_RULE: &str = "((age > 30 AND department = 'Sales') OR (age < 25 AND department = 'Marketing')) AND (salary > 50000 OR experience > 5)";

fn employee(age: i32, department: &str, salary: i32, experience: i32) -> Record {
    Record::new()
        .with("age", age)
        .with("department", department)
        .with("salary", salary)
        .with("experience", experience)
}

// ==================== 端到端示例 ====================

#[test]
fn test_complex_rule_end_to_end() {
    let rule = create_rule(COMPLEX_RULE).unwrap();

    assert!(evaluate_rule(&rule, &employee(35, "Sales", 60000, 2)).unwrap());
    assert!(!evaluate_rule(&rule, &employee(35, "Sales", 40000, 2)).unwrap());
    assert!(evaluate_rule(&rule, &employee(22, "Marketing", 40000, 6)).unwrap());
    assert!(!evaluate_rule(&rule, &employee(28, "Marketing", 90000, 9)).unwrap());
}

#[test]
fn test_record_from_json_end_to_end() {
    let rule = create_rule(COMPLEX_RULE).unwrap();
    let record = Record::from_json(
        r#"{"age": 35, "department": "Sales", "salary": 60000, "experience": 2}"#,
    )
    .unwrap();
    assert!(evaluate_rule(&rule, &record).unwrap());
}

// ==================== 优先级 ====================

#[test]
fn test_precedence_groupings() {
    let flat = create_rule("a > 1 OR a > 2 AND a > 3").unwrap();
    let grouped = create_rule("(a > 1 OR a > 2) AND a > 3").unwrap();

    let a = |v: f64| Record::new().with("a", v);

    // a=0: 两种分组均为 false
    assert!(!evaluate_rule(&flat, &a(0.0)).unwrap());
    assert!(!evaluate_rule(&grouped, &a(0.0)).unwrap());

    // a=2.5: a>1 为 true，flat 在 OR 处短路为 true；grouped 需要 a>3，结果 false
    assert!(evaluate_rule(&flat, &a(2.5)).unwrap());
    assert!(!evaluate_rule(&grouped, &a(2.5)).unwrap());

    // a=3.5: 两种分组均为 true
    assert!(evaluate_rule(&flat, &a(3.5)).unwrap());
    assert!(evaluate_rule(&grouped, &a(3.5)).unwrap());
}

#[test]
fn test_precedence_tree_shape() {
    let flat = create_rule("a > 1 OR a > 2 AND a > 3").unwrap();
    match flat.as_ref() {
        Node::Operator {
            operator, right, ..
        } => {
            assert_eq!(*operator, LogicalOperator::Or);
            assert!(matches!(
                right.as_ref(),
                Node::Operator {
                    operator: LogicalOperator::And,
                    ..
                }
            ));
        }
        Node::Comparison(_) => panic!("expected operator root"),
    }
}

// ==================== 短路求值 ====================

#[test]
fn test_short_circuit_skips_missing_attribute() {
    let rule = create_rule("age > 30 AND level > 3").unwrap();
    let record = Record::new().with("age", 20);
    assert!(!evaluate_rule(&rule, &record).unwrap());

    let rule = create_rule("age > 30 OR level > 3").unwrap();
    let record = Record::new().with("age", 40);
    assert!(evaluate_rule(&rule, &record).unwrap());
}

// ==================== 幂等与并发 ====================

#[test]
fn test_repeated_and_concurrent_evaluation() {
    let rule = create_rule(COMPLEX_RULE).unwrap();
    let record = employee(35, "Sales", 60000, 2);

    for _ in 0..10 {
        assert!(evaluate_rule(&rule, &record).unwrap());
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let rule = Arc::clone(&rule);
            thread::spawn(move || {
                let salary = if i % 2 == 0 { 60000 } else { 40000 };
                let record = employee(35, "Sales", salary, 2);
                (0..100)
                    .map(|_| evaluate_rule(&rule, &record).unwrap())
                    .all(|matched| matched == (i % 2 == 0))
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

// ==================== 规则合并 ====================

#[test]
fn test_combine_shares_common_subtree() {
    let combined = combine_rules(&[
        "age > 30 AND department = 'Sales'",
        "age > 30 AND department = 'Marketing'",
    ])
    .unwrap();

    let Node::Operator {
        operator,
        left,
        right,
    } = combined.as_ref()
    else {
        panic!("expected operator root");
    };
    assert_eq!(*operator, LogicalOperator::Or);

    let (Node::Operator { left: l1, .. }, Node::Operator { left: l2, .. }) =
        (left.as_ref(), right.as_ref())
    else {
        panic!("expected operator children");
    };
    assert!(Arc::ptr_eq(l1, l2));
    assert_eq!(**l1, Node::comparison("age", Comparator::Gt, 30));

    let record = Record::new().with("age", 40).with("department", "Sales");
    assert!(evaluate_rule(&combined, &record).unwrap());

    let record = Record::new().with("age", 20).with("department", "Sales");
    assert!(!evaluate_rule(&combined, &record).unwrap());
}

#[test]
fn test_combine_single_rule_returns_rule() {
    let combined = combine_rules(&["age > 30"]).unwrap();
    assert_eq!(*combined, Node::comparison("age", Comparator::Gt, 30));
}

#[test]
fn test_combine_fails_on_first_invalid_rule() {
    let err = combine_rules(&["age > 30", "(department = 'Sales'", "age >"]).unwrap_err();
    assert!(err.is_syntax());
    assert_eq!(err.position(), Some(0));
}

#[test]
fn test_combined_evaluates_same_as_rules() {
    let rules = [
        "age > 30 AND department = 'Sales'",
        "age > 30 AND salary > 50000",
        "experience >= 10",
    ];
    let combined = combine_rules(&rules).unwrap();
    let singles: Vec<_> = rules.iter().map(|r| create_rule(r).unwrap()).collect();

    for record in [
        employee(35, "Sales", 10, 0),
        employee(35, "HR", 60000, 0),
        employee(20, "HR", 10, 12),
        employee(20, "HR", 10, 1),
    ] {
        let expected = singles
            .iter()
            .any(|rule| evaluate_rule(rule, &record).unwrap());
        assert_eq!(evaluate_rule(&combined, &record).unwrap(), expected);
    }
}

// ==================== 错误处理 ====================

#[test]
fn test_syntax_errors() {
    let err = create_rule("age >").unwrap_err();
    assert!(err.is_syntax());
    assert_eq!(err.position(), Some(5));

    for source in [
        "",
        "age > 30 AND",
        "(age > 30",
        "age > 30)",
        "age > 30 salary",
        "department = 'Sales",
        "age >> 30",
        "NOT age > 30",
    ] {
        let err = create_rule(source).unwrap_err();
        assert!(err.is_syntax(), "{source:?} should be a syntax error: {err}");
    }
}

#[test]
fn test_missing_attribute_error() {
    let rule = create_rule("age > 30").unwrap();
    let record = Record::new().with("department", "Sales");
    let err = evaluate_rule(&rule, &record).unwrap_err();
    assert_eq!(err, RuleError::MissingAttribute("age".to_string()));
    assert!(err.is_evaluation());
}

#[test]
fn test_type_mismatch_error() {
    let rule = create_rule("department > 3").unwrap();
    let record = Record::new().with("department", "Sales");
    assert!(matches!(
        evaluate_rule(&rule, &record).unwrap_err(),
        RuleError::TypeMismatch {
            comparator: Comparator::Gt,
            ..
        }
    ));

    let rule = create_rule("department = 3").unwrap();
    assert!(!evaluate_rule(&rule, &record).unwrap());
    let rule = create_rule("department != 3").unwrap();
    assert!(evaluate_rule(&rule, &record).unwrap());
}

// ==================== 树高限制 ====================

#[test]
fn test_long_flat_chain_is_syntax_error() {
    let chain = format!("a = 0{} OR a = 1", " OR a = 0".repeat(20_000));
    let err = create_rule(&chain).unwrap_err();
    assert!(matches!(
        err,
        RuleError::Syntax {
            kind: SyntaxErrorKind::NestingTooDeep(limit),
            ..
        } if limit == DEFAULT_MAX_TREE_DEPTH
    ));

    let chain = format!("a = 0{}", " AND a = 0".repeat(20_000));
    assert!(create_rule(&chain).unwrap_err().is_syntax());
}

#[test]
fn test_flat_chain_at_limit_evaluates() {
    let chain = format!(
        "a = 0{} OR a = 1",
        " OR a = 0".repeat(DEFAULT_MAX_TREE_DEPTH - 2)
    );
    let rule = create_rule(&chain).unwrap();
    assert_eq!(rule.depth(), DEFAULT_MAX_TREE_DEPTH);

    assert!(evaluate_rule(&rule, &Record::new().with("a", 1)).unwrap());
    assert!(!evaluate_rule(&rule, &Record::new().with("a", 2)).unwrap());
}

#[test]
fn test_combining_too_many_rules_is_syntax_error() {
    let rules: Vec<String> = (0..=DEFAULT_MAX_TREE_DEPTH)
        .map(|i| format!("a = {}", i))
        .collect();
    assert!(combine_rules(&rules).unwrap_err().is_syntax());
    assert!(combine_rules(&rules[..DEFAULT_MAX_TREE_DEPTH]).is_ok());
}

// ==================== 扩展语法与属性目录 ====================

#[test]
fn test_in_operator_and_booleans() {
    let rule = create_rule(
        "department IN ('Sales', 'Marketing') AND level NOT IN (1, 2) AND is_vip = true",
    )
    .unwrap();

    let record = Record::new()
        .with("department", "Marketing")
        .with("level", 3)
        .with("is_vip", true);
    assert!(evaluate_rule(&rule, &record).unwrap());

    let record = Record::new()
        .with("department", "Marketing")
        .with("level", 2)
        .with("is_vip", true);
    assert!(!evaluate_rule(&rule, &record).unwrap());
}

#[test]
fn test_engine_with_catalog() {
    let mut engine = RuleEngine::default();
    engine.register_attribute(AttributeDefinition::new("age", ValueType::Number));
    engine.register_attribute(AttributeDefinition::new("department", ValueType::String));
    engine.register_attribute(AttributeDefinition::new("is_vip", ValueType::Boolean).optional());

    assert!(matches!(
        engine.create_rule("salary > 100").unwrap_err(),
        RuleError::UnknownAttribute(name) if name == "salary"
    ));
    assert!(matches!(
        engine.create_rule("age = 'old'").unwrap_err(),
        RuleError::InvalidLiteral { .. }
    ));

    let rule = engine
        .create_rule("age > 30 AND (department = 'Sales' OR is_vip = true)")
        .unwrap();

    // is_vip 为可选属性，缺失时视为不匹配
    let record = Record::new().with("age", 40).with("department", "HR");
    assert!(!engine.evaluate_rule(&rule, &record).unwrap());

    // age 为必填属性
    let record = Record::new().with("department", "Sales");
    assert!(engine.evaluate_rule(&rule, &record).is_err());
}

#[test]
fn test_canonical_form_round_trip() {
    let rule = create_rule(COMPLEX_RULE).unwrap();
    let reparsed = create_rule(&rule.to_string()).unwrap();
    assert_eq!(rule, reparsed);
}
