//! 规则引擎命令行工具
//!
//! 编译、合并并评估资格规则，结果以 JSON 输出到标准输出。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eligibility_shared::config;
use eligibility_shared::observability::{self, ObservabilityConfig};
use rule_engine::{EngineConfig, Record, Rule, RuleEngine};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

const SERVICE_NAME: &str = "rule-engine";

/// 应用配置
#[derive(Debug, Clone, Default, Deserialize)]
struct AppConfig {
    #[serde(default)]
    service_name: String,
    #[serde(default)]
    environment: String,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    observability: ObservabilityConfig,
}

#[derive(Parser, Debug)]
#[command(name = "rule-engine")]
#[command(version, about = "资格规则编译与评估工具")]
#[command(propagate_version = true)]
struct Cli {
    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 解析规则并输出规范形式
    Check {
        /// 规则字符串，可重复指定
        #[arg(short, long, required = true)]
        rule: Vec<String>,

        /// 以 JSON 输出语法树
        #[arg(long)]
        json: bool,
    },

    /// 对属性记录评估规则，多条规则按配置的策略合并
    Eval {
        /// 规则字符串，可重复指定
        #[arg(short, long, required = true)]
        rule: Vec<String>,

        /// JSON 对象形式的属性记录
        #[arg(long, conflicts_with = "record_file", required_unless_present = "record_file")]
        record: Option<String>,

        /// 从文件读取属性记录
        #[arg(long)]
        record_file: Option<PathBuf>,

        /// 输出评估追踪
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config: AppConfig = config::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let service_name = if config.service_name.is_empty() {
        SERVICE_NAME
    } else {
        config.service_name.as_str()
    };
    let mut obs_config = config.observability.clone().with_service_name(service_name);
    if let Some(level) = &cli.log_level {
        obs_config = obs_config.with_log_level(level.clone());
    }
    observability::init(&obs_config)?;

    info!(
        environment = %config.environment,
        combine_policy = %config.engine.combine_policy,
        attributes = config.engine.attributes.len(),
        "Rule engine configured"
    );

    let engine = RuleEngine::new(config.engine);

    match cli.command {
        Commands::Check { rule, json } => run_check(&engine, &rule, json),
        Commands::Eval {
            rule,
            record,
            record_file,
            trace,
        } => {
            let record = read_record(record, record_file)?;
            run_eval(&engine, &rule, &record, trace)
        }
    }
}

fn run_check(engine: &RuleEngine, rules: &[String], json: bool) -> Result<()> {
    for source in rules {
        let root = engine
            .create_rule(source)
            .with_context(|| format!("invalid rule: {}", source))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&root)?);
        } else {
            println!("{}", root);
        }
    }
    Ok(())
}

fn run_eval(engine: &RuleEngine, rules: &[String], record: &Record, trace: bool) -> Result<()> {
    let rule = match rules {
        [single] => engine.compile("cli", single)?,
        _ => {
            let root = engine.combine_rules(rules)?;
            let source = rules
                .iter()
                .map(|r| format!("({})", r))
                .collect::<Vec<_>>()
                .join(&format!(" {} ", engine.config().combine_policy));
            Rule::new("cli-combined", source, root)
        }
    };

    let mut executor = engine.executor();
    if trace {
        executor = executor.with_trace();
    }

    let result = executor.execute(&rule, record)?;
    info!(
        rule_id = %result.rule_id,
        matched = result.matched,
        elapsed_us = result.evaluation_time_us,
        "Rule evaluated"
    );

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn read_record(inline: Option<String>, file: Option<PathBuf>) -> Result<Record> {
    let json = match (inline, file) {
        (Some(json), _) => json,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read record file {}", path.display()))?,
        (None, None) => anyhow::bail!("either --record or --record-file is required"),
    };

    Record::from_json(&json).context("record must be a JSON object of numbers, strings and booleans")
}
