//! 配置管理模块
//!
//! 支持多格式配置文件加载、环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "ELIGIBILITY";

/// 从配置文件和环境变量加载配置
///
/// 加载顺序（后加载的会覆盖先加载的同名配置项）：
/// 1. config/default.toml（默认配置）
/// 2. config/{environment}.toml（环境特定配置）
/// 3. config/{service_name}.toml（服务特定配置）
/// 4. 环境变量（ELIGIBILITY_ 前缀，层级用双下划线分隔，如
///    ELIGIBILITY_ENGINE__MAX_DEPTH -> engine.max_depth）
///
/// `service_name` 与 `environment` 作为默认值注入，目标类型可直接声明这两个字段。
pub fn load<T: DeserializeOwned>(service_name: &str) -> Result<T, ConfigError> {
    let env = environment();
    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

    Config::builder()
        .set_default("service_name", service_name)?
        .set_default("environment", env.clone())?
        .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
        .add_source(File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false))
        .add_source(
            File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                .required(false),
        )
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// 当前运行环境（ELIGIBILITY_ENV，默认 development）
pub fn environment() -> String {
    std::env::var(format!("{}_ENV", ENV_PREFIX)).unwrap_or_else(|_| "development".to_string())
}
