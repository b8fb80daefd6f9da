use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 观察层配置总结构
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ObserverSettings {
    pub instrumentation: InstrumentationSettings,
    pub identity: IdentitySettings,
    pub utm: UtmSettings,
    pub payload: PayloadSettings,
}

/// 自动埋点配置
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InstrumentationSettings {
    /// 调用 auto_track 之后延迟多久扫描 DOM（单位：毫秒），默认 1500ms
    pub delay_ms: u64,
}

/// 访客标识同步配置
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IdentitySettings {
    /// 追加到外链上的查询参数名
    pub param_name: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UtmSettings {
    pub prefix: String,
}

/// 序列化载荷的解析限制
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PayloadSettings {
    pub max_len: usize,
    pub max_depth: usize,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            instrumentation: InstrumentationSettings { delay_ms: 1500 },
            identity: IdentitySettings {
                param_name: "leosyn".to_string(),
            },
            utm: UtmSettings {
                prefix: "utm_".to_string(),
            },
            payload: PayloadSettings {
                max_len: 64 * 1024,
                max_depth: 32,
            },
        }
    }
}

impl ObserverSettings {
    /// 加载配置：支持默认值、可选配置文件、环境变量覆盖
    pub fn new() -> anyhow::Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::with_name("observer").required(false))
            .add_source(Environment::with_prefix("LEO").separator("__"));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 从指定文件加载，文件缺失的键沿用默认值
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let builder = Self::defaults()?.add_source(File::from(path).required(true));
        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    fn defaults() -> anyhow::Result<ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Self::default();
        Ok(Config::builder()
            .set_default(
                "instrumentation.delay_ms",
                defaults.instrumentation.delay_ms,
            )?
            .set_default("identity.param_name", defaults.identity.param_name)?
            .set_default("utm.prefix", defaults.utm.prefix)?
            .set_default("payload.max_len", defaults.payload.max_len as u64)?
            .set_default("payload.max_depth", defaults.payload.max_depth as u64)?)
    }
}
