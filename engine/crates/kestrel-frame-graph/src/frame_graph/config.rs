use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// frame graph 的配置，可从 TOML 文件加载
///
/// ```toml
/// debug_labels = true
/// log_execution_plan = false
/// log_level = "info"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameGraphConfig {
    /// 是否为每个 Pass 录制 debug label
    pub debug_labels: bool,

    /// 是否在每次 build 之后打印执行计划
    pub log_execution_plan: bool,

    /// 日志过滤级别：off / error / warn / info / debug / trace
    pub log_level: String,
}

impl Default for FrameGraphConfig {
    fn default() -> Self {
        Self {
            debug_labels: true,
            log_execution_plan: false,
            log_level: "info".to_string(),
        }
    }
}

impl FrameGraphConfig {
    /// 从 TOML 字符串解析，缺省的字段使用默认值
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("解析 FrameGraph 配置失败")?;
        config.log_filter()?;
        Ok(config)
    }

    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;

        Self::from_toml_str(&content).with_context(|| format!("加载配置文件失败: {:?}", path.as_ref()))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        fs::write(path.as_ref(), content).with_context(|| format!("写入配置文件失败: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// `log_level` 对应的过滤级别
    pub fn log_filter(&self) -> anyhow::Result<log::LevelFilter> {
        log::LevelFilter::from_str(&self.log_level).with_context(|| format!("无效的日志级别: {:?}", self.log_level))
    }

    /// 按 `log_level` 初始化全局 logger
    pub fn init_log(&self) -> anyhow::Result<()> {
        kestrel_crate_tools::init_log::init_log_with_filter(self.log_filter()?);
        Ok(())
    }
}
