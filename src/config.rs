//! 配置管理模块
//!
//! 提供CLI参数解析和引擎配置管理功能

// 标准库导入
use std::path::PathBuf;

// 第三方crate导入
use clap::{Parser, ValueEnum};

// 本地模块导入
use crate::constants::{catalog_config, classifier_config, dictionary_config, scan_config};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// 原地替换为译文
    #[default]
    Translate,
    /// 只收集未翻译的文本
    Extract,
}

/// 引擎配置结构体
///
/// 支持Builder模式进行链式配置。
///
/// # Examples
///
/// ```rust
/// use dom_i18n::config::{EngineConfig, Mode};
///
/// let config = EngineConfig::new()
///     .with_mode(Mode::Extract)
///     .with_max_nodes(10_000)
///     .include_hidden(false);
/// assert_eq!(config.max_nodes(), 10_000);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 运行模式
    mode: Mode,
    /// 参与处理的属性
    attributes: Vec<String>,
    /// 是否处理属性
    include_attributes: bool,
    /// 文本最小长度
    min_len: usize,
    /// 文本最大长度
    max_len: usize,
    /// 是否处理隐藏元素
    include_hidden: bool,
    /// 每轮最大访问节点数
    max_nodes: usize,
    /// shadow/iframe 最大递归深度
    max_depth: usize,
    /// 子串替换的最小键长度
    min_substring_len: usize,
    /// 每个提取条目的位置样本数
    sample_limit: usize,
    /// 位置描述追溯层数
    descriptor_depth: usize,
}

impl EngineConfig {
    /// 创建新的配置实例
    ///
    /// 返回具有默认值的配置实例：
    /// - 模式: 翻译
    /// - 属性: aria-label / title / placeholder / value
    /// - 文本长度: 2 ~ 800
    /// - 节点上限: 250000，递归深度: 12
    pub fn new() -> Self {
        Self {
            mode: Mode::Translate,
            attributes: scan_config::DEFAULT_ATTRS
                .iter()
                .map(|a| a.to_string())
                .collect(),
            include_attributes: true,
            min_len: classifier_config::DEFAULT_MIN_LEN,
            max_len: classifier_config::DEFAULT_MAX_LEN,
            include_hidden: true,
            max_nodes: scan_config::DEFAULT_MAX_NODES,
            max_depth: scan_config::DEFAULT_MAX_DEPTH,
            min_substring_len: dictionary_config::MIN_SUBSTRING_LEN,
            sample_limit: catalog_config::SAMPLE_LIMIT,
            descriptor_depth: catalog_config::DESCRIPTOR_DEPTH,
        }
    }

    /// 获取运行模式
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// 获取属性白名单
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// 属性是否在白名单中（已开启属性处理时）
    pub fn watches_attribute(&self, name: &str) -> bool {
        self.include_attributes && self.attributes.iter().any(|a| a == name)
    }

    /// 是否处理属性
    pub fn includes_attributes(&self) -> bool {
        self.include_attributes
    }

    /// 获取最小长度
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// 获取最大长度
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// 是否处理隐藏元素
    pub fn includes_hidden(&self) -> bool {
        self.include_hidden
    }

    /// 获取节点上限
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// 获取递归深度上限
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 获取子串替换的最小键长度
    pub fn min_substring_len(&self) -> usize {
        self.min_substring_len
    }

    /// 获取位置样本数
    pub fn sample_limit(&self) -> usize {
        self.sample_limit
    }

    /// 获取位置描述追溯层数
    pub fn descriptor_depth(&self) -> usize {
        self.descriptor_depth
    }

    /// 设置运行模式
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// 设置属性白名单
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// 设置是否处理属性
    pub fn include_attributes(mut self, include: bool) -> Self {
        self.include_attributes = include;
        self
    }

    /// 设置文本长度范围
    pub fn with_length_range(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    /// 设置是否处理隐藏元素
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// 设置节点上限
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// 设置递归深度上限
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 设置子串替换的最小键长度
    pub fn with_min_substring_len(mut self, len: usize) -> Self {
        self.min_substring_len = len;
        self
    }

    /// 设置位置样本数
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    /// 设置位置描述追溯层数
    pub fn with_descriptor_depth(mut self, depth: usize) -> Self {
        self.descriptor_depth = depth;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// CLI参数结构
#[derive(Parser)]
#[command(author, version, about = "基于词典的DOM界面汉化工具 - 支持原地翻译和未翻译文本提取", long_about = None)]
pub struct Cli {
    /// 输入HTML文件路径或网页URL
    #[arg(short, long, value_name = "FILE_OR_URL")]
    pub input: String,

    /// 输出文件路径 (可选，默认为输入文件名+模式后缀)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// 运行模式
    #[arg(short, long, value_enum, default_value_t = Mode::Translate)]
    pub mode: Mode,

    /// 词典来源 (URL或文件，可重复，按顺序尝试)
    #[arg(short, long = "dict", value_name = "URL_OR_FILE")]
    pub dicts: Vec<String>,

    /// 内置词典目录 (目录下的 *.json 按文件名顺序作为后备来源)
    #[arg(long, value_name = "DIR")]
    pub bundle_dir: Option<PathBuf>,

    /// 不使用默认远程词典
    #[arg(long)]
    pub no_remote: bool,

    /// 预先注册的同源框架 (URL=FILE，可重复)
    #[arg(long = "frame", value_name = "URL=FILE")]
    pub frames: Vec<String>,

    /// 每轮最大访问节点数
    #[arg(long, default_value_t = scan_config::DEFAULT_MAX_NODES)]
    pub max_nodes: usize,

    /// shadow/iframe 最大递归深度
    #[arg(long, default_value_t = scan_config::DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// 跳过隐藏元素
    #[arg(long)]
    pub skip_hidden: bool,

    /// 提取模式下输出待填写的词典模板
    #[arg(long)]
    pub template: bool,

    /// 显示扫描统计
    #[arg(long)]
    pub stats: bool,

    /// 远程词典最大重试次数
    #[arg(long, default_value_t = dictionary_config::DEFAULT_MAX_RETRIES)]
    pub retries: usize,

    /// 请求超时时间（秒）
    #[arg(long, default_value_t = dictionary_config::REQUEST_TIMEOUT_SECONDS)]
    pub timeout: u64,

    /// 详细输出模式
    #[arg(short, long)]
    pub verbose: bool,

    /// 静默模式 (仅输出错误)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// 由命令行参数构建引擎配置
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_mode(self.mode)
            .with_max_nodes(self.max_nodes)
            .with_max_depth(self.max_depth)
            .include_hidden(!self.skip_hidden)
    }

    /// 解析 `--frame URL=FILE` 参数
    pub fn frame_specs(&self) -> Result<Vec<(String, PathBuf)>, String> {
        self.frames
            .iter()
            .map(|spec| match spec.split_once('=') {
                Some((url, file)) if !url.is_empty() && !file.is_empty() => {
                    Ok((url.to_string(), PathBuf::from(file)))
                }
                _ => Err(format!("框架参数格式应为 URL=FILE: {}", spec)),
            })
            .collect()
    }
}
