//! 文本过滤器模块
//!
//! 判断候选字符串是否为值得处理的英文界面文本，
//! 让翻译器和提取目录不在标记、数字和已汉化文本上浪费工作

// 标准库导入
use std::sync::LazyLock;

// 第三方crate导入
use regex::Regex;

// 本地模块导入
use crate::constants::classifier_config;

/// 纯数字/尺寸/符号
static NUMERIC_OR_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\d\s./:,%+\-×]*\d[\d\s./:,%+\-×]*(?:px|pt|em|rem|vh|vw|ms|s|kb|mb|gb|tb|fps|hz|khz|k|m|x)?$")
        .expect("numeric pattern is valid")
});

/// 只含数字和符号（无单位）
static SYMBOLS_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s./:%+\-]+$").expect("symbol pattern is valid"));

/// 裸URL
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:https?://|www\.\S+$)").expect("url pattern is valid"));

/// 调试日志
static DEBUG_LOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Edge from [0-9a-f-]{8,}").expect("debug pattern is valid")
});

/// 汉字（目标语言文字）
static HAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Han}").expect("han pattern is valid"));

/// 文本过滤器
#[derive(Debug, Clone)]
pub struct Classifier {
    min_len: usize,
    max_len: usize,
}

impl Classifier {
    /// 创建过滤器
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }

    /// 最小长度
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// 最大长度
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// 判断文本是否为可处理的英文界面文本
    pub fn is_candidate(&self, text: &str) -> bool {
        let trimmed = text.trim();

        // 计数最多只走到极端上限，超长日志不会拖慢过滤
        let len = trimmed
            .chars()
            .take(classifier_config::EMERGENCY_MAX_LEN + 1)
            .count();

        if len < self.min_len {
            return false;
        }
        if len > classifier_config::EMERGENCY_MAX_LEN {
            return false;
        }
        if len > self.max_len {
            return false;
        }

        // 必须含英文
        if !trimmed.chars().any(|c| c.is_ascii_alphabetic()) {
            return false;
        }

        if SYMBOLS_ONLY.is_match(trimmed) || NUMERIC_OR_UNIT.is_match(trimmed) {
            return false;
        }

        if trimmed.contains(classifier_config::MARKUP_CHARS) {
            return false;
        }

        if BARE_URL.is_match(trimmed) || DEBUG_LOG.is_match(trimmed) {
            return false;
        }

        // 已经是中文的视为已汉化
        !HAN.is_match(trimmed)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            classifier_config::DEFAULT_MIN_LEN,
            classifier_config::DEFAULT_MAX_LEN,
        )
    }
}
