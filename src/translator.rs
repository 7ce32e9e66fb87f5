//! 字符串翻译模块
//!
//! 三级解析，先命中者生效：
//! 1. 精确匹配
//! 2. 数字模式匹配
//! 3. 有长度下限的整词子串替换

// 标准库导入
use std::borrow::Cow;

// 第三方crate导入
use regex::NoExpand;

// 本地模块导入
use crate::dictionary::Dictionary;

/// 基于词典的翻译器
///
/// 翻译是 (字符串, 当前词典) 的纯函数，不会修改词典；
/// 重新加载时通过 [`Translator::replace_dictionary`] 整体替换
#[derive(Debug, Clone)]
pub struct Translator {
    dictionary: Dictionary,
}

impl Translator {
    /// 创建翻译器
    pub fn new(dictionary: Dictionary) -> Self {
        Self { dictionary }
    }

    /// 当前词典
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// 整体替换词典，返回旧词典
    pub fn replace_dictionary(&mut self, dictionary: Dictionary) -> Dictionary {
        std::mem::replace(&mut self.dictionary, dictionary)
    }

    /// 翻译字符串，无规则适用时原样返回
    pub fn translate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.dictionary.is_empty() {
            return Cow::Borrowed(text);
        }

        if let Some(value) = self.dictionary.get(trimmed) {
            return Cow::Owned(rewrap(text, trimmed, value));
        }

        if let Some(value) = self.apply_patterns(trimmed) {
            return Cow::Owned(rewrap(text, trimmed, &value));
        }

        self.replace_substrings(text)
    }

    /// 翻译是否会改变该字符串（按去除首尾空白后的内容判断）
    pub fn is_already_translated(&self, text: &str) -> bool {
        let key = text.trim();
        if key.is_empty() {
            return false;
        }
        self.translate(key) != key
    }

    fn apply_patterns(&self, trimmed: &str) -> Option<String> {
        let placeholder = self.dictionary.placeholder();
        self.dictionary
            .patterns()
            .iter()
            .find_map(|rule| rule.apply(trimmed, placeholder))
    }

    fn replace_substrings<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(text);
        for rule in self.dictionary.substring_rules() {
            // 译文已出现在输出里，说明这段已经汉化过
            if out.contains(rule.value()) {
                continue;
            }
            if !out.contains(rule.key()) {
                continue;
            }
            let replaced = match rule.matcher().replace_all(&out, NoExpand(rule.value())) {
                Cow::Owned(replaced) => Some(replaced),
                Cow::Borrowed(_) => None,
            };
            if let Some(replaced) = replaced {
                out = Cow::Owned(replaced);
            }
        }
        out
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(Dictionary::empty())
    }
}

/// 保留原文本首尾空白，中间替换为译文
fn rewrap(original: &str, trimmed: &str, value: &str) -> String {
    let start = original.len() - original.trim_start().len();
    let end = start + trimmed.len();
    let mut out = String::with_capacity(original.len() - trimmed.len() + value.len());
    out.push_str(&original[..start]);
    out.push_str(value);
    out.push_str(&original[end..]);
    out
}
