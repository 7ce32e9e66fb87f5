//! 词典存储模块
//!
//! 保存当前的翻译映射以及由其派生的规则：
//! - 精确匹配表
//! - 含 `%d` 占位符的数字模式规则
//! - 预编译的整词子串替换规则
//!
//! 所有规则在加载时一次性构建并缓存，之后只读

// 第三方crate导入
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

// 本地模块导入
use crate::constants::dictionary_config;
use crate::error::LoadError;

/// 词典构建选项
#[derive(Debug, Clone)]
pub struct DictionaryOptions {
    /// 数字占位符
    pub placeholder: String,
    /// 子串替换的最小键长度（字符数）
    pub min_substring_len: usize,
}

impl Default for DictionaryOptions {
    fn default() -> Self {
        Self {
            placeholder: dictionary_config::PLACEHOLDER_TOKEN.to_string(),
            min_substring_len: dictionary_config::MIN_SUBSTRING_LEN,
        }
    }
}

/// 数字模式规则
#[derive(Debug, Clone)]
pub struct PatternRule {
    key: String,
    matcher: Regex,
    template: String,
}

impl PatternRule {
    /// 原始词典键
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 译文模板
    pub fn template(&self) -> &str {
        &self.template
    }

    /// 匹配整个字符串，成功时把捕获的数字按顺序填回模板
    pub fn apply(&self, text: &str, placeholder: &str) -> Option<String> {
        let captures = self.matcher.captures(text)?;
        let mut groups = captures.iter().skip(1).map(|m| m.map_or("", |m| m.as_str()));

        let mut out = String::with_capacity(self.template.len() + 8);
        let mut pieces = self.template.split(placeholder);
        if let Some(first) = pieces.next() {
            out.push_str(first);
        }
        for piece in pieces {
            out.push_str(groups.next().unwrap_or(""));
            out.push_str(piece);
        }
        Some(out)
    }
}

/// 整词子串替换规则
#[derive(Debug, Clone)]
pub struct SubstringRule {
    key: String,
    value: String,
    matcher: Regex,
}

impl SubstringRule {
    /// 原文
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 译文
    pub fn value(&self) -> &str {
        &self.value
    }

    /// 编译后的整词匹配器
    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }
}

/// 翻译词典
///
/// 加载后不可变；重新加载时整体替换
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: IndexMap<String, String>,
    patterns: Vec<PatternRule>,
    substrings: Vec<SubstringRule>,
    placeholder: String,
    origin: Option<String>,
}

impl Dictionary {
    /// 创建空词典（加载失败时使用）
    pub fn empty() -> Self {
        Self {
            placeholder: dictionary_config::PLACEHOLDER_TOKEN.to_string(),
            ..Default::default()
        }
    }

    /// 从键值对构建词典并派生规则
    ///
    /// 键会被去除首尾空白；空键被丢弃；重复键保留第一次出现的值
    pub fn from_entries<I, K, V>(pairs: I, options: &DictionaryOptions) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries = IndexMap::new();
        for (key, value) in pairs {
            let key: String = key.into();
            let trimmed = key.trim();
            if trimmed.is_empty() {
                debug!("丢弃空词典键");
                continue;
            }
            entries.entry(trimmed.to_string()).or_insert_with(|| value.into());
        }

        let patterns = build_pattern_rules(&entries, &options.placeholder);
        let substrings = build_substring_rules(&entries, options);

        Self {
            entries,
            patterns,
            substrings,
            placeholder: options.placeholder.clone(),
            origin: None,
        }
    }

    /// 解析JSON词典负载
    ///
    /// 只接受对象，且所有值都必须是字符串，至少包含一个条目
    pub fn from_json(
        payload: &str,
        origin: &str,
        options: &DictionaryOptions,
    ) -> Result<Self, LoadError> {
        // 直接解析为 IndexMap 以保留文档顺序
        let ordered: IndexMap<String, Value> = match serde_json::from_str(payload) {
            Ok(map) => map,
            Err(e) => {
                let reason = match serde_json::from_str::<Value>(payload) {
                    Ok(other) => format!("期望JSON对象，实际为 {}", json_kind(&other)),
                    Err(_) => format!("JSON解析失败: {}", e),
                };
                return Err(LoadError::Malformed {
                    source: origin.to_string(),
                    reason,
                });
            }
        };

        let mut pairs = Vec::with_capacity(ordered.len());
        for (key, value) in ordered {
            match value {
                Value::String(text) => pairs.push((key, text)),
                other => {
                    return Err(LoadError::Malformed {
                        source: origin.to_string(),
                        reason: format!("键 '{}' 的值不是字符串 ({})", key, json_kind(&other)),
                    })
                }
            }
        }

        let mut dictionary = Self::from_entries(pairs, options);
        if dictionary.is_empty() {
            return Err(LoadError::Malformed {
                source: origin.to_string(),
                reason: "词典为空".to_string(),
            });
        }
        dictionary.origin = Some(origin.to_string());
        Ok(dictionary)
    }

    /// 精确查找
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// 是否包含该键
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按文档顺序遍历条目
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 数字模式规则
    pub fn patterns(&self) -> &[PatternRule] {
        &self.patterns
    }

    /// 子串替换规则
    pub fn substring_rules(&self) -> &[SubstringRule] {
        &self.substrings
    }

    /// 数字占位符
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// 词典来源
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// 生成数字模式规则的正则源码
///
/// 整串锚定；字面部分全部转义，连续空白折叠为 `\s+`；
/// 键中不含占位符时返回 None
pub fn pattern_source(key: &str, placeholder: &str) -> Option<String> {
    if placeholder.is_empty() || !key.contains(placeholder) {
        return None;
    }

    let literals: Vec<String> = key.split(placeholder).map(escape_literal).collect();
    let mut source = String::from("^");
    source.push_str(&literals.join(dictionary_config::NUM_CAPTURE));
    source.push('$');
    Some(source)
}

/// 生成整词子串匹配的正则源码
///
/// 只在键的首/尾是 ASCII 单词字符时加边界，
/// 使用 ASCII 边界以便与相邻的中文字符正确断开
pub fn substring_source(key: &str) -> String {
    let mut source = String::new();
    if key.chars().next().is_some_and(is_ascii_word_char) {
        source.push_str(r"(?-u:\b)");
    }
    source.push_str(&regex::escape(key));
    if key.chars().last().is_some_and(is_ascii_word_char) {
        source.push_str(r"(?-u:\b)");
    }
    source
}

fn build_pattern_rules(entries: &IndexMap<String, String>, placeholder: &str) -> Vec<PatternRule> {
    let mut rules = Vec::new();
    for (key, template) in entries {
        let Some(source) = pattern_source(key, placeholder) else {
            continue;
        };
        match Regex::new(&source) {
            Ok(matcher) => rules.push(PatternRule {
                key: key.clone(),
                matcher,
                template: template.clone(),
            }),
            Err(e) => warn!("⚠️  丢弃无效的模式规则 '{}': {}", key, e),
        }
    }
    rules
}

fn build_substring_rules(
    entries: &IndexMap<String, String>,
    options: &DictionaryOptions,
) -> Vec<SubstringRule> {
    let mut rules = Vec::new();
    for (key, value) in entries {
        if key.chars().count() < options.min_substring_len || value.is_empty() {
            continue;
        }
        if !options.placeholder.is_empty() && key.contains(&options.placeholder) {
            continue;
        }
        match Regex::new(&substring_source(key)) {
            Ok(matcher) => rules.push(SubstringRule {
                key: key.clone(),
                value: value.clone(),
                matcher,
            }),
            Err(e) => warn!("⚠️  丢弃无效的子串规则 '{}': {}", key, e),
        }
    }
    rules
}

/// 转义字面文本并把空白段折叠为 `\s+`
fn escape_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len() + 4);
    let mut in_space = false;
    let mut word = String::new();
    for ch in literal.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push_str(&regex::escape(&word));
                word.clear();
                out.push_str(r"\s+");
                in_space = true;
            }
        } else {
            in_space = false;
            word.push(ch);
        }
    }
    out.push_str(&regex::escape(&word));
    out
}

fn is_ascii_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "布尔值",
        Value::Number(_) => "数字",
        Value::String(_) => "字符串",
        Value::Array(_) => "数组",
        Value::Object(_) => "对象",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(pairs: &[(&str, &str)]) -> Dictionary {
        Dictionary::from_entries(pairs.iter().copied(), &DictionaryOptions::default())
    }

    #[test]
    fn test_pattern_source_escapes_and_flexes_whitespace() {
        let source = pattern_source("Apply %d changes (x+y)", "%d").unwrap();
        assert_eq!(
            source,
            r"^Apply\s+([0-9][0-9,]*(?:\.[0-9]+)?)\s+changes\s+\(x\+y\)$"
        );
        assert!(pattern_source("No placeholder", "%d").is_none());
    }

    #[test]
    fn test_pattern_rule_apply_in_capture_order() {
        let d = dict(&[("%d of %d selected", "已选 %d / %d")]);
        let rule = &d.patterns()[0];
        assert_eq!(rule.apply("3 of 10 selected", "%d").as_deref(), Some("已选 3 / 10"));
        assert_eq!(rule.apply("3  of 1,200.5 selected", "%d").as_deref(), Some("已选 3 / 1,200.5"));
        assert!(rule.apply("x of 10 selected", "%d").is_none());
        assert!(rule.apply("3 of 10 selected!", "%d").is_none());
    }

    #[test]
    fn test_substring_rules_respect_threshold() {
        let d = dict(&[("to", "到"), ("Export", "导出"), ("Settings", "设置"), ("Deleted", "")]);
        let keys: Vec<&str> = d.substring_rules().iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["Export", "Settings"]);
    }

    #[test]
    fn test_substring_source_boundaries() {
        assert_eq!(substring_source("Export"), r"(?-u:\b)Export(?-u:\b)");
        assert_eq!(substring_source("(beta)"), r"\(beta\)");
    }

    #[test]
    fn test_from_json_preserves_order_and_trims_keys() {
        let d = Dictionary::from_json(
            r#"{"  Zeta ": "泽塔", "Alpha": "阿尔法", "Zeta": "重复"}"#,
            "inline",
            &DictionaryOptions::default(),
        )
        .unwrap();
        let keys: Vec<&str> = d.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
        assert_eq!(d.get("Zeta"), Some("泽塔"));
        assert_eq!(d.origin(), Some("inline"));
    }

    #[test]
    fn test_from_json_rejects_bad_shapes() {
        let options = DictionaryOptions::default();
        assert!(Dictionary::from_json("[1, 2]", "a", &options).is_err());
        assert!(Dictionary::from_json("{}", "b", &options).is_err());
        assert!(Dictionary::from_json(r#"{"Hello": 1}"#, "c", &options).is_err());
        assert!(Dictionary::from_json("not json", "d", &options).is_err());
        assert!(Dictionary::from_json(r#"{"  ": "空"}"#, "e", &options).is_err());
    }

    #[test]
    fn test_empty_value_is_kept_as_entry() {
        let d = dict(&[("Beta", "")]);
        assert_eq!(d.get("Beta"), Some(""));
        assert!(d.substring_rules().is_empty());
    }
}
