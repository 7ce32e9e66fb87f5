//! 提取目录模块
//!
//! 提取模式下收集页面中尚无译文的英文界面文本，
//! 记录出现次数、位置样本和来源类型，供导出为词典模板

// 标准库导入
use std::fmt;

// 第三方crate导入
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};
use tracing::debug;

// 本地模块导入
use crate::classifier::Classifier;
use crate::constants::catalog_config;
use crate::dom::{element_name, get_attr, is_element, parent_of};
use crate::translator::Translator;

/// 文本来源类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OriginKind {
    /// 文本节点
    Text,
    /// 属性
    Attribute(String),
}

impl fmt::Display for OriginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginKind::Text => write!(f, "text"),
            OriginKind::Attribute(name) => write!(f, "attr:{}", name),
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    count: usize,
    samples: IndexSet<String>,
    kinds: IndexSet<String>,
}

/// 导出行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    /// 原文（已去除首尾空白）
    pub key: String,
    /// 出现次数
    pub count: usize,
    /// 来源类型，如 `text`、`attr:title`
    pub types: Vec<String>,
    /// 位置样本
    pub samples: Vec<String>,
}

/// 导出快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// 生成时间
    pub generated_at: DateTime<Utc>,
    /// 行数
    pub total: usize,
    /// 按出现次数降序排列的行
    pub rows: Vec<CatalogRow>,
}

/// 提取目录
#[derive(Debug)]
pub struct Catalog {
    entries: IndexMap<String, Entry>,
    sample_limit: usize,
    descriptor_depth: usize,
}

impl Catalog {
    /// 创建目录
    pub fn new(sample_limit: usize, descriptor_depth: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            sample_limit,
            descriptor_depth,
        }
    }

    /// 登记一处文本，返回是否被收录
    ///
    /// 过滤器不接受或当前词典已能翻译的文本不会收录
    pub fn register(
        &mut self,
        text: &str,
        origin: Option<&Handle>,
        kind: OriginKind,
        classifier: &Classifier,
        translator: &Translator,
    ) -> bool {
        if !classifier.is_candidate(text) {
            return false;
        }
        let key = text.trim();
        if translator.is_already_translated(key) {
            return false;
        }

        let entry = self.entries.entry(key.to_string()).or_default();
        entry.count += 1;
        entry.kinds.insert(kind.to_string());
        if entry.samples.len() < self.sample_limit {
            if let Some(element) = origin {
                let path = descriptor(element, self.descriptor_depth);
                if !path.is_empty() {
                    entry.samples.insert(path);
                }
            }
        }
        true
    }

    /// 移除当前词典已能翻译的条目，返回移除数量
    pub fn prune(&mut self, translator: &Translator) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| !translator.is_already_translated(key));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("🧹 目录清理 {} 条已可翻译的条目", removed);
        }
        removed
    }

    /// 导出当前仍无译文的条目
    pub fn export(&self, translator: &Translator) -> CatalogSnapshot {
        let mut rows: Vec<CatalogRow> = self
            .entries
            .iter()
            .filter(|(key, _)| !translator.is_already_translated(key))
            .map(|(key, entry)| CatalogRow {
                key: key.clone(),
                count: entry.count,
                types: entry.kinds.iter().cloned().collect(),
                samples: entry.samples.iter().cloned().collect(),
            })
            .collect();
        // 稳定排序，同次数保持首次出现顺序
        rows.sort_by(|a, b| b.count.cmp(&a.count));

        CatalogSnapshot {
            generated_at: Utc::now(),
            total: rows.len(),
            rows,
        }
    }

    /// 导出待填写的词典模板 `{原文: ""}`
    pub fn export_template(&self, translator: &Translator) -> IndexMap<String, String> {
        self.export(translator)
            .rows
            .into_iter()
            .map(|row| (row.key, String::new()))
            .collect()
    }

    /// 清空
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 是否包含该原文
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key.trim())
    }

    /// 某条原文的出现次数
    pub fn count_of(&self, key: &str) -> usize {
        self.entries.get(key.trim()).map_or(0, |entry| entry.count)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(catalog_config::SAMPLE_LIMIT, catalog_config::DESCRIPTOR_DEPTH)
    }
}

/// 元素位置描述：`tag#id.cls1.cls2`，最多向上 `depth` 层，外层在前
pub fn descriptor(element: &Handle, depth: usize) -> String {
    let mut parts = Vec::with_capacity(depth);
    let mut current = Some(element.clone());

    while let Some(node) = current {
        if parts.len() >= depth || !is_element(&node) {
            break;
        }
        parts.push(describe_one(&node));
        current = parent_of(&node);
    }

    parts.reverse();
    parts.join(" > ")
}

fn describe_one(element: &Handle) -> String {
    let mut part = element_name(element).unwrap_or_default().to_ascii_lowercase();
    if let Some(id) = get_attr(element, "id").filter(|id| !id.is_empty()) {
        part.push('#');
        part.push_str(&id);
    }
    if let Some(class) = get_attr(element, "class") {
        let classes: Vec<&str> = class
            .split_whitespace()
            .take(catalog_config::DESCRIPTOR_CLASSES)
            .collect();
        if !classes.is_empty() {
            part.push('.');
            part.push_str(&classes.join("."));
        }
    }
    part
}
