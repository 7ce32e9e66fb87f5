//! 变更监听模块
//!
//! 把 DOM 变更记录整理为引擎的增量工作项，
//! 并提供在静态文档上模拟 MutationObserver 的记录器

// 标准库导入
use std::fmt;

// 第三方crate导入
use markup5ever_rcdom::{Handle, NodeData};
use tracing::debug;

// 本地模块导入
use crate::dom::{self, element_name};

/// 一条变更记录
#[derive(Clone)]
pub enum MutationRecord {
    /// 子节点增删
    ChildList {
        /// 父节点
        target: Handle,
        /// 新增节点（按插入顺序）
        added: Vec<Handle>,
        /// 移除节点
        removed: Vec<Handle>,
    },
    /// 属性变化
    Attributes {
        /// 元素
        target: Handle,
        /// 属性名
        name: String,
    },
    /// 文本内容变化
    CharacterData {
        /// 文本节点
        target: Handle,
    },
}

impl fmt::Debug for MutationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationRecord::ChildList { added, removed, .. } => {
                write!(f, "ChildList(+{} -{})", added.len(), removed.len())
            }
            MutationRecord::Attributes { target, name } => {
                write!(f, "Attributes({}@{})", name, element_name(target).unwrap_or("?"))
            }
            MutationRecord::CharacterData { .. } => write!(f, "CharacterData"),
        }
    }
}

/// 增量工作项
#[derive(Clone)]
pub enum WorkItem {
    /// 移出文档的节点
    Detached(Handle),
    /// 新插入的元素，深度扫描其子树
    ScanElement(Handle),
    /// 直接处理文本节点
    Text(Handle),
    /// 只处理元素上的一个属性
    Attribute {
        /// 元素
        element: Handle,
        /// 属性名
        name: String,
    },
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Detached(_) => write!(f, "Detached"),
            WorkItem::ScanElement(element) => {
                write!(f, "ScanElement({})", element_name(element).unwrap_or("?"))
            }
            WorkItem::Text(_) => write!(f, "Text"),
            WorkItem::Attribute { name, .. } => write!(f, "Attribute({})", name),
        }
    }
}

/// 变更监听器
///
/// 只关心子节点增删、白名单属性和文本内容三类变化
#[derive(Debug, Clone)]
pub struct MutationWatcher {
    attribute_filter: Vec<String>,
    connected: bool,
}

impl MutationWatcher {
    /// 创建监听器（初始未连接）
    pub fn new(attribute_filter: Vec<String>) -> Self {
        Self {
            attribute_filter,
            connected: false,
        }
    }

    /// 开始监听
    pub fn connect(&mut self) {
        self.connected = true;
    }

    /// 停止监听
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// 是否在监听
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// 属性是否在过滤列表中
    pub fn observes_attribute(&self, name: &str) -> bool {
        self.attribute_filter.iter().any(|a| a == name)
    }

    /// 按投递顺序把一批记录整理为工作项
    pub fn plan(&self, records: &[MutationRecord]) -> Vec<WorkItem> {
        let mut items = Vec::new();
        for record in records {
            match record {
                MutationRecord::ChildList { added, removed, .. } => {
                    items.extend(removed.iter().cloned().map(WorkItem::Detached));
                    for node in added {
                        match node.data {
                            NodeData::Element { .. } => items.push(WorkItem::ScanElement(node.clone())),
                            NodeData::Text { .. } => items.push(WorkItem::Text(node.clone())),
                            _ => {}
                        }
                    }
                }
                MutationRecord::Attributes { target, name } => {
                    if self.observes_attribute(name) {
                        items.push(WorkItem::Attribute {
                            element: target.clone(),
                            name: name.clone(),
                        });
                    }
                }
                MutationRecord::CharacterData { target } => {
                    if let NodeData::Text { .. } = target.data {
                        items.push(WorkItem::Text(target.clone()));
                    }
                }
            }
        }
        debug!("变更记录 {} 条 -> 工作项 {} 个", records.len(), items.len());
        items
    }
}

/// 变更记录器
///
/// 在静态文档上执行编辑并生成与浏览器一致的变更记录
#[derive(Debug, Default)]
pub struct MutationRecorder {
    records: Vec<MutationRecord>,
}

impl MutationRecorder {
    /// 创建记录器
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加子节点
    pub fn append_child(&mut self, parent: &Handle, child: &Handle) {
        if let Some(old_parent) = dom::parent_of(child) {
            self.remove_child(&old_parent, child);
        }
        dom::append_child(parent, child);
        self.records.push(MutationRecord::ChildList {
            target: parent.clone(),
            added: vec![child.clone()],
            removed: Vec::new(),
        });
    }

    /// 移除子节点
    pub fn remove_child(&mut self, parent: &Handle, child: &Handle) -> bool {
        if !dom::remove_child(parent, child) {
            return false;
        }
        self.records.push(MutationRecord::ChildList {
            target: parent.clone(),
            added: Vec::new(),
            removed: vec![child.clone()],
        });
        true
    }

    /// 设置属性
    pub fn set_attribute(&mut self, element: &Handle, name: &str, value: &str) {
        dom::set_attr(element, name, value);
        self.records.push(MutationRecord::Attributes {
            target: element.clone(),
            name: name.to_string(),
        });
    }

    /// 改写文本节点
    pub fn set_text(&mut self, node: &Handle, text: &str) {
        dom::set_text(node, text);
        self.records.push(MutationRecord::CharacterData {
            target: node.clone(),
        });
    }

    /// 待投递的记录数
    pub fn pending(&self) -> usize {
        self.records.len()
    }

    /// 取出当前批次
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}
