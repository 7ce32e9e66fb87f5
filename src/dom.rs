//! DOM模块
//!
//! 提供页面宿主抽象、rcdom 节点工具函数，以及以节点身份为键的弱引用表

// 标准库导入
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

// 第三方crate导入
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{LocalName, Namespace};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use tracing::debug;
use url::Url;

// 本地模块导入
use crate::error::{DomError, FrameAccessError};

/// 扫描器需要的宿主能力
///
/// 除了节点树本身，扫描器还需要知道 shadow root、框架文档和可见性，
/// 这些在浏览器里由宿主提供
pub trait DomHost {
    /// 文档根节点
    fn document(&self) -> Handle;

    /// 元素挂载的 shadow root
    fn shadow_root(&self, element: &Handle) -> Option<Handle>;

    /// 框架元素的文档；跨域访问返回错误
    fn frame_document(&self, element: &Handle) -> Result<Option<Handle>, FrameAccessError>;

    /// 元素是否不显示或不可见
    fn is_hidden(&self, element: &Handle) -> bool;
}

/// 静态页面
///
/// - shadow root 来自声明式 `<template shadowrootmode>`
/// - `srcdoc` 框架视为同源，首次访问时解析并按 `srcdoc` 内容缓存
/// - `src` 框架按页面地址解析，同源文档需通过 [`Page::attach_frame`] 注册
pub struct Page {
    dom: RcDom,
    url: Option<Url>,
    srcdoc_frames: RefCell<WeakNodeMap<(String, RcDom)>>,
    attached_frames: HashMap<String, RcDom>,
}

impl Page {
    /// 解析HTML页面
    pub fn parse(html: &str, url: Option<Url>) -> Result<Self, DomError> {
        let dom = parse_html(html)?;
        Ok(Self {
            dom,
            url,
            srcdoc_frames: RefCell::new(WeakNodeMap::new()),
            attached_frames: HashMap::new(),
        })
    }

    /// 页面地址
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// 注册同源框架文档
    ///
    /// `src` 与框架元素的 `src` 属性写法一致，会按页面地址解析
    pub fn attach_frame(&mut self, src: &str, html: &str) -> Result<(), DomError> {
        let key = match &self.url {
            Some(base) => base
                .join(src)
                .map_err(|e| DomError::Parse {
                    details: format!("框架地址无效 '{}': {}", src, e),
                })?
                .to_string(),
            None => src.to_string(),
        };

        let dom = parse_html(html)?;
        self.attached_frames.insert(key.clone(), dom);
        debug!("注册框架文档: {}", key);
        Ok(())
    }

    /// 已注册的框架数量（含已解析的 srcdoc）
    pub fn frame_count(&self) -> usize {
        self.attached_frames.len() + self.srcdoc_frames.borrow().len()
    }

    /// 序列化当前文档
    pub fn to_html(&self) -> Result<String, DomError> {
        serialize_node(&self.dom.document)
    }

    /// 找到 `<body>`，不存在时返回文档根
    pub fn body(&self) -> Handle {
        find_element(&self.dom.document, "body").unwrap_or_else(|| self.dom.document.clone())
    }

    /// 取 srcdoc 框架的文档，内容变化后重新解析
    fn srcdoc_document(&self, element: &Handle, srcdoc: &str) -> Option<Handle> {
        if let Some((source, dom)) = self.srcdoc_frames.borrow().get(element) {
            if source == srcdoc {
                return Some(dom.document.clone());
            }
        }

        match parse_html(srcdoc) {
            Ok(dom) => {
                let document = dom.document.clone();
                self.srcdoc_frames
                    .borrow_mut()
                    .insert(element, (srcdoc.to_string(), dom));
                Some(document)
            }
            Err(e) => {
                debug!("srcdoc 解析失败: {}", e);
                None
            }
        }
    }
}

impl DomHost for Page {
    fn document(&self) -> Handle {
        self.dom.document.clone()
    }

    fn shadow_root(&self, element: &Handle) -> Option<Handle> {
        let children = element.children.borrow();
        children.iter().find_map(|child| match child.data {
            NodeData::Element { ref name, ref template_contents, .. }
                if &*name.local == "template"
                    && (has_attr(child, "shadowrootmode") || has_attr(child, "shadowroot")) =>
            {
                template_contents.borrow().clone()
            }
            _ => None,
        })
    }

    fn frame_document(&self, element: &Handle) -> Result<Option<Handle>, FrameAccessError> {
        if !is_frame_element(element) {
            return Ok(None);
        }
        if let Some(srcdoc) = get_attr(element, "srcdoc") {
            return Ok(self.srcdoc_document(element, &srcdoc));
        }

        let src = match get_attr(element, "src") {
            Some(src) if !src.trim().is_empty() => src.trim().to_string(),
            _ => return Ok(None),
        };
        if src.eq_ignore_ascii_case("about:blank") {
            return Ok(None);
        }

        let key = match &self.url {
            Some(base) => {
                let resolved = base
                    .join(&src)
                    .map_err(|_| FrameAccessError::InvalidUrl { src: src.clone() })?;
                if resolved.origin() != base.origin() {
                    return Err(FrameAccessError::CrossOrigin {
                        frame_url: resolved.to_string(),
                    });
                }
                resolved.to_string()
            }
            None => {
                // 没有页面地址时，绝对地址一律按跨域处理
                if Url::parse(&src).is_ok() {
                    return Err(FrameAccessError::CrossOrigin { frame_url: src });
                }
                src
            }
        };

        Ok(self.attached_frames.get(&key).map(|dom| dom.document.clone()))
    }

    fn is_hidden(&self, element: &Handle) -> bool {
        if has_attr(element, "hidden") {
            return true;
        }
        match get_attr(element, "style") {
            Some(style) => {
                let style: String = style
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase();
                style.contains("display:none") || style.contains("visibility:hidden")
            }
            None => false,
        }
    }
}

/// 解析HTML字符串为DOM
pub fn parse_html(html: &str) -> Result<RcDom, DomError> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| DomError::Parse {
            details: format!("{:?}", e),
        })
}

/// 把一段HTML解析为游离节点（取 `<body>` 下的子节点）
pub fn parse_fragment(html: &str) -> Result<Vec<Handle>, DomError> {
    let dom = parse_html(html)?;
    let body = find_element(&dom.document, "body").ok_or_else(|| DomError::Parse {
        details: "片段缺少 body".to_string(),
    })?;
    let children: Vec<Handle> = body.children.borrow_mut().drain(..).collect();
    for child in &children {
        child.parent.set(None);
    }
    Ok(children)
}

/// 序列化节点为HTML字符串
pub fn serialize_node(node: &Handle) -> Result<String, DomError> {
    let mut buffer = Vec::new();
    serialize(
        &mut buffer,
        &SerializableHandle::from(node.clone()),
        SerializeOpts::default(),
    )
    .map_err(|e| DomError::Serialize {
        details: format!("{:?}", e),
    })?;

    String::from_utf8(buffer).map_err(|e| DomError::Serialize {
        details: format!("UTF-8转换失败: {}", e),
    })
}

/// 节点身份键
pub fn node_key(node: &Handle) -> usize {
    Rc::as_ptr(node) as usize
}

/// 获取元素标签名
pub fn element_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

/// 是否为元素节点
pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 是否为框架元素
pub fn is_frame_element(node: &Handle) -> bool {
    matches!(element_name(node), Some("iframe") | Some("frame"))
}

/// 获取节点属性值
pub fn get_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 节点是否带有该属性
pub fn has_attr(node: &Handle, attr_name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .any(|attr| &*attr.name.local == attr_name),
        _ => false,
    }
}

/// 设置节点属性，不存在时追加
pub fn set_attr(node: &Handle, attr_name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        if let Some(attr) = attrs.iter_mut().find(|attr| &*attr.name.local == attr_name) {
            attr.value = StrTendril::from_slice(value);
            return;
        }
        attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(attr_name)),
            value: StrTendril::from_slice(value),
        });
    }
}

/// 读取文本节点内容
pub fn text_content(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 改写文本节点内容
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        let mut contents = contents.borrow_mut();
        contents.clear();
        contents.push_slice(text);
    }
}

/// 创建游离的文本节点
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 获取父节点
pub fn parent_of(node: &Handle) -> Option<Handle> {
    // Cell 只能取出再放回
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    node.parent.set(weak);
    parent
}

/// 获取父元素
pub fn parent_element(node: &Handle) -> Option<Handle> {
    parent_of(node).filter(is_element)
}

/// 从节点自身开始向上查找第一个满足条件的元素
pub fn closest<F>(node: &Handle, predicate: F) -> Option<Handle>
where
    F: Fn(&Handle) -> bool,
{
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if is_element(&candidate) && predicate(&candidate) {
            return Some(candidate);
        }
        current = parent_of(&candidate);
    }
    None
}

/// 追加子节点
pub fn append_child(parent: &Handle, child: &Handle) {
    if let Some(old_parent) = parent_of(child) {
        remove_child(&old_parent, child);
    }
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 移除子节点，返回是否确实移除
pub fn remove_child(parent: &Handle, child: &Handle) -> bool {
    let mut children = parent.children.borrow_mut();
    match children.iter().position(|c| Rc::ptr_eq(c, child)) {
        Some(index) => {
            children.remove(index);
            child.parent.set(None);
            true
        }
        None => false,
    }
}

/// 深度优先查找第一个指定标签的元素
pub fn find_element(root: &Handle, tag: &str) -> Option<Handle> {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if element_name(&node) == Some(tag) {
            return Some(node);
        }
        for child in node.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }
    None
}

/// 收集子树中所有文本节点（文档顺序）
pub fn text_nodes(root: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if let NodeData::Text { .. } = node.data {
            found.push(node.clone());
        }
        for child in node.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }
    found
}

/// 以节点身份为键的弱引用表
///
/// 只持有弱引用，不会延长节点生命周期，也不会往文档里写标记属性
#[derive(Debug)]
pub struct WeakNodeMap<V> {
    entries: HashMap<usize, (Weak<Node>, V)>,
    next_purge: usize,
}

const PURGE_FLOOR: usize = 1024;

impl<V> WeakNodeMap<V> {
    /// 创建空表
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_purge: PURGE_FLOOR,
        }
    }

    /// 插入或覆盖，返回仍然存活的旧值
    pub fn insert(&mut self, node: &Handle, value: V) -> Option<V> {
        if self.entries.len() >= self.next_purge {
            self.purge();
            self.next_purge = (self.entries.len() * 2).max(PURGE_FLOOR);
        }
        self.entries
            .insert(node_key(node), (Rc::downgrade(node), value))
            .and_then(|(weak, old)| weak.upgrade().filter(|n| Rc::ptr_eq(n, node)).map(|_| old))
    }

    /// 查找
    pub fn get(&self, node: &Handle) -> Option<&V> {
        let (weak, value) = self.entries.get(&node_key(node))?;
        weak.upgrade()
            .filter(|live| Rc::ptr_eq(live, node))
            .map(|_| value)
    }

    /// 可变查找
    pub fn get_mut(&mut self, node: &Handle) -> Option<&mut V> {
        let (weak, value) = self.entries.get_mut(&node_key(node))?;
        match weak.upgrade() {
            Some(live) if Rc::ptr_eq(&live, node) => Some(value),
            _ => None,
        }
    }

    /// 是否存在
    pub fn contains(&self, node: &Handle) -> bool {
        self.get(node).is_some()
    }

    /// 移除
    pub fn remove(&mut self, node: &Handle) -> Option<V> {
        self.entries.remove(&node_key(node)).map(|(_, value)| value)
    }

    /// 条目数量（含尚未清理的失效条目）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清空
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_purge = PURGE_FLOOR;
    }

    /// 清理已经失效的节点
    pub fn purge(&mut self) {
        self.entries.retain(|_, (weak, _)| weak.strong_count() > 0);
    }
}

impl<V> Default for WeakNodeMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
