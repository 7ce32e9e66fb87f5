//! 深度扫描模块
//!
//! 遍历文本节点和白名单属性，并进入 shadow root 与同源框架。
//! 扫描只负责找出待处理的单元，翻译或登记由引擎完成

// 标准库导入
use std::fmt;

// 第三方crate导入
use markup5ever_rcdom::{Handle, NodeData};
use tracing::{debug, trace};

// 本地模块导入
use crate::config::EngineConfig;
use crate::constants::scan_config;
use crate::dom::{closest, element_name, get_attr, is_frame_element, parent_of, DomHost, WeakNodeMap};

/// 待处理单元
#[derive(Clone)]
pub enum TextUnit {
    /// 文本节点
    Text(Handle),
    /// 元素上的某个属性
    Attribute {
        /// 所属元素
        element: Handle,
        /// 属性名
        name: String,
    },
}

impl fmt::Debug for TextUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextUnit::Text(_) => write!(f, "Text"),
            TextUnit::Attribute { element, name } => write!(
                f,
                "Attribute({}@{})",
                name,
                element_name(element).unwrap_or("?")
            ),
        }
    }
}

/// 节点访问预算
///
/// 每次外部触发（全量扫描、一批变更、重置）开始新的一轮，
/// 一轮内访问数达到上限后扫描静默停止
#[derive(Debug, Clone)]
pub struct ScanBudget {
    max_nodes: usize,
    visited: usize,
    total_visited: usize,
    exhausted: bool,
    exhaustions: usize,
}

impl ScanBudget {
    /// 创建预算
    pub fn new(max_nodes: usize) -> Self {
        Self {
            max_nodes,
            visited: 0,
            total_visited: 0,
            exhausted: false,
            exhaustions: 0,
        }
    }

    /// 开始新的一轮
    pub fn begin_pass(&mut self) {
        self.visited = 0;
        self.exhausted = false;
    }

    /// 记录一次访问，超出上限时返回 false
    pub fn visit(&mut self) -> bool {
        if self.visited >= self.max_nodes {
            if !self.exhausted {
                self.exhausted = true;
                self.exhaustions += 1;
            }
            return false;
        }
        self.visited += 1;
        self.total_visited += 1;
        true
    }

    /// 本轮是否已耗尽
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// 本轮已访问节点数
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// 累计访问节点数
    pub fn total_visited(&self) -> usize {
        self.total_visited
    }

    /// 耗尽次数
    pub fn exhaustions(&self) -> usize {
        self.exhaustions
    }

    /// 上限
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }
}

/// 已处理元素的标记方式
pub enum VisitMarks<'v> {
    /// 不标记
    Off,
    /// 标记经过的元素
    Mark(&'v mut WeakNodeMap<()>),
    /// 标记并跳过已标记的子树
    MarkAndSkip(&'v mut WeakNodeMap<()>),
}

/// 单次扫描结果
#[derive(Debug, Default)]
pub struct ScanReport {
    /// 找到的待处理单元（文档顺序）
    pub units: Vec<TextUnit>,
    /// 访问的节点数
    pub nodes_visited: usize,
    /// 因深度上限未进入的 shadow/框架
    pub depth_limited: usize,
    /// 无法访问的框架
    pub frames_skipped: usize,
    /// 跳过的已标记子树
    pub marked_skipped: usize,
    /// 是否因预算耗尽提前停止
    pub exhausted: bool,
}

/// 深度扫描器
pub struct DeepScanner<'c> {
    config: &'c EngineConfig,
}

impl<'c> DeepScanner<'c> {
    /// 创建扫描器
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// 扫描 `root` 之下的文本和属性
    ///
    /// `root` 可以是文档、shadow root、元素或文本节点
    pub fn scan<H: DomHost>(
        &self,
        host: &H,
        root: &Handle,
        budget: &mut ScanBudget,
        mut marks: VisitMarks<'_>,
    ) -> ScanReport {
        let mut report = ScanReport::default();

        if budget.is_exhausted() {
            report.exhausted = true;
            return report;
        }
        if ancestors_block(host, root, self.config.includes_hidden()) {
            return report;
        }

        // (节点, shadow/框架嵌套深度)
        let mut stack: Vec<(Handle, usize)> = vec![(root.clone(), 0)];

        while let Some((node, depth)) = stack.pop() {
            match node.data {
                NodeData::Document => {
                    push_children(&mut stack, &node, depth);
                }
                NodeData::Text { ref contents } => {
                    if !budget.visit() {
                        report.exhausted = true;
                        break;
                    }
                    report.nodes_visited += 1;
                    if !contents.borrow().trim().is_empty() {
                        report.units.push(TextUnit::Text(node.clone()));
                    }
                }
                NodeData::Element { .. } => {
                    if !budget.visit() {
                        report.exhausted = true;
                        break;
                    }
                    report.nodes_visited += 1;

                    if is_non_rendered(&node) {
                        continue;
                    }
                    if !self.config.includes_hidden() && host.is_hidden(&node) {
                        continue;
                    }

                    match marks {
                        VisitMarks::Off => {}
                        VisitMarks::Mark(ref mut visited) => {
                            visited.insert(&node, ());
                        }
                        VisitMarks::MarkAndSkip(ref mut visited) => {
                            if visited.insert(&node, ()).is_some() {
                                report.marked_skipped += 1;
                                continue;
                            }
                        }
                    }

                    self.collect_attributes(&node, &mut report.units);

                    if is_excluded(&node) {
                        continue;
                    }

                    push_children(&mut stack, &node, depth);
                    self.push_nested_roots(host, &node, depth, &mut stack, &mut report);
                }
                _ => {}
            }
        }

        if report.exhausted {
            debug!(
                "⏹️ 节点预算耗尽，扫描提前停止 (本轮 {} / {})",
                budget.visited(),
                budget.max_nodes()
            );
        }
        report
    }

    /// 收集元素上符合条件的属性
    pub fn collect_attributes(&self, element: &Handle, units: &mut Vec<TextUnit>) {
        if !self.config.includes_attributes() {
            return;
        }
        for name in self.config.attributes() {
            if !attribute_is_eligible(element, name) {
                continue;
            }
            match get_attr(element, name) {
                Some(value) if !value.trim().is_empty() => units.push(TextUnit::Attribute {
                    element: element.clone(),
                    name: name.clone(),
                }),
                _ => {}
            }
        }
    }

    fn push_nested_roots<H: DomHost>(
        &self,
        host: &H,
        element: &Handle,
        depth: usize,
        stack: &mut Vec<(Handle, usize)>,
        report: &mut ScanReport,
    ) {
        if is_frame_element(element) {
            match host.frame_document(element) {
                Ok(Some(document)) => {
                    self.push_nested(stack, document, depth, report);
                }
                Ok(None) => {}
                Err(e) => {
                    trace!("跳过框架: {}", e);
                    report.frames_skipped += 1;
                }
            }
        }

        // 栈顶先出，shadow root 先于子节点扫描
        if let Some(shadow) = host.shadow_root(element) {
            self.push_nested(stack, shadow, depth, report);
        }
    }

    fn push_nested(
        &self,
        stack: &mut Vec<(Handle, usize)>,
        root: Handle,
        depth: usize,
        report: &mut ScanReport,
    ) {
        if depth + 1 > self.config.max_depth() {
            debug!("嵌套深度达到上限 {}，不再进入", self.config.max_depth());
            report.depth_limited += 1;
            return;
        }
        stack.push((root, depth + 1));
    }
}

fn push_children(stack: &mut Vec<(Handle, usize)>, node: &Handle, depth: usize) {
    for child in node.children.borrow().iter().rev() {
        stack.push((child.clone(), depth));
    }
}

/// 是否为排除的可编辑/代码元素
pub fn is_excluded(element: &Handle) -> bool {
    if let Some(name) = element_name(element) {
        if scan_config::EXCLUDED_TAGS.contains(&name) {
            return true;
        }
    }
    match get_attr(element, "contenteditable") {
        Some(value) => {
            let value = value.trim().to_ascii_lowercase();
            value.is_empty() || value == "true" || value == "plaintext-only"
        }
        None => false,
    }
}

/// 是否为不渲染文本的元素
pub fn is_non_rendered(element: &Handle) -> bool {
    element_name(element).is_some_and(|name| scan_config::NON_RENDERED_TAGS.contains(&name))
}

/// 属性是否可以作为界面文本处理
///
/// - `value` 只在按钮类 input 上是显示文本
/// - 被排除元素只保留 aria-label / title / placeholder
pub fn attribute_is_eligible(element: &Handle, name: &str) -> bool {
    if name == "value" {
        return element_name(element) == Some("input")
            && get_attr(element, "type").is_some_and(|t| {
                scan_config::LABEL_INPUT_TYPES.contains(&t.trim().to_ascii_lowercase().as_str())
            });
    }
    if is_excluded(element) {
        return scan_config::CHROME_ATTRS.contains(&name);
    }
    true
}

/// 节点的祖先（不含自身）是否把它排除在扫描之外
pub fn ancestors_block<H: DomHost>(host: &H, node: &Handle, include_hidden: bool) -> bool {
    parent_of(node)
        .and_then(|parent| {
            closest(&parent, |ancestor| {
                is_excluded(ancestor)
                    || is_non_rendered(ancestor)
                    || (!include_hidden && host.is_hidden(ancestor))
            })
        })
        .is_some()
}

/// 元素自身及其祖先是否允许处理它的属性
pub fn element_in_scope<H: DomHost>(host: &H, element: &Handle, include_hidden: bool) -> bool {
    if is_non_rendered(element) || (!include_hidden && host.is_hidden(element)) {
        return false;
    }
    !ancestors_block(host, element, include_hidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{find_element, text_content, Page};
    use url::Url;

    fn texts(report: &ScanReport) -> Vec<String> {
        report
            .units
            .iter()
            .filter_map(|unit| match unit {
                TextUnit::Text(node) => text_content(node).map(|t| t.trim().to_string()),
                _ => None,
            })
            .collect()
    }

    fn attrs(report: &ScanReport) -> Vec<String> {
        report
            .units
            .iter()
            .filter_map(|unit| match unit {
                TextUnit::Attribute { element, name } => {
                    Some(format!("{}@{}", name, element_name(element).unwrap_or("?")))
                }
                _ => None,
            })
            .collect()
    }

    fn scan_page(page: &Page, config: &EngineConfig) -> ScanReport {
        let mut budget = ScanBudget::new(config.max_nodes());
        DeepScanner::new(config).scan(page, &page.document(), &mut budget, VisitMarks::Off)
    }

    #[test]
    fn test_collects_text_in_document_order() {
        let page = Page::parse("<div><p>First</p><span>Second</span></div><p>Third</p>", None)
            .unwrap();
        let report = scan_page(&page, &EngineConfig::default());
        assert_eq!(texts(&report), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_excluded_and_non_rendered_subtrees() {
        let page = Page::parse(
            "<p>Keep</p>\
             <textarea placeholder=\"Write here\">Draft</textarea>\
             <pre>Code block</pre>\
             <code>snippet</code>\
             <div contenteditable=\"true\"><b>Typed</b></div>\
             <script>var x = 1;</script>\
             <style>p { color: red }</style>",
            None,
        )
        .unwrap();
        let report = scan_page(&page, &EngineConfig::default());
        assert_eq!(texts(&report), vec!["Keep"]);
        assert_eq!(attrs(&report), vec!["placeholder@textarea"]);
    }

    #[test]
    fn test_value_only_on_button_inputs() {
        let page = Page::parse(
            "<input type=\"submit\" value=\"Send now\">\
             <input type=\"text\" value=\"user data\" title=\"Your name\">\
             <button value=\"raw\">Go ahead</button>",
            None,
        )
        .unwrap();
        let report = scan_page(&page, &EngineConfig::default());
        assert_eq!(attrs(&report), vec!["value@input", "title@input"]);
        assert_eq!(texts(&report), vec!["Go ahead"]);
    }

    #[test]
    fn test_attributes_can_be_disabled() {
        let page = Page::parse("<p title=\"Tooltip\">Body</p>", None).unwrap();
        let config = EngineConfig::new().include_attributes(false);
        let report = scan_page(&page, &config);
        assert!(attrs(&report).is_empty());
        assert_eq!(texts(&report), vec!["Body"]);
    }

    #[test]
    fn test_hidden_elements_are_optional() {
        let html = "<p>Shown</p><p hidden>Secret</p><div style=\"display:none\"><b>Gone</b></div>";
        let page = Page::parse(html, None).unwrap();
        assert_eq!(texts(&scan_page(&page, &EngineConfig::default())).len(), 3);
        let config = EngineConfig::new().include_hidden(false);
        assert_eq!(texts(&scan_page(&page, &config)), vec!["Shown"]);
    }

    #[test]
    fn test_enters_shadow_roots_and_same_origin_frames() {
        let url = Url::parse("https://app.weavy.ai/").unwrap();
        let mut page = Page::parse(
            "<div><template shadowrootmode=\"open\"><p>Shadow text</p></template><p>Light text</p></div>\
             <iframe src=\"/inner\"></iframe>\
             <iframe src=\"https://other.example.com/\"></iframe>",
            Some(url),
        )
        .unwrap();
        page.attach_frame("/inner", "<p>Frame text</p>").unwrap();
        let report = scan_page(&page, &EngineConfig::default());
        assert_eq!(texts(&report), vec!["Shadow text", "Light text", "Frame text"]);
        assert_eq!(report.frames_skipped, 1);
    }

    #[test]
    fn test_depth_limit_stops_nesting() {
        let page = Page::parse(
            "<div><template shadowrootmode=\"open\">\
               <p>Level one</p>\
               <section><template shadowrootmode=\"open\"><p>Level two</p></template></section>\
             </template></div>",
            None,
        )
        .unwrap();
        let config = EngineConfig::new().with_max_depth(1);
        let report = scan_page(&page, &config);
        assert_eq!(texts(&report), vec!["Level one"]);
        assert_eq!(report.depth_limited, 1);
    }

    #[test]
    fn test_budget_halts_exactly_at_cap() {
        let html: String = (0..10).map(|i| format!("<p>Item {}</p>", i)).collect();
        let page = Page::parse(&html, None).unwrap();
        let config = EngineConfig::new().with_max_nodes(7);
        let mut budget = ScanBudget::new(config.max_nodes());
        let scanner = DeepScanner::new(&config);
        let report = scanner.scan(&page, &page.document(), &mut budget, VisitMarks::Off);
        assert!(report.exhausted);
        assert_eq!(report.nodes_visited, 7);
        assert_eq!(budget.visited(), 7);
        assert_eq!(budget.exhaustions(), 1);

        // 同一轮内不再继续
        let again = scanner.scan(&page, &page.document(), &mut budget, VisitMarks::Off);
        assert_eq!(again.nodes_visited, 0);

        budget.begin_pass();
        assert!(!budget.is_exhausted());
        assert_eq!(budget.total_visited(), 7);
    }

    #[test]
    fn test_marked_subtrees_are_skipped() {
        let page = Page::parse("<div id=\"box\"><p>Once</p></div>", None).unwrap();
        let config = EngineConfig::default();
        let scanner = DeepScanner::new(&config);
        let mut visited = WeakNodeMap::new();
        let mut budget = ScanBudget::new(config.max_nodes());

        let first = scanner.scan(&page, &page.document(), &mut budget, VisitMarks::Mark(&mut visited));
        assert_eq!(texts(&first), vec!["Once"]);

        let div = find_element(&page.document(), "div").unwrap();
        let second = scanner.scan(&page, &div, &mut budget, VisitMarks::MarkAndSkip(&mut visited));
        assert!(second.units.is_empty());
        assert_eq!(second.marked_skipped, 1);
    }

    #[test]
    fn test_root_inside_excluded_context() {
        let page = Page::parse("<pre><span>Inside pre</span></pre>", None).unwrap();
        let config = EngineConfig::default();
        let span = find_element(&page.document(), "span").unwrap();
        let mut budget = ScanBudget::new(config.max_nodes());
        let report = DeepScanner::new(&config).scan(&page, &span, &mut budget, VisitMarks::Off);
        assert!(report.units.is_empty());
        assert!(!element_in_scope(&page, &span, true));
    }

    #[test]
    fn test_ancestors_block_checks_hidden_chain() {
        let page = Page::parse("<div hidden><p><b>Deep</b></p></div><i>Free</i>", None).unwrap();
        let bold = find_element(&page.document(), "b").unwrap();
        let italic = find_element(&page.document(), "i").unwrap();
        assert!(ancestors_block(&page, &bold, false));
        assert!(!ancestors_block(&page, &bold, true));
        assert!(!ancestors_block(&page, &italic, false));
    }
}
