//! 引擎模块
//!
//! 一个引擎实例拥有词典、提取目录、访问预算和已访问集合，
//! 所有回调（加载完成、变更批次、控制消息）都是它的方法。
//!
//! 状态机：`Uninitialized → Loading → Ready → (Stopped)`，
//! 非 Ready 状态下到达的变更会被丢弃，并在回到 Ready 时补一次全量扫描

// 标准库导入
use std::borrow::Cow;
use std::fmt;

// 第三方crate导入
use markup5ever_rcdom::Handle;
use tracing::{debug, info, warn};

// 本地模块导入
use crate::catalog::{Catalog, CatalogSnapshot, OriginKind};
use crate::classifier::Classifier;
use crate::config::{EngineConfig, Mode};
use crate::control::{ControlMessage, ControlResponse};
use crate::dictionary::Dictionary;
use crate::dom::{
    get_attr, is_element, is_frame_element, parent_element, parent_of, set_attr, set_text,
    text_content, DomHost, Page, WeakNodeMap,
};
use crate::error::LoadError;
use crate::scanner::{
    ancestors_block, attribute_is_eligible, element_in_scope, DeepScanner, ScanBudget, TextUnit,
    VisitMarks,
};
use crate::stats::ScanStats;
use crate::translator::Translator;
use crate::watcher::{MutationRecord, MutationWatcher, WorkItem};

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// 尚未开始加载词典
    Uninitialized,
    /// 词典加载中
    Loading,
    /// 正常工作
    Ready,
    /// 已停用
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// 汉化/提取引擎
pub struct Engine<H: DomHost = Page> {
    host: H,
    config: EngineConfig,
    state: EngineState,
    classifier: Classifier,
    translator: Translator,
    catalog: Catalog,
    watcher: MutationWatcher,
    budget: ScanBudget,
    visited: WeakNodeMap<()>,
    sightings: WeakNodeMap<Vec<(OriginKind, String)>>,
    load_started: bool,
    dictionary_installed: bool,
    pending_rescan: bool,
    stats: ScanStats,
}

impl<H: DomHost> Engine<H> {
    /// 创建引擎
    pub fn new(host: H, config: EngineConfig) -> Self {
        let watcher = MutationWatcher::new(config.attributes().to_vec());
        Self {
            host,
            classifier: Classifier::new(config.min_len(), config.max_len()),
            translator: Translator::default(),
            catalog: Catalog::new(config.sample_limit(), config.descriptor_depth()),
            watcher,
            budget: ScanBudget::new(config.max_nodes()),
            visited: WeakNodeMap::new(),
            sightings: WeakNodeMap::new(),
            state: EngineState::Uninitialized,
            load_started: false,
            dictionary_installed: false,
            pending_rescan: false,
            stats: ScanStats::default(),
            config,
        }
    }

    /// 当前状态
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 配置
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 页面宿主
    pub fn host(&self) -> &H {
        &self.host
    }

    /// 页面宿主（可变）
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// 取回页面宿主
    pub fn into_host(self) -> H {
        self.host
    }

    /// 翻译器
    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// 提取目录
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// 统计
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// 是否有待补的全量扫描
    pub fn has_pending_rescan(&self) -> bool {
        self.pending_rescan
    }

    /// 进入加载状态
    pub fn begin_loading(&mut self) {
        self.load_started = true;
        if self.state == EngineState::Stopped {
            return;
        }
        self.state = EngineState::Loading;
        self.watcher.disconnect();
        debug!("⏳ 词典加载中");
    }

    /// 安装加载结果
    ///
    /// 加载失败时使用空词典继续运行。安装后清理目录，
    /// 并在未停用时进入 Ready 做一次全量扫描
    pub fn install_dictionary(&mut self, result: Result<Dictionary, LoadError>) {
        let dictionary = match result {
            Ok(dictionary) => {
                info!(
                    "📚 词典已加载: {} 条 (数字模式 {} 条, 子串规则 {} 条) 来源: {}",
                    dictionary.len(),
                    dictionary.patterns().len(),
                    dictionary.substring_rules().len(),
                    dictionary.origin().unwrap_or("内存")
                );
                dictionary
            }
            Err(e) => {
                warn!("⚠️ 词典加载失败，翻译不可用: {}", e);
                Dictionary::empty()
            }
        };

        self.translator.replace_dictionary(dictionary);
        self.load_started = true;
        self.dictionary_installed = true;
        self.visited.clear();
        self.stats.catalog_pruned += self.catalog.prune(&self.translator);

        if self.state == EngineState::Stopped {
            self.pending_rescan = true;
            return;
        }
        self.become_ready();
    }

    /// 启用或停用
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            if self.state != EngineState::Stopped {
                self.state = EngineState::Stopped;
                self.watcher.disconnect();
                info!("⏸️ 引擎已停用");
            }
            return;
        }

        if self.state != EngineState::Stopped {
            return;
        }
        info!("▶️ 引擎已启用");
        if self.dictionary_installed {
            self.pending_rescan = true;
            self.become_ready();
        } else if self.load_started {
            self.state = EngineState::Loading;
        } else {
            self.state = EngineState::Uninitialized;
        }
    }

    /// 全量扫描当前文档
    pub fn scan_document(&mut self) {
        if self.state != EngineState::Ready {
            self.pending_rescan = true;
            return;
        }
        self.pending_rescan = false;
        self.budget.begin_pass();
        self.stats.passes += 1;

        let document = self.host.document();
        self.scan_root(&document, false);
        debug!(
            "🔍 全量扫描完成: 访问 {} 个节点{}",
            self.budget.visited(),
            if self.budget.is_exhausted() { " (预算耗尽)" } else { "" }
        );
    }

    /// 处理一批变更记录
    pub fn on_mutations(&mut self, records: &[MutationRecord]) {
        if records.is_empty() {
            return;
        }
        if self.state != EngineState::Ready || !self.watcher.is_connected() {
            self.stats.mutations_dropped += records.len();
            self.pending_rescan = true;
            debug!("状态 {} 下丢弃 {} 条变更，待恢复后全量扫描", self.state, records.len());
            return;
        }

        self.budget.begin_pass();
        self.stats.passes += 1;
        self.stats.mutations_processed += records.len();

        for item in self.watcher.plan(records) {
            match item {
                WorkItem::Detached(node) => self.forget_subtree(&node),
                _ if self.budget.is_exhausted() => {}
                WorkItem::ScanElement(element) => self.scan_root(&element, true),
                WorkItem::Text(node) => self.process_direct_text(node),
                WorkItem::Attribute { element, name } => self.process_direct_attribute(element, name),
            }
        }
        self.sync_budget_stats();
    }

    /// 清空目录和已访问集合，重新全量扫描
    pub fn reset(&mut self) {
        self.catalog.reset();
        self.visited.clear();
        self.sightings.clear();
        info!("🔄 已重置提取目录");
        self.scan_document();
    }

    /// 导出提取目录
    pub fn export(&self) -> CatalogSnapshot {
        self.catalog.export(&self.translator)
    }

    /// 处理控制消息
    pub fn handle_message(&mut self, message: ControlMessage) -> ControlResponse {
        match message {
            ControlMessage::Export => {
                if self.config.mode() != Mode::Extract {
                    return ControlResponse::failure("当前为翻译模式，没有提取目录");
                }
                match serde_json::to_value(self.export()) {
                    Ok(data) => ControlResponse::with_data(data),
                    Err(e) => ControlResponse::failure(format!("导出失败: {}", e)),
                }
            }
            ControlMessage::Reset => {
                self.reset();
                ControlResponse::ack()
            }
            ControlMessage::Ping => ControlResponse::ack(),
            ControlMessage::Toggle { enabled } => {
                self.set_enabled(enabled);
                ControlResponse::ack()
            }
        }
    }

    /// 处理 JSON 形式的控制消息
    pub fn handle_json(&mut self, payload: &str) -> ControlResponse {
        match ControlMessage::from_json(payload) {
            Ok(message) => self.handle_message(message),
            Err(e) => ControlResponse::failure(format!("无法解析控制消息: {}", e)),
        }
    }

    fn become_ready(&mut self) {
        self.state = EngineState::Ready;
        self.watcher.connect();
        info!("✅ 引擎就绪 (模式: {:?})", self.config.mode());
        self.scan_document();
    }

    fn scan_root(&mut self, root: &Handle, incremental: bool) {
        let scanner = DeepScanner::new(&self.config);
        let marks = match (self.config.mode(), incremental) {
            (Mode::Translate, false) => VisitMarks::Mark(&mut self.visited),
            (Mode::Translate, true) => VisitMarks::MarkAndSkip(&mut self.visited),
            (Mode::Extract, _) => VisitMarks::Off,
        };
        let report = scanner.scan(&self.host, root, &mut self.budget, marks);
        self.stats.record_scan(&report);

        for unit in report.units {
            self.process_unit(unit);
        }
        self.sync_budget_stats();
    }

    /// 移出文档的子树不再算已处理，重新插入时会再次扫描
    fn forget_subtree(&mut self, root: &Handle) {
        if self.visited.is_empty() {
            return;
        }
        let mut stack = vec![(root.clone(), 0)];
        while let Some((node, depth)) = stack.pop() {
            self.visited.remove(&node);
            stack.extend(node.children.borrow().iter().map(|child| (child.clone(), depth)));
            if !is_element(&node) || depth >= self.config.max_depth() {
                continue;
            }
            if let Some(shadow) = self.host.shadow_root(&node) {
                stack.push((shadow, depth + 1));
            }
            if is_frame_element(&node) {
                if let Ok(Some(document)) = self.host.frame_document(&node) {
                    stack.push((document, depth + 1));
                }
            }
        }
    }

    fn process_direct_text(&mut self, node: Handle) {
        let Some(text) = text_content(&node) else {
            return;
        };
        if text.trim().is_empty() || parent_of(&node).is_none() {
            return;
        }
        if !self.budget.visit() {
            return;
        }
        if ancestors_block(&self.host, &node, self.config.includes_hidden()) {
            return;
        }
        self.process_unit(TextUnit::Text(node));
    }

    fn process_direct_attribute(&mut self, element: Handle, name: String) {
        if !self.config.watches_attribute(&name) || !attribute_is_eligible(&element, &name) {
            return;
        }
        if !self.budget.visit() {
            return;
        }
        if !element_in_scope(&self.host, &element, self.config.includes_hidden()) {
            return;
        }
        self.process_unit(TextUnit::Attribute { element, name });
    }

    fn process_unit(&mut self, unit: TextUnit) {
        match unit {
            TextUnit::Text(node) => {
                let Some(text) = text_content(&node) else {
                    return;
                };
                match self.config.mode() {
                    Mode::Translate => {
                        if let Some(translated) = self.translate_candidate(&text) {
                            set_text(&node, &translated);
                            self.stats.texts_translated += 1;
                        }
                    }
                    Mode::Extract => {
                        let origin = parent_element(&node);
                        self.register(&text, &node, origin.as_ref(), OriginKind::Text);
                    }
                }
            }
            TextUnit::Attribute { element, name } => {
                let Some(value) = get_attr(&element, &name) else {
                    return;
                };
                match self.config.mode() {
                    Mode::Translate => {
                        if let Some(translated) = self.translate_candidate(&value) {
                            set_attr(&element, &name, &translated);
                            self.stats.attributes_translated += 1;
                        }
                    }
                    Mode::Extract => {
                        let kind = OriginKind::Attribute(name);
                        self.register(&value, &element, Some(&element), kind);
                    }
                }
            }
        }
    }

    /// 过滤器接受且翻译结果不同时返回译文
    fn translate_candidate(&self, text: &str) -> Option<String> {
        if !self.classifier.is_candidate(text) {
            return None;
        }
        match self.translator.translate(text) {
            Cow::Owned(translated) if translated != text => Some(translated),
            _ => None,
        }
    }

    /// 同一节点的同一来源只计一次；条目被清理后重新计数
    fn register(&mut self, text: &str, source: &Handle, origin: Option<&Handle>, kind: OriginKind) {
        let sighting = (kind, text.trim().to_string());
        let seen = self
            .sightings
            .get(source)
            .is_some_and(|seen| seen.contains(&sighting));
        if seen && self.catalog.contains(&sighting.1) {
            return;
        }

        let registered = self.catalog.register(
            text,
            origin,
            sighting.0.clone(),
            &self.classifier,
            &self.translator,
        );
        if !registered {
            return;
        }
        self.stats.catalog_hits += 1;
        if seen {
            return;
        }
        match self.sightings.get_mut(source) {
            Some(list) => list.push(sighting),
            None => {
                self.sightings.insert(source, vec![sighting]);
            }
        }
    }

    fn sync_budget_stats(&mut self) {
        self.stats.nodes_visited = self.budget.total_visited();
        self.stats.budget_exhaustions = self.budget.exhaustions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictionaryOptions;
    use crate::dom::{find_element, parse_fragment};
    use crate::watcher::MutationRecorder;

    fn dictionary(pairs: &[(&str, &str)]) -> Dictionary {
        Dictionary::from_entries(pairs.iter().copied(), &DictionaryOptions::default())
    }

    fn engine(html: &str, mode: Mode) -> Engine {
        let page = Page::parse(html, None).unwrap();
        Engine::new(page, EngineConfig::new().with_mode(mode))
    }

    fn html_of(engine: &Engine) -> String {
        engine.host().to_html().unwrap()
    }

    #[test]
    fn test_state_machine() {
        let mut e = engine("<p>Hello</p>", Mode::Translate);
        assert_eq!(e.state(), EngineState::Uninitialized);
        e.begin_loading();
        assert_eq!(e.state(), EngineState::Loading);
        e.install_dictionary(Ok(dictionary(&[("Hello", "你好")])));
        assert_eq!(e.state(), EngineState::Ready);
        assert!(html_of(&e).contains("<p>你好</p>"));

        e.set_enabled(false);
        assert_eq!(e.state(), EngineState::Stopped);
        e.set_enabled(true);
        assert_eq!(e.state(), EngineState::Ready);
    }

    #[test]
    fn test_load_failure_installs_empty_dictionary() {
        let mut e = engine("<p>Hello</p>", Mode::Translate);
        e.begin_loading();
        e.install_dictionary(Err(LoadError::Exhausted { attempts: Vec::new() }));
        assert_eq!(e.state(), EngineState::Ready);
        assert!(e.translator().dictionary().is_empty());
        assert!(html_of(&e).contains("<p>Hello</p>"));
    }

    #[test]
    fn test_mutations_before_ready_schedule_rescan() {
        let mut e = engine("<div id=\"root\"></div>", Mode::Translate);
        e.begin_loading();

        let root = find_element(&e.host().document(), "div").unwrap();
        let added = parse_fragment("<span>Hello</span>").unwrap();
        let mut recorder = MutationRecorder::new();
        recorder.append_child(&root, &added[0]);
        e.on_mutations(&recorder.take_records());
        assert!(e.has_pending_rescan());
        assert_eq!(e.stats().mutations_dropped, 1);

        e.install_dictionary(Ok(dictionary(&[("Hello", "你好")])));
        assert!(!e.has_pending_rescan());
        assert!(html_of(&e).contains("<span>你好</span>"));
    }

    #[test]
    fn test_install_while_stopped_waits_for_enable() {
        let mut e = engine("<p>Hello</p>", Mode::Translate);
        e.begin_loading();
        e.set_enabled(false);
        e.install_dictionary(Ok(dictionary(&[("Hello", "你好")])));
        assert_eq!(e.state(), EngineState::Stopped);
        assert!(html_of(&e).contains("<p>Hello</p>"));

        e.set_enabled(true);
        assert_eq!(e.state(), EngineState::Ready);
        assert!(html_of(&e).contains("<p>你好</p>"));
    }

    #[test]
    fn test_enable_before_install_returns_to_loading() {
        let mut e = engine("<p>Hello</p>", Mode::Translate);
        e.set_enabled(false);
        e.set_enabled(true);
        assert_eq!(e.state(), EngineState::Uninitialized);
        e.begin_loading();
        e.set_enabled(false);
        e.set_enabled(true);
        assert_eq!(e.state(), EngineState::Loading);
    }

    #[test]
    fn test_translates_attributes_and_skips_form_data() {
        let mut e = engine(
            "<button title=\"Save\" aria-label=\"Save\">Save</button>\
             <input type=\"text\" value=\"Save\" placeholder=\"Save\">\
             <input type=\"submit\" value=\"Save\">",
            Mode::Translate,
        );
        e.install_dictionary(Ok(dictionary(&[("Save", "保存")])));
        let html = html_of(&e);
        assert!(html.contains("<button title=\"保存\" aria-label=\"保存\">保存</button>"));
        assert!(html.contains("<input type=\"text\" value=\"Save\" placeholder=\"保存\">"));
        assert!(html.contains("<input type=\"submit\" value=\"保存\">"));
        assert_eq!(e.stats().texts_translated, 1);
        assert_eq!(e.stats().attributes_translated, 4);
    }

    #[test]
    fn test_attribute_mutation_reprocesses_only_that_attribute() {
        let mut e = engine("<p title=\"x\">Body text</p>", Mode::Translate);
        e.install_dictionary(Ok(dictionary(&[("Close", "关闭"), ("Body text", "正文")])));
        let p = find_element(&e.host().document(), "p").unwrap();

        let mut recorder = MutationRecorder::new();
        recorder.set_attribute(&p, "title", "Close");
        recorder.set_attribute(&p, "data-label", "Close");
        e.on_mutations(&recorder.take_records());

        assert_eq!(get_attr(&p, "title").as_deref(), Some("关闭"));
        assert_eq!(get_attr(&p, "data-label").as_deref(), Some("Close"));
    }

    #[test]
    fn test_export_only_in_extract_mode() {
        let mut translate = engine("<p>Hello</p>", Mode::Translate);
        translate.install_dictionary(Ok(Dictionary::empty()));
        assert!(!translate.handle_message(ControlMessage::Export).ok);

        let mut extract = engine("<p>Upload file</p>", Mode::Extract);
        extract.install_dictionary(Ok(Dictionary::empty()));
        let response = extract.handle_message(ControlMessage::Export);
        assert!(response.ok);
        let data = response.data.unwrap();
        assert_eq!(data["rows"][0]["key"], "Upload file");
        assert_eq!(data["rows"][0]["samples"][0], "html > body > p");
    }

    #[test]
    fn test_handle_json_rejects_garbage() {
        let mut e = engine("<p>Hello</p>", Mode::Extract);
        assert!(e.handle_json(r#"{"type":"ping"}"#).ok);
        let response = e.handle_json("not json");
        assert!(!response.ok);
        assert!(response.error.unwrap().contains("无法解析"));
    }
}
