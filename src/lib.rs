//! DOM i18n - 基于词典的界面汉化与未翻译文本提取库
//!
//! 这个库提供了词典加载、文本过滤、三级翻译、深度DOM扫描、变更监听和提取目录等核心功能。

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod control;
pub mod dictionary;
pub mod dom;
pub mod engine;
pub mod error;
pub mod loader;
pub mod scanner;
pub mod stats;
pub mod translator;
pub mod utils;
pub mod watcher;

pub use catalog::{Catalog, CatalogRow, CatalogSnapshot, OriginKind};
pub use classifier::Classifier;
pub use config::{EngineConfig, Mode};
pub use control::{ControlMessage, ControlResponse};
pub use dictionary::{Dictionary, DictionaryOptions};
pub use dom::{DomHost, Page};
pub use engine::{Engine, EngineState};
pub use error::{DomError, FrameAccessError, LoadError};
pub use loader::{DictionaryLoader, DictionarySource};
pub use translator::Translator;
pub use watcher::{MutationRecord, MutationRecorder, MutationWatcher};
