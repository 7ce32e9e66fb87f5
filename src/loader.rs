//! 词典加载模块
//!
//! 按顺序尝试远程地址和本地文件，接受第一个格式正确的词典：
//! - 远程请求绕过缓存并带超时
//! - 网络错误和5xx按线性退避重试，格式错误不重试
//! - 全部失败时返回 `LoadError::Exhausted`

// 标准库导入
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// 第三方crate导入
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

// 本地模块导入
use crate::constants::{dictionary_config, is_valid_dict_url};
use crate::dictionary::{Dictionary, DictionaryOptions};
use crate::error::LoadError;
use crate::load_error;

/// 词典来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionarySource {
    /// 远程地址
    Remote(Url),
    /// 本地文件
    File(PathBuf),
}

impl DictionarySource {
    /// 按写法识别来源：HTTP(S) 地址为远程，其余视为文件路径
    pub fn parse(spec: &str) -> Self {
        if is_valid_dict_url(spec) {
            if let Ok(url) = Url::parse(spec) {
                return DictionarySource::Remote(url);
            }
        }
        DictionarySource::File(PathBuf::from(spec))
    }
}

impl fmt::Display for DictionarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionarySource::Remote(url) => write!(f, "{}", url),
            DictionarySource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// 默认远程来源
pub fn default_sources() -> Vec<DictionarySource> {
    dictionary_config::DEFAULT_DICT_URLS
        .iter()
        .filter_map(|url| Url::parse(url).ok())
        .map(DictionarySource::Remote)
        .collect()
}

/// 目录下的内置词典（`*.json`，按路径排序）
pub fn bundled_sources(dir: &Path) -> Vec<DictionarySource> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    debug!("内置词典目录 {} 中找到 {} 个文件", dir.display(), files.len());
    files.into_iter().map(DictionarySource::File).collect()
}

/// 词典加载器
#[derive(Debug, Clone)]
pub struct DictionaryLoader {
    client: reqwest::Client,
    max_retries: usize,
    retry_delay: Duration,
    options: DictionaryOptions,
}

impl DictionaryLoader {
    /// 创建加载器
    pub fn new(timeout_secs: u64, max_retries: usize) -> Result<Self, LoadError> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            max_retries,
            retry_delay: Duration::from_millis(dictionary_config::RETRY_DELAY_BASE_MS),
            options: DictionaryOptions::default(),
        })
    }

    /// 设置词典构建选项
    pub fn with_options(mut self, options: DictionaryOptions) -> Self {
        self.options = options;
        self
    }

    /// 设置重试延迟基数
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// 依次尝试所有来源
    pub async fn load(&self, sources: &[DictionarySource]) -> Result<Dictionary, LoadError> {
        let mut attempts = Vec::with_capacity(sources.len());

        for source in sources {
            match self.load_one(source).await {
                Ok(dictionary) => {
                    info!("✅ 词典来源可用: {} ({} 条)", source, dictionary.len());
                    return Ok(dictionary);
                }
                Err(e) => {
                    warn!("❌ 词典来源不可用 {}: {}", source, e);
                    attempts.push((source.to_string(), e.to_string()));
                }
            }
        }

        Err(LoadError::Exhausted { attempts })
    }

    /// 获取远程文本（带重试）
    pub async fn fetch_text(&self, url: &Url) -> Result<String, LoadError> {
        let max_attempts = self.max_retries + 1;
        let mut attempt = 1;

        loop {
            debug!("🔄 请求 {} (第 {} 次)", url, attempt);
            match self.fetch(url).await {
                Ok(body) => {
                    if attempt > 1 {
                        info!("✅ 重试成功！");
                    }
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!("请求失败 (尝试 {}/{}): {}", attempt, max_attempts, e);
                    let delay = self.retry_delay * attempt as u32;
                    debug!("⏳ 等待 {:?} 后重试...", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn load_one(&self, source: &DictionarySource) -> Result<Dictionary, LoadError> {
        let payload = match source {
            DictionarySource::Remote(url) => self.fetch_text(url).await?,
            DictionarySource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| load_error!(io, path.display(), e))?,
        };
        Dictionary::from_json(&payload, &source.to_string(), &self.options)
    }

    async fn fetch(&self, url: &Url) -> Result<String, LoadError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(load_error!(
                network,
                url,
                status.canonical_reason().unwrap_or("HTTP错误"),
                status.as_u16()
            ));
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn loader() -> DictionaryLoader {
        DictionaryLoader::new(2, 1)
            .unwrap()
            .with_retry_delay(Duration::from_millis(0))
    }

    #[test]
    fn test_source_parsing() {
        assert!(matches!(
            DictionarySource::parse("https://example.com/zh.json"),
            DictionarySource::Remote(_)
        ));
        assert_eq!(
            DictionarySource::parse("lang/zh.json"),
            DictionarySource::File(PathBuf::from("lang/zh.json"))
        );
        assert_eq!(default_sources().len(), 2);
    }

    #[test]
    fn test_bundled_sources_sorted_json_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.JSON"), "{}").unwrap();

        let names: Vec<String> = bundled_sources(dir.path())
            .into_iter()
            .map(|s| match s {
                DictionarySource::File(path) => path
                    .strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/"),
                DictionarySource::Remote(_) => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "nested/c.JSON"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_source() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.json");
        let good = dir.path().join("good.json");
        fs::write(&bad, "[1, 2, 3]").unwrap();
        fs::write(&good, r#"{"Hello": "你好", "Apply %d changes": "应用 %d 处修改"}"#).unwrap();

        let sources = vec![
            DictionarySource::File(dir.path().join("missing.json")),
            DictionarySource::File(bad),
            DictionarySource::File(good.clone()),
        ];
        let dictionary = loader().load(&sources).await.unwrap();
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.patterns().len(), 1);
        assert_eq!(dictionary.origin(), Some(good.display().to_string().as_str()));
    }

    #[tokio::test]
    async fn test_exhausted_when_every_source_fails() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.json");
        fs::write(&empty, "{}").unwrap();

        let sources = vec![
            DictionarySource::File(dir.path().join("missing.json")),
            DictionarySource::File(empty),
        ];
        match loader().load(&sources).await {
            Err(LoadError::Exhausted { attempts }) => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[1].1.contains("词典为空"));
            }
            other => panic!("unexpected result: {:?}", other.map(|d| d.len())),
        }
    }

    #[tokio::test]
    async fn test_unreachable_remote_falls_back_to_file() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("zh.json");
        fs::write(&good, r#"{"Settings": "设置"}"#).unwrap();

        let sources = vec![
            DictionarySource::Remote(Url::parse("http://127.0.0.1:9/zh.json").unwrap()),
            DictionarySource::File(good),
        ];
        let dictionary = loader().load(&sources).await.unwrap();
        assert_eq!(dictionary.get("Settings"), Some("设置"));
    }

    #[tokio::test]
    async fn test_no_sources_is_exhausted() {
        let result = loader().load(&[]).await;
        assert!(matches!(result, Err(LoadError::Exhausted { ref attempts }) if attempts.is_empty()));
    }
}
