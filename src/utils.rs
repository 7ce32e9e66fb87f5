use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::warn;
use url::Url;

use crate::config::Mode;

/// 输入源类型枚举
#[derive(Debug, Clone)]
pub enum InputSource {
    /// 本地文件路径
    File(PathBuf),
    /// 网页URL
    Url(Url),
}

/// 初始化日志系统
pub fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// 验证输入源
/// 用于判断输入是文件路径还是URL，并返回相应的类型
pub fn validate_input_source(input: &str) -> Result<InputSource> {
    if let Ok(url) = Url::parse(input) {
        if url.scheme() == "http" || url.scheme() == "https" {
            return Ok(InputSource::Url(url));
        }
    }

    let path = PathBuf::from(input);
    let absolute_path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(InputSource::File(absolute_path))
}

/// 验证输入文件
pub fn validate_input_file(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("输入文件不存在: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("输入路径不是文件: {}", path.display());
    }

    if let Some(ext) = path.extension() {
        if ext != "html" && ext != "htm" {
            warn!("⚠️  文件扩展名不是HTML: {}", ext.to_string_lossy());
        }
    }

    Ok(())
}

/// 输出文件名后缀与扩展名
fn output_naming(mode: Mode, template: bool) -> (&'static str, &'static str) {
    match (mode, template) {
        (Mode::Translate, _) => ("zh", "html"),
        (Mode::Extract, false) => ("catalog", "json"),
        (Mode::Extract, true) => ("template", "json"),
    }
}

/// 为不同输入源生成输出路径
pub fn generate_output_path_for_source(
    source: &InputSource,
    output: &Option<PathBuf>,
    mode: Mode,
    template: bool,
) -> PathBuf {
    if let Some(output_path) = output {
        return output_path.clone();
    }

    match source {
        InputSource::File(path) => generate_output_path(path, mode, template),
        InputSource::Url(url) => {
            let (suffix, extension) = output_naming(mode, template);
            let host = url.host_str().unwrap_or("webpage");
            let path_segments: Vec<&str> = url
                .path_segments()
                .map(|segments| segments.filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();

            let page_name = match path_segments.last().copied() {
                Some(last) => match last.rfind('.') {
                    Some(dot_pos) => &last[..dot_pos],
                    None => last,
                },
                None => "index",
            };
            let filename = format!("{}_{}_{}.{}", host, page_name, suffix, extension);

            // 清理文件名中的非法字符
            let safe_filename = filename
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
                .collect::<String>();

            PathBuf::from(safe_filename)
        }
    }
}

/// 生成输出文件路径: input_zh.html / input_catalog.json
pub fn generate_output_path(input: &Path, mode: Mode, template: bool) -> PathBuf {
    let (suffix, extension) = output_naming(mode, template);
    let stem = input.file_stem().unwrap_or_default();
    let output_name = format!("{}_{}.{}", stem.to_string_lossy(), suffix, extension);

    match input.parent() {
        Some(parent) => parent.join(output_name),
        None => PathBuf::from(output_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_input_source() {
        assert!(matches!(
            validate_input_source("https://app.weavy.ai/flow").unwrap(),
            InputSource::Url(_)
        ));
        match validate_input_source("page.html").unwrap() {
            InputSource::File(path) => assert!(path.is_absolute()),
            InputSource::Url(_) => panic!("expected file"),
        }
    }

    #[test]
    fn test_output_path_for_file() {
        let input = PathBuf::from("/tmp/site/page.html");
        assert_eq!(
            generate_output_path(&input, Mode::Translate, false),
            PathBuf::from("/tmp/site/page_zh.html")
        );
        assert_eq!(
            generate_output_path(&input, Mode::Extract, true),
            PathBuf::from("/tmp/site/page_template.json")
        );
    }

    #[test]
    fn test_output_path_for_url() {
        let source = InputSource::Url(Url::parse("https://app.weavy.ai/flows/editor.html").unwrap());
        assert_eq!(
            generate_output_path_for_source(&source, &None, Mode::Extract, false),
            PathBuf::from("app.weavy.ai_editor_catalog.json")
        );
        let root = InputSource::Url(Url::parse("https://app.weavy.ai/").unwrap());
        assert_eq!(
            generate_output_path_for_source(&root, &None, Mode::Translate, false),
            PathBuf::from("app.weavy.ai_index_zh.html")
        );
        let explicit = Some(PathBuf::from("out.html"));
        assert_eq!(
            generate_output_path_for_source(&root, &explicit, Mode::Translate, false),
            PathBuf::from("out.html")
        );
    }
}
