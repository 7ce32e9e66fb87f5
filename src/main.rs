use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

use dom_i18n::config::{Cli, Mode};
use dom_i18n::dictionary::DictionaryOptions;
use dom_i18n::dom::Page;
use dom_i18n::engine::Engine;
use dom_i18n::loader::{bundled_sources, default_sources, DictionaryLoader, DictionarySource};
use dom_i18n::stats::{format_duration, print_scan_stats, ScanStats};
use dom_i18n::utils::{
    generate_output_path_for_source, init_logging, validate_input_file, validate_input_source,
    InputSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    init_logging(cli.verbose, cli.quiet);

    let source = validate_input_source(&cli.input)?;
    let output_path = generate_output_path_for_source(&source, &cli.output, cli.mode, cli.template);

    info!("🚀 启动DOM汉化引擎 (模式: {:?})", cli.mode);
    info!("📂 输入: {}", cli.input);
    info!("📄 输出: {}", output_path.display());

    let total_start = Instant::now();

    match run(&cli, &source, &output_path).await {
        Ok(stats) => {
            let total_duration = total_start.elapsed();
            info!("✅ 处理完成！总耗时: {}", format_duration(total_duration));

            if stats.budget_exhaustions > 0 {
                warn!("⚠️  节点预算耗尽，部分内容未处理 (可调大 --max-nodes)");
            }

            if cli.stats || cli.verbose {
                print_scan_stats(&stats, cli.mode, total_duration);
            }
        }
        Err(e) => {
            error!("❌ 处理失败: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// 处理核心函数
async fn run(cli: &Cli, source: &InputSource, output_path: &Path) -> Result<ScanStats> {
    let config = cli.engine_config();
    let loader = DictionaryLoader::new(cli.timeout, cli.retries)
        .context("创建HTTP客户端失败")?
        .with_options(DictionaryOptions {
            min_substring_len: config.min_substring_len(),
            ..DictionaryOptions::default()
        });

    // 读取页面
    let (html, page_url) = match source {
        InputSource::File(path) => {
            validate_input_file(path)?;
            let html = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("读取文件失败: {}", path.display()))?;
            (html, None)
        }
        InputSource::Url(url) => {
            let html = loader
                .fetch_text(url)
                .await
                .with_context(|| format!("获取网页失败: {}", url))?;
            (html, Some(url.clone()))
        }
    };
    info!("📏 页面大小: {} 字节", html.len());

    let mut page = Page::parse(&html, page_url).context("解析HTML失败")?;

    for (frame_url, frame_file) in cli.frame_specs().map_err(anyhow::Error::msg)? {
        let frame_html = tokio::fs::read_to_string(&frame_file)
            .await
            .with_context(|| format!("读取框架文件失败: {}", frame_file.display()))?;
        page.attach_frame(&frame_url, &frame_html)
            .with_context(|| format!("注册框架失败: {}", frame_url))?;
    }

    let sources = collect_sources(cli);
    if sources.is_empty() {
        warn!("⚠️  没有配置任何词典来源");
    }

    let mut engine = Engine::new(page, config);
    engine.begin_loading();
    let loaded = loader.load(&sources).await;
    engine.install_dictionary(loaded);

    let output = match cli.mode {
        Mode::Translate => engine.host().to_html().context("序列化HTML失败")?,
        Mode::Extract => {
            let snapshot = engine.export();
            info!("📝 收集到 {} 条未翻译文本", snapshot.total);
            if cli.template {
                let template = engine.catalog().export_template(engine.translator());
                serde_json::to_string_pretty(&template).context("序列化模板失败")?
            } else {
                serde_json::to_string_pretty(&snapshot).context("序列化目录失败")?
            }
        }
    };

    tokio::fs::write(output_path, &output)
        .await
        .with_context(|| format!("写入文件失败: {}", output_path.display()))?;

    Ok(engine.stats().clone())
}

/// 词典来源顺序：命令行指定 → 默认远程 → 内置目录
fn collect_sources(cli: &Cli) -> Vec<DictionarySource> {
    let mut sources: Vec<DictionarySource> =
        cli.dicts.iter().map(|spec| DictionarySource::parse(spec)).collect();
    if !cli.no_remote {
        sources.extend(default_sources());
    }
    if let Some(dir) = &cli.bundle_dir {
        sources.extend(bundled_sources(dir));
    }
    sources
}
