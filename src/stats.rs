use std::time::Duration;

use serde::Serialize;

use crate::config::Mode;
use crate::scanner::ScanReport;

/// 扫描统计结构
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub passes: usize,
    pub nodes_visited: usize,
    pub texts_translated: usize,
    pub attributes_translated: usize,
    pub catalog_hits: usize,
    pub catalog_pruned: usize,
    pub budget_exhaustions: usize,
    pub depth_limited: usize,
    pub frames_skipped: usize,
    pub marked_skipped: usize,
    pub mutations_processed: usize,
    pub mutations_dropped: usize,
}

impl ScanStats {
    /// 累加一次扫描的结果
    pub fn record_scan(&mut self, report: &ScanReport) {
        self.depth_limited += report.depth_limited;
        self.frames_skipped += report.frames_skipped;
        self.marked_skipped += report.marked_skipped;
    }
}

/// 打印扫描统计
pub fn print_scan_stats(stats: &ScanStats, mode: Mode, total_duration: Duration) {
    println!("\n📊 扫描统计报告:");
    println!("═══════════════════════════════════════");

    println!("⏱️  总耗时: {}", format_duration(total_duration));

    // 遍历统计
    println!("\n🌲 遍历统计:");
    println!("   扫描轮次: {} 次", stats.passes);
    println!("   访问节点: {} 个", stats.nodes_visited);
    println!("   跳过已处理子树: {} 个", stats.marked_skipped);
    println!("   跨域框架: {} 个", stats.frames_skipped);
    println!("   深度受限: {} 处", stats.depth_limited);
    if stats.budget_exhaustions > 0 {
        println!("   ⚠️  节点预算耗尽: {} 次", stats.budget_exhaustions);
    }

    match mode {
        Mode::Translate => {
            println!("\n🔤 翻译统计:");
            println!("   文本节点: {} 处", stats.texts_translated);
            println!("   属性: {} 处", stats.attributes_translated);
        }
        Mode::Extract => {
            println!("\n📝 提取统计:");
            println!("   登记次数: {} 次", stats.catalog_hits);
            println!("   重载后清理: {} 条", stats.catalog_pruned);
        }
    }

    if stats.mutations_processed + stats.mutations_dropped > 0 {
        println!("\n👀 变更统计:");
        println!("   已处理: {} 条", stats.mutations_processed);
        println!("   已丢弃: {} 条", stats.mutations_dropped);
    }

    // 性能指标
    if total_duration.as_secs_f64() > 0.0 {
        println!("\n🚀 性能指标:");
        println!(
            "   处理速度: {:.0} 节点/s",
            stats.nodes_visited as f64 / total_duration.as_secs_f64()
        );
    }
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
