/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 默认 INFO 级别，可通过 RUST_LOG 环境变量覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// 记录程序启动信息
pub fn log_startup(mode: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 小红书自动发布系统 V2（双模式）");
    info!(
        "📅 日期: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🎲 模式选择: {}", mode);
    info!("{}", "=".repeat(60));
}

/// 记录运行结束统计
///
/// # 参数
/// - `status`: 最终状态
/// - `duration_secs`: 总耗时（秒）
pub fn log_run_complete(status: &str, duration_secs: f64) {
    info!("\n{}", "=".repeat(60));
    if status == "success" {
        info!("✅ 发布成功");
    } else {
        info!("❌ 执行失败");
    }
    info!("⏱️  总耗时: {:.1}秒", duration_secs);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("这是一段很长的中文文本内容", 5), "这是一段很...");
    }
}
