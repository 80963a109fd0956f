use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use xhs_auto_publish::utils::{logging, RandomHelper};
use xhs_auto_publish::{App, Config};

/// 小红书旅游博主自动发布系统 V2
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// 测试模式（不真正发布）
    #[arg(long)]
    test: bool,

    /// 指定城市（用于测试）
    #[arg(long)]
    city: Option<String>,

    /// 强制执行（忽略时间窗口）
    #[arg(long)]
    force: bool,

    /// 跳过登录检查
    #[arg(long)]
    skip_login_check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    let args = Args::parse();

    // 加载配置
    let config = Config::from_env();
    let app = App::new(config.clone());

    // 检查登录状态（除非明确跳过）
    if !args.skip_login_check && !app.check_login().await {
        error!("❌ 未登录，退出执行");
        std::process::exit(1);
    }

    if args.test {
        info!("🧪 测试模式 V2");
        if let Err(e) = app.run_test(args.city.as_deref()).await {
            error!("❌ 测试失败: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    // 正常模式：检查是否应该运行
    let in_window =
        RandomHelper::should_run_now(&config.publish_window_start, &config.publish_window_end);

    if args.force || in_window {
        if args.force {
            info!("🚀 强制执行模式");
        } else {
            info!("✅ 到达发布时间，开始执行");
        }
        app.run(args.city.as_deref()).await;
    } else {
        info!("⏰ 不在发布时间窗口内，退出");
    }

    Ok(())
}
