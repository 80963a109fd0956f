//! 应用编排 - 编排层
//!
//! ## 职责
//!
//! 1. **登录门禁**：运行前检查登录状态，未登录时生成二维码并退出
//! 2. **模式选择**：80% 旅游攻略，20% 文字卡片
//! 3. **流程驱动**：顺序执行各步骤，任何一步失败短路到收尾
//! 4. **兜底收尾**：无论成败都清理临时文件，并且最后记录到飞书；
//!    记录本身失败只打日志，绝不向上抛
//!
//! 每次运行恰好发出一条通知、落一条表格记录。

use std::time::Instant;

use rand::Rng;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{RunResult, RunStatus};
use crate::services::feishu_client::build_run_record;
use crate::services::{FeishuClient, XhsToolClient};
use crate::utils::logging;
use crate::workflow::{generate_context, CardFlow, GuideFlow, PipelineStep};

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 运行前检查登录状态
    ///
    /// # 返回
    /// `true` 表示可以继续执行；未登录时生成二维码并返回 `false`
    pub async fn check_login(&self) -> bool {
        info!("{}", "=".repeat(60));
        info!("🔐 检查小红书登录状态...");
        info!("{}", "=".repeat(60));

        let mut client = XhsToolClient::new(&self.config);

        match client.check_login_status().await {
            Ok(true) => {
                info!("✅ 已登录小红书");
                true
            }
            Ok(false) => {
                warn!("❌ 未登录小红书");
                info!("正在生成登录二维码...");

                match client.get_login_qrcode().await {
                    Ok(path) => {
                        info!("\n二维码图片已保存到: {}", path);
                        info!("如果在远程服务器上，也可以下载图片:");
                        info!("  scp user@server:{} .", path);
                        info!("\n扫码登录后，请重新运行此程序");
                    }
                    Err(e) => {
                        warn!("二维码图片未生成，请检查MCP服务: {}", e);
                    }
                }
                info!("{}", "=".repeat(60));
                false
            }
            Err(e) => {
                // 检查本身失败时继续执行，让后续步骤处理错误
                error!("检查登录状态失败: {}", e);
                warn!("将继续执行，但可能会因为未登录而失败");
                true
            }
        }
    }

    /// 正常模式：完整流程（双模式）
    pub async fn run(&self, city: Option<&str>) -> RunResult {
        // 随机决定模式：默认 80% 旅游攻略，20% 文字卡片
        let use_text_card = rand::thread_rng().gen::<f64>() < self.config.text_card_ratio;

        logging::log_startup(if use_text_card {
            "模式2-文字卡片(20%)"
        } else {
            "模式1-旅游攻略(80%)"
        });

        if use_text_card {
            self.run_card_mode().await
        } else {
            self.run_guide_mode(city).await
        }
    }

    /// 测试模式：快速验证流程（不发布、不记录）
    pub async fn run_test(&self, city: Option<&str>) -> AppResult<()> {
        info!("{}", "=".repeat(60));
        info!("🧪 测试模式 V2 - 使用小红书真实内容");
        info!("{}", "=".repeat(60));

        let ctx = generate_context(&self.config.cities_file, city)?;
        info!("\n📋 城市: {}", ctx.city);

        let mut flow = GuideFlow::new(&self.config);
        let outcome = flow.run_test(&ctx).await;

        // 清理临时文件
        flow.cleanup();

        outcome
    }

    /// 模式1：旅游攻略
    async fn run_guide_mode(&self, city: Option<&str>) -> RunResult {
        let start = Instant::now();
        let mut result = RunResult::unknown();

        // Step 0: 生成上下文
        info!("\n▶️  {}", PipelineStep::Context);
        let ctx = match generate_context(&self.config.cities_file, city) {
            Ok(ctx) => ctx,
            Err(e) => {
                error!("❌ 执行失败: {}", e);
                result.status = RunStatus::Failed;
                result.error = Some(e.to_string());
                result.failed_step = Some(PipelineStep::Context.label().to_string());
                result.title = city
                    .map(|c| format!("{}旅游攻略", c))
                    .unwrap_or_else(|| "旅游攻略（未完成）".to_string());
                result.duration = Some(start.elapsed().as_secs_f64());

                self.log_to_feishu(city.unwrap_or("未知"), 0, &result).await;
                return result;
            }
        };
        info!("   城市: {}", ctx.city);

        let mut flow = GuideFlow::new(&self.config);

        match flow.run(&ctx).await {
            Ok(publish) => {
                result.status = RunStatus::Success;
                result.note_id = Some(publish.note_id);
                result.publish_time = Some(publish.publish_time);
                result.title = flow.known_title(Some(&ctx));
                result.duration = Some(start.elapsed().as_secs_f64());
                logging::log_run_complete("success", start.elapsed().as_secs_f64());
            }
            Err(e) => {
                error!("❌ 执行失败: {}", e);
                result.status = RunStatus::Failed;
                result.error = Some(e.to_string());
                result.failed_step = Some(flow.current_step().label().to_string());
                result.title = flow.known_title(Some(&ctx));
                result.duration = Some(start.elapsed().as_secs_f64());
                logging::log_run_complete("failed", start.elapsed().as_secs_f64());
            }
        }

        // 清理临时文件（无论成败）
        flow.cleanup();

        // Step 6: 记录到飞书
        self.log_to_feishu(&ctx.city, ctx.image_count, &result).await;

        result
    }

    /// 模式2：文字卡片
    async fn run_card_mode(&self) -> RunResult {
        let start = Instant::now();
        let mut result = RunResult::unknown();

        let mut flow = CardFlow::new(&self.config);

        match flow.run().await {
            Ok(publish) => {
                result.status = RunStatus::Success;
                result.note_id = Some(publish.note_id);
                result.publish_time = Some(publish.publish_time);
                result.title = flow.known_title();
                result.duration = Some(start.elapsed().as_secs_f64());
                logging::log_run_complete("success", start.elapsed().as_secs_f64());
            }
            Err(e) => {
                error!("❌ 执行失败: {}", e);
                result.status = RunStatus::Failed;
                result.error = Some(e.to_string());
                result.failed_step = Some(flow.current_step().label().to_string());
                result.title = flow.known_title();
                result.duration = Some(start.elapsed().as_secs_f64());
                logging::log_run_complete("failed", start.elapsed().as_secs_f64());
            }
        }

        flow.cleanup();

        self.log_to_feishu("文字卡片", 1, &result).await;

        result
    }

    /// Step 6: 记录到飞书（通知 + 表格），尽力而为
    ///
    /// 自身的失败只记日志，不影响运行结果
    async fn log_to_feishu(&self, city: &str, image_count: usize, result: &RunResult) {
        info!("\n▶️  {}", PipelineStep::Logging);

        let feishu = FeishuClient::new(&self.config);

        let notify_outcome = if result.status == RunStatus::Success {
            feishu.send_success_notification(result).await
        } else {
            feishu
                .send_failure_notification(
                    city,
                    result.error.as_deref().unwrap_or("未知错误"),
                    &result.title,
                    result.failed_step.as_deref().unwrap_or("未知步骤"),
                )
                .await
        };
        if let Err(e) = notify_outcome {
            error!("❌ 发送飞书通知时出错: {}", e);
        }

        let record = build_run_record(city, image_count, result);
        match feishu.append_table_record(record).await {
            Ok(()) => info!("✅ 飞书记录完成"),
            Err(e) => error!("❌ 飞书记录失败: {}", e),
        }
    }
}
