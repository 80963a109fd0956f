//! # 小红书自动发布系统
//!
//! 一个自动发布旅游攻略/文字卡片内容的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 工具层（Utils）
//! - `utils/` - 与业务无关的基础能力
//! - `RandomHelper` - 基于日期的确定性随机（每天固定的发布时间）
//! - `RetryPolicy` - 显式的重试策略对象
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `XhsToolClient` - 小红书 MCP 工具调用 + 回复归一化
//! - `AiClient` - AI 文案生成能力（解析失败逐级降级）
//! - `ImageDownloader` - 图片下载/去水印/调整尺寸
//! - `TextCardGenerator` - 文字卡片绘制
//! - `FeishuClient` - 飞书通知和表格记录
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次发布"的完整处理流程
//! - `GuideFlow` - 旅游攻略模式（搜索 → 图片 → 文案 → 组装 → 发布）
//! - `CardFlow` - 文字卡片模式
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 登录门禁、模式选择、兜底清理、统一记录

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{NoteContent, PublishResult, RunContext, RunResult, RunStatus, SearchOutcome};
pub use orchestrator::App;
pub use services::{AiClient, FeishuClient, ImageDownloader, XhsToolClient};
pub use workflow::{CardFlow, GuideFlow, PipelineStep};
