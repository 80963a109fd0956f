//! 流程层
//!
//! 定义"一次发布"的完整处理流程：
//! 旅游攻略模式（搜索 → 下载图片 → 生成文案 → 组装 → 发布）
//! 和文字卡片模式（选话题 → 画卡片 → 组装 → 发布）

pub mod card_flow;
pub mod context;
pub mod guide_flow;

pub use card_flow::CardFlow;
pub use context::generate_context;
pub use guide_flow::GuideFlow;

/// 流水线步骤
///
/// 任何一步失败都会短路到 清理 → 通知 → 记录，
/// 失败通知中带上出错步骤的名字
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Init,
    Context,
    Search,
    Images,
    Content,
    Assembly,
    Publish,
    Logging,
    /// 文字卡片模式的生成步骤
    CardContent,
}

impl PipelineStep {
    /// 步骤显示名（用于日志和失败通知）
    pub fn label(self) -> &'static str {
        match self {
            PipelineStep::Init => "初始化",
            PipelineStep::Context => "Step 0: 生成上下文",
            PipelineStep::Search => "Step 1: 搜索小红书内容",
            PipelineStep::Images => "Step 2: 下载并处理图片",
            PipelineStep::Content => "Step 3: AI生成攻略文案",
            PipelineStep::Assembly => "Step 4: 组装发布数据",
            PipelineStep::Publish => "Step 5: MCP发布到小红书",
            PipelineStep::Logging => "Step 6: 记录到飞书",
            PipelineStep::CardContent => "生成文字卡片内容",
        }
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_labels() {
        assert_eq!(PipelineStep::Search.label(), "Step 1: 搜索小红书内容");
        assert!(PipelineStep::Search.label().contains("Step 1"));
        assert_eq!(PipelineStep::Publish.label(), "Step 5: MCP发布到小红书");
    }
}
