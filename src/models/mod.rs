//! 数据模型
//!
//! 流水线各步骤之间传递的数据结构

pub mod city;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use city::{load_cities, load_text_topics, CityConfig, TextTopic, Topic};

/// 一次运行的上下文（Step 0 生成后不再修改）
#[derive(Debug, Clone)]
pub struct RunContext {
    /// 城市名
    pub city: String,
    /// 选中的主题
    pub topic: Topic,
    /// 目标图片数量
    pub image_count: usize,
    /// 当天种子
    pub seed: u32,
    /// 运行开始时间 "HH:MM:SS"
    pub publish_time: String,
    /// 城市关键词元数据（地标等）
    pub keywords: city::Keywords,
}

/// 搜索到的帖子引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRef {
    pub feed_id: String,
    pub xsec_token: String,
}

/// 帖子详情
#[derive(Debug, Clone, Default)]
pub struct FeedDetail {
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
}

/// Step 1 的聚合结果
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub feeds: Vec<FeedRef>,
    /// 图片 URL，最多 10 张
    pub images: Vec<String>,
    pub reference_title: String,
    pub reference_tags: Vec<String>,
}

/// 生成的文案（始终恰好三个字段）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoteContent {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// 发布结果
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// "success" 或远程返回的状态
    pub status: String,
    /// 笔记ID；无法提取时为 "no_id_returned" / "unknown_status"
    pub note_id: String,
    /// 发布时间 "YYYY-MM-DD HH:MM:SS"
    pub publish_time: String,
    /// 远程原始回复（保留用于排查）
    pub raw_result: Value,
}

/// 运行最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
    Unknown,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Unknown => "unknown",
        }
    }
}

/// 一次运行的终态记录（写入飞书后不再修改）
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    pub error: Option<String>,
    pub failed_step: Option<String>,
    pub title: String,
    pub note_id: Option<String>,
    pub publish_time: Option<String>,
    /// 总耗时（秒）
    pub duration: Option<f64>,
}

impl RunResult {
    pub fn unknown() -> Self {
        Self {
            status: RunStatus::Unknown,
            error: None,
            failed_step: None,
            title: String::new(),
            note_id: None,
            publish_time: None,
            duration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_str() {
        assert_eq!(RunStatus::Success.as_str(), "success");
        assert_eq!(RunStatus::Failed.as_str(), "failed");
        assert_eq!(RunStatus::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_note_content_roundtrip() {
        // 合法 JSON 的文案经序列化/反序列化后保持不变
        let content = NoteContent {
            title: "成都一日游攻略".to_string(),
            content: "早上来到成都🏙️".to_string(),
            tags: vec!["#成都旅行".to_string(), "#吃喝玩乐".to_string()],
        };
        let json = serde_json::to_string(&content).unwrap();
        let back: NoteContent = serde_json::from_str(&json).unwrap();
        assert_eq!(content, back);
    }
}
