//! 文字卡片发布流程 - 流程层（模式2）
//!
//! 生成纯色背景+一句话内容的简洁帖子：
//! 选话题 → 画卡片 → 扩写正文 → 发布

use rand::seq::SliceRandom;
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{load_text_topics, NoteContent, PublishResult, TextTopic};
use crate::services::{TextCardGenerator, XhsToolClient};
use crate::workflow::PipelineStep;

/// 文字卡片流程
pub struct CardFlow {
    config: Config,
    tool_client: XhsToolClient,
    generator: Option<TextCardGenerator>,
    current_step: PipelineStep,
    partial_title: Option<String>,
}

impl CardFlow {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            tool_client: XhsToolClient::new(config),
            generator: None,
            current_step: PipelineStep::Init,
            partial_title: None,
        }
    }

    pub fn current_step(&self) -> PipelineStep {
        self.current_step
    }

    pub fn known_title(&self) -> String {
        self.partial_title
            .clone()
            .unwrap_or_else(|| "文字卡片（未完成）".to_string())
    }

    /// 执行文字卡片流程
    pub async fn run(&mut self) -> AppResult<PublishResult> {
        info!("📝 模式2: 文字卡片模式");

        // 生成文字卡片内容
        self.current_step = PipelineStep::CardContent;
        let topics = load_text_topics(&self.config.text_topics_file)?;
        let topic = pick_topic(&topics);

        info!("  选中话题: {} {}", topic.emoji, topic.text);
        info!("  标签: {}", topic.tags.join(", "));

        let generator = TextCardGenerator::new(&self.config.temp_image_dir)?;
        let image_path = generator.generate_card(&topic.text, "text_card_01.jpg")?;
        self.generator = Some(generator);

        let content = compose_card_content(&topic);
        self.partial_title = Some(content.title.clone());

        info!("✅ 文字卡片内容生成完成");
        info!("   标题: {}", content.title);
        info!("   图片: {}", image_path.display());

        // 组装发布数据
        self.current_step = PipelineStep::Assembly;
        info!("\n▶️  {}", self.current_step);
        let images = vec![image_path.display().to_string()];
        info!("   标题: {}", content.title);
        info!("   图片: 1张");
        info!("   标签: {}个", content.tags.len());

        // 发布
        self.current_step = PipelineStep::Publish;
        info!("\n▶️  {}", self.current_step);
        let result = self
            .tool_client
            .publish_content(&content.title, &content.content, &images, &content.tags)
            .await?;

        info!("✅ 发布成功（文字卡片模式）");
        Ok(result)
    }

    /// 清理临时卡片文件
    pub fn cleanup(&self) {
        if let Some(generator) = &self.generator {
            generator.cleanup();
        }
    }
}

/// 随机挑一个话题
fn pick_topic(topics: &[TextTopic]) -> TextTopic {
    topics
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| TextTopic {
            text: "生活需要一点仪式感".to_string(),
            emoji: "✨".to_string(),
            tags: vec!["#日常分享".to_string()],
        })
}

/// 由话题组装完整的发布内容
///
/// 标题是话题本身（带表情）；话题没配表情时按关键词挑一个装饰表情
pub fn compose_card_content(topic: &TextTopic) -> NoteContent {
    let emoji = if topic.emoji.is_empty() {
        crate::services::text_card::decoration_emoji(&topic.text)
            .unwrap_or("")
            .to_string()
    } else {
        topic.emoji.clone()
    };

    let title = if emoji.is_empty() {
        topic.text.clone()
    } else {
        format!("{}{}", emoji, topic.text)
    };

    NoteContent {
        title,
        content: compose_card_body(&topic.text, &emoji),
        tags: topic.tags.clone(),
    }
}

/// 根据关键词类别生成正文（同类别内随机挑一个变体）
fn compose_card_body(text: &str, emoji: &str) -> String {
    let head = format!("{}{}", emoji, text);

    let variants: &[&str] = if ["上班", "辞职", "打工", "周五", "卑微"]
        .iter()
        .any(|k| text.contains(k))
    {
        // 职场类
        &[
            "每个打工人都不容易，但我们都在努力生活着。\n\n今天也要加油鸭！💪",
            "生活不易，但总要继续前行。\n\n愿我们都能找到属于自己的节奏。🌟",
            "谁的人生不是一边崩溃一边自愈呢？\n\n明天又是全新的一天！✨",
        ]
    } else if ["逃离", "治愈", "走走", "厌倦"].iter().any(|k| text.contains(k)) {
        // 逃离城市类
        &[
            "有时候真的需要暂时离开，去看看不一样的风景。\n\n给自己一点空间，给心灵一次放松。🌿",
            "生活不止眼前的苟且，还有诗和远方。\n\n偶尔出逃，是为了更好地回来。🎒",
            "城市虽繁华，但有时也需要一场说走就走的旅行。\n\n去治愈，去放空，去重新找回自己。💫",
        ]
    } else if ["快乐", "值得", "美好", "仪式感"].iter().any(|k| text.contains(k)) {
        // 生活感悟类
        &[
            "生活需要一点小确幸，需要一点仪式感。\n\n珍惜每一个美好瞬间。💕",
            "慢慢来，一切都来得及。\n\n温柔对待自己，热爱生活的每一天。🌸",
            "幸福很简单，就藏在生活的点点滴滴里。\n\n保持热爱，奔赴山海。✨",
        ]
    } else if ["周末", "发呆", "躺平", "摆烂", "咸鱼"].iter().any(|k| text.contains(k)) {
        // 周末休闲类
        &[
            "周末就该这样，慢悠悠地度过。\n\n什么都不想，什么都不做，就是最好的休息。😌",
            "偶尔给自己放个假，彻底放松一下。\n\n充电完毕，下周再战！🔋",
            "生活需要张弛有度，该躺平时就躺平。\n\n休息好了才能更好地出发。🛌",
        ]
    } else {
        // 旅行向往类
        &[
            "心之所向，身必往之。\n\n总有一天，我会去到那些梦想的地方。🗺️",
            "世界那么大，总要去看看。\n\n把梦想写进清单，一个一个去实现。✈️",
            "旅行的意义，在于遇见不一样的自己。\n\n勇敢出发吧！🎒",
        ]
    };

    let body = variants
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(variants[0]);

    format!("{}\n\n{}", head, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_card_content_title_with_emoji() {
        let topic = TextTopic {
            text: "周五快乐".to_string(),
            emoji: "🎊".to_string(),
            tags: vec!["#打工人".to_string()],
        };
        let content = compose_card_content(&topic);
        assert_eq!(content.title, "🎊周五快乐");
        assert!(content.content.starts_with("🎊周五快乐"));
        assert_eq!(content.tags, vec!["#打工人"]);
    }

    #[test]
    fn test_compose_card_body_category() {
        // 职场类关键词应落入职场模板
        let body = compose_card_body("今天也要上班", "💼");
        assert!(
            body.contains("打工人") || body.contains("前行") || body.contains("崩溃"),
            "意外的正文: {}",
            body
        );
    }

    #[test]
    fn test_compose_card_content_no_emoji_no_keyword() {
        // 既没配表情也不命中关键词时，标题就是话题本身
        let topic = TextTopic {
            text: "随便记录一下".to_string(),
            emoji: String::new(),
            tags: vec![],
        };
        let content = compose_card_content(&topic);
        assert_eq!(content.title, "随便记录一下");
    }

    #[test]
    fn test_compose_card_content_keyword_decoration() {
        // 没配表情但命中关键词时，自动补一个装饰表情
        let topic = TextTopic {
            text: "想去远方".to_string(),
            emoji: String::new(),
            tags: vec![],
        };
        let content = compose_card_content(&topic);
        assert!(content.title.ends_with("想去远方"));
        assert_ne!(content.title, "想去远方");
    }
}
