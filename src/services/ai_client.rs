//! AI 文案客户端 - 业务能力层
//!
//! 通过 OpenAI 兼容接口（DeepSeek / 通义千问）生成小红书风格文案。
//! 输出解析失败时逐级降级：JSON → 按行提取 → 模板兜底，
//! 保证文案生成永远不会卡住流水线。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（DeepSeek、通义千问兼容端点）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::models::{NoteContent, RunContext, SearchOutcome};

/// 地标典型物体表，用于在视觉模型不可用时构造图片提示
static LANDMARK_OBJECTS: phf::Map<&'static str, &'static [&'static str]> = phf::phf_map! {
    "故宫" => &["宫殿", "红墙", "金顶", "台阶"],
    "天安门" => &["城楼", "广场", "红墙", "国旗"],
    "长城" => &["城墙", "烽火台", "山脉", "石阶"],
    "颐和园" => &["湖水", "宫殿", "长廊", "石桥"],
    "西湖" => &["湖水", "柳树", "桥", "山"],
    "雷峰塔" => &["塔", "湖景", "建筑"],
    "灵隐寺" => &["寺庙", "佛像", "树木", "香炉"],
    "外滩" => &["江景", "建筑", "天际线", "灯光"],
    "豫园" => &["园林", "池塘", "假山", "亭台"],
    "洪崖洞" => &["吊脚楼", "江景", "灯光", "山城"],
    "解放碑" => &["纪念碑", "广场", "商业街"],
    "宽窄巷子" => &["老街", "茶馆", "川西民居"],
    "锦里" => &["古街", "灯笼", "小吃"],
};

/// AI 文案客户端
pub struct AiClient {
    client: Client<OpenAIConfig>,
    chat_model: String,
    vision_model: String,
}

impl AiClient {
    /// 创建新的 AI 客户端（兼容 OpenAI API 的服务）
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.ai_api_key)
            .with_api_base(&config.ai_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            chat_model: config.ai_chat_model.clone(),
            vision_model: config.ai_vision_model.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `model`: 模型名
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `imgs`: 图片 URL 列表（可选），走 Vision API
    async fn send_to_llm(
        &self,
        model: &str,
        user_message: &str,
        system_message: Option<&str>,
        imgs: Option<&[String]>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", model);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| AppError::llm_api_failed(model, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match imgs {
            Some(img_urls) if !img_urls.is_empty() => {
                // Vision API：文本和图片混合内容
                let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
                    Vec::new();

                content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: user_message.to_string(),
                    },
                ));

                for url in img_urls.iter() {
                    content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: Some(ImageDetail::Auto),
                            },
                        },
                    ));
                }

                debug!("使用 Vision API，包含 {} 张图片", img_urls.len());

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()
                    .map_err(|e| AppError::llm_api_failed(model, e))?
            }
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| AppError::llm_api_failed(model, e))?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(0.7)
            .max_tokens(1000u32)
            .build()
            .map_err(|e| AppError::llm_api_failed(model, e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(model, e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Llm(LlmError::EmptyContent {
                    model: model.to_string(),
                })
            })?;

        Ok(content.trim().to_string())
    }

    /// 分析单张图片，返回一句话描述
    ///
    /// 没有配置视觉模型或调用失败时返回备用描述
    pub async fn analyze_image(&self, image_url: &str) -> String {
        if self.vision_model.is_empty() {
            return "旅游场景图片".to_string();
        }

        let prompt = "请用一句话描述这张图片的场景，突出旅游、美食、生活氛围。\
                      要求：20字以内，口语化，适合小红书风格。";

        let urls = [image_url.to_string()];
        match self
            .send_to_llm(&self.vision_model, prompt, None, Some(&urls))
            .await
        {
            Ok(desc) => {
                debug!("图片描述: {}", desc);
                desc
            }
            Err(e) => {
                warn!("图片分析失败: {}", e);
                "旅游场景图片".to_string()
            }
        }
    }

    /// 生成攻略式文案
    ///
    /// 解析失败时退回模板文案，调用方无需处理失败
    pub async fn generate_guide_content(
        &self,
        ctx: &RunContext,
        outcome: &SearchOutcome,
        image_hints: &[String],
    ) -> NoteContent {
        info!("生成文案: {}", ctx.city);

        let landmarks = extract_landmarks(ctx, outcome);
        let prompt = build_guide_prompt(ctx, outcome, image_hints, &landmarks);
        debug!("Prompt:\n{}", crate::utils::logging::truncate_text(&prompt, 200));

        let system = "你是一个真实的旅游博主，只根据事实写游记。";

        match self
            .send_to_llm(&self.chat_model, &prompt, Some(system), None)
            .await
            .and_then(|text| parse_content(&text))
        {
            Ok(content) => {
                info!("✅ 文案生成成功: {}", content.title);
                content
            }
            Err(e) => {
                warn!("文案生成失败: {}，使用备用文案模板", e);
                fallback_guide(&ctx.city, &ctx.topic.topic_type, &landmarks)
            }
        }
    }
}

/// 从上下文和参考内容中提取地标（最多5个）
pub fn extract_landmarks(ctx: &RunContext, outcome: &SearchOutcome) -> Vec<String> {
    let mut landmarks: Vec<String> = ctx.keywords.landmarks.iter().take(3).cloned().collect();

    for landmark in &ctx.keywords.landmarks {
        if outcome.reference_title.contains(landmark.as_str())
            && !landmarks.contains(landmark)
        {
            landmarks.push(landmark.clone());
        }
    }

    landmarks.truncate(5);
    landmarks
}

/// 地标的典型物体（没有收录的地标用通用描述）
pub fn landmark_objects(landmark: &str) -> &'static [&'static str] {
    for (key, objects) in LANDMARK_OBJECTS.entries() {
        if landmark.contains(key) {
            return *objects;
        }
    }
    &["建筑", "景观", "天空"]
}

/// 构建攻略文案 prompt
fn build_guide_prompt(
    ctx: &RunContext,
    outcome: &SearchOutcome,
    image_hints: &[String],
    landmarks: &[String],
) -> String {
    let hints_text = if image_hints.is_empty() {
        String::from("（无）")
    } else {
        image_hints
            .iter()
            .enumerate()
            .map(|(i, hint)| format!("图片{}: {}", i + 1, hint))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r##"你是一个小红书旅游博主，今天要写一篇{city}的{topic}分享。

【参考信息】
参考标题: {reference_title}
常见标签: {reference_tags}
涉及地标: {landmarks}
图片数量: {image_count}
图片内容提示:
{hints}

【说明】
- 图片来自多个高质量旅游帖子，请基于城市和地标信息生成原创内容
- 内容要实用、详细，不要空泛

要求：
1. 标题：15-20字，吸引人，不要用标点符号结尾
2. 正文：200-300字，分段，使用emoji，像真实经历
3. 标签：4-6个，包含城市、主题、热门话题，每个标签以#开头
4. 口语化，不要太正式，要有烟火气

输出JSON格式：
{{
    "title": "标题文本",
    "content": "正文内容",
    "tags": ["#标签1", "#标签2", "#标签3"]
}}

只输出JSON，不要其他内容。"##,
        city = ctx.city,
        topic = ctx.topic.name,
        reference_title = outcome.reference_title,
        reference_tags = outcome.reference_tags.iter().take(5).cloned().collect::<Vec<_>>().join(" "),
        landmarks = landmarks.join("、"),
        image_count = ctx.image_count,
        hints = hints_text,
    )
}

/// 解析 AI 返回的文案
///
/// 先去掉 markdown 代码块标记再解析 JSON，校验三个必需字段；
/// JSON 解析失败时退化为按行提取
pub fn parse_content(content_text: &str) -> AppResult<NoteContent> {
    let stripped = strip_code_fences(content_text);

    match serde_json::from_str::<serde_json::Value>(&stripped) {
        Ok(value) => {
            let title = value.get("title").and_then(|v| v.as_str());
            let content = value.get("content").and_then(|v| v.as_str());
            let tags_value = value.get("tags");

            match (title, content, tags_value) {
                (Some(title), Some(content), Some(tags_value)) => Ok(NoteContent {
                    title: title.to_string(),
                    content: content.to_string(),
                    tags: normalize_tags_value(tags_value),
                }),
                _ => Err(AppError::Llm(LlmError::ContentParseFailed {
                    detail: "缺少必需字段".to_string(),
                })),
            }
        }
        Err(e) => {
            warn!("JSON解析失败: {}，尝试按行提取", e);
            extract_content_by_lines(&stripped)
        }
    }
}

/// 去掉 markdown 代码块标记
fn strip_code_fences(text: &str) -> String {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
        return body.trim().to_string();
    }

    if let Some(body) = text.strip_prefix("```") {
        let body = body.strip_suffix("```").unwrap_or(body);
        return body.trim().to_string();
    }

    text.to_string()
}

/// 标签归一化：接受数组或逗号分隔字符串，统一为 # 前缀且不重复叠加
fn normalize_tags_value(value: &serde_json::Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        serde_json::Value::Array(arr) => arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        serde_json::Value::String(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        _ => Vec::new(),
    };

    raw.iter()
        .map(|t| normalize_tag(t))
        .filter(|t| t.len() > 1)
        .collect()
}

/// 单个标签归一化为 "#xxx" 形式
pub fn normalize_tag(tag: &str) -> String {
    let trimmed = tag.trim().trim_matches('"').trim_start_matches('#').trim();
    format!("#{}", trimmed)
}

/// 按行提取标题/正文/标签
fn extract_content_by_lines(text: &str) -> AppResult<NoteContent> {
    let mut title = String::new();
    let mut content_body = String::new();
    let mut tags = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("标题") || line.to_lowercase().starts_with("title") {
            title = after_colon(line);
        } else if line.starts_with("正文") || line.to_lowercase().starts_with("content") {
            content_body = after_colon(line);
        } else if line.starts_with("标签") || line.to_lowercase().starts_with("tags") {
            tags = after_colon(line)
                .split(',')
                .map(normalize_tag)
                .filter(|t| t.len() > 1)
                .collect();
        }
    }

    if title.is_empty() || content_body.is_empty() {
        return Err(AppError::Llm(LlmError::ContentParseFailed {
            detail: crate::utils::logging::truncate_text(text, 100),
        }));
    }

    Ok(NoteContent {
        title,
        content: content_body,
        tags,
    })
}

fn after_colon(line: &str) -> String {
    line.split_once([':', '：'])
        .map(|(_, rest)| rest)
        .unwrap_or("")
        .trim()
        .trim_matches('"')
        .to_string()
}

/// 备用攻略文案（AI 失败时）
///
/// 同一主题类型下输出是确定的，保证流水线永不因文案卡住
pub fn fallback_guide(city: &str, topic_type: &str, landmarks: &[String]) -> NoteContent {
    let landmarks_str = if landmarks.is_empty() {
        "旅游".to_string()
    } else {
        landmarks.iter().take(2).cloned().collect::<Vec<_>>().join("、")
    };

    let mut title = format!("{}{}一日游攻略", city, landmarks_str);
    if title.chars().count() > 20 {
        title = format!("{}旅游攻略", city);
    }

    let content = match topic_type {
        "food" => format!(
            "今天来{city}吃吃吃！🍜\n\n\
             📍必吃推荐\n{landmarks}附近藏着好多老店，随便进一家都不踩雷。\n\n\
             💰人均消费\n大部分店人均50-80元，性价比很高。\n\n\
             💡探店建议\n1. 错开饭点排队时间\n2. 跟着本地人走，小巷子里有惊喜\n3. 甜咸都试试，别带偏见\n\n\
             总结：{city}的烟火气都在吃的里面了，下次还来！",
            city = city,
            landmarks = landmarks_str
        ),
        "drink" => format!(
            "在{city}喝到了超出预期的一杯☕\n\n\
             📍店铺位置\n{landmarks}附近，环境安静适合发呆。\n\n\
             🍵推荐单品\n招牌款基本不会错，季节限定也值得试。\n\n\
             💡小建议\n1. 下午人少体验好\n2. 靠窗位置拍照出片\n3. 可以问店员要推荐\n\n\
             偷得浮生半日闲，这才是旅行的意义。",
            city = city,
            landmarks = landmarks_str
        ),
        _ => format!(
            "今天给大家整理一份超详细的{city}攻略！\n\n\
             📍 景点推荐\n{landmarks}都是必打卡的地方，每个景点都有独特的魅力。\n\n\
             🎫 门票信息\n大部分景点门票在50-100元之间，建议提前网上购票更优惠。\n\n\
             ⏰ 最佳游玩时间\n建议早上9点开始，避开人流高峰，下午5点前结束。\n\n\
             🚇 交通方式\n市区景点地铁直达，郊区景点建议包车或跟团。\n\n\
             💡 实用Tips\n1. 穿舒适的鞋子，一天要走很多路\n2. 带好防晒用品和水\n3. 提前规划好路线，节省时间",
            city = city,
            landmarks = landmarks_str
        ),
    };

    NoteContent {
        title,
        content,
        tags: vec![
            format!("#{}旅行", city),
            format!("#{}攻略", city),
            "#吃喝玩乐".to_string(),
            "#周末去哪玩".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_plain_json() {
        // 合法 JSON 经解析后三个字段原样保留
        let text = r##"{"title": "成都一日游", "content": "超好玩", "tags": ["#成都", "#旅游"]}"##;
        let content = parse_content(text).unwrap();
        assert_eq!(content.title, "成都一日游");
        assert_eq!(content.content, "超好玩");
        assert_eq!(content.tags, vec!["#成都", "#旅游"]);
    }

    #[test]
    fn test_parse_content_with_code_fences() {
        let text = "```json\n{\"title\": \"北京攻略\", \"content\": \"故宫走起\", \"tags\": [\"故宫\"]}\n```";
        let content = parse_content(text).unwrap();
        assert_eq!(content.title, "北京攻略");
        // 无前缀标签被归一化
        assert_eq!(content.tags, vec!["#故宫"]);
    }

    #[test]
    fn test_parse_content_missing_key() {
        let text = r#"{"title": "只有标题", "content": "没有标签"}"#;
        assert!(parse_content(text).is_err());
    }

    #[test]
    fn test_parse_content_tags_as_string() {
        let text = r##"{"title": "T", "content": "C", "tags": "#a, b, #c"}"##;
        let content = parse_content(text).unwrap();
        assert_eq!(content.tags, vec!["#a", "#b", "#c"]);
    }

    #[test]
    fn test_parse_content_line_fallback() {
        let text = "标题: 杭州西湖攻略\n正文: 断桥残雪值得一看\n标签: #杭州, #西湖";
        let content = parse_content(text).unwrap();
        assert_eq!(content.title, "杭州西湖攻略");
        assert_eq!(content.content, "断桥残雪值得一看");
        assert_eq!(content.tags, vec!["#杭州", "#西湖"]);
    }

    #[test]
    fn test_parse_content_hopeless_input() {
        assert!(parse_content("完全无关的一段话").is_err());
    }

    #[test]
    fn test_normalize_tag_dedup_prefix() {
        assert_eq!(normalize_tag("##成都"), "#成都");
        assert_eq!(normalize_tag("成都"), "#成都");
        assert_eq!(normalize_tag(" #成都 "), "#成都");
    }

    #[test]
    fn test_fallback_guide_deterministic() {
        let landmarks = vec!["宽窄巷子".to_string(), "锦里".to_string()];
        let a = fallback_guide("成都", "landmark", &landmarks);
        let b = fallback_guide("成都", "landmark", &landmarks);
        assert_eq!(a, b);
        assert!(a.title.chars().count() <= 20);
        assert!(!a.tags.is_empty());
        assert!(a.tags.iter().all(|t| t.starts_with('#')));
    }

    #[test]
    fn test_fallback_guide_varies_by_topic_type() {
        let landmarks = vec!["火锅".to_string()];
        let food = fallback_guide("重庆", "food", &landmarks);
        let general = fallback_guide("重庆", "general", &landmarks);
        assert_ne!(food.content, general.content);
    }

    #[test]
    fn test_landmark_objects_lookup() {
        assert_eq!(landmark_objects("北京故宫"), &["宫殿", "红墙", "金顶", "台阶"]);
        assert_eq!(landmark_objects("没收录的地方"), &["建筑", "景观", "天空"]);
    }
}
