/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// MCP 服务地址
    pub mcp_url: String,
    /// 每次远程调用的超时（秒）
    pub mcp_timeout_secs: u64,
    /// 二维码保存路径
    pub qrcode_path: String,
    // --- AI 配置 ---
    /// AI 服务商（deepseek / qwen）
    pub ai_provider: String,
    pub ai_api_key: String,
    pub ai_api_base_url: String,
    pub ai_chat_model: String,
    /// 视觉模型（为空则跳过逐图描述）
    pub ai_vision_model: String,
    // --- 飞书配置 ---
    pub feishu_webhook_url: String,
    pub feishu_webhook_secret: String,
    pub feishu_app_id: String,
    pub feishu_app_secret: String,
    /// 多维表格 base_id
    pub feishu_base_id: String,
    /// 具体 table_id（为空则自动取第一个）
    pub feishu_table_id: String,
    // --- 发布配置 ---
    /// 发布时间窗口开始，如 "08:00"
    pub publish_window_start: String,
    /// 发布时间窗口结束，如 "10:00"
    pub publish_window_end: String,
    /// 文字卡片模式概率（0.0-1.0）
    pub text_card_ratio: f64,
    /// 城市配置文件路径
    pub cities_file: String,
    /// 文字卡片话题库路径
    pub text_topics_file: String,
    /// 临时图片目录
    pub temp_image_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mcp_url: "http://localhost:18060/mcp".to_string(),
            mcp_timeout_secs: 30,
            qrcode_path: "login_qrcode.png".to_string(),
            ai_provider: "deepseek".to_string(),
            ai_api_key: String::new(),
            ai_api_base_url: "https://api.deepseek.com".to_string(),
            ai_chat_model: "deepseek-chat".to_string(),
            ai_vision_model: String::new(),
            feishu_webhook_url: String::new(),
            feishu_webhook_secret: String::new(),
            feishu_app_id: String::new(),
            feishu_app_secret: String::new(),
            feishu_base_id: String::new(),
            feishu_table_id: String::new(),
            publish_window_start: "08:00".to_string(),
            publish_window_end: "10:00".to_string(),
            text_card_ratio: 0.2,
            cities_file: "config/cities.toml".to_string(),
            text_topics_file: "config/text_topics.toml".to_string(),
            temp_image_dir: "temp_images".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let provider = std::env::var("AI_PROVIDER").unwrap_or(default.ai_provider).to_lowercase();

        // 千问走 dashscope 的 OpenAI 兼容端点，且支持视觉模型
        let (base_url, chat_model, vision_model) = if provider == "qwen" {
            (
                "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
                "qwen-max".to_string(),
                "qwen-vl-max".to_string(),
            )
        } else {
            (default.ai_api_base_url, default.ai_chat_model, default.ai_vision_model)
        };

        Self {
            mcp_url: std::env::var("XHS_MCP_URL").unwrap_or(default.mcp_url),
            mcp_timeout_secs: std::env::var("MCP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.mcp_timeout_secs),
            qrcode_path: std::env::var("QRCODE_PATH").unwrap_or(default.qrcode_path),
            ai_provider: provider,
            ai_api_key: std::env::var("DEEPSEEK_API_KEY")
                .or_else(|_| std::env::var("QWEN_API_KEY"))
                .unwrap_or(default.ai_api_key),
            ai_api_base_url: std::env::var("AI_API_BASE_URL").unwrap_or(base_url),
            ai_chat_model: std::env::var("AI_CHAT_MODEL").unwrap_or(chat_model),
            ai_vision_model: std::env::var("AI_VISION_MODEL").unwrap_or(vision_model),
            feishu_webhook_url: std::env::var("FEISHU_WEBHOOK_URL").unwrap_or(default.feishu_webhook_url),
            feishu_webhook_secret: std::env::var("FEISHU_WEBHOOK_SECRET").unwrap_or(default.feishu_webhook_secret),
            feishu_app_id: std::env::var("FEISHU_APP_ID").unwrap_or(default.feishu_app_id),
            feishu_app_secret: std::env::var("FEISHU_APP_SECRET").unwrap_or(default.feishu_app_secret),
            feishu_base_id: std::env::var("FEISHU_TABLE_ID").unwrap_or(default.feishu_base_id),
            feishu_table_id: std::env::var("FEISHU_TABLE_TABLE_ID").unwrap_or(default.feishu_table_id),
            publish_window_start: std::env::var("PUBLISH_WINDOW_START").unwrap_or(default.publish_window_start),
            publish_window_end: std::env::var("PUBLISH_WINDOW_END").unwrap_or(default.publish_window_end),
            text_card_ratio: std::env::var("TEXT_CARD_RATIO").ok().and_then(|v| v.parse().ok()).unwrap_or(default.text_card_ratio),
            cities_file: std::env::var("CITIES_FILE").unwrap_or(default.cities_file),
            text_topics_file: std::env::var("TEXT_TOPICS_FILE").unwrap_or(default.text_topics_file),
            temp_image_dir: std::env::var("TEMP_IMAGE_DIR").unwrap_or(default.temp_image_dir),
        }
    }
}
