pub mod ai_client;
pub mod feishu_client;
pub mod image_downloader;
pub mod text_card;
pub mod tool_client;

pub use ai_client::AiClient;
pub use feishu_client::FeishuClient;
pub use image_downloader::ImageDownloader;
pub use text_card::TextCardGenerator;
pub use tool_client::{ToolReply, XhsToolClient};
