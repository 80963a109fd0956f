//! 旅游攻略发布流程 - 流程层
//!
//! 流程顺序：
//! 1. 从小红书搜索真实内容（多关键词，混合收集图片）
//! 2. 下载并处理图片（去水印、调整尺寸）
//! 3. AI生成攻略式文案（失败退模板）
//! 4. 组装发布数据
//! 5. MCP发布
//!
//! 失败的步骤名留在 `current_step` 中，供编排层写入失败通知

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{NoteContent, PublishResult, RunContext, SearchOutcome};
use crate::services::{AiClient, ImageDownloader, XhsToolClient};
use crate::workflow::PipelineStep;

/// 组装好的发布数据
#[derive(Debug, Clone)]
pub struct AssembledPost {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// 本地图片路径
    pub images: Vec<String>,
}

/// 旅游攻略流程
pub struct GuideFlow {
    config: Config,
    tool_client: XhsToolClient,
    ai_client: AiClient,
    downloader: Option<ImageDownloader>,
    current_step: PipelineStep,
    /// 已生成的标题（失败时通知里也尽量带上）
    partial_title: Option<String>,
}

impl GuideFlow {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            tool_client: XhsToolClient::new(config),
            ai_client: AiClient::new(config),
            downloader: None,
            current_step: PipelineStep::Init,
            partial_title: None,
        }
    }

    /// 出错时所在的步骤
    pub fn current_step(&self) -> PipelineStep {
        self.current_step
    }

    /// 已知的标题（可能来自文案，也可能是城市兜底）
    pub fn known_title(&self, ctx: Option<&RunContext>) -> String {
        if let Some(title) = &self.partial_title {
            return title.clone();
        }
        match ctx {
            Some(ctx) => format!("{}旅游攻略", ctx.city),
            None => "旅游攻略（未完成）".to_string(),
        }
    }

    /// 执行完整流程（不含 Step 0，上下文由编排层传入）
    pub async fn run(&mut self, ctx: &RunContext) -> AppResult<PublishResult> {
        // Step 1: 从小红书搜索内容
        self.current_step = PipelineStep::Search;
        info!("\n▶️  {}", self.current_step);
        let outcome = self.search_xhs_content(ctx).await?;

        // Step 2: 下载并处理图片
        self.current_step = PipelineStep::Images;
        info!("\n▶️  {}", self.current_step);
        let local_images = self.download_and_process_images(&outcome, ctx.image_count).await?;

        // Step 3: 生成攻略式文案
        self.current_step = PipelineStep::Content;
        info!("\n▶️  {}", self.current_step);
        let content = self.generate_content(ctx, &outcome).await;
        self.partial_title = Some(content.title.clone());

        // Step 4: 组装发布数据
        self.current_step = PipelineStep::Assembly;
        info!("\n▶️  {}", self.current_step);
        let post = assemble_post(&content, &local_images);
        info!("   标题: {}", post.title);
        info!("   图片: {}张（本地路径）", post.images.len());
        info!("   标签: {}个", post.tags.len());

        // Step 5: MCP发布
        self.current_step = PipelineStep::Publish;
        info!("\n▶️  {}", self.current_step);
        let result = self
            .tool_client
            .publish_content(&post.title, &post.content, &post.images, &post.tags)
            .await?;

        info!("✅ 发布成功");
        info!("  笔记ID: {}", result.note_id);

        Ok(result)
    }

    /// 测试模式：只走到文案生成，不发布
    pub async fn run_test(&mut self, ctx: &RunContext) -> AppResult<()> {
        self.current_step = PipelineStep::Search;
        info!("\n▶️  Step 1: 从小红书搜索内容");
        let outcome = self.search_xhs_content(ctx).await?;
        info!("   找到 {} 张图片", outcome.images.len());
        info!(
            "   参考标题: {}",
            crate::utils::logging::truncate_text(&outcome.reference_title, 50)
        );

        self.current_step = PipelineStep::Images;
        info!("\n▶️  Step 2: 下载并处理图片");
        let local_images = self.download_and_process_images(&outcome, ctx.image_count).await?;
        info!("   成功处理 {} 张图片", local_images.len());

        self.current_step = PipelineStep::Content;
        info!("\n▶️  Step 3: 生成攻略式文案");
        let content = self.generate_content(ctx, &outcome).await;
        info!("\n✍️  文案:");
        info!("  标题: {}", content.title);
        info!(
            "  正文:\n{}...",
            crate::utils::logging::truncate_text(&content.content, 300)
        );
        info!("  标签: {}", content.tags.join(", "));

        info!("\n{}", "=".repeat(60));
        info!("✅ 测试完成（未实际发布）");
        info!("{}", "=".repeat(60));
        Ok(())
    }

    /// Step 1: 搜索 + 混合收集图片
    ///
    /// 从多个帖子各取最多3张图片，降低重复率；
    /// 所有帖子都提取不到图片时本次运行失败
    async fn search_xhs_content(&mut self, ctx: &RunContext) -> AppResult<SearchOutcome> {
        let keywords = build_search_keywords(&ctx.city, &ctx.topic.name, &ctx.topic.topic_type);

        let mut all_feeds = Vec::new();
        for keyword in &keywords {
            info!("搜索: {}", keyword);
            match self.tool_client.search_feeds(keyword, 5).await {
                Ok(feeds) => {
                    all_feeds.extend(feeds);
                    if all_feeds.len() >= 3 {
                        break;
                    }
                }
                Err(e) => {
                    warn!("搜索失败: {}", e);
                    continue;
                }
            }
        }

        if all_feeds.is_empty() {
            return Err(AppError::Validation(ValidationError::EmptySearchResults));
        }

        info!("✅ 共找到 {} 个相关内容", all_feeds.len());
        info!("从 {} 个帖子中提取图片...", all_feeds.len());

        let mut all_images = Vec::new();
        let mut reference_titles = Vec::new();
        let mut reference_tags = Vec::new();

        for feed in &all_feeds {
            if feed.xsec_token.is_empty() {
                warn!(
                    "  ⚠️  帖子 {}... 缺少xsec_token，跳过",
                    crate::utils::logging::truncate_text(&feed.feed_id, 20)
                );
                continue;
            }

            match self
                .tool_client
                .get_feed_detail(&feed.feed_id, &feed.xsec_token)
                .await
            {
                Ok(detail) => {
                    if detail.images.is_empty() {
                        warn!(
                            "  ⚠️  帖子 {}... 没有图片",
                            crate::utils::logging::truncate_text(&feed.feed_id, 20)
                        );
                        continue;
                    }
                    // 每个帖子最多取3张，增加多样性
                    let take_count = detail.images.len().min(3);
                    all_images.extend(detail.images.iter().take(take_count).cloned());
                    if !detail.title.is_empty() {
                        reference_titles.push(detail.title.clone());
                    }
                    reference_tags.extend(detail.tags.clone());
                    info!(
                        "  ✅ 从帖子 {}... 获取 {} 张图片",
                        crate::utils::logging::truncate_text(&feed.feed_id, 20),
                        take_count
                    );
                }
                Err(e) => {
                    warn!(
                        "  ⚠️  获取帖子 {}... 失败: {}",
                        crate::utils::logging::truncate_text(&feed.feed_id, 20),
                        e
                    );
                    continue;
                }
            }
        }

        if all_images.is_empty() {
            return Err(AppError::Validation(ValidationError::NoImages {
                feed_count: all_feeds.len(),
            }));
        }

        info!(
            "✅ 共获取 {} 张图片（混合自 {} 个帖子）",
            all_images.len(),
            reference_titles.len()
        );

        // 标签去重，保持出现顺序
        let mut seen = std::collections::HashSet::new();
        let reference_tags: Vec<String> = reference_tags
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .take(10)
            .collect();

        all_images.truncate(10);

        Ok(SearchOutcome {
            feeds: all_feeds,
            images: all_images,
            reference_title: reference_titles
                .first()
                .cloned()
                .unwrap_or_else(|| format!("{}旅游攻略", ctx.city)),
            reference_tags,
        })
    }

    /// Step 2: 逐张下载处理，直到达到目标数量
    async fn download_and_process_images(
        &mut self,
        outcome: &SearchOutcome,
        target_count: usize,
    ) -> AppResult<Vec<PathBuf>> {
        if outcome.images.is_empty() {
            return Err(AppError::Validation(ValidationError::NoImages {
                feed_count: outcome.feeds.len(),
            }));
        }

        info!(
            "Step 2: 下载并处理图片 - 来源: {}张，目标: {}张",
            outcome.images.len(),
            target_count
        );

        let downloader = ImageDownloader::new(&self.config.temp_image_dir)?;
        let mut local_images = Vec::new();

        for (i, img_url) in outcome.images.iter().enumerate() {
            if local_images.len() >= target_count {
                info!("已达到目标数量 {} 张，停止处理", target_count);
                break;
            }

            info!("处理第{}张图片...", i + 1);
            match downloader
                .download_and_process(img_url, local_images.len() + 1)
                .await
            {
                Ok(path) => {
                    info!("  ✅ 已处理: {}", path.display());
                    local_images.push(path);
                }
                Err(e) => {
                    warn!("  ⚠️  处理失败: {}，尝试下一张", e);
                    continue;
                }
            }
        }

        self.downloader = Some(downloader);

        if local_images.is_empty() {
            return Err(AppError::Validation(ValidationError::NoProcessedImages));
        }

        if local_images.len() < target_count {
            warn!(
                "⚠️  仅成功处理 {}/{} 张图片",
                local_images.len(),
                target_count
            );
        } else {
            info!("✅ 成功处理 {} 张图片", local_images.len());
        }

        Ok(local_images)
    }

    /// Step 3: 生成文案（内部已兜底，不会失败）
    async fn generate_content(&self, ctx: &RunContext, outcome: &SearchOutcome) -> NoteContent {
        info!("Step 3: 生成攻略式文案 - {}", ctx.city);

        let hints = self.build_image_hints(ctx, outcome).await;
        self.ai_client
            .generate_guide_content(ctx, outcome, &hints)
            .await
    }

    /// 逐图提示：有视觉模型时让模型看图，否则用地标物体表
    async fn build_image_hints(&self, ctx: &RunContext, outcome: &SearchOutcome) -> Vec<String> {
        if !self.config.ai_vision_model.is_empty() {
            let mut hints = Vec::new();
            for url in outcome.images.iter().take(3) {
                hints.push(self.ai_client.analyze_image(url).await);
            }
            return hints;
        }

        ctx.keywords
            .landmarks
            .iter()
            .take(3)
            .map(|landmark| {
                format!(
                    "{}（{}）",
                    landmark,
                    crate::services::ai_client::landmark_objects(landmark).join("、")
                )
            })
            .collect()
    }

    /// 清理临时图片（无论成功失败都会被编排层调用）
    pub fn cleanup(&self) {
        if let Some(downloader) = &self.downloader {
            downloader.cleanup();
        }
    }
}

/// Step 4: 组装图文内容
pub fn assemble_post(content: &NoteContent, local_images: &[PathBuf]) -> AssembledPost {
    info!("Step 4: 组装图文内容");

    AssembledPost {
        title: content.title.clone(),
        content: content.content.clone(),
        tags: content.tags.clone(),
        images: local_images
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    }
}

/// 根据主题类型构建搜索关键词
pub fn build_search_keywords(city: &str, topic_name: &str, topic_type: &str) -> Vec<String> {
    match topic_type {
        // 景点类：强调攻略、打卡、游玩
        "landmark" => vec![
            format!("{}{}攻略", city, topic_name),
            format!("{}{}游玩", city, topic_name),
            format!("{}打卡", topic_name),
        ],
        // 美食类：强调推荐、探店、好吃
        "food" => vec![
            format!("{}{}推荐", city, topic_name),
            format!("{}{}探店", city, topic_name),
            format!("{}好吃的{}", city, topic_name),
        ],
        // 饮品类：强调探店、推荐
        "drink" => vec![
            format!("{}{}探店", city, topic_name),
            format!("{}{}推荐", city, topic_name),
            format!("{}{}店", city, topic_name),
        ],
        // 通用类：旅游攻略关键词
        _ => vec![
            format!("{}旅游攻略", city),
            format!("{}一日游", city),
            format!("{}必去景点", city),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_by_topic_type() {
        assert_eq!(
            build_search_keywords("北京", "故宫", "landmark"),
            vec!["北京故宫攻略", "北京故宫游玩", "故宫打卡"]
        );
        assert_eq!(
            build_search_keywords("成都", "火锅", "food"),
            vec!["成都火锅推荐", "成都火锅探店", "成都好吃的火锅"]
        );
        assert_eq!(
            build_search_keywords("杭州", "茶馆", "drink"),
            vec!["杭州茶馆探店", "杭州茶馆推荐", "杭州茶馆店"]
        );
        assert_eq!(
            build_search_keywords("重庆", "旅游攻略", "general"),
            vec!["重庆旅游攻略", "重庆一日游", "重庆必去景点"]
        );
    }

    #[test]
    fn test_assemble_post() {
        let content = NoteContent {
            title: "标题".to_string(),
            content: "正文".to_string(),
            tags: vec!["#tag".to_string()],
        };
        let images = vec![PathBuf::from("/tmp/a.jpg"), PathBuf::from("/tmp/b.jpg")];
        let post = assemble_post(&content, &images);
        assert_eq!(post.images.len(), 2);
        assert_eq!(post.title, "标题");
    }
}
