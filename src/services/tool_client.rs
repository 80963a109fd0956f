//! 小红书 MCP 客户端 - 业务能力层
//!
//! 通过 JSON-RPC over HTTP 调用小红书 MCP 服务的各种工具。
//! 连接一次、复用会话；远程回复没有固定契约，统一归一化为 [`ToolReply`]
//! 后按"结构化 JSON → 正则提取 → 兜底默认值"的顺序链式解析。

use std::time::Duration;

use base64::Engine;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, RemoteServiceError, ValidationError};
use crate::models::{FeedDetail, FeedRef, PublishResult};

/// MCP 协议版本
const PROTOCOL_VERSION: &str = "2024-11-05";

/// 二维码生成等待上限（MCP 生成二维码需要时间）
const QRCODE_TIMEOUT_SECS: u64 = 60;

/// 归一化后的工具回复
///
/// 远程回复在三种形态之间摇摆：内容块列表、嵌套对象、裸字符串；
/// 每种形态各有独立的解析入口，避免层层类型嗅探
#[derive(Debug, Clone, PartialEq)]
pub enum ToolReply {
    /// MCP 标准内容块列表 [{"type": "text", "text": "..."}]
    Blocks(Vec<ContentBlock>),
    /// 嵌套对象
    Object(Value),
    /// 裸字符串（可能内嵌 JSON）
    Text(String),
}

/// 单个内容块
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub block_type: String,
    pub text: Option<String>,
    /// image 块的 base64 数据
    pub data: Option<String>,
}

impl ToolReply {
    /// 从 JSON-RPC result 字段归一化
    pub fn from_result(result: &Value) -> Option<ToolReply> {
        if let Some(blocks) = result.get("content").and_then(|v| v.as_array()) {
            let parsed = blocks
                .iter()
                .map(|b| ContentBlock {
                    block_type: b
                        .get("type")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    text: b.get("text").and_then(|v| v.as_str()).map(String::from),
                    data: b
                        .get("data")
                        .or_else(|| b.get("base64"))
                        .and_then(|v| v.as_str())
                        .map(String::from),
                })
                .collect();
            return Some(ToolReply::Blocks(parsed));
        }
        if let Some(s) = result.as_str() {
            return Some(ToolReply::Text(s.to_string()));
        }
        // 裸数组也按对象形态走结构化解析
        if result.is_object() || result.is_array() {
            return Some(ToolReply::Object(result.clone()));
        }
        None
    }

    /// 第一个文本块的内容
    pub fn first_text(&self) -> Option<&str> {
        match self {
            ToolReply::Blocks(blocks) => blocks
                .iter()
                .find(|b| b.text.is_some())
                .and_then(|b| b.text.as_deref()),
            ToolReply::Text(s) => Some(s),
            ToolReply::Object(_) => None,
        }
    }

    /// 原始回复的 JSON 表示（记录用）
    pub fn to_raw(&self) -> Value {
        match self {
            ToolReply::Blocks(blocks) => Value::Array(
                blocks
                    .iter()
                    .map(|b| {
                        json!({
                            "type": b.block_type,
                            "text": b.text,
                            "data": b.data.as_deref().map(|d| format!("<{}字节>", d.len())),
                        })
                    })
                    .collect(),
            ),
            ToolReply::Object(v) => v.clone(),
            ToolReply::Text(s) => Value::String(s.clone()),
        }
    }
}

/// 已建立的会话
struct Session {
    session_id: Option<String>,
    tools: Vec<String>,
}

/// 小红书 MCP 客户端
pub struct XhsToolClient {
    http: reqwest::Client,
    mcp_url: String,
    qrcode_path: String,
    session: Option<Session>,
    next_id: u64,
}

impl XhsToolClient {
    /// 创建新的客户端（不立即连接）
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.mcp_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            mcp_url: config.mcp_url.clone(),
            qrcode_path: config.qrcode_path.clone(),
            session: None,
            next_id: 0,
        }
    }

    /// 确保已连接（initialize → initialized → tools/list）
    async fn ensure_connected(&mut self) -> AppResult<()> {
        if self.session.is_some() {
            return Ok(());
        }

        info!("连接小红书MCP服务...");

        let init_result = self
            .rpc(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
                None,
            )
            .await?;

        let session_id = init_result.1;
        self.notify("notifications/initialized", session_id.as_deref())
            .await?;

        let (list_result, _) = self.rpc("tools/list", json!({}), session_id.as_deref()).await?;
        let tools: Vec<String> = list_result
            .get("tools")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| t.get("name").and_then(|n| n.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        info!("✅ 已连接，获取到 {} 个工具", tools.len());

        self.session = Some(Session { session_id, tools });
        Ok(())
    }

    /// 发送一次 JSON-RPC 请求，返回 (result, 响应携带的会话ID)
    async fn rpc(
        &mut self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> AppResult<(Value, Option<String>)> {
        self.next_id += 1;
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": method,
            "params": params,
        });

        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json, text/event-stream"));
        if let Some(sid) = session_id {
            if let Ok(value) = HeaderValue::from_str(sid) {
                headers.insert("mcp-session-id", value);
            }
        }

        let response = self
            .http
            .post(&self.mcp_url)
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let new_session_id = response
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let text = response.text().await?;
        let parsed = if content_type.contains("text/event-stream") {
            parse_sse_body(&text)?
        } else {
            serde_json::from_str::<Value>(&text)?
        };

        if let Some(err) = parsed.get("error") {
            return Err(AppError::RemoteService(RemoteServiceError::CallFailed {
                tool: method.to_string(),
                message: err.to_string(),
            }));
        }

        let result = parsed.get("result").cloned().unwrap_or(Value::Null);
        Ok((result, new_session_id))
    }

    /// 发送 JSON-RPC 通知（无 id，不期待回复体）
    async fn notify(&self, method: &str, session_id: Option<&str>) -> AppResult<()> {
        let body = json!({ "jsonrpc": "2.0", "method": method });

        let mut request = self
            .http
            .post(&self.mcp_url)
            .header("accept", "application/json, text/event-stream")
            .json(&body);
        if let Some(sid) = session_id {
            request = request.header("mcp-session-id", sid);
        }

        // 通知失败不阻塞流程
        if let Err(e) = request.send().await {
            debug!("发送 {} 通知失败: {}", method, e);
        }
        Ok(())
    }

    /// 调用指定工具并归一化回复
    pub async fn call_tool(&mut self, tool_name: &str, arguments: Value) -> AppResult<ToolReply> {
        self.ensure_connected().await?;

        let session = self
            .session
            .as_ref()
            .ok_or(AppError::RemoteService(RemoteServiceError::NotConnected))?;

        if !session.tools.iter().any(|t| t == tool_name) {
            return Err(AppError::RemoteService(RemoteServiceError::ToolNotFound {
                tool: tool_name.to_string(),
            }));
        }

        let session_id = session.session_id.clone();
        let (result, _) = self
            .rpc(
                "tools/call",
                json!({ "name": tool_name, "arguments": arguments }),
                session_id.as_deref(),
            )
            .await?;

        if result
            .get("isError")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            let message = ToolReply::from_result(&result)
                .and_then(|r| r.first_text().map(String::from))
                .unwrap_or_else(|| result.to_string());
            return Err(AppError::RemoteService(RemoteServiceError::CallFailed {
                tool: tool_name.to_string(),
                message,
            }));
        }

        ToolReply::from_result(&result).ok_or_else(|| {
            AppError::RemoteService(RemoteServiceError::NoResult {
                tool: tool_name.to_string(),
                detail: crate::utils::logging::truncate_text(&result.to_string(), 200),
            })
        })
    }

    // ========== 具体工具 ==========

    /// 检查登录状态
    pub async fn check_login_status(&mut self) -> AppResult<bool> {
        info!("检查小红书登录状态...");
        let reply = self.call_tool("check_login_status", json!({})).await?;
        let logged_in = parse_login_status(&reply);
        info!("登录状态: {}", if logged_in { "已登录" } else { "未登录" });
        Ok(logged_in)
    }

    /// 获取登录二维码并保存为图片文件
    ///
    /// MCP 生成二维码可能需要 10-30 秒，这里给 60 秒超时
    pub async fn get_login_qrcode(&mut self) -> AppResult<String> {
        info!("获取小红书登录二维码...");
        info!("⏱️  等待 MCP 服务生成二维码（可能需要 10-30 秒）...");

        let reply = tokio::time::timeout(
            Duration::from_secs(QRCODE_TIMEOUT_SECS),
            self.call_tool("get_login_qrcode", json!({})),
        )
        .await
        .map_err(|_| AppError::timeout("get_login_qrcode", QRCODE_TIMEOUT_SECS))??;

        let Some(qr_base64) = parse_qrcode_base64(&reply) else {
            return Err(AppError::RemoteService(RemoteServiceError::NoResult {
                tool: "get_login_qrcode".to_string(),
                detail: "回复中没有二维码图片数据".to_string(),
            }));
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(qr_base64.as_bytes())
            .map_err(|e| AppError::Other(format!("二维码base64解码失败: {}", e)))?;

        let path = self.qrcode_path.clone();
        std::fs::write(&path, bytes).map_err(|e| AppError::file_write_failed(&path, e))?;

        info!("✅ 二维码已保存到: {}", path);
        Ok(path)
    }

    /// 搜索小红书内容
    ///
    /// # 参数
    /// - `keyword`: 搜索关键词
    /// - `limit`: 返回数量限制
    pub async fn search_feeds(&mut self, keyword: &str, limit: usize) -> AppResult<Vec<FeedRef>> {
        info!("搜索小红书内容: {}", keyword);
        let reply = self
            .call_tool("search_feeds", json!({ "keyword": keyword }))
            .await?;

        let feeds = parse_search_reply(&reply, limit);
        info!("✅ 找到 {} 个相关内容", feeds.len());
        Ok(feeds)
    }

    /// 获取帖子详情
    pub async fn get_feed_detail(
        &mut self,
        feed_id: &str,
        xsec_token: &str,
    ) -> AppResult<FeedDetail> {
        info!("获取帖子详情: {}", feed_id);
        let reply = self
            .call_tool(
                "get_feed_detail",
                json!({ "feed_id": feed_id, "xsec_token": xsec_token }),
            )
            .await?;

        let detail = parse_detail_reply(&reply);
        info!(
            "✅ 获取到帖子: {}",
            crate::utils::logging::truncate_text(&detail.title, 30)
        );
        Ok(detail)
    }

    /// 发布图文内容
    ///
    /// 标签作为纯文本数组传递（去掉 # 和话题标记），由 MCP 处理成话题格式
    pub async fn publish_content(
        &mut self,
        title: &str,
        content: &str,
        images: &[String],
        tags: &[String],
    ) -> AppResult<PublishResult> {
        info!("发布内容: {}", title);
        info!("  图片数: {}", images.len());
        info!("  标签数: {}", tags.len());

        let mut arguments = json!({
            "title": title,
            "content": content,
            "images": images,
        });

        if !tags.is_empty() {
            let clean_tags: Vec<String> = tags.iter().map(|t| clean_tag(t)).filter(|t| !t.is_empty()).collect();
            info!("📌 清理后的标签: {:?}", clean_tags);
            arguments["tags"] = json!(clean_tags);
        }

        let reply = self.call_tool("publish_content", arguments).await?;
        interpret_publish_reply(&reply)
    }
}

/// 从 SSE 响应体中取最后一个 data 行的 JSON
fn parse_sse_body(body: &str) -> AppResult<Value> {
    let mut last = None;
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() {
                last = Some(data);
            }
        }
    }
    match last {
        Some(data) => Ok(serde_json::from_str(data)?),
        None => Err(AppError::RemoteService(RemoteServiceError::NoResult {
            tool: "sse".to_string(),
            detail: "事件流中没有 data 行".to_string(),
        })),
    }
}

/// 去掉标签中的 #、[话题] 等符号，只保留纯文本
pub fn clean_tag(tag: &str) -> String {
    tag.trim()
        .replace('#', "")
        .replace("[话题]", "")
        .replace(['[', ']'], "")
        .trim()
        .to_string()
}

// ========== 回复解析（按形态分派） ==========

/// 解析登录状态回复
pub fn parse_login_status(reply: &ToolReply) -> bool {
    match reply {
        ToolReply::Blocks(_) | ToolReply::Text(_) => reply
            .first_text()
            .map(|t| t.contains("已登录") || t.to_lowercase().contains("logged in"))
            .unwrap_or(false),
        ToolReply::Object(obj) => obj
            .get("is_login")
            .or_else(|| obj.get("logged_in"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    }
}

/// 从二维码回复中提取 base64 图片数据
pub fn parse_qrcode_base64(reply: &ToolReply) -> Option<String> {
    let raw = match reply {
        ToolReply::Blocks(blocks) => blocks
            .iter()
            .find(|b| b.block_type == "image")
            .and_then(|b| b.data.clone()),
        ToolReply::Object(obj) => ["qrcode", "qr_code", "image", "base64"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_str()).map(String::from)),
        ToolReply::Text(s) => Some(s.clone()),
    }?;

    // data URL 格式需要去掉前缀
    if raw.starts_with("data:image") {
        raw.split_once(',').map(|(_, b64)| b64.to_string())
    } else {
        Some(raw)
    }
}

/// 解析搜索回复为帖子引用列表
///
/// 解析链：结构化 JSON（含内嵌 JSON 字符串）→ 正则提取 → 空列表兜底
pub fn parse_search_reply(reply: &ToolReply, limit: usize) -> Vec<FeedRef> {
    let mut feeds = Vec::new();

    match reply {
        ToolReply::Blocks(blocks) => {
            for block in blocks {
                let Some(text) = &block.text else { continue };
                if let Ok(data) = serde_json::from_str::<Value>(text) {
                    extract_feeds_from_value(&data, limit, &mut feeds);
                } else {
                    extract_feeds_by_regex(text, limit, &mut feeds);
                }
                if feeds.len() >= limit {
                    break;
                }
            }
        }
        ToolReply::Object(obj) => {
            extract_feeds_from_value(obj, limit, &mut feeds);
        }
        ToolReply::Text(text) => {
            if let Ok(data) = serde_json::from_str::<Value>(text) {
                extract_feeds_from_value(&data, limit, &mut feeds);
            } else {
                extract_feeds_by_regex(text, limit, &mut feeds);
            }
        }
    }

    feeds.truncate(limit);
    debug!("解析出 {} 个帖子", feeds.len());
    feeds
}

/// 从结构化 JSON 中提取帖子（支持 feeds / items / notes 等字段名）
fn extract_feeds_from_value(data: &Value, limit: usize, out: &mut Vec<FeedRef>) {
    let items = data
        .get("feeds")
        .or_else(|| data.get("items"))
        .or_else(|| data.get("notes"))
        .and_then(|v| v.as_array());

    let list: Vec<&Value> = match items {
        Some(arr) => arr.iter().collect(),
        None => match data.as_array() {
            Some(arr) => arr.iter().collect(),
            None => return,
        },
    };

    for item in list {
        if out.len() >= limit {
            return;
        }
        let feed_id = item
            .get("id")
            .or_else(|| item.get("note_id"))
            .or_else(|| item.get("feed_id"))
            .and_then(|v| v.as_str());
        let Some(feed_id) = feed_id else { continue };

        // 驼峰和下划线两种命名都可能出现
        let token = item
            .get("xsecToken")
            .or_else(|| item.get("xsec_token"))
            .or_else(|| item.get("token"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        out.push(FeedRef {
            feed_id: feed_id.to_string(),
            xsec_token: token.to_string(),
        });
    }
}

/// 正则提取帖子 id 和 token
fn extract_feeds_by_regex(text: &str, limit: usize, out: &mut Vec<FeedRef>) {
    let Ok(id_re) = Regex::new(r#"(?:feed_id|note_id|id)["\s:]+([a-zA-Z0-9]+)"#) else {
        return;
    };
    let Ok(token_re) = Regex::new(r#"xsec_token["\s:]+([a-zA-Z0-9_=-]+)"#) else {
        return;
    };

    let ids: Vec<String> = id_re
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .take(limit)
        .collect();
    let tokens: Vec<String> = token_re
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    for (i, feed_id) in ids.into_iter().enumerate() {
        if out.len() >= limit {
            return;
        }
        out.push(FeedRef {
            feed_id,
            xsec_token: tokens.get(i).cloned().unwrap_or_default(),
        });
    }
}

/// 解析帖子详情回复
///
/// 结构化形态下数据嵌套在 data.note 里；字符串形态退化为正则提取
pub fn parse_detail_reply(reply: &ToolReply) -> FeedDetail {
    let mut detail = FeedDetail::default();

    match reply {
        ToolReply::Blocks(_) => {
            let Some(text) = reply.first_text() else {
                return detail;
            };
            match serde_json::from_str::<Value>(text) {
                Ok(data) => {
                    let note = data
                        .get("data")
                        .and_then(|d| d.get("note"))
                        .cloned()
                        .unwrap_or(data);
                    fill_detail_from_note(&note, &mut detail);
                }
                Err(e) => {
                    warn!("帖子详情JSON解析失败: {}，退化为正则提取", e);
                    fill_detail_by_regex(text, &mut detail);
                }
            }
        }
        ToolReply::Object(obj) => {
            let note = obj
                .get("data")
                .and_then(|d| d.get("note"))
                .unwrap_or(obj)
                .clone();
            fill_detail_from_note(&note, &mut detail);
        }
        ToolReply::Text(text) => fill_detail_by_regex(text, &mut detail),
    }

    detail
}

fn fill_detail_from_note(note: &Value, detail: &mut FeedDetail) {
    detail.title = note
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let desc = note.get("desc").and_then(|v| v.as_str()).unwrap_or_default();
    detail.content = desc.to_string();

    // 图片从 imageList 中取 urlDefault，缺失时退而求其次
    if let Some(image_list) = note.get("imageList").and_then(|v| v.as_array()) {
        detail.images = image_list
            .iter()
            .filter_map(|img| {
                img.get("urlDefault")
                    .or_else(|| img.get("url"))
                    .or_else(|| img.get("urlPre"))
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .collect();
    }

    // 标签从正文中的 #话题 标记提取
    if let Ok(tag_re) = Regex::new(r"#([^#\[]+)\[话题\]") {
        detail.tags = tag_re
            .captures_iter(desc)
            .filter_map(|c| c.get(1).map(|m| format!("#{}", m.as_str().trim())))
            .collect();
    }
}

fn fill_detail_by_regex(text: &str, detail: &mut FeedDetail) {
    if let Ok(title_re) = Regex::new(r#"title["\s:]+([^\n"]+)"#) {
        if let Some(cap) = title_re.captures(text) {
            detail.title = cap[1].trim().to_string();
        }
    }
    if let Ok(img_re) = Regex::new(r#"https?://[^\s"]+\.(?:jpg|jpeg|png|webp)"#) {
        detail.images = img_re
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
    }
    if let Ok(tag_re) = Regex::new(r"#([^\s#]+)") {
        detail.tags = tag_re
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| format!("#{}", m.as_str())))
            .collect();
    }
}

/// 解释发布回复
///
/// 宽严不对称：明确失败才报错；明确成功但拿不到ID记为
/// `no_id_returned`；完全无法识别的形态按低置信度成功处理，
/// 避免误报失败卡住整个流程
pub fn interpret_publish_reply(reply: &ToolReply) -> AppResult<PublishResult> {
    let publish_time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let raw = reply.to_raw();

    let mut note_id: Option<String> = None;
    let mut status = "unknown".to_string();

    match reply {
        ToolReply::Blocks(_) => {
            let Some(text) = reply.first_text() else {
                warn!("⚠️  未知的MCP返回格式（无文本块）");
                return Ok(PublishResult {
                    status: "success".to_string(),
                    note_id: "unknown_format".to_string(),
                    publish_time,
                    raw_result: raw,
                });
            };

            // 方式1: 标准格式 PostID:xxxx
            if let Some((_, rest)) = text.split_once("PostID:") {
                let candidate = rest
                    .split_once('}')
                    .map(|(head, _)| head)
                    .unwrap_or(rest)
                    .trim();
                if candidate.len() > 10 {
                    note_id = Some(candidate.to_string());
                    info!("✅ 从PostID字段提取到ID: {}", candidate);
                }
            }

            // 方式2: 从响应中匹配类似笔记ID的长十六进制串
            if note_id.is_none() {
                if let Ok(re) = Regex::new(r"\b[a-f0-9]{16,32}\b") {
                    if let Some(m) = re.find(text) {
                        note_id = Some(m.as_str().to_string());
                        info!("✅ 从正则匹配提取到ID: {}", m.as_str());
                    }
                }
            }

            // 提取 Status 字段
            if let Some((_, rest)) = text.split_once("Status:") {
                if let Some(word) = rest.trim().split_whitespace().next() {
                    status = word.to_string();
                }
            }

            let lower = text.to_lowercase();
            let explicit_success =
                text.contains("发布成功") || text.contains("发布完成") || lower.contains("success");
            let explicit_failure =
                text.contains("失败") || lower.contains("error") || lower.contains("fail");

            if explicit_success {
                if note_id.is_none() {
                    warn!("⚠️  MCP返回发布成功，但未获取到PostID");
                    warn!("   内容可能在草稿箱或已发布但ID未返回");
                    note_id = Some("no_id_returned".to_string());
                }
            } else if explicit_failure {
                return Err(AppError::Validation(ValidationError::PublishRejected {
                    message: crate::utils::logging::truncate_text(text, 200),
                }));
            } else {
                warn!(
                    "⚠️  发布状态不明确: {}",
                    crate::utils::logging::truncate_text(text, 200)
                );
                if note_id.is_none() {
                    note_id = Some("unknown_status".to_string());
                }
            }
        }
        ToolReply::Text(text) => {
            note_id = Some(if text.len() > 10 {
                text.clone()
            } else {
                "no_id_returned".to_string()
            });
        }
        ToolReply::Object(obj) => {
            note_id = Some(
                obj.get("note_id")
                    .or_else(|| obj.get("id"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("no_id_returned")
                    .to_string(),
            );
        }
    }

    Ok(PublishResult {
        status: if status == "unknown" {
            "success".to_string()
        } else {
            status
        },
        note_id: note_id.unwrap_or_else(|| "no_id_returned".to_string()),
        publish_time,
        raw_result: raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_blocks(text: &str) -> ToolReply {
        ToolReply::Blocks(vec![ContentBlock {
            block_type: "text".to_string(),
            text: Some(text.to_string()),
            data: None,
        }])
    }

    #[test]
    fn test_normalize_content_blocks() {
        let result = json!({
            "content": [
                {"type": "text", "text": "✅ 已登录\n用户名: xxx"},
                {"type": "image", "data": "aGVsbG8="}
            ]
        });
        let reply = ToolReply::from_result(&result).unwrap();
        match &reply {
            ToolReply::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                assert_eq!(blocks[1].block_type, "image");
                assert_eq!(blocks[1].data.as_deref(), Some("aGVsbG8="));
            }
            other => panic!("期望 Blocks，得到 {:?}", other),
        }
        assert!(parse_login_status(&reply));
    }

    #[test]
    fn test_login_status_shapes() {
        assert!(parse_login_status(&ToolReply::Text("已登录".into())));
        assert!(parse_login_status(&ToolReply::Text("User is Logged In".into())));
        assert!(!parse_login_status(&ToolReply::Text("未登录".into())));
        assert!(parse_login_status(&ToolReply::Object(json!({"is_login": true}))));
        assert!(parse_login_status(&ToolReply::Object(json!({"logged_in": true}))));
        assert!(!parse_login_status(&ToolReply::Object(json!({}))));
    }

    #[test]
    fn test_search_reply_embedded_json() {
        // 文本块内嵌 JSON，feeds 使用驼峰 token 字段
        let reply = text_blocks(
            r#"{"feeds": [
                {"id": "65f0a1b2c3d4e5f6a7b8c9d0", "xsecToken": "ABwslDkj_x"},
                {"id": "65f0a1b2c3d4e5f6a7b8c9d1", "xsec_token": "CDwslDkj_y"}
            ]}"#,
        );
        let feeds = parse_search_reply(&reply, 10);
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].feed_id, "65f0a1b2c3d4e5f6a7b8c9d0");
        assert_eq!(feeds[0].xsec_token, "ABwslDkj_x");
        assert_eq!(feeds[1].xsec_token, "CDwslDkj_y");
    }

    #[test]
    fn test_search_reply_object_shape() {
        let reply = ToolReply::Object(json!({
            "items": [
                {"note_id": "abc123", "token": "tok1"},
                {"feed_id": "def456"}
            ]
        }));
        let feeds = parse_search_reply(&reply, 10);
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].feed_id, "abc123");
        assert_eq!(feeds[1].xsec_token, "");
    }

    #[test]
    fn test_search_reply_bare_string_regex() {
        let reply = ToolReply::Text(
            "找到帖子 feed_id: 65f0aabbccdd 对应 xsec_token: AB-cd_ef 等".to_string(),
        );
        let feeds = parse_search_reply(&reply, 10);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].feed_id, "65f0aabbccdd");
        assert_eq!(feeds[0].xsec_token, "AB-cd_ef");
    }

    #[test]
    fn test_search_reply_limit() {
        let reply = ToolReply::Object(json!({
            "feeds": (0..20).map(|i| json!({"id": format!("feed{}", i)})).collect::<Vec<_>>()
        }));
        let feeds = parse_search_reply(&reply, 5);
        assert_eq!(feeds.len(), 5);
    }

    #[test]
    fn test_search_reply_no_signal() {
        let feeds = parse_search_reply(&ToolReply::Text("服务繁忙".to_string()), 10);
        assert!(feeds.is_empty());
    }

    #[test]
    fn test_detail_reply_nested_note() {
        let reply = text_blocks(
            r#"{"data": {"note": {
                "title": "成都两日游",
                "desc": "超好玩 #成都[话题] #旅游攻略[话题]",
                "imageList": [
                    {"urlDefault": "https://img.example.com/a.jpg"},
                    {"url": "https://img.example.com/b.jpg"},
                    {"other": 1}
                ]
            }}}"#,
        );
        let detail = parse_detail_reply(&reply);
        assert_eq!(detail.title, "成都两日游");
        assert_eq!(detail.images.len(), 2);
        assert_eq!(detail.tags, vec!["#成都", "#旅游攻略"]);
    }

    #[test]
    fn test_detail_reply_string_fallback() {
        let reply = ToolReply::Text(
            "title: 重庆攻略\n图片 https://cdn.example.com/x.png 还有 #洪崖洞 #山城".to_string(),
        );
        let detail = parse_detail_reply(&reply);
        assert_eq!(detail.title, "重庆攻略");
        assert_eq!(detail.images, vec!["https://cdn.example.com/x.png"]);
        assert!(detail.tags.contains(&"#洪崖洞".to_string()));
    }

    #[test]
    fn test_publish_success_without_id() {
        // 明确成功但没有ID → 非致命，标记 no_id_returned
        let reply = text_blocks("发布成功！内容已提交审核");
        let result = interpret_publish_reply(&reply).unwrap();
        assert_eq!(result.status, "success");
        assert_eq!(result.note_id, "no_id_returned");
    }

    #[test]
    fn test_publish_success_with_post_id() {
        let reply = text_blocks("{Status:success PostID:65f0a1b2c3d4e5f6a7b8c9d0}");
        let result = interpret_publish_reply(&reply).unwrap();
        assert_eq!(result.note_id, "65f0a1b2c3d4e5f6a7b8c9d0");
        assert_eq!(result.status, "success");
    }

    #[test]
    fn test_publish_explicit_failure_is_fatal() {
        let reply = text_blocks("发布失败：图片格式不支持");
        assert!(interpret_publish_reply(&reply).is_err());
    }

    #[test]
    fn test_publish_unrecognized_is_low_confidence_success() {
        let reply = text_blocks("操作已受理");
        let result = interpret_publish_reply(&reply).unwrap();
        assert_eq!(result.status, "success");
        assert_eq!(result.note_id, "unknown_status");
    }

    #[test]
    fn test_publish_object_shape() {
        let reply = ToolReply::Object(json!({"note_id": "65f0a1b2c3d4"}));
        let result = interpret_publish_reply(&reply).unwrap();
        assert_eq!(result.note_id, "65f0a1b2c3d4");
    }

    #[test]
    fn test_clean_tag() {
        assert_eq!(clean_tag("#成都旅行[话题]#"), "成都旅行");
        assert_eq!(clean_tag(" #吃喝玩乐 "), "吃喝玩乐");
        assert_eq!(clean_tag("[话题]"), "");
    }

    #[test]
    fn test_qrcode_data_url_stripped() {
        let reply = ToolReply::Object(json!({
            "qrcode": "data:image/png;base64,aGVsbG8="
        }));
        assert_eq!(parse_qrcode_base64(&reply).as_deref(), Some("aGVsbG8="));
    }

    #[test]
    fn test_parse_sse_body() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"result\":{\"ok\":true}}\n\n";
        let parsed = parse_sse_body(body).unwrap();
        assert_eq!(parsed["result"]["ok"], json!(true));
    }
}
