//! 飞书客户端 - 业务能力层
//!
//! 发送 Webhook 卡片通知（支持时间戳+HMAC签名）和多维表格记录。
//! 通知/记录属于尽力而为的旁路操作，失败只记日志不向上抛。

use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use chrono::{Local, TimeZone};
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{RunResult, RunStatus};
use crate::utils::RetryPolicy;

type HmacSha256 = Hmac<Sha256>;

/// 缓存的 tenant_access_token
struct CachedToken {
    token: String,
    /// Unix 秒
    expires_at: i64,
}

/// 飞书客户端
pub struct FeishuClient {
    http: reqwest::Client,
    webhook_url: String,
    webhook_secret: String,
    app_id: String,
    app_secret: String,
    base_id: String,
    table_id: Mutex<Option<String>>,
    token: Mutex<Option<CachedToken>>,
}

impl FeishuClient {
    pub fn new(config: &Config) -> Self {
        if config.feishu_webhook_url.is_empty() {
            warn!("FEISHU_WEBHOOK_URL 未设置，将跳过飞书通知");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            http,
            webhook_url: config.feishu_webhook_url.clone(),
            webhook_secret: config.feishu_webhook_secret.clone(),
            app_id: config.feishu_app_id.clone(),
            app_secret: config.feishu_app_secret.clone(),
            base_id: config.feishu_base_id.clone(),
            table_id: Mutex::new(if config.feishu_table_id.is_empty() {
                None
            } else {
                Some(config.feishu_table_id.clone())
            }),
            token: Mutex::new(None),
        }
    }

    /// 发送 Webhook 卡片消息
    ///
    /// # 参数
    /// - `title`: 卡片标题
    /// - `template`: 卡片颜色模板（blue / red 等）
    /// - `content_lines`: 内容行列表
    pub async fn send_webhook_message(
        &self,
        title: &str,
        template: &str,
        content_lines: &[String],
    ) -> AppResult<()> {
        if self.webhook_url.is_empty() {
            warn!("Webhook URL未设置，跳过发送");
            return Ok(());
        }

        let elements: Vec<Value> = content_lines
            .iter()
            .map(|line| {
                json!({
                    "tag": "div",
                    "text": { "tag": "plain_text", "content": line }
                })
            })
            .collect();

        let mut card = json!({
            "msg_type": "interactive",
            "card": {
                "header": {
                    "title": { "tag": "plain_text", "content": title },
                    "template": template
                },
                "elements": elements
            }
        });

        // 配置了密钥时附加时间戳和签名
        if !self.webhook_secret.is_empty() {
            let timestamp = Local::now().timestamp().to_string();
            let sign = generate_sign(&timestamp, &self.webhook_secret);
            card["timestamp"] = json!(timestamp);
            card["sign"] = json!(sign);
        }

        let url = self.webhook_url.clone();
        let result = RetryPolicy::notify()
            .run("飞书通知", || {
                let card = card.clone();
                let url = url.clone();
                async move {
                    let response = self.http.post(&url).json(&card).send().await?;
                    let body: Value = response.json().await?;
                    Ok(body)
                }
            })
            .await?;

        let ok = result.get("code").and_then(|v| v.as_i64()) == Some(0)
            || result.get("StatusCode").and_then(|v| v.as_i64()) == Some(0);
        if ok {
            info!("✅ 飞书通知发送成功");
        } else {
            warn!("飞书通知发送失败: {}", result);
        }

        Ok(())
    }

    /// 发送成功通知
    pub async fn send_success_notification(&self, result: &RunResult) -> AppResult<()> {
        let content_lines = vec![
            format!("标题: {}", result.title),
            "状态: ✅ 发布成功".to_string(),
            format!("笔记ID: {}", result.note_id.as_deref().unwrap_or("N/A")),
            format!(
                "耗时: {}秒",
                result
                    .duration
                    .map(|d| format!("{:.1}", d))
                    .unwrap_or_else(|| "N/A".to_string())
            ),
        ];

        self.send_webhook_message("🎉 小红书发布成功", "blue", &content_lines)
            .await
    }

    /// 发送失败通知
    ///
    /// 附带错误分类和排查建议（基于错误信息的子串启发式，不保证准确）
    pub async fn send_failure_notification(
        &self,
        ctx_city: &str,
        error: &str,
        title: &str,
        step: &str,
    ) -> AppResult<()> {
        let (category, suggestions) = classify_error(error);

        let mut content_lines = vec![
            format!("标题: {}", title),
            format!("城市: {}", ctx_city),
            "状态: ❌ 发布失败".to_string(),
            format!("失败步骤: {}", step),
            format!("错误分类: {}", category),
            format!(
                "错误信息: {}",
                crate::utils::logging::truncate_text(error, 200)
            ),
        ];
        content_lines.push("排查建议:".to_string());
        for s in suggestions {
            content_lines.push(format!("  {}", s));
        }

        self.send_webhook_message("❌ 小红书发布失败", "red", &content_lines)
            .await
    }

    /// 获取 tenant_access_token（带缓存，提前1分钟过期）
    async fn get_access_token(&self) -> Option<String> {
        if self.app_id.is_empty() || self.app_secret.is_empty() {
            return None;
        }

        let now = Local::now().timestamp();
        {
            let cached = self.token.lock().ok()?;
            if let Some(c) = cached.as_ref() {
                if now < c.expires_at {
                    return Some(c.token.clone());
                }
            }
        }

        let url = "https://open.feishu.cn/open-apis/auth/v3/tenant_access_token/internal";
        let body = json!({ "app_id": self.app_id, "app_secret": self.app_secret });

        let result: Value = match self.http.post(url).json(&body).send().await {
            Ok(resp) => match resp.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!("获取飞书access_token响应解析失败: {}", e);
                    return None;
                }
            },
            Err(e) => {
                warn!("获取飞书access_token异常: {}", e);
                return None;
            }
        };

        if result.get("code").and_then(|v| v.as_i64()) != Some(0) {
            warn!("获取飞书access_token失败: {}", result);
            return None;
        }

        let token = result
            .get("tenant_access_token")
            .and_then(|v| v.as_str())?
            .to_string();
        let expire = result.get("expire").and_then(|v| v.as_i64()).unwrap_or(7200);

        debug!("飞书access_token获取成功");
        if let Ok(mut cached) = self.token.lock() {
            *cached = Some(CachedToken {
                token: token.clone(),
                expires_at: now + expire - 60,
            });
        }

        Some(token)
    }

    /// 获取 table_id；未配置时自动取多维表格的第一个表
    async fn get_table_id(&self) -> Option<String> {
        {
            let cached = self.table_id.lock().ok()?;
            if let Some(id) = cached.as_ref() {
                return Some(id.clone());
            }
        }

        if self.base_id.is_empty() {
            return None;
        }

        let access_token = self.get_access_token().await?;
        let url = format!(
            "https://open.feishu.cn/open-apis/bitable/v1/apps/{}/tables",
            self.base_id
        );

        let result: Value = match self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .send()
            .await
        {
            Ok(resp) => resp.json().await.ok()?,
            Err(e) => {
                warn!("获取table_id异常: {}", e);
                return None;
            }
        };

        if result.get("code").and_then(|v| v.as_i64()) != Some(0) {
            warn!("获取table_id失败: {}", result);
            return None;
        }

        let first = result
            .get("data")
            .and_then(|d| d.get("items"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())?;
        let table_id = first.get("table_id").and_then(|v| v.as_str())?.to_string();

        info!("自动获取到table_id: {}", table_id);
        if let Ok(mut cached) = self.table_id.lock() {
            *cached = Some(table_id.clone());
        }
        Some(table_id)
    }

    /// 添加表格记录（按列名的扁平键值对）
    pub async fn append_table_record(&self, record: Map<String, Value>) -> AppResult<()> {
        if self.base_id.is_empty() {
            warn!("Base ID未设置，跳过表格记录");
            return Ok(());
        }

        let Some(access_token) = self.get_access_token().await else {
            warn!("无法获取access_token，跳过表格记录");
            return Ok(());
        };

        let Some(table_id) = self.get_table_id().await else {
            warn!("无法获取table_id，跳过表格记录");
            return Ok(());
        };

        let url = format!(
            "https://open.feishu.cn/open-apis/bitable/v1/apps/{}/tables/{}/records",
            self.base_id, table_id
        );

        let body = json!({ "fields": record });
        let result: Value = self
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if result.get("code").and_then(|v| v.as_i64()) == Some(0) {
            info!("✅ 飞书表格记录成功");
            Ok(())
        } else {
            warn!("飞书表格记录失败: {}", result);
            Err(AppError::Other(format!("飞书表格记录失败: {}", result)))
        }
    }
}

/// 生成飞书 Webhook 签名
///
/// 飞书的算法：以 "{timestamp}\n{secret}" 为 HMAC 密钥、空消息体
/// 计算 HmacSHA256，再 base64 编码
pub fn generate_sign(timestamp: &str, secret: &str) -> String {
    let string_to_sign = format!("{}\n{}", timestamp, secret);
    let mac = HmacSha256::new_from_slice(string_to_sign.as_bytes())
        .map(|m| m.finalize().into_bytes())
        .unwrap_or_default();
    base64::engine::general_purpose::STANDARD.encode(mac)
}

/// 错误分类：子串启发式，返回（分类名, 排查建议）
pub fn classify_error(error: &str) -> (&'static str, &'static [&'static str]) {
    let lower = error.to_lowercase();

    if error.contains("MCP") || lower.contains("session") || lower.contains("connection refused") {
        (
            "MCP服务异常",
            &[
                "1. 确认MCP服务已启动（默认 http://localhost:18060/mcp）",
                "2. 检查 XHS_MCP_URL 配置",
                "3. 尝试重启MCP服务",
            ],
        )
    } else if lower.contains("timeout") || error.contains("超时") {
        (
            "网络超时",
            &[
                "1. 检查服务器网络连接",
                "2. 确认外部服务是否可达",
                "3. 稍后重试",
            ],
        )
    } else if lower.contains("quota") || error.contains("LLM") || lower.contains("api key") {
        (
            "AI服务异常",
            &[
                "1. 检查 API Key 是否有效",
                "2. 确认账户余额/配额",
                "3. 检查模型名称配置",
            ],
        )
    } else if error.contains("图片") || lower.contains("404") || lower.contains("download") {
        (
            "图片下载失败",
            &[
                "1. 图片源可能已失效，重新运行换一批帖子",
                "2. 检查网络代理配置",
            ],
        )
    } else if lower.contains("permission") || error.contains("权限") || lower.contains("bitable") {
        (
            "飞书权限不足",
            &[
                "1. 检查应用是否开通 bitable:app 权限",
                "2. 确认表格已共享给应用",
            ],
        )
    } else if error.contains("登录") || lower.contains("login") {
        (
            "登录态失效",
            &["1. 重新运行并扫码登录", "2. 检查MCP服务的cookie状态"],
        )
    } else {
        (
            "未知错误",
            &["1. 查看完整日志定位问题", "2. 携带错误信息排查"],
        )
    }
}

/// 组装写入表格的运行记录
///
/// 日期列为当天零点的毫秒时间戳（多维表格日期字段格式）
pub fn build_run_record(ctx_city: &str, image_count: usize, result: &RunResult) -> Map<String, Value> {
    let now = Local::now();
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).single())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis());

    let is_success = result.status == RunStatus::Success;

    let mut record = Map::new();
    record.insert("日期".to_string(), json!(midnight));
    record.insert(
        "发布时间".to_string(),
        json!(result
            .publish_time
            .clone()
            .unwrap_or_else(|| now.format("%H:%M:%S").to_string())),
    );
    record.insert("标题".to_string(), json!(result.title));
    record.insert("城市".to_string(), json!(ctx_city));
    record.insert(
        "模式".to_string(),
        json!(if ctx_city == "文字卡片" { "文字卡片" } else { "旅游攻略" }),
    );
    record.insert(
        "状态".to_string(),
        json!(if is_success { "✅ 成功" } else { "❌ 失败" }),
    );
    record.insert(
        "笔记ID".to_string(),
        json!(result.note_id.as_deref().unwrap_or("N/A")),
    );
    record.insert(
        "耗时".to_string(),
        json!(result
            .duration
            .map(|d| format!("{:.1}秒", d))
            .unwrap_or_else(|| "N/A".to_string())),
    );
    record.insert("图片数".to_string(), json!(image_count));
    record.insert(
        "失败原因".to_string(),
        json!(if is_success {
            String::new()
        } else {
            crate::utils::logging::truncate_text(result.error.as_deref().unwrap_or(""), 200)
        }),
    );

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sign_deterministic() {
        // 固定时间戳和密钥下签名可复现
        let a = generate_sign("1702867200", "my-secret");
        let b = generate_sign("1702867200", "my-secret");
        assert_eq!(a, b);
        assert!(!a.is_empty());

        // 不同时间戳产生不同签名
        let c = generate_sign("1702867201", "my-secret");
        assert_ne!(a, c);
    }

    #[test]
    fn test_classify_error_categories() {
        assert_eq!(classify_error("MCP发布失败: Session with given id not found").0, "MCP服务异常");
        assert_eq!(classify_error("Request timeout after 30 seconds").0, "网络超时");
        assert_eq!(classify_error("DeepSeek API error: insufficient_quota").0, "AI服务异常");
        assert_eq!(classify_error("图片下载失败: 404 Not Found").0, "图片下载失败");
        assert_eq!(classify_error("Access denied: bitable:app permission required").0, "飞书权限不足");
        assert_eq!(classify_error("莫名其妙的错误").0, "未知错误");
    }

    #[test]
    fn test_build_run_record_failure() {
        let result = RunResult {
            status: RunStatus::Failed,
            error: Some("x".repeat(500)),
            failed_step: Some("Step 1: 搜索小红书内容".to_string()),
            title: "成都旅游攻略".to_string(),
            note_id: None,
            publish_time: None,
            duration: Some(12.34),
        };
        let record = build_run_record("成都", 6, &result);

        assert_eq!(record["状态"], json!("❌ 失败"));
        assert_eq!(record["城市"], json!("成都"));
        assert_eq!(record["图片数"], json!(6));
        assert_eq!(record["耗时"], json!("12.3秒"));
        // 失败原因限制长度
        let reason = record["失败原因"].as_str().unwrap();
        assert!(reason.chars().count() <= 203);
    }

    #[test]
    fn test_build_run_record_success_has_empty_reason() {
        let result = RunResult {
            status: RunStatus::Success,
            error: None,
            failed_step: None,
            title: "标题".to_string(),
            note_id: Some("abc".to_string()),
            publish_time: Some("09:35:42".to_string()),
            duration: Some(30.0),
        };
        let record = build_run_record("杭州", 4, &result);
        assert_eq!(record["状态"], json!("✅ 成功"));
        assert_eq!(record["失败原因"], json!(""));
        assert_eq!(record["模式"], json!("旅游攻略"));
    }
}
