use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 网络错误（可重试）
    Network(NetworkError),
    /// 远程工具服务错误（回复异常/无法解析）
    RemoteService(RemoteServiceError),
    /// 校验错误（缺少必需数据，本次运行致命）
    Validation(ValidationError),
    /// 超时错误（单次调用超时）
    Timeout(TimeoutError),
    /// LLM 服务错误
    Llm(LlmError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Network(e) => write!(f, "网络错误: {}", e),
            AppError::RemoteService(e) => write!(f, "MCP服务错误: {}", e),
            AppError::Validation(e) => write!(f, "校验错误: {}", e),
            AppError::Timeout(e) => write!(f, "超时错误: {}", e),
            AppError::Llm(e) => write!(f, "LLM错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Network(e) => Some(e),
            AppError::RemoteService(e) => Some(e),
            AppError::Validation(e) => Some(e),
            AppError::Timeout(e) => Some(e),
            AppError::Llm(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 网络错误
#[derive(Debug)]
pub enum NetworkError {
    /// 请求失败（连接被拒绝等）
    RequestFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// HTTP 状态码异常
    BadStatus { url: String, status: u16 },
    /// 图片下载失败
    DownloadFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::RequestFailed { url, source } => {
                write!(f, "请求失败 ({}): {}", url, source)
            }
            NetworkError::BadStatus { url, status } => {
                write!(f, "HTTP状态异常 ({}): {}", url, status)
            }
            NetworkError::DownloadFailed { url, source } => {
                write!(f, "图片下载失败 ({}): {}", url, source)
            }
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkError::RequestFailed { source, .. }
            | NetworkError::DownloadFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            NetworkError::BadStatus { .. } => None,
        }
    }
}

/// 远程工具服务错误
///
/// 远程服务的回复没有固定契约，解析尽量降级处理；
/// 只有完全找不到任何信号时才返回 NoResult。
#[derive(Debug)]
pub enum RemoteServiceError {
    /// 工具不存在
    ToolNotFound { tool: String },
    /// 会话未建立
    NotConnected,
    /// 回复中找不到任何可用信号
    NoResult { tool: String, detail: String },
    /// 远程服务明确返回失败
    CallFailed { tool: String, message: String },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for RemoteServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteServiceError::ToolNotFound { tool } => {
                write!(f, "未找到工具: {}", tool)
            }
            RemoteServiceError::NotConnected => write!(f, "MCP客户端未连接"),
            RemoteServiceError::NoResult { tool, detail } => {
                write!(f, "工具 {} 的回复中无任何可用结果: {}", tool, detail)
            }
            RemoteServiceError::CallFailed { tool, message } => {
                write!(f, "工具 {} 调用失败: {}", tool, message)
            }
            RemoteServiceError::JsonParseFailed { source } => {
                write!(f, "JSON解析失败: {}", source)
            }
        }
    }
}

impl std::error::Error for RemoteServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RemoteServiceError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 校验错误（本次运行致命）
#[derive(Debug)]
pub enum ValidationError {
    /// 搜索无结果
    EmptySearchResults,
    /// 未获取到任何图片
    NoImages { feed_count: usize },
    /// 图片全部处理失败
    NoProcessedImages,
    /// 话题库为空
    EmptyTopicLibrary,
    /// 发布回复明确失败
    PublishRejected { message: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptySearchResults => write!(f, "小红书搜索无结果"),
            ValidationError::NoImages { feed_count } => {
                write!(
                    f,
                    "未能从小红书获取任何图片（共 {} 个帖子均无法提取图片）",
                    feed_count
                )
            }
            ValidationError::NoProcessedImages => write!(f, "未能成功处理任何图片"),
            ValidationError::EmptyTopicLibrary => write!(f, "话题库为空"),
            ValidationError::PublishRejected { message } => {
                write!(f, "发布失败: {}", message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// 超时错误
#[derive(Debug)]
pub struct TimeoutError {
    /// 超时的操作名
    pub operation: String,
    /// 超时秒数
    pub seconds: u64,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "操作 {} 超时（{}秒）", self.operation, self.seconds)
    }
}

impl std::error::Error for TimeoutError {}

/// LLM 服务错误
#[derive(Debug)]
pub enum LlmError {
    /// API 调用失败
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    EmptyContent { model: String },
    /// 返回内容无法解析出必需字段
    ContentParseFailed { detail: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ApiCallFailed { model, source } => {
                write!(f, "LLM API调用失败 (模型: {}): {}", model, source)
            }
            LlmError::EmptyContent { model } => {
                write!(f, "LLM返回内容为空 (模型: {})", model)
            }
            LlmError::ContentParseFailed { detail } => {
                write!(f, "无法从LLM返回中提取文案: {}", detail)
            }
        }
    }
}

impl std::error::Error for LlmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LlmError::ApiCallFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 未找到可用字体
    FontNotFound,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
            FileError::FontNotFound => write!(f, "未找到可用的系统字体"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            FileError::FontNotFound => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 必需环境变量不存在
    EnvVarNotFound { var_name: String },
    /// 城市配置中找不到指定城市
    CityNotFound { city: String },
    /// 城市配置为空
    EmptyCityList,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarNotFound { var_name } => {
                write!(f, "环境变量 {} 不存在", var_name)
            }
            ConfigError::CityNotFound { city } => {
                write!(f, "城市配置中找不到: {}", city)
            }
            ConfigError::EmptyCityList => write!(f, "城市配置为空"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::Timeout(TimeoutError {
                operation: err
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "http".to_string()),
                seconds: 0,
            });
        }
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| String::from("unknown"));
        AppError::Network(NetworkError::RequestFailed {
            url,
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::RemoteService(RemoteServiceError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Other(format!("图片处理失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建下载失败错误
    pub fn download_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Network(NetworkError::DownloadFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 创建超时错误
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        AppError::Timeout(TimeoutError {
            operation: operation.into(),
            seconds,
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 是否为可重试错误（网络/超时）
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Timeout(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
