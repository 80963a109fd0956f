//! 城市与话题配置
//!
//! 从 TOML 配置文件加载城市列表（含主题/关键词元数据）和文字卡片话题库

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, FileError};

/// 主题（如"故宫"/"火锅"）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    /// 类型：landmark / food / drink / general
    #[serde(rename = "type")]
    pub topic_type: String,
}

impl Topic {
    pub fn general() -> Self {
        Self {
            name: "旅游攻略".to_string(),
            topic_type: "general".to_string(),
        }
    }
}

/// 城市关键词元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Keywords {
    #[serde(default)]
    pub landmarks: Vec<String>,
}

/// 单个城市配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    /// 优先级：high / medium / low
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub keywords: Keywords,
}

fn default_priority() -> String {
    "medium".to_string()
}

impl CityConfig {
    /// 加权随机选择时的权重：high=5, medium=3, low=1
    pub fn weight(&self) -> usize {
        match self.priority.as_str() {
            "high" => 5,
            "medium" => 3,
            _ => 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CitiesFile {
    cities: Vec<CityConfig>,
}

/// 文字卡片话题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTopic {
    pub text: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TextTopicsFile {
    topics: Vec<TextTopic>,
}

/// 加载城市配置
pub fn load_cities(path: impl AsRef<Path>) -> AppResult<Vec<CityConfig>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::File(FileError::ReadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    })?;

    let parsed: CitiesFile = toml::from_str(&text).map_err(|e| {
        AppError::File(FileError::TomlParseFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    })?;

    if parsed.cities.is_empty() {
        return Err(AppError::Config(crate::error::ConfigError::EmptyCityList));
    }

    Ok(parsed.cities)
}

/// 加载文字卡片话题库
pub fn load_text_topics(path: impl AsRef<Path>) -> AppResult<Vec<TextTopic>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::File(FileError::ReadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    })?;

    let parsed: TextTopicsFile = toml::from_str(&text).map_err(|e| {
        AppError::File(FileError::TomlParseFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    })?;

    if parsed.topics.is_empty() {
        return Err(AppError::Validation(
            crate::error::ValidationError::EmptyTopicLibrary,
        ));
    }

    Ok(parsed.topics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_cities_toml() {
        let text = r#"
[[cities]]
name = "成都"
priority = "high"
[[cities.topics]]
name = "宽窄巷子"
type = "landmark"
[[cities.topics]]
name = "火锅"
type = "food"
[cities.keywords]
landmarks = ["宽窄巷子", "锦里", "大熊猫基地"]

[[cities]]
name = "杭州"
"#;
        let parsed: CitiesFile = toml::from_str(text).unwrap();
        assert_eq!(parsed.cities.len(), 2);
        assert_eq!(parsed.cities[0].name, "成都");
        assert_eq!(parsed.cities[0].weight(), 5);
        assert_eq!(parsed.cities[0].topics[1].topic_type, "food");
        assert_eq!(parsed.cities[0].keywords.landmarks.len(), 3);
        // 未写 priority 时默认 medium
        assert_eq!(parsed.cities[1].weight(), 3);
    }

    #[test]
    fn test_load_cities_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[[cities]]\nname = \"北京\"\npriority = \"low\"\n"
        )
        .unwrap();

        let cities = load_cities(file.path()).unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].weight(), 1);
    }

    #[test]
    fn test_empty_city_list_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "cities = []\n").unwrap();
        assert!(load_cities(file.path()).is_err());
    }
}
