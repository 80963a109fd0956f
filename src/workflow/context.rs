//! Step 0: 生成上下文
//!
//! 为当天发布生成确定性随机参数和内容选择。
//! 城市用进程随机数加权挑选；图片数量和主题用当天种子，
//! 同一天内重复运行得到相同选择。

use chrono::Local;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::{load_cities, CityConfig, RunContext, Topic};
use crate::utils::RandomHelper;

/// 生成当天的上下文
///
/// # 参数
/// - `cities_file`: 城市配置文件路径
/// - `city_override`: 指定城市（测试用），None 则加权随机选择
pub fn generate_context(cities_file: &str, city_override: Option<&str>) -> AppResult<RunContext> {
    info!("Step 0: 生成上下文");

    let cities = load_cities(cities_file)?;

    let city_config = match city_override {
        Some(name) => cities
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| {
                AppError::Config(ConfigError::CityNotFound {
                    city: name.to_string(),
                })
            })?,
        None => select_city_with_weight(&cities)?,
    };

    // 图片数量和主题用当天种子，保证当天内可复现
    let seed = RandomHelper::today_seed();
    let mut rng = RandomHelper::daily_rng(Local::now().date_naive());

    let image_count = rng.gen_range(4..=8);

    let topic = city_config
        .topics
        .choose(&mut rng)
        .cloned()
        .unwrap_or_else(Topic::general);

    let ctx = RunContext {
        city: city_config.name.clone(),
        topic,
        image_count,
        seed,
        publish_time: Local::now().format("%H:%M:%S").to_string(),
        keywords: city_config.keywords.clone(),
    };

    info!(
        "✅ 上下文生成完成: {} - {} ({}), {}张图片",
        ctx.city, ctx.topic.name, ctx.topic.topic_type, ctx.image_count
    );

    Ok(ctx)
}

/// 加权随机选择城市：high=5, medium=3, low=1
fn select_city_with_weight(cities: &[CityConfig]) -> AppResult<CityConfig> {
    let mut pool: Vec<&CityConfig> = Vec::new();
    for city in cities {
        for _ in 0..city.weight() {
            pool.push(city);
        }
    }

    pool.choose(&mut rand::thread_rng())
        .map(|c| (*c).clone())
        .ok_or(AppError::Config(ConfigError::EmptyCityList))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::city::Keywords;

    fn city(name: &str, priority: &str) -> CityConfig {
        CityConfig {
            name: name.to_string(),
            priority: priority.to_string(),
            topics: vec![],
            keywords: Keywords::default(),
        }
    }

    #[test]
    fn test_weighted_pool_respects_priority() {
        let cities = vec![city("A", "high"), city("B", "low")];
        // 多次采样，high 城市应显著占多数
        let mut a_count = 0;
        for _ in 0..200 {
            let selected = select_city_with_weight(&cities).unwrap();
            if selected.name == "A" {
                a_count += 1;
            }
        }
        assert!(a_count > 100, "high 权重城市被选 {} 次", a_count);
    }

    #[test]
    fn test_select_from_empty_fails() {
        assert!(select_city_with_weight(&[]).is_err());
    }
}
