//! 随机工具模块
//!
//! 提供基于日期的确定性随机数生成：同一天内多次检查得到同一个发布时间

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// 随机工具类
pub struct RandomHelper;

impl RandomHelper {
    /// 获取指定日期的随机种子
    ///
    /// 对日期字符串做稳定哈希，取前4字节作为整数种子，
    /// 确保每天的随机数是确定的
    pub fn daily_seed(date: NaiveDate) -> u32 {
        let date_str = date.format("%Y-%m-%d").to_string();
        let digest = Sha256::digest(date_str.as_bytes());
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }

    /// 获取今天的随机种子
    pub fn today_seed() -> u32 {
        Self::daily_seed(Local::now().date_naive())
    }

    /// 用当天种子构造确定性随机数生成器
    pub fn daily_rng(date: NaiveDate) -> StdRng {
        StdRng::seed_from_u64(Self::daily_seed(date) as u64)
    }

    /// 获取时间窗口内的随机时间
    ///
    /// 使用当天的种子，确保每天的随机时间是固定的
    ///
    /// # 参数
    /// - `start_time`: 开始时间字符串，如 "08:00"
    /// - `end_time`: 结束时间字符串，如 "10:00"
    /// - `date`: 日期
    pub fn random_time_in_window(
        start_time: &str,
        end_time: &str,
        date: NaiveDate,
    ) -> Option<DateTime<Local>> {
        let start_minutes = parse_hhmm(start_time)?;
        let end_minutes = parse_hhmm(end_time)?;
        if end_minutes < start_minutes {
            return None;
        }

        let mut rng = Self::daily_rng(date);
        let minutes = rng.gen_range(start_minutes..=end_minutes);
        let second = rng.gen_range(0u32..=59);

        let hour = minutes / 60;
        let minute = minutes % 60;

        date.and_hms_opt(hour, minute, second)
            .and_then(|naive| Local.from_local_datetime(&naive).single())
    }

    /// 判断当前是否应该执行
    ///
    /// 检查当前时间是否等于今天的随机时间（精确到分钟）。
    /// 触发进程若没有在这一分钟内被调起，当天跳过
    pub fn should_run_now(start_time: &str, end_time: &str) -> bool {
        let now = Local::now();
        let Some(target) = Self::random_time_in_window(start_time, end_time, now.date_naive())
        else {
            return false;
        };

        now.year() == target.year()
            && now.month() == target.month()
            && now.day() == target.day()
            && now.hour() == target.hour()
            && now.minute() == target.minute()
    }
}

/// 解析 "HH:MM" 为分钟数
fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.trim().parse().ok()?;
    let minute: u32 = m.trim().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_seed_deterministic() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 18).unwrap();
        let a = RandomHelper::daily_seed(date);
        let b = RandomHelper::daily_seed(date);
        assert_eq!(a, b);

        // 不同日期应产生不同种子
        let other = NaiveDate::from_ymd_opt(2025, 12, 19).unwrap();
        assert_ne!(a, RandomHelper::daily_seed(other));
    }

    #[test]
    fn test_random_time_deterministic_within_day() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let t1 = RandomHelper::random_time_in_window("08:00", "10:00", date).unwrap();
        let t2 = RandomHelper::random_time_in_window("08:00", "10:00", date).unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_random_time_within_window() {
        // 多个日期都应落在窗口内
        for day in 1..=28 {
            let date = NaiveDate::from_ymd_opt(2026, 2, day).unwrap();
            let t = RandomHelper::random_time_in_window("08:00", "10:00", date).unwrap();
            let minutes = t.hour() * 60 + t.minute();
            assert!((480..=600).contains(&minutes), "第{}天超出窗口: {}", day, t);
        }
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("08:00"), Some(480));
        assert_eq!(parse_hhmm("23:59"), Some(1439));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("abc"), None);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(RandomHelper::random_time_in_window("10:00", "08:00", date).is_none());
    }
}
