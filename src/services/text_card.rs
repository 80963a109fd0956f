//! 文字卡片生成器 - 业务能力层
//!
//! 生成纯色背景的文字卡片图片（模式2用）。
//! 字体从系统路径中探测，找不到可用字体时本次卡片模式失败。

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, FileError};

/// 卡片尺寸：3:4 竖版
const CARD_WIDTH: u32 = 1080;
const CARD_HEIGHT: u32 = 1350;
const FONT_SIZE: f32 = 80.0;
/// 行间距
const LINE_GAP: i64 = 30;
/// 左右各留 100px 边距
const MARGIN: u32 = 100;

/// 背景色方案
const BACKGROUND_COLORS: &[[u8; 3]] = &[
    [255, 245, 240], // 米白色
    [240, 248, 255], // 浅蓝色
    [255, 250, 240], // 花白色
    [245, 255, 250], // 薄荷色
    [255, 240, 245], // 淡粉色
    [240, 255, 240], // 蜜瓜绿
    [255, 248, 220], // 玉米丝色
    [230, 230, 250], // 淡紫色
    [255, 228, 225], // 浅玫瑰色
    [240, 255, 255], // 天蓝色
    [255, 250, 205], // 柠檬绸色
    [250, 240, 230], // 亚麻色
    [245, 245, 220], // 米黄色
    [255, 239, 213], // 番木瓜色
    [230, 255, 250], // 薄荷奶油色
];

/// 文字色方案（与背景形成对比）
const TEXT_COLORS: &[[u8; 3]] = &[
    [60, 60, 60],    // 深灰色
    [40, 40, 40],    // 炭灰色
    [80, 80, 80],    // 中灰色
    [70, 130, 180],  // 钢青色
    [188, 143, 143], // 玫瑰褐色
    [139, 69, 19],   // 马鞍棕色
    [85, 107, 47],   // 橄榄绿
    [72, 61, 139],   // 深板岩蓝
    [112, 128, 144], // 板岩灰
    [47, 79, 79],    // 深板岩灰
    [105, 105, 105], // 暗灰色
    [128, 0, 0],     // 栗色
    [0, 100, 0],     // 深绿色
    [25, 25, 112],   // 午夜蓝
];

/// 根据关键词添加的装饰表情（在标题中使用，不画进卡片）
static KEYWORD_EMOJIS: phf::Map<&'static str, &'static [&'static str]> = phf::phf_map! {
    "上班" => &["💼", "👔", "⏰"],
    "辞职" => &["🎉", "🆓", "✨"],
    "打工" => &["💪", "🔥", "⚡"],
    "周五" => &["🎊", "🎈", "🌟"],
    "周末" => &["🎮", "🛋️", "☕"],
    "逃离" => &["🏃", "🚀", "🌈"],
    "治愈" => &["🌿", "🌸", "💚"],
    "旅行" => &["✈️", "🗺️", "🎒"],
    "快乐" => &["😊", "🌞", "💕"],
    "值得" => &["💖", "⭐", "🌺"],
    "美好" => &["🌸", "🌼", "🦋"],
    "发呆" => &["💭", "☁️", "🌙"],
    "躺平" => &["🛌", "😴", "💤"],
    "咸鱼" => &["🐟", "😌", "🌊"],
    "梦想" => &["💫", "🌠", "✨"],
    "远方" => &["🌄", "🏔️", "🌅"],
};

/// 系统字体探测路径（需要支持中文）
const FONT_PATHS: &[&str] = &[
    "/System/Library/Fonts/PingFang.ttc",                     // macOS 苹方
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",   // macOS Arial Unicode
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",         // Linux 文泉驿
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc", // Linux Noto CJK
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",        // Linux DejaVu
    "C:\\Windows\\Fonts\\msyh.ttc",                           // Windows 微软雅黑
    "C:\\Windows\\Fonts\\simhei.ttf",                         // Windows 黑体
];

/// 文字卡片生成器
pub struct TextCardGenerator {
    output_dir: PathBuf,
    font: FontVec,
}

impl TextCardGenerator {
    /// 创建生成器并加载系统字体
    pub fn new(output_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| AppError::file_write_failed(output_dir.display().to_string(), e))?;

        let font = load_system_font()?;

        Ok(Self { output_dir, font })
    }

    /// 生成文字卡片
    ///
    /// # 参数
    /// - `text`: 文字内容（7-12字为宜，过长自动换行）
    /// - `filename`: 输出文件名
    ///
    /// # 返回
    /// 卡片图片的绝对路径
    pub fn generate_card(&self, text: &str, filename: &str) -> AppResult<PathBuf> {
        let mut rng = rand::thread_rng();
        let bg = *BACKGROUND_COLORS.choose(&mut rng).unwrap_or(&[255, 245, 240]);
        let fg = *TEXT_COLORS.choose(&mut rng).unwrap_or(&[60, 60, 60]);

        let mut canvas = RgbImage::from_pixel(CARD_WIDTH, CARD_HEIGHT, Rgb(bg));

        let scale = PxScale::from(FONT_SIZE);
        let max_width = CARD_WIDTH - MARGIN * 2;
        let lines = wrap_text_with(text, max_width, |s| text_size(scale, &self.font, s).0);

        // 垂直居中逐行绘制
        let line_height = FONT_SIZE as i64 + LINE_GAP;
        let total_height = lines.len() as i64 * line_height;
        let start_y = (CARD_HEIGHT as i64 - total_height) / 2;

        for (i, line) in lines.iter().enumerate() {
            let (text_width, _) = text_size(scale, &self.font, line);
            let x = (CARD_WIDTH as i64 - text_width as i64) / 2;
            let y = start_y + i as i64 * line_height;
            draw_text_mut(
                &mut canvas,
                Rgb(fg),
                x.max(0) as i32,
                y.max(0) as i32,
                scale,
                &self.font,
                line,
            );
        }

        let output_path = self.output_dir.join(filename);
        let dynamic = DynamicImage::ImageRgb8(canvas);
        let bytes = super::image_downloader::encode_jpeg(&dynamic, 85)?;
        std::fs::write(&output_path, &bytes)
            .map_err(|e| AppError::file_write_failed(output_path.display().to_string(), e))?;

        let abs_path = output_path
            .canonicalize()
            .unwrap_or_else(|_| output_path.clone());

        info!("✅ 文字卡片已生成: {}", abs_path.display());
        info!("   文字: {}", text);
        info!("   行数: {}", lines.len());
        info!("   背景色: RGB{:?}  文字色: RGB{:?}", bg, fg);
        info!("   文件大小: {:.1} KB", bytes.len() as f64 / 1024.0);

        Ok(abs_path)
    }

    /// 清理临时文件
    pub fn cleanup(&self) {
        debug!("清理文字卡片临时文件...");
        if let Err(e) = std::fs::remove_dir_all(&self.output_dir) {
            warn!("清理失败: {}", e);
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// 按关键词为话题挑一个装饰表情
pub fn decoration_emoji(text: &str) -> Option<&'static str> {
    let mut rng = rand::thread_rng();
    for (keyword, emojis) in KEYWORD_EMOJIS.entries() {
        if text.contains(keyword) {
            return emojis.choose(&mut rng).copied();
        }
    }
    None
}

/// 自动换行：按字符逐个累积，超宽即断行
///
/// `measure` 返回一段文字的渲染宽度（像素）
pub fn wrap_text_with<F>(text: &str, max_width: u32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> u32,
{
    if measure(text) <= max_width {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(current);
            }
            current = ch.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        vec![text.to_string()]
    } else {
        lines
    }
}

/// 从系统路径中加载第一个可用字体
fn load_system_font() -> AppResult<FontVec> {
    for path in FONT_PATHS {
        if !Path::new(path).exists() {
            continue;
        }
        match std::fs::read(path) {
            Ok(data) => match FontVec::try_from_vec_and_index(data, 0) {
                Ok(font) => {
                    info!("✅ 使用字体: {}", path);
                    return Ok(font);
                }
                Err(e) => {
                    debug!("加载字体 {} 失败: {}", path, e);
                }
            },
            Err(e) => {
                debug!("读取字体 {} 失败: {}", path, e);
            }
        }
    }

    warn!("⚠️  未找到系统字体，无法生成文字卡片");
    Err(AppError::File(FileError::FontNotFound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_short_stays_single_line() {
        let lines = wrap_text_with("短句", 880, |s| s.chars().count() as u32 * 80);
        assert_eq!(lines, vec!["短句"]);
    }

    #[test]
    fn test_wrap_text_splits_on_width() {
        // 每个字 80px，880px 一行最多 11 个字
        let text = "这是一段需要换行的比较长的文字内容共十八个字";
        let lines = wrap_text_with(text, 880, |s| s.chars().count() as u32 * 80);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.chars().count() <= 11);
        }
        // 换行后拼回去等于原文
        assert_eq!(lines.concat(), text);
    }

    #[test]
    fn test_decoration_emoji_keyword_hit() {
        // 命中关键词时一定返回该组中的某个表情
        let emoji = decoration_emoji("今天不想上班");
        assert!(emoji.is_some());
        assert!(["💼", "👔", "⏰"].contains(&emoji.unwrap()));

        assert!(decoration_emoji("无关内容").is_none());
    }

    #[test]
    fn test_palettes_nonempty() {
        assert!(!BACKGROUND_COLORS.is_empty());
        assert!(!TEXT_COLORS.is_empty());
    }

    /// 需要系统中文字体，默认忽略
    #[test]
    #[ignore]
    fn test_generate_card_real_font() {
        let dir = tempfile::tempdir().unwrap();
        let generator = TextCardGenerator::new(dir.path().join("cards")).expect("需要系统字体");
        let path = generator.generate_card("周五快乐", "text_card_01.jpg").unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), CARD_WIDTH);
        assert_eq!(img.height(), CARD_HEIGHT);
    }
}
