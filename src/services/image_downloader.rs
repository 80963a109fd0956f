//! 图片下载和处理 - 业务能力层
//!
//! 从小红书下载图片，去除水印（固定比例裁剪底部），调整到平台
//! 接受的尺寸范围并控制文件大小。处理类失败一律降级用原图，
//! 只有下载失败才向上传播。

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::utils::RetryPolicy;

/// 平台图片尺寸要求：1000-4096，宽高比 0.5-2.0，大小 ≤5MB
const MAX_EDGE: u32 = 2048;
const MIN_EDGE: u32 = 1000;
const MAX_BYTES: usize = 5 * 1024 * 1024;
const JPEG_QUALITY: u8 = 90;
/// 超出大小限制后只降一次质量，仍超则接受
const JPEG_QUALITY_FALLBACK: u8 = 80;

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// 图片下载器
///
/// 持有临时目录，发布完成后统一清理
pub struct ImageDownloader {
    http: reqwest::Client,
    output_dir: PathBuf,
    policy: RetryPolicy,
}

impl ImageDownloader {
    /// 创建下载器并准备临时目录
    pub fn new(output_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| AppError::file_write_failed(output_dir.display().to_string(), e))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Ok(Self {
            http,
            output_dir,
            policy: RetryPolicy::network(),
        })
    }

    /// 下载图片到临时目录
    ///
    /// 仅连接/超时错误重试；其他失败立即传播
    pub async fn download_image(&self, url: &str, filename: &str) -> AppResult<PathBuf> {
        info!("下载图片: {}...", crate::utils::logging::truncate_text(url, 50));

        let bytes = self
            .policy
            .run("下载图片", || async {
                let response = self
                    .http
                    .get(url)
                    .header("User-Agent", USER_AGENT)
                    .send()
                    .await
                    .map_err(|e| classify_download_error(url, e))?;

                let status = response.status();
                if !status.is_success() {
                    // 4xx/5xx 不属于连接问题，直接失败
                    return Err(AppError::Other(format!(
                        "图片下载失败 ({}): HTTP {}",
                        url, status
                    )));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| classify_download_error(url, e))?;
                Ok(bytes)
            })
            .await?;

        let output_path = self.output_dir.join(filename);
        std::fs::write(&output_path, &bytes)
            .map_err(|e| AppError::file_write_failed(output_path.display().to_string(), e))?;

        info!("✅ 已保存: {}", output_path.display());
        Ok(output_path)
    }

    /// 去除水印（简单裁剪底部10%）
    ///
    /// 不做水印检测，只按固定比例裁剪；任何处理错误都返回原图
    pub fn remove_watermark(&self, image_path: &Path) -> PathBuf {
        debug!("去除水印: {}", image_path.display());

        match self.crop_and_save(image_path) {
            Ok(path) => {
                debug!("✅ 水印已去除: {}", path.display());
                path
            }
            Err(e) => {
                warn!("去除水印失败: {}，使用原图", e);
                image_path.to_path_buf()
            }
        }
    }

    fn crop_and_save(&self, image_path: &Path) -> AppResult<PathBuf> {
        let img = image::open(image_path)?;
        let cropped = crop_watermark_strip(&img);

        let output_path = suffixed_path(image_path, "_no_watermark");
        let bytes = encode_jpeg(&cropped, 95)?;
        std::fs::write(&output_path, bytes)
            .map_err(|e| AppError::file_write_failed(output_path.display().to_string(), e))?;
        Ok(output_path)
    }

    /// 调整图片尺寸以符合平台要求，并控制文件大小
    ///
    /// 任何处理错误都返回原图
    pub fn resize_for_platform(&self, image_path: &Path) -> PathBuf {
        debug!("调整图片尺寸: {}", image_path.display());

        match self.resize_and_save(image_path) {
            Ok((path, w, h)) => {
                info!("✅ 尺寸已调整: {}x{}", w, h);
                path
            }
            Err(e) => {
                warn!("调整尺寸失败: {}，使用原图", e);
                image_path.to_path_buf()
            }
        }
    }

    fn resize_and_save(&self, image_path: &Path) -> AppResult<(PathBuf, u32, u32)> {
        let img = image::open(image_path)?;
        let (new_width, new_height) = plan_resize(img.width(), img.height());

        let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);

        let mut bytes = encode_jpeg(&resized, JPEG_QUALITY)?;
        if bytes.len() > MAX_BYTES {
            debug!(
                "文件 {:.1}MB 超出限制，降低质量重编码",
                bytes.len() as f64 / 1024.0 / 1024.0
            );
            bytes = encode_jpeg(&resized, JPEG_QUALITY_FALLBACK)?;
            // 降一次质量后仍超限则按现状接受
        }

        let output_path = suffixed_path(image_path, "_resized");
        std::fs::write(&output_path, bytes)
            .map_err(|e| AppError::file_write_failed(output_path.display().to_string(), e))?;
        Ok((output_path, new_width, new_height))
    }

    /// 下载并处理图片（完整流程：下载 → 去水印 → 调整尺寸）
    ///
    /// # 参数
    /// - `url`: 图片URL
    /// - `index`: 图片序号（从1开始，用于文件命名）
    pub async fn download_and_process(&self, url: &str, index: usize) -> AppResult<PathBuf> {
        let filename = format!("image_{:02}.jpg", index);
        let local_path = self.download_image(url, &filename).await?;

        let no_watermark_path = self.remove_watermark(&local_path);
        let final_path = self.resize_for_platform(&no_watermark_path);

        Ok(final_path)
    }

    /// 清理临时文件
    pub fn cleanup(&self) {
        info!("清理临时图片文件...");
        match std::fs::remove_dir_all(&self.output_dir) {
            Ok(()) => info!("✅ 临时文件已清理"),
            Err(e) => warn!("清理失败: {}", e),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// 下载错误分类：连接/超时可重试，其余立即传播
fn classify_download_error(url: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::timeout(url, 30)
    } else if e.is_connect() {
        AppError::download_failed(url, e)
    } else {
        AppError::Other(format!("图片下载失败 ({}): {}", url, e))
    }
}

/// 裁掉底部10%（平台水印通常压在底部）
pub fn crop_watermark_strip(img: &DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let crop_height = ((height as f64) * 0.9) as u32;
    if crop_height == 0 {
        return img.clone();
    }
    img.crop_imm(0, 0, width, crop_height)
}

/// 计算目标尺寸
///
/// 长边压到 2048 以内保持宽高比，再把低于 1000 的边抬到下限
/// （第二次抬升按比例重算另一边，可能把长边顶出上限，接受）
pub fn plan_resize(width: u32, height: u32) -> (u32, u32) {
    let ratio = width as f64 / height as f64;

    let (mut new_width, mut new_height) = if ratio > 1.0 {
        let w = width.min(MAX_EDGE);
        (w, ((w as f64) / ratio) as u32)
    } else {
        let h = height.min(MAX_EDGE);
        (((h as f64) * ratio) as u32, h)
    };

    if new_width < MIN_EDGE {
        new_width = MIN_EDGE;
        new_height = ((new_width as f64) / ratio) as u32;
    }
    if new_height < MIN_EDGE {
        new_height = MIN_EDGE;
        new_width = ((new_height as f64) * ratio) as u32;
    }

    (new_width.max(1), new_height.max(1))
}

/// JPEG 编码（JPEG 不支持透明通道，先转 RGB）
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> AppResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(out)
}

/// 在扩展名前插入后缀："a/b.jpg" + "_resized" → "a/b_resized.jpg"
fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("jpg");
    path.with_file_name(format!("{}{}.{}", stem, suffix, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_plan_resize_upscales_to_floor() {
        // 小于平台下限的图被抬升到下限
        assert_eq!(plan_resize(500, 500), (1000, 1000));
        assert_eq!(plan_resize(800, 1600), (1000, 2000));
    }

    #[test]
    fn test_plan_resize_caps_long_edge() {
        assert_eq!(plan_resize(4000, 2000), (2048, 1024));
        assert_eq!(plan_resize(2000, 4000), (1024, 2048));
    }

    #[test]
    fn test_plan_resize_within_envelope_unchanged() {
        assert_eq!(plan_resize(1500, 1200), (1500, 1200));
    }

    #[test]
    fn test_plan_resize_second_clamp_may_exceed_cap() {
        // 抬升短边后长边可能越过上限，按设计接受
        let (w, h) = plan_resize(3000, 1200);
        assert_eq!(h, 1000);
        assert!(w > MAX_EDGE);
    }

    #[test]
    fn test_crop_watermark_strip_fraction() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 200));
        let cropped = crop_watermark_strip(&img);
        assert_eq!(cropped.width(), 100);
        assert_eq!(cropped.height(), 180);
    }

    #[test]
    fn test_encode_jpeg_small_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        let bytes = encode_jpeg(&img, JPEG_QUALITY).unwrap();
        assert!(!bytes.is_empty());
        // JPEG 魔数
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_suffixed_path() {
        let path = Path::new("temp_images/image_01.jpg");
        assert_eq!(
            suffixed_path(path, "_resized"),
            PathBuf::from("temp_images/image_01_resized.jpg")
        );
    }

    #[test]
    fn test_cleanup_removes_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("imgs");
        let downloader = ImageDownloader::new(&sub).unwrap();
        std::fs::write(sub.join("a.jpg"), b"fake").unwrap();

        downloader.cleanup();
        assert!(!sub.exists());
    }

    #[test]
    fn test_process_local_image_end_to_end() {
        // 本地走完 裁剪→缩放→编码，不经过网络
        let dir = tempfile::tempdir().unwrap();
        let downloader = ImageDownloader::new(dir.path().join("imgs")).unwrap();

        let src = downloader.output_dir().join("image_01.jpg");
        let img = DynamicImage::ImageRgb8(RgbImage::new(1200, 1600));
        let bytes = encode_jpeg(&img, 90).unwrap();
        std::fs::write(&src, bytes).unwrap();

        let no_wm = downloader.remove_watermark(&src);
        assert!(no_wm.to_string_lossy().contains("_no_watermark"));

        let final_path = downloader.resize_for_platform(&no_wm);
        assert!(final_path.to_string_lossy().contains("_resized"));

        let result = image::open(&final_path).unwrap();
        // 1200x1600 → 裁剪后 1200x1440 → 保持比例，两边都在下限之上
        assert!(result.width() >= MIN_EDGE && result.height() >= MIN_EDGE);
    }

    #[test]
    fn test_remove_watermark_degrades_on_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = ImageDownloader::new(dir.path().join("imgs")).unwrap();

        let bad = downloader.output_dir().join("broken.jpg");
        std::fs::write(&bad, b"not an image").unwrap();

        // 处理失败返回原路径
        assert_eq!(downloader.remove_watermark(&bad), bad);
        assert_eq!(downloader.resize_for_platform(&bad), bad);
    }
}
