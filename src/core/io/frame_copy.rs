//! 把采样结果映射回原始帧图片并复制到结果目录

use super::points_file::PointsFile;
use crate::core::sampling::SamplingError;
use image::{DynamicImage, ImageOutputFormat};
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::io::Cursor;
use std::path::Path;

const JPEG_QUALITY: u8 = 90;

/// 复制统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    /// 命中的全集帧下标
    pub matched_frames: Vec<usize>,
    pub copied: usize,
    pub missing: usize,
}

/// 帧图片命名：`<prefix> (<n>).png|jpg`，n = 点下标 + first_frame_number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNaming {
    pub prefix: String,
    pub first_frame_number: usize,
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self {
            prefix: "frame".to_string(),
            first_frame_number: 0,
        }
    }
}

impl FrameNaming {
    pub fn new(prefix: impl Into<String>, first_frame_number: usize) -> Self {
        Self {
            prefix: prefix.into(),
            first_frame_number,
        }
    }

    fn source(&self, number: usize, ext: &str) -> String {
        format!("{} ({}).{}", self.prefix, number, ext)
    }

    fn target(&self, number: usize, k: usize) -> String {
        format!("{} ({}) (P{}).jpg", self.prefix, number, k)
    }
}

/// 全集中值与某个样本点完全相同的点下标（按全集顺序，每个下标最多一次）
pub fn match_sample_points(full: &PointsFile, sample: &PointsFile) -> Vec<usize> {
    full.points()
        .iter()
        .enumerate()
        .filter(|(_, point)| sample.points().iter().any(|s| s == *point))
        .map(|(i, _)| i)
        .collect()
}

/// 复制命中的帧：`<prefix> (<n>).png|jpg` -> `<prefix> (<n>) (P<k>).jpg`，PNG 重新编码为 JPEG。
/// 找不到的帧只记录，不中断。
pub fn copy_sample_frames(
    frames_dir: impl AsRef<Path>,
    result_dir: impl AsRef<Path>,
    matched_frames: &[usize],
    naming: &FrameNaming,
) -> Result<CopyReport, SamplingError> {
    let frames_dir = frames_dir.as_ref();
    let result_dir = result_dir.as_ref();
    fs::create_dir_all(result_dir)?;

    let mut report = CopyReport {
        matched_frames: matched_frames.to_vec(),
        ..Default::default()
    };

    for (k, &index) in matched_frames.iter().enumerate() {
        let number = index + naming.first_frame_number;
        let png = frames_dir.join(naming.source(number, "png"));
        let jpg = frames_dir.join(naming.source(number, "jpg"));
        let target = result_dir.join(naming.target(number, k));

        if png.exists() {
            let img = image::open(&png)?;
            fs::write(&target, encode_jpeg(&img)?)?;
        } else if jpg.exists() {
            fs::copy(&jpg, &target)?;
        } else {
            warn!("⚠️ frame {} not found in {}", number, frames_dir.display());
            report.missing += 1;
            continue;
        }
        report.copied += 1;
    }

    info!(
        "🖼️ copied {} frames to {} ({} missing)",
        report.copied,
        result_dir.display(),
        report.missing
    );
    Ok(report)
}

/// 匹配并复制
pub fn extract_and_copy_frames(
    full_points: impl AsRef<Path>,
    sample_points: impl AsRef<Path>,
    frames_dir: impl AsRef<Path>,
    result_dir: impl AsRef<Path>,
    naming: &FrameNaming,
) -> Result<CopyReport, SamplingError> {
    let full = PointsFile::read(full_points)?;
    let sample = PointsFile::read(sample_points)?;
    let matched = match_sample_points(&full, &sample);
    info!("🔎 {} of {} sample points matched", matched.len(), sample.len());
    copy_sample_frames(frames_dir, result_dir, &matched, naming)
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, SamplingError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    Ok(buffer.into_inner())
}
