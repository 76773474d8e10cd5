use super::config::{validate_percentage, SamplingConfig};
use super::descriptor::{Descriptor, FrameDescriptor};
use super::error::SamplingError;
use super::grouper::{Group, Grouping};
use super::similarity::SimilarityMetric;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// 采样模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// 组内按离均值距离降序（最不相似的优先）
    Extremity,
    /// 不分组，整体随机无放回抽取
    Random,
    /// 不分组，每个固定窗口取前若干帧
    Cadence,
}

/// max(1, floor(total × pct / 100))，空输入返回 0
pub fn sample_size(total: usize, percentage: f64) -> usize {
    if total == 0 {
        return 0;
    }
    let raw = (total as f64 * percentage / 100.0).floor() as usize;
    raw.clamp(1, total)
}

/// 一次采样的结果，保持选择顺序
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    mode: SamplingMode,
    frames: Vec<FrameDescriptor>,
}

impl Sample {
    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<FrameDescriptor> {
        self.frames
    }

    pub fn descriptors(&self) -> Vec<&Descriptor> {
        self.frames.iter().map(|f| &f.descriptor).collect()
    }

    pub fn frame_indices(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.frame_index).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

pub struct GroupSampler {
    percentage: f64,
    cadence_window: usize,
    seed: Option<u64>,
}

impl GroupSampler {
    pub fn new(percentage: f64, cadence_window: usize, seed: Option<u64>) -> Result<Self, SamplingError> {
        validate_percentage(percentage)?;
        if cadence_window == 0 {
            return Err(SamplingError::invalid("cadence_window", "must be >= 1"));
        }
        Ok(Self {
            percentage,
            cadence_window,
            seed,
        })
    }

    pub fn from_config(config: &SamplingConfig) -> Result<Self, SamplingError> {
        Self::new(config.sampling_percentage, config.cadence_window, config.seed)
    }

    /// 组内成员按离均值的距离降序排列，距离相同保持插入顺序
    pub fn rank_group<'a>(
        &self,
        group: &'a Group,
        metric: &SimilarityMetric,
    ) -> Vec<(&'a FrameDescriptor, f64)> {
        let anchor = group.average().descriptor();
        let mut ranked: Vec<(&FrameDescriptor, f64)> = group
            .members()
            .iter()
            .map(|m| (m, metric.closeness(anchor, &m.descriptor)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn sample_group<'a>(
        &self,
        group: &'a Group,
        metric: &SimilarityMetric,
    ) -> Vec<&'a FrameDescriptor> {
        let n = sample_size(group.len(), self.percentage);
        debug!("group {}: {} of {} frames sampled", group.id(), n, group.len());
        self.rank_group(group, metric)
            .into_iter()
            .take(n)
            .map(|(m, _)| m)
            .collect()
    }

    /// 逐组采样后按组创建顺序拼接
    pub fn sample_grouping(&self, grouping: &Grouping, metric: &SimilarityMetric) -> Sample {
        let frames = grouping
            .groups()
            .iter()
            .flat_map(|g| self.sample_group(g, metric))
            .cloned()
            .collect();
        Sample {
            mode: SamplingMode::Extremity,
            frames,
        }
    }

    pub fn sample_random(&self, frames: &[FrameDescriptor]) -> Sample {
        let n = sample_size(frames.len(), self.percentage);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..frames.len()).collect();
        order.shuffle(&mut rng);

        Sample {
            mode: SamplingMode::Random,
            frames: order.into_iter().take(n).map(|i| frames[i].clone()).collect(),
        }
    }

    pub fn sample_cadence(&self, frames: &[FrameDescriptor]) -> Sample {
        let per_window = sample_size(self.cadence_window, self.percentage);
        let frames = frames
            .chunks(self.cadence_window)
            .flat_map(|window| window.iter().take(per_window))
            .cloned()
            .collect();
        Sample {
            mode: SamplingMode::Cadence,
            frames,
        }
    }
}
