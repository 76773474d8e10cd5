//! 帧采样器 - 分组 + 采样 + 写点文件

use super::models::SamplingReport;
use crate::core::io::{read_descriptor_file, PointsFile};
use crate::core::sampling::{
    ConcurrentGrouper, Descriptor, DescriptorKind, FrameDescriptor, GroupSampler, Grouping,
    OnlineGrouper, Sample, SamplingConfig, SamplingError, SamplingMode, SimilarityMetric,
};
use log::info;
use std::path::{Path, PathBuf};

/// 点文件输出位置：`<dir>/<stem><LABEL><n>.data`
#[derive(Debug, Clone)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub stem: String,
}

impl OutputTarget {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }
}

/// 帧采样器
///
/// ```ignore
/// let sampler = FrameSampler::create(SamplingConfig::default())?;
/// let report = sampler.sample_file(SamplingMode::Extremity, "descritoresHOG.txt", None, &target)?;
/// ```
pub struct FrameSampler {
    config: SamplingConfig,
    metric: SimilarityMetric,
    sampler: GroupSampler,
}

impl FrameSampler {
    /// 校验配置；参数非法时在任何输出之前失败
    pub fn create(config: SamplingConfig) -> Result<Self, SamplingError> {
        crate::init_logging();
        config.validate()?;
        let metric = SimilarityMetric::from_config(&config);
        let sampler = GroupSampler::from_config(&config)?;
        info!(
            "🎞️ FrameSampler: threshold {}, {}%, {}",
            config.similarity_threshold,
            config.sampling_percentage,
            if config.parallel { "parallel" } else { "sequential" }
        );
        Ok(Self {
            config,
            metric,
            sampler,
        })
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// 按配置选择顺序或并行分组
    pub fn group(&self, descriptors: Vec<Descriptor>) -> Result<Grouping, SamplingError> {
        if self.config.parallel {
            ConcurrentGrouper::from_config(&self.config)?.run(descriptors)
        } else {
            OnlineGrouper::group_all(&self.config, descriptors)
        }
    }

    /// 只采样不写文件；分组模式同时返回分组结果
    pub fn sample(
        &self,
        mode: SamplingMode,
        descriptors: Vec<Descriptor>,
    ) -> Result<(Sample, Option<Grouping>), SamplingError> {
        match mode {
            SamplingMode::Extremity => {
                let grouping = self.group(descriptors)?;
                let sample = self.sampler.sample_grouping(&grouping, &self.metric);
                Ok((sample, Some(grouping)))
            }
            SamplingMode::Random => {
                let frames = FrameDescriptor::enumerate(descriptors);
                Ok((self.sampler.sample_random(&frames), None))
            }
            SamplingMode::Cadence => {
                let frames = FrameDescriptor::enumerate(descriptors);
                Ok((self.sampler.sample_cadence(&frames), None))
            }
        }
    }

    /// 采样并写点文件
    pub fn sample_to_file(
        &self,
        mode: SamplingMode,
        descriptors: Vec<Descriptor>,
        target: &OutputTarget,
    ) -> Result<SamplingReport, SamplingError> {
        let total_frames = descriptors.len();
        let kind = descriptors.first().map(Descriptor::kind);
        let (sample, grouping) = self.sample(mode, descriptors)?;

        let output = write_points(
            &PointsFile::from_descriptors(sample.descriptors()),
            kind,
            target,
        )?;
        Ok(SamplingReport {
            mode: Some(mode),
            kind,
            total_frames,
            group_sizes: grouping.map(|g| g.group_sizes()).unwrap_or_default(),
            sampled_frames: sample.frame_indices(),
            output,
        })
    }

    /// 读描述子文件后采样
    pub fn sample_file(
        &self,
        mode: SamplingMode,
        input: impl AsRef<Path>,
        kind: Option<DescriptorKind>,
        target: &OutputTarget,
    ) -> Result<SamplingReport, SamplingError> {
        let (kind, descriptors) = read_descriptor_file(input, kind)?;
        let mut report = self.sample_to_file(mode, descriptors, target)?;
        report.kind = Some(kind);
        Ok(report)
    }

    /// 全集导出：每个描述子都写入点文件，用于之后把样本映射回帧号
    pub fn full_set(
        &self,
        descriptors: Vec<Descriptor>,
        target: &OutputTarget,
    ) -> Result<SamplingReport, SamplingError> {
        let kind = descriptors.first().map(Descriptor::kind);
        let output = write_points(&PointsFile::from_descriptors(&descriptors), kind, target)?;
        Ok(SamplingReport {
            mode: None,
            kind,
            total_frames: descriptors.len(),
            group_sizes: Vec::new(),
            sampled_frames: (0..descriptors.len()).collect(),
            output,
        })
    }
}

fn write_points(
    points: &PointsFile,
    kind: Option<DescriptorKind>,
    target: &OutputTarget,
) -> Result<Option<PathBuf>, SamplingError> {
    match kind {
        Some(kind) => points.write_unique(&target.dir, &target.stem, kind),
        None => Ok(None),
    }
}
