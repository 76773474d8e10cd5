use crate::core::sampling::{DescriptorKind, SamplingMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 一次采样运行的结果摘要（CLI 以 JSON 输出）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingReport {
    /// None 表示全集导出（不采样）
    pub mode: Option<SamplingMode>,
    pub kind: Option<DescriptorKind>,
    pub total_frames: usize,
    /// 只有分组模式才有
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_sizes: Vec<usize>,
    pub sampled_frames: Vec<usize>,
    /// 空样本时不写文件
    pub output: Option<PathBuf>,
}

impl SamplingReport {
    pub fn group_count(&self) -> usize {
        self.group_sizes.len()
    }

    pub fn sample_count(&self) -> usize {
        self.sampled_frames.len()
    }
}
