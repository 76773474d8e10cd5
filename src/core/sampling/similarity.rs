//! 描述子相似度度量
//!
//! 三种描述子统一输出 [0, 1] 区间的"接近度"分数：越小越相似，
//! 分组时统一使用 `score < threshold` 判定。

use super::config::SamplingConfig;
use super::descriptor::{BinaryMatrix, Descriptor};

/// 无法比较（类型或宽度不一致）时返回的最差分数
pub const WORST_CLOSENESS: f64 = 1.0;

/// 嵌入向量分数的下界
const EMBEDDING_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMetric {
    /// 向量类型：距离的 sigmoid 缩放
    vector_distance_scale: f64,
    /// 嵌入类型：sigmoid 陡度
    embedding_alpha: f64,
    /// 矩阵类型：保留距离 <= ratio * 最小距离 的匹配
    match_ratio: f64,
    /// 矩阵类型：参与平均的最佳匹配数
    top_k_matches: usize,
}

impl SimilarityMetric {
    pub fn new(
        vector_distance_scale: f64,
        embedding_alpha: f64,
        match_ratio: f64,
        top_k_matches: usize,
    ) -> Self {
        Self {
            vector_distance_scale,
            embedding_alpha,
            match_ratio,
            top_k_matches,
        }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(
            config.vector_distance_scale,
            config.embedding_alpha,
            config.match_ratio,
            config.top_k_matches,
        )
    }

    /// 比较两个描述子；形状不兼容时返回 [`WORST_CLOSENESS`]
    pub fn closeness(&self, a: &Descriptor, b: &Descriptor) -> f64 {
        self.try_closeness(a, b).unwrap_or(WORST_CLOSENESS)
    }

    /// 比较两个描述子；形状不兼容时返回 `None`
    pub fn try_closeness(&self, a: &Descriptor, b: &Descriptor) -> Option<f64> {
        match (a, b) {
            (Descriptor::Vector(x), Descriptor::Vector(y)) => {
                vector_closeness(x, y, self.vector_distance_scale)
            }
            (Descriptor::Embedding(x), Descriptor::Embedding(y)) => {
                embedding_closeness(x, y, self.embedding_alpha)
            }
            (Descriptor::Matrix(x), Descriptor::Matrix(y)) => {
                matrix_closeness(x, y, self.match_ratio, self.top_k_matches)
            }
            _ => None,
        }
    }

    /// 分组判定：三种类型共用同一个比较方向
    pub fn qualifies(score: f64, threshold: f64) -> bool {
        score < threshold
    }
}

impl Default for SimilarityMetric {
    fn default() -> Self {
        Self::from_config(&SamplingConfig::default())
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// 2·sigmoid(x) - 1，x >= 0 时落在 [0, 1)
fn bounded_sigmoid(x: f64) -> f64 {
    (x / 2.0).tanh()
}

fn vector_closeness(a: &[f32], b: &[f32], scale: f64) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let distance = euclidean_distance(a, b);
    Some(bounded_sigmoid(distance / scale))
}

fn l2_normalized(v: &[f32]) -> Option<Vec<f32>> {
    let norm = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.iter().map(|&x| (x as f64 / norm) as f32).collect())
}

fn embedding_closeness(a: &[f32], b: &[f32], alpha: f64) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let a = l2_normalized(a)?;
    let b = l2_normalized(b)?;
    let distance = euclidean_distance(&a, &b);
    Some(EMBEDDING_FLOOR + (1.0 - EMBEDDING_FLOOR) * bounded_sigmoid(alpha * distance))
}

/// 暴力汉明匹配：query 每行找 train 中最近的一行
fn nearest_matches(query: &BinaryMatrix, train: &BinaryMatrix) -> Vec<u32> {
    query
        .iter_rows()
        .filter_map(|q| train.iter_rows().map(|t| hamming_distance(q, t)).min())
        .collect()
}

fn matrix_closeness(
    a: &BinaryMatrix,
    b: &BinaryMatrix,
    match_ratio: f64,
    top_k: usize,
) -> Option<f64> {
    if a.is_empty() || b.is_empty() || a.cols() != b.cols() {
        return None;
    }

    let mut distances = nearest_matches(a, b);
    let min_distance = *distances.iter().min()?;

    // 离群匹配过滤
    let cutoff = match_ratio * min_distance as f64;
    distances.retain(|&d| d as f64 <= cutoff);
    distances.sort_unstable();
    distances.truncate(top_k.max(1));

    let mean = distances.iter().map(|&d| d as f64).sum::<f64>() / distances.len() as f64;
    let max_distance = (a.cols() * 8) as f64;
    Some((mean / max_distance).clamp(0.0, 1.0))
}
