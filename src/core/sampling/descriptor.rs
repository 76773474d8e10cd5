use super::error::SamplingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 描述子类型（每种对应一个外部提取器）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    /// 梯度直方图向量 (HOG)
    Vector,
    /// 二值关键点矩阵 (ORB)
    Matrix,
    /// 深度网络嵌入向量 (CNN)
    Embedding,
}

impl DescriptorKind {
    /// 文件名中使用的提取器标签
    pub fn label(&self) -> &'static str {
        match self {
            DescriptorKind::Vector => "HOG",
            DescriptorKind::Matrix => "ORB",
            DescriptorKind::Embedding => "CNN",
        }
    }

    /// 根据文件名推断类型（`descritoresHOG.txt` -> Vector）
    pub fn from_file_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        [
            DescriptorKind::Vector,
            DescriptorKind::Matrix,
            DescriptorKind::Embedding,
        ]
        .into_iter()
        .find(|kind| upper.contains(kind.label()))
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 二值描述子矩阵：每行一个关键点，每列一个字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMatrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl BinaryMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<u8>) -> Result<Self, SamplingError> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            SamplingError::MalformedDescriptor(format!("matrix {}x{} is too large", rows, cols))
        })?;
        if len != data.len() {
            return Err(SamplingError::MalformedDescriptor(format!(
                "matrix {}x{} needs {} bytes, got {}",
                rows,
                cols,
                len,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// 调用方保证 rows * cols == data.len()
    pub(crate) fn from_raw(rows: usize, cols: usize, data: Vec<u8>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self { rows, cols, data }
    }

    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, SamplingError> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
            return Err(SamplingError::MalformedDescriptor(format!(
                "ragged matrix: expected rows of {} bytes, found {}",
                cols,
                bad.len()
            )));
        }
        let data = rows.iter().flatten().copied().collect();
        Self::new(rows.len(), cols, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> &[u8] {
        let start = index * self.cols;
        &self.data[start..start + self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[u8]> {
        // chunks_exact(0) panics
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

/// 单帧的视觉描述子，由外部提取器生成，进入分组器后不再修改
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Vector(Vec<f32>),
    Matrix(BinaryMatrix),
    Embedding(Vec<f32>),
}

impl Descriptor {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Descriptor::Vector(_) => DescriptorKind::Vector,
            Descriptor::Matrix(_) => DescriptorKind::Matrix,
            Descriptor::Embedding(_) => DescriptorKind::Embedding,
        }
    }

    /// 展平后的元素个数
    pub fn flat_len(&self) -> usize {
        match self {
            Descriptor::Vector(v) | Descriptor::Embedding(v) => v.len(),
            Descriptor::Matrix(m) => m.as_bytes().len(),
        }
    }

    /// 展平为 points 文件中的一行数值，不足 `width` 的部分补零。
    /// 矩阵字节按 /255 归一化。
    pub fn to_point_values(&self, width: usize) -> Vec<f32> {
        let mut values: Vec<f32> = match self {
            Descriptor::Vector(v) | Descriptor::Embedding(v) => v.clone(),
            Descriptor::Matrix(m) => m.as_bytes().iter().map(|&b| b as f32 / 255.0).collect(),
        };
        values.resize(width.max(values.len()), 0.0);
        values
    }
}

/// 带帧序号的描述子（序号即输入流中的位置）
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDescriptor {
    pub frame_index: usize,
    pub descriptor: Descriptor,
}

impl FrameDescriptor {
    pub fn new(frame_index: usize, descriptor: Descriptor) -> Self {
        Self {
            frame_index,
            descriptor,
        }
    }

    /// 按输入顺序编号
    pub fn enumerate(descriptors: Vec<Descriptor>) -> Vec<FrameDescriptor> {
        descriptors
            .into_iter()
            .enumerate()
            .map(|(i, d)| FrameDescriptor::new(i, d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(
            DescriptorKind::from_file_name("descritoresHOG.txt"),
            Some(DescriptorKind::Vector)
        );
        assert_eq!(
            DescriptorKind::from_file_name("video1_orb.txt"),
            Some(DescriptorKind::Matrix)
        );
        assert_eq!(
            DescriptorKind::from_file_name("descritoresCNN.txt"),
            Some(DescriptorKind::Embedding)
        );
        assert_eq!(DescriptorKind::from_file_name("frames.txt"), None);
    }

    #[test]
    fn test_matrix_shape_checked() {
        assert!(BinaryMatrix::new(2, 3, vec![0; 6]).is_ok());
        assert!(BinaryMatrix::new(2, 3, vec![0; 5]).is_err());
        assert!(BinaryMatrix::from_rows(&[vec![1, 2], vec![3]]).is_err());
        assert!(matches!(
            BinaryMatrix::new(usize::MAX, 2, vec![]),
            Err(SamplingError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_matrix_rows() {
        let m = BinaryMatrix::from_rows(&[vec![1, 2], vec![3, 4], vec![5, 6]]).unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.row(1), &[3, 4]);
        assert_eq!(m.iter_rows().count(), 3);

        let empty = BinaryMatrix::new(0, 0, vec![]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.iter_rows().count(), 0);
    }

    #[test]
    fn test_point_values_padded() {
        let m = BinaryMatrix::from_rows(&[vec![255, 0]]).unwrap();
        let values = Descriptor::Matrix(m).to_point_values(4);
        assert_eq!(values, vec![1.0, 0.0, 0.0, 0.0]);

        let v = Descriptor::Vector(vec![0.5, 1.5]).to_point_values(2);
        assert_eq!(v, vec![0.5, 1.5]);
    }

    #[test]
    fn test_enumerate_keeps_order() {
        let frames = FrameDescriptor::enumerate(vec![
            Descriptor::Vector(vec![1.0]),
            Descriptor::Vector(vec![2.0]),
        ]);
        assert_eq!(frames[0].frame_index, 0);
        assert_eq!(frames[1].frame_index, 1);
        assert_eq!(frames[1].descriptor, Descriptor::Vector(vec![2.0]));
    }
}
