//! 组代表（平均描述子）的增量维护

use super::descriptor::{BinaryMatrix, Descriptor, DescriptorKind};
use super::error::SamplingError;

/// 组内所有成员的逐元素均值，每次插入后更新
#[derive(Debug, Clone)]
pub struct GroupAverage {
    count: usize,
    state: AverageState,
    current: Descriptor,
}

#[derive(Debug, Clone)]
enum AverageState {
    /// 向量/嵌入：滑动均值（f64 累积）
    Dense { kind: DescriptorKind, mean: Vec<f64> },
    /// 矩阵：逐格求和 + 逐行计数，行数不同的成员只贡献自己拥有的行
    Matrix {
        cols: usize,
        sums: Vec<f64>,
        row_counts: Vec<usize>,
    },
}

impl GroupAverage {
    /// 单成员组的均值就是它本身
    pub fn new(first: &Descriptor) -> Self {
        let state = match first {
            Descriptor::Vector(v) | Descriptor::Embedding(v) => AverageState::Dense {
                kind: first.kind(),
                mean: v.iter().map(|&x| x as f64).collect(),
            },
            Descriptor::Matrix(m) => AverageState::Matrix {
                cols: m.cols(),
                sums: m.as_bytes().iter().map(|&b| b as f64).collect(),
                row_counts: vec![1; m.rows()],
            },
        };
        Self {
            count: 1,
            state,
            current: first.clone(),
        }
    }

    /// 全量重算（正确性基准）
    pub fn from_members<'a, I>(members: I) -> Result<Self, SamplingError>
    where
        I: IntoIterator<Item = &'a Descriptor>,
    {
        let mut iter = members.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| SamplingError::MalformedDescriptor("empty group".into()))?;

        let mut state = Self::new(first).state;
        let mut count = 1;
        for member in iter {
            Self::accumulate_sum(&mut state, member)?;
            count += 1;
        }
        if let AverageState::Dense { mean, .. } = &mut state {
            // accumulate_sum 对 Dense 累加的是总和
            let n = count as f64;
            mean.iter_mut().for_each(|m| *m /= n);
        }

        let current = Self::materialize(&state);
        Ok(Self {
            count,
            state,
            current,
        })
    }

    /// 增量插入一个成员
    pub fn push(&mut self, descriptor: &Descriptor) -> Result<(), SamplingError> {
        let group_kind = self.kind();
        let n = (self.count + 1) as f64;
        match descriptor {
            Descriptor::Vector(v) | Descriptor::Embedding(v) => {
                let AverageState::Dense { kind, mean } = &mut self.state else {
                    return Err(kind_mismatch(descriptor.kind(), group_kind));
                };
                if *kind != descriptor.kind() {
                    return Err(kind_mismatch(descriptor.kind(), group_kind));
                }
                check_len(mean.len(), v.len())?;
                for (m, &x) in mean.iter_mut().zip(v.iter()) {
                    *m += (x as f64 - *m) / n;
                }
            }
            Descriptor::Matrix(_) => Self::accumulate_sum(&mut self.state, descriptor)?,
        }
        self.count += 1;
        self.current = Self::materialize(&self.state);
        Ok(())
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.current
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn kind(&self) -> DescriptorKind {
        self.current.kind()
    }

    fn accumulate_sum(state: &mut AverageState, descriptor: &Descriptor) -> Result<(), SamplingError> {
        match (state, descriptor) {
            (AverageState::Dense { kind, mean }, Descriptor::Vector(v) | Descriptor::Embedding(v))
                if *kind == descriptor.kind() =>
            {
                check_len(mean.len(), v.len())?;
                for (m, &x) in mean.iter_mut().zip(v.iter()) {
                    *m += x as f64;
                }
                Ok(())
            }
            (
                AverageState::Matrix {
                    cols,
                    sums,
                    row_counts,
                },
                Descriptor::Matrix(m),
            ) => {
                if m.cols() != *cols {
                    return Err(SamplingError::MalformedDescriptor(format!(
                        "matrix width {} does not match group width {}",
                        m.cols(),
                        cols
                    )));
                }
                if m.rows() > row_counts.len() {
                    row_counts.resize(m.rows(), 0);
                    sums.resize(m.rows() * *cols, 0.0);
                }
                for (r, row) in m.iter_rows().enumerate() {
                    row_counts[r] += 1;
                    let base = r * *cols;
                    for (c, &b) in row.iter().enumerate() {
                        sums[base + c] += b as f64;
                    }
                }
                Ok(())
            }
            (AverageState::Dense { kind, .. }, d) => Err(kind_mismatch(d.kind(), *kind)),
            (AverageState::Matrix { .. }, d) => Err(kind_mismatch(d.kind(), DescriptorKind::Matrix)),
        }
    }

    fn materialize(state: &AverageState) -> Descriptor {
        match state {
            AverageState::Dense { kind, mean } => {
                let values = mean.iter().map(|&m| m as f32).collect();
                match kind {
                    DescriptorKind::Embedding => Descriptor::Embedding(values),
                    _ => Descriptor::Vector(values),
                }
            }
            AverageState::Matrix {
                cols,
                sums,
                row_counts,
            } => {
                let data = sums
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| {
                        let n = row_counts[i / (*cols).max(1)].max(1) as f64;
                        (s / n).round().clamp(0.0, 255.0) as u8
                    })
                    .collect();
                Descriptor::Matrix(BinaryMatrix::from_raw(row_counts.len(), *cols, data))
            }
        }
    }
}

fn kind_mismatch(got: DescriptorKind, group: DescriptorKind) -> SamplingError {
    SamplingError::MalformedDescriptor(format!(
        "cannot average {} descriptor into {} group",
        got, group
    ))
}

fn check_len(expected: usize, got: usize) -> Result<(), SamplingError> {
    if expected != got {
        return Err(SamplingError::MalformedDescriptor(format!(
            "vector length {} does not match group length {}",
            got, expected
        )));
    }
    Ok(())
}
