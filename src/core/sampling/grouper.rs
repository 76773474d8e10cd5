//! 单遍在线分组
//!
//! 每个描述子依次与已有组的平均描述子比较，命中则并入该组并更新均值，
//! 否则新开一组。分组结束后 [`OnlineGrouper::finalize`] 冻结为只读的 [`Grouping`]。

use super::average::GroupAverage;
use super::config::{validate_threshold, AssignmentPolicy, SamplingConfig};
use super::descriptor::{Descriptor, DescriptorKind, FrameDescriptor};
use super::error::SamplingError;
use super::similarity::SimilarityMetric;
use log::{debug, info, warn};

/// 相似组：创建后只允许追加成员
#[derive(Debug, Clone)]
pub struct Group {
    id: usize,
    members: Vec<FrameDescriptor>,
    average: GroupAverage,
    /// 并行分组选出的中心成员（成员下标）
    medoid: Option<usize>,
}

impl Group {
    fn open(id: usize, first: FrameDescriptor) -> Self {
        let average = GroupAverage::new(&first.descriptor);
        Self {
            id,
            members: vec![first],
            average,
            medoid: None,
        }
    }

    /// 由完整成员列表构建（并行分组收尾时使用）
    pub(crate) fn from_members(
        id: usize,
        members: Vec<FrameDescriptor>,
        medoid: Option<usize>,
    ) -> Result<Self, SamplingError> {
        let average = GroupAverage::from_members(members.iter().map(|m| &m.descriptor))?;
        Ok(Self {
            id,
            members,
            average,
            medoid,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn members(&self) -> &[FrameDescriptor] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn average(&self) -> &GroupAverage {
        &self.average
    }

    /// 比较锚点：并行分组为中心成员，顺序分组为平均描述子
    pub fn representative(&self) -> &Descriptor {
        match self.medoid.and_then(|i| self.members.get(i)) {
            Some(member) => &member.descriptor,
            None => self.average.descriptor(),
        }
    }
}

/// 单个描述子的分组结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    AssignedToExisting(usize),
    NewGroupOpened(usize),
}

impl Assignment {
    pub fn group_id(&self) -> usize {
        match self {
            Assignment::AssignedToExisting(id) | Assignment::NewGroupOpened(id) => *id,
        }
    }
}

/// 在候选分数中按策略选组；分数相同时创建早的组优先
pub(crate) fn select_group<I>(scores: I, threshold: f64, policy: AssignmentPolicy) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    let mut best: Option<(usize, f64)> = None;
    for (index, score) in scores {
        if !SimilarityMetric::qualifies(score, threshold) {
            continue;
        }
        match policy {
            AssignmentPolicy::FirstQualifying => return Some((index, score)),
            AssignmentPolicy::BestQualifying => {
                if best.map_or(true, |(_, s)| score < s) {
                    best = Some((index, score));
                }
            }
        }
    }
    best
}

/// 顺序在线分组器
pub struct OnlineGrouper {
    metric: SimilarityMetric,
    threshold: f64,
    policy: AssignmentPolicy,
    groups: Vec<Group>,
    next_frame: usize,
}

impl OnlineGrouper {
    pub fn new(
        metric: SimilarityMetric,
        threshold: f64,
        policy: AssignmentPolicy,
    ) -> Result<Self, SamplingError> {
        validate_threshold(threshold)?;
        Ok(Self {
            metric,
            threshold,
            policy,
            groups: Vec::new(),
            next_frame: 0,
        })
    }

    pub fn from_config(config: &SamplingConfig) -> Result<Self, SamplingError> {
        Self::new(
            SimilarityMetric::from_config(config),
            config.similarity_threshold,
            config.assignment_policy,
        )
    }

    /// 以输入顺序编号后分组
    pub fn push(&mut self, descriptor: Descriptor) -> Assignment {
        let frame = FrameDescriptor::new(self.next_frame, descriptor);
        self.push_frame(frame)
    }

    pub fn push_frame(&mut self, frame: FrameDescriptor) -> Assignment {
        self.next_frame = self.next_frame.max(frame.frame_index + 1);

        let scores = self.groups.iter().enumerate().map(|(i, g)| {
            (i, self.metric.closeness(g.average.descriptor(), &frame.descriptor))
        });
        let candidate = select_group(scores, self.threshold, self.policy);

        if let Some((index, score)) = candidate {
            let group = &mut self.groups[index];
            match group.average.push(&frame.descriptor) {
                Ok(()) => {
                    debug!(
                        "frame {} -> group {} (score {:.4})",
                        frame.frame_index, group.id, score
                    );
                    group.members.push(frame);
                    return Assignment::AssignedToExisting(group.id);
                }
                Err(e) => {
                    // 形状不兼容：当作与所有组都不相似
                    warn!("⚠️ frame {} not comparable: {}", frame.frame_index, e);
                }
            }
        }

        let id = self.groups.len();
        debug!("frame {} opens group {}", frame.frame_index, id);
        self.groups.push(Group::open(id, frame));
        Assignment::NewGroupOpened(id)
    }

    pub fn extend<I>(&mut self, descriptors: I)
    where
        I: IntoIterator<Item = Descriptor>,
    {
        for d in descriptors {
            self.push(d);
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 输入结束，冻结分组
    pub fn finalize(self) -> Grouping {
        info!(
            "📦 grouping finished: {} frames in {} groups",
            self.next_frame,
            self.groups.len()
        );
        Grouping::new(self.groups)
    }

    /// 一次性分组整个序列
    pub fn group_all(
        config: &SamplingConfig,
        descriptors: Vec<Descriptor>,
    ) -> Result<Grouping, SamplingError> {
        let mut grouper = Self::from_config(config)?;
        grouper.extend(descriptors);
        Ok(grouper.finalize())
    }
}

/// 冻结后的分组结果（只读）
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    groups: Vec<Group>,
}

impl Grouping {
    pub(crate) fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Group::len).collect()
    }

    /// 所有组的类型（混合类型时取第一个组）
    pub fn kind(&self) -> Option<DescriptorKind> {
        self.groups.first().map(|g| g.average.kind())
    }

    /// 每帧所属的组号，按帧序号排列
    pub fn assignments(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = self
            .groups
            .iter()
            .flat_map(|g| g.members.iter().map(move |m| (m.frame_index, g.id)))
            .collect();
        pairs.sort_unstable();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampling::descriptor::BinaryMatrix;

    fn grouper(threshold: f64, policy: AssignmentPolicy) -> OnlineGrouper {
        OnlineGrouper::new(SimilarityMetric::new(1.0, 5.0, 3.0, 50), threshold, policy).unwrap()
    }

    fn v(x: f32, y: f32) -> Descriptor {
        Descriptor::Vector(vec![x, y])
    }

    fn two_clusters() -> Vec<Descriptor> {
        vec![
            v(0.0, 0.0),
            v(10.0, 10.0),
            v(0.1, 0.0),
            v(10.1, 10.0),
            v(0.0, 0.1),
        ]
    }

    #[test]
    fn test_two_obvious_clusters() {
        let mut g = grouper(0.5, AssignmentPolicy::BestQualifying);
        g.extend(two_clusters());
        let grouping = g.finalize();

        assert_eq!(grouping.len(), 2);
        assert_eq!(grouping.group_sizes(), vec![3, 2]);
        let first: Vec<usize> = grouping.groups()[0]
            .members()
            .iter()
            .map(|m| m.frame_index)
            .collect();
        assert_eq!(first, vec![0, 2, 4]);
    }

    #[test]
    fn test_state_transitions() {
        let mut g = grouper(0.5, AssignmentPolicy::BestQualifying);
        assert!(g.is_empty());
        assert_eq!(g.push(v(0.0, 0.0)), Assignment::NewGroupOpened(0));
        assert_eq!(g.push(v(0.1, 0.0)), Assignment::AssignedToExisting(0));
        assert_eq!(g.push(v(9.0, 9.0)), Assignment::NewGroupOpened(1));
        assert_eq!(g.groups().len(), 2);
    }

    #[test]
    fn test_partition_invariant() {
        let input: Vec<Descriptor> = (0..60)
            .map(|i| v((i % 7) as f32 * 0.9, (i % 3) as f32 * 2.5))
            .collect();
        let mut g = grouper(0.4, AssignmentPolicy::FirstQualifying);
        g.extend(input.clone());
        let grouping = g.finalize();

        let assignments = grouping.assignments();
        assert_eq!(assignments.len(), input.len());
        for (expected, (frame, _)) in assignments.iter().enumerate() {
            assert_eq!(*frame, expected);
        }
        assert_eq!(grouping.frame_count(), input.len());
    }

    #[test]
    fn test_best_vs_first_policy() {
        // 第二组的均值离新帧更近，但第一组也满足阈值
        let input = vec![v(0.0, 0.0), v(1.0, 0.0), v(0.8, 0.0)];

        let mut first = grouper(0.5, AssignmentPolicy::FirstQualifying);
        let mut best = grouper(0.5, AssignmentPolicy::BestQualifying);
        for g in [&mut first, &mut best] {
            // 直接建好两组，否则 0 与 1 在阈值 0.5 下会合并
            g.groups.push(Group::open(0, FrameDescriptor::new(0, input[0].clone())));
            g.groups.push(Group::open(1, FrameDescriptor::new(1, input[1].clone())));
            g.next_frame = 2;
        }

        assert_eq!(first.push(input[2].clone()), Assignment::AssignedToExisting(0));
        assert_eq!(best.push(input[2].clone()), Assignment::AssignedToExisting(1));
    }

    #[test]
    fn test_select_group_ties_prefer_earliest() {
        let scores = vec![(0, 0.3), (1, 0.2), (2, 0.2)];
        assert_eq!(
            select_group(scores.clone(), 0.5, AssignmentPolicy::BestQualifying),
            Some((1, 0.2))
        );
        assert_eq!(
            select_group(scores.clone(), 0.5, AssignmentPolicy::FirstQualifying),
            Some((0, 0.3))
        );
        assert_eq!(select_group(scores, 0.1, AssignmentPolicy::BestQualifying), None);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let input: Vec<Descriptor> = (0..40)
            .map(|i| v((i / 8) as f32 * 6.0 + (i % 8) as f32 * 0.05, 0.0))
            .collect();

        let counts: Vec<usize> = [0.05, 0.2, 0.5, 0.9]
            .iter()
            .map(|&t| {
                let mut g = grouper(t, AssignmentPolicy::BestQualifying);
                g.extend(input.clone());
                g.finalize().len()
            })
            .collect();

        // 阈值越宽松，组数不增加
        for pair in counts.windows(2) {
            assert!(pair[1] <= pair[0], "{:?}", counts);
        }
        assert_eq!(counts[2], 5);
    }

    #[test]
    fn test_determinism() {
        let input: Vec<Descriptor> = (0..50)
            .map(|i| v(((i * 37) % 11) as f32 * 0.3, ((i * 13) % 5) as f32))
            .collect();

        let run = || {
            let mut g = grouper(0.45, AssignmentPolicy::BestQualifying);
            g.extend(input.clone());
            g.finalize().assignments()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_incompatible_descriptor_opens_singleton() {
        let mut g = grouper(0.9, AssignmentPolicy::BestQualifying);
        let wide = Descriptor::Matrix(BinaryMatrix::from_rows(&[vec![0, 0]]).unwrap());
        let narrow = Descriptor::Matrix(BinaryMatrix::from_rows(&[vec![0]]).unwrap());
        let empty = Descriptor::Matrix(BinaryMatrix::new(0, 0, vec![]).unwrap());

        assert_eq!(g.push(wide.clone()), Assignment::NewGroupOpened(0));
        assert_eq!(g.push(narrow), Assignment::NewGroupOpened(1));
        assert_eq!(g.push(empty), Assignment::NewGroupOpened(2));
        assert_eq!(g.push(wide), Assignment::AssignedToExisting(0));
    }

    #[test]
    fn test_incremental_average_matches_members() {
        let mut g = grouper(0.8, AssignmentPolicy::BestQualifying);
        g.extend((0..25).map(|i| Descriptor::Embedding(vec![1.0 + i as f32 * 0.01, 2.0, 0.5])));
        let grouping = g.finalize();
        assert_eq!(grouping.len(), 1);

        let group = &grouping.groups()[0];
        let recomputed =
            GroupAverage::from_members(group.members().iter().map(|m| &m.descriptor)).unwrap();
        match (group.average().descriptor(), recomputed.descriptor()) {
            (Descriptor::Embedding(a), Descriptor::Embedding(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    assert!((x - y).abs() < 1e-5);
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_threshold() {
        let r = OnlineGrouper::new(SimilarityMetric::default(), -0.1, AssignmentPolicy::default());
        assert!(matches!(r, Err(SamplingError::InvalidParameter { .. })));
    }

    #[test]
    fn test_empty_input() {
        let grouping = OnlineGrouper::group_all(&SamplingConfig::default(), vec![]).unwrap();
        assert!(grouping.is_empty());
        assert_eq!(grouping.kind(), None);
    }
}
