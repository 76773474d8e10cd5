//! 并行分组
//!
//! 每帧的相似度计算在 rayon 线程池上并行执行，比较对象是当时可见的组代表快照；
//! 归组、插入和代表重选在同一个互斥锁内完成。
//!
//! 进入临界区的先后顺序不确定，因此多线程下分组结果不可复现（组数也可能不同），
//! 只保证每帧恰好属于一个组。需要可复现结果时使用 [`OnlineGrouper`](super::grouper::OnlineGrouper)。

use super::config::{validate_threshold, AssignmentPolicy, SamplingConfig};
use super::descriptor::{Descriptor, FrameDescriptor};
use super::error::SamplingError;
use super::grouper::{select_group, Group, Grouping};
use super::similarity::SimilarityMetric;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

struct ConcurrentGroup {
    members: Vec<FrameDescriptor>,
    /// 当前代表在 members 中的下标
    representative: usize,
}

/// 所有工作线程共享的分组状态
struct SharedGroups {
    /// 写入只在持有 `groups` 锁时发生
    representatives: RwLock<Vec<Arc<Descriptor>>>,
    groups: Mutex<Vec<ConcurrentGroup>>,
}

impl SharedGroups {
    fn new() -> Self {
        Self {
            representatives: RwLock::new(Vec::new()),
            groups: Mutex::new(Vec::new()),
        }
    }

    /// 读取当前代表快照（可能已过期，属于可接受的竞争）
    fn snapshot(&self) -> Vec<Arc<Descriptor>> {
        self.representatives
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct ConcurrentGrouper {
    metric: SimilarityMetric,
    threshold: f64,
    policy: AssignmentPolicy,
    workers: usize,
    timeout: Duration,
}

impl ConcurrentGrouper {
    pub fn new(
        metric: SimilarityMetric,
        threshold: f64,
        policy: AssignmentPolicy,
        workers: usize,
        timeout: Duration,
    ) -> Result<Self, SamplingError> {
        validate_threshold(threshold)?;
        if workers == 0 {
            return Err(SamplingError::invalid("worker_threads", "must be >= 1"));
        }
        Ok(Self {
            metric,
            threshold,
            policy,
            workers,
            timeout,
        })
    }

    pub fn from_config(config: &SamplingConfig) -> Result<Self, SamplingError> {
        Self::new(
            SimilarityMetric::from_config(config),
            config.similarity_threshold,
            config.assignment_policy,
            config.workers(),
            config.timeout(),
        )
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 并行分组整个序列；超时则放弃剩余任务并返回 [`SamplingError::Incomplete`]，
    /// 已形成的部分分组被丢弃
    pub fn run(&self, descriptors: Vec<Descriptor>) -> Result<Grouping, SamplingError> {
        self.run_frames(FrameDescriptor::enumerate(descriptors))
    }

    pub fn run_frames(&self, frames: Vec<FrameDescriptor>) -> Result<Grouping, SamplingError> {
        let total = frames.len();
        info!(
            "🧵 concurrent grouping: {} frames on {} workers",
            total, self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| SamplingError::ResourceUnavailable(format!("worker pool: {}", e)))?;

        let shared = SharedGroups::new();
        let processed = AtomicUsize::new(0);
        let abandoned = AtomicBool::new(false);
        let deadline = Instant::now() + self.timeout;

        pool.install(|| {
            frames.into_par_iter().for_each(|frame| {
                if abandoned.load(Ordering::Relaxed) {
                    return;
                }
                if Instant::now() >= deadline {
                    abandoned.store(true, Ordering::Relaxed);
                    return;
                }
                self.process_frame(&shared, frame);
                processed.fetch_add(1, Ordering::Relaxed);
            })
        });

        let processed = processed.into_inner();
        if abandoned.into_inner() || processed < total {
            warn!(
                "⏱️ concurrent grouping abandoned: {}/{} frames processed",
                processed, total
            );
            return Err(SamplingError::Incomplete { processed, total });
        }

        let groups = shared
            .groups
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let groups = groups
            .into_iter()
            .enumerate()
            .map(|(id, g)| Group::from_members(id, g.members, Some(g.representative)))
            .collect::<Result<Vec<_>, _>>()?;

        let grouping = Grouping::new(groups);
        info!(
            "📦 concurrent grouping finished: {} frames in {} groups",
            grouping.frame_count(),
            grouping.len()
        );
        Ok(grouping)
    }

    fn process_frame(&self, shared: &SharedGroups, frame: FrameDescriptor) {
        // 锁外计算相似度
        let snapshot = shared.snapshot();
        let scores = snapshot
            .iter()
            .enumerate()
            .map(|(i, rep)| (i, self.metric.closeness(rep, &frame.descriptor)));
        let candidate = select_group(scores, self.threshold, self.policy);

        let mut groups = shared.groups.lock().unwrap_or_else(PoisonError::into_inner);
        match candidate {
            Some((index, score)) => {
                debug!(
                    "frame {} -> group {} (gap {:.4})",
                    frame.frame_index,
                    index,
                    self.threshold - score
                );
                let group = &mut groups[index];
                group.members.push(frame);
                group.representative = self.elect_representative(&group.members);
                let rep = Arc::new(group.members[group.representative].descriptor.clone());
                shared
                    .representatives
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)[index] = rep;
            }
            None => {
                let rep = Arc::new(frame.descriptor.clone());
                groups.push(ConcurrentGroup {
                    members: vec![frame],
                    representative: 0,
                });
                shared
                    .representatives
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(rep);
            }
        }
    }

    /// 选出与组内其余成员平均距离最小的成员，O(n²)
    fn elect_representative(&self, members: &[FrameDescriptor]) -> usize {
        if members.len() <= 2 {
            return 0;
        }
        let mut best = (0, f64::INFINITY);
        for (i, candidate) in members.iter().enumerate() {
            let total: f64 = members
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| self.metric.closeness(&candidate.descriptor, &other.descriptor))
                .sum();
            let mean = total / (members.len() - 1) as f64;
            if mean < best.1 {
                best = (i, mean);
            }
        }
        best.0
    }
}
