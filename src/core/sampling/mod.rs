pub mod average;
pub mod concurrent;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod grouper;
pub mod sampler;
pub mod similarity;

pub use average::GroupAverage;
pub use concurrent::ConcurrentGrouper;
pub use config::{AssignmentPolicy, SamplingConfig};
pub use descriptor::{BinaryMatrix, Descriptor, DescriptorKind, FrameDescriptor};
pub use error::SamplingError;
pub use grouper::{Assignment, Group, Grouping, OnlineGrouper};
pub use sampler::{sample_size, GroupSampler, Sample, SamplingMode};
pub use similarity::{SimilarityMetric, WORST_CLOSENESS};
