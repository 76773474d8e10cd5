pub mod descriptor_file;
pub mod frame_copy;
pub mod points_file;

pub use descriptor_file::{parse_descriptors, read_descriptor_file};
pub use frame_copy::{copy_sample_frames, extract_and_copy_frames, match_sample_points, CopyReport, FrameNaming};
pub use points_file::PointsFile;
