pub mod report;

pub use report::SamplingReport;
