use super::error::SamplingError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 分组策略：命中第一个满足阈值的组，或命中分数最优的组
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    FirstQualifying,
    #[default]
    BestQualifying,
}

/// 采样运行配置（JSON5 文件或代码构造）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub similarity_threshold: f64,
    pub sampling_percentage: f64,
    pub assignment_policy: AssignmentPolicy,
    pub vector_distance_scale: f64,
    pub embedding_alpha: f64,
    pub match_ratio: f64,
    pub top_k_matches: usize,
    /// 固定节奏模式的窗口（30fps 下的一秒）
    pub cadence_window: usize,
    pub parallel: bool,
    /// 0 表示按 CPU 核数
    pub worker_threads: usize,
    pub timeout_secs: u64,
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            sampling_percentage: 10.0,
            assignment_policy: AssignmentPolicy::default(),
            vector_distance_scale: 1.0,
            embedding_alpha: 5.0,
            match_ratio: 3.0,
            top_k_matches: 50,
            cadence_window: 30,
            parallel: false,
            worker_threads: 0,
            timeout_secs: 600,
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn from_json5_str(text: &str) -> Result<Self, SamplingError> {
        json5::from_str(text).map_err(|e| SamplingError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SamplingError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json5_str(&text)
    }

    /// 在任何处理开始前校验参数
    pub fn validate(&self) -> Result<(), SamplingError> {
        validate_threshold(self.similarity_threshold)?;
        validate_percentage(self.sampling_percentage)?;
        if !(self.vector_distance_scale.is_finite() && self.vector_distance_scale > 0.0) {
            return Err(SamplingError::invalid(
                "vector_distance_scale",
                "must be a positive number",
            ));
        }
        if !(self.embedding_alpha.is_finite() && self.embedding_alpha > 0.0) {
            return Err(SamplingError::invalid(
                "embedding_alpha",
                "must be a positive number",
            ));
        }
        if !(self.match_ratio.is_finite() && self.match_ratio >= 1.0) {
            return Err(SamplingError::invalid("match_ratio", "must be >= 1"));
        }
        if self.top_k_matches == 0 {
            return Err(SamplingError::invalid("top_k_matches", "must be >= 1"));
        }
        if self.cadence_window == 0 {
            return Err(SamplingError::invalid("cadence_window", "must be >= 1"));
        }
        if self.timeout_secs == 0 {
            return Err(SamplingError::invalid("timeout_secs", "must be >= 1"));
        }
        Ok(())
    }

    pub fn workers(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.worker_threads
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn validate_threshold(threshold: f64) -> Result<(), SamplingError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(SamplingError::invalid(
            "similarity_threshold",
            format!("{} is outside [0, 1]", threshold),
        ));
    }
    Ok(())
}

pub fn validate_percentage(percentage: f64) -> Result<(), SamplingError> {
    if !(0.0..=100.0).contains(&percentage) {
        return Err(SamplingError::invalid(
            "sampling_percentage",
            format!("{} is outside [0, 100]", percentage),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SamplingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_json5_partial_config() {
        let cfg = SamplingConfig::from_json5_str(
            r#"{
                // 只覆盖部分字段
                similarity_threshold: 0.3,
                sampling_percentage: 25,
                assignment_policy: "first_qualifying",
                parallel: true,
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.similarity_threshold, 0.3);
        assert_eq!(cfg.sampling_percentage, 25.0);
        assert_eq!(cfg.assignment_policy, AssignmentPolicy::FirstQualifying);
        assert!(cfg.parallel);
        assert_eq!(cfg.cadence_window, 30);
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn test_bad_json5_reported() {
        let err = SamplingConfig::from_json5_str("{ similarity_threshold: }").unwrap_err();
        assert!(matches!(err, SamplingError::Config(_)));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let cfg = SamplingConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SamplingError::InvalidParameter {
                name: "similarity_threshold",
                ..
            })
        ));

        let nan = SamplingConfig {
            similarity_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_invalid_percentage_rejected() {
        let cfg = SamplingConfig {
            sampling_percentage: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SamplingError::InvalidParameter {
                name: "sampling_percentage",
                ..
            })
        ));
        assert!(validate_percentage(100.0).is_ok());
        assert!(validate_percentage(100.1).is_err());
    }

    #[test]
    fn test_workers_default_to_cpu_count() {
        let cfg = SamplingConfig::default();
        assert!(cfg.workers() >= 1);

        let fixed = SamplingConfig {
            worker_threads: 3,
            ..Default::default()
        };
        assert_eq!(fixed.workers(), 3);
    }
}
