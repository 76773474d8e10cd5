//! 稠密点文件（`DN` 格式）
//!
//! ```text
//! DN
//! <point_count>
//! <dimensionality>
//! D0;D1;...;D<dim-1>
//! P0;v0;v1;...
//! ```

use crate::core::sampling::{Descriptor, DescriptorKind, SamplingError};
use log::info;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct PointsFile {
    dimensionality: usize,
    points: Vec<Vec<f32>>,
}

impl PointsFile {
    /// 所有描述子展平并补零到本批次最大宽度
    pub fn from_descriptors<'a, I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = &'a Descriptor>,
    {
        let descriptors: Vec<&Descriptor> = descriptors.into_iter().collect();
        let dimensionality = descriptors.iter().map(|d| d.flat_len()).max().unwrap_or(0);
        let points = descriptors
            .iter()
            .map(|d| d.to_point_values(dimensionality))
            .collect();
        Self {
            dimensionality,
            points,
        }
    }

    pub fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    pub fn points(&self) -> &[Vec<f32>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("DN\n");
        let _ = writeln!(out, "{}", self.points.len());
        let _ = writeln!(out, "{}", self.dimensionality);
        let header: Vec<String> = (0..self.dimensionality).map(|i| format!("D{}", i)).collect();
        out.push_str(&header.join(";"));
        out.push('\n');
        for (i, point) in self.points.iter().enumerate() {
            let _ = write!(out, "P{}", i);
            for v in point {
                let _ = write!(out, ";{}", v);
            }
            out.push('\n');
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self, SamplingError> {
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));
        let mut next = |what: &str| {
            lines
                .next()
                .ok_or_else(|| parse_error(0, format!("missing {}", what)))
        };

        let (line, magic) = next("DN marker")?;
        if magic != "DN" {
            return Err(parse_error(line, format!("expected `DN`, found `{}`", magic)));
        }
        let (line, count) = next("point count")?;
        let count: usize = count
            .parse()
            .map_err(|_| parse_error(line, format!("invalid point count `{}`", count)))?;
        let (line, dim) = next("dimensionality")?;
        let dimensionality: usize = dim
            .parse()
            .map_err(|_| parse_error(line, format!("invalid dimensionality `{}`", dim)))?;
        next("column header")?;

        let mut points = Vec::new();
        for (line, text) in lines {
            if text.is_empty() {
                continue;
            }
            let mut fields = text.split(';');
            let label = fields.next().unwrap_or_default();
            if label != format!("P{}", points.len()) {
                return Err(parse_error(line, format!("unexpected point label `{}`", label)));
            }
            let values = fields
                .map(|f| {
                    f.parse::<f32>()
                        .map_err(|_| parse_error(line, format!("invalid value `{}`", f)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if values.len() != dimensionality {
                return Err(parse_error(
                    line,
                    format!("expected {} values, found {}", dimensionality, values.len()),
                ));
            }
            points.push(values);
        }

        if points.len() != count {
            return Err(parse_error(
                0,
                format!("header declares {} points, found {}", count, points.len()),
            ));
        }
        Ok(Self {
            dimensionality,
            points,
        })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, SamplingError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// 写入 `<dir>/<stem><LABEL><n>.data`，n 从 1 递增直到不冲突。
    /// 空点集不写文件，返回 None。
    pub fn write_unique(
        &self,
        dir: impl AsRef<Path>,
        stem: &str,
        kind: DescriptorKind,
    ) -> Result<Option<PathBuf>, SamplingError> {
        if self.is_empty() {
            info!("🈳 empty sample, no points file written");
            return Ok(None);
        }
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = next_available_path(dir, stem, kind);
        fs::write(&path, self.render())?;
        info!("💾 {} points saved to {}", self.len(), path.display());
        Ok(Some(path))
    }
}

pub fn next_available_path(dir: &Path, stem: &str, kind: DescriptorKind) -> PathBuf {
    (1usize..)
        .map(|n| dir.join(format!("{}{}{}.data", stem, kind.label(), n)))
        .find(|p| !p.exists())
        .unwrap_or_else(|| dir.join(format!("{}{}.data", stem, kind.label())))
}

fn parse_error(line: usize, reason: impl Into<String>) -> SamplingError {
    SamplingError::Parse {
        line,
        reason: reason.into(),
    }
}
