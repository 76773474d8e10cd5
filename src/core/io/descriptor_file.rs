//! 提取器输出的描述子文本文件
//!
//! 空行分隔的块，每块一个描述子：
//! - HOG: `[v0, v1, ...]`
//! - ORB: `rows: cols: type` 头，随后一行空格分隔的两位十六进制字节（行优先）
//! - CNN: 一行或多行逗号分隔的数值，按顺序展平

use crate::core::sampling::{BinaryMatrix, Descriptor, DescriptorKind, SamplingError};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

static MATRIX_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s*:\s*(\d+)\s*:\s*(\d+)\s*$").expect("matrix header pattern")
});

/// 一个块：起始行号（1 起）与各行内容
struct Block<'a> {
    first_line: usize,
    lines: Vec<&'a str>,
}

fn split_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }
        current
            .get_or_insert_with(|| Block {
                first_line: i + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }
    blocks.extend(current);
    blocks
}

fn parse_error(line: usize, reason: impl Into<String>) -> SamplingError {
    SamplingError::Parse {
        line,
        reason: reason.into(),
    }
}

fn parse_values(line: usize, text: &str) -> Result<Vec<f32>, SamplingError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|t| {
            let t = t.trim();
            t.parse::<f32>()
                .map_err(|_| parse_error(line, format!("invalid number `{}`", t)))
        })
        .collect()
}

fn parse_vector(block: &Block) -> Result<Descriptor, SamplingError> {
    let joined = block.lines.join(" ");
    let inner = joined
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| parse_error(block.first_line, "vector block must be wrapped in [ ]"))?;
    Ok(Descriptor::Vector(parse_values(block.first_line, inner)?))
}

fn parse_matrix(block: &Block) -> Result<Descriptor, SamplingError> {
    let header = block.lines[0];
    let caps = MATRIX_HEADER
        .captures(header)
        .ok_or_else(|| parse_error(block.first_line, format!("bad matrix header `{}`", header)))?;
    let field = |i: usize| -> Result<usize, SamplingError> {
        caps[i]
            .parse()
            .map_err(|_| parse_error(block.first_line, format!("matrix header field `{}` too large", &caps[i])))
    };
    let (rows, cols, elem_type) = (field(1)?, field(2)?, field(3)?);
    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| parse_error(block.first_line, "matrix too large"))?;

    if len > 0 && elem_type != 0 {
        return Err(parse_error(
            block.first_line,
            format!("matrix element type {} is not 8-bit unsigned", elem_type),
        ));
    }

    // 容量来自实际读到的字节，不信任头部
    let mut data = Vec::new();
    for (offset, line) in block.lines.iter().enumerate().skip(1) {
        let line_no = block.first_line + offset;
        for token in line.split_whitespace() {
            let byte = u8::from_str_radix(token, 16)
                .map_err(|_| parse_error(line_no, format!("invalid hex byte `{}`", token)))?;
            data.push(byte);
        }
    }
    if data.len() != len {
        return Err(parse_error(
            block.first_line,
            format!("matrix {}x{} needs {} bytes, found {}", rows, cols, len, data.len()),
        ));
    }

    let matrix = BinaryMatrix::new(rows, cols, data)
        .map_err(|e| parse_error(block.first_line, e.to_string()))?;
    Ok(Descriptor::Matrix(matrix))
}

fn parse_embedding(block: &Block) -> Result<Descriptor, SamplingError> {
    let mut values = Vec::new();
    for (offset, line) in block.lines.iter().enumerate() {
        values.extend(parse_values(block.first_line + offset, line)?);
    }
    Ok(Descriptor::Embedding(values))
}

/// 解析整份文本，任何语法错误都在分组开始前返回
pub fn parse_descriptors(text: &str, kind: DescriptorKind) -> Result<Vec<Descriptor>, SamplingError> {
    split_blocks(text)
        .iter()
        .map(|block| match kind {
            DescriptorKind::Vector => parse_vector(block),
            DescriptorKind::Matrix => parse_matrix(block),
            DescriptorKind::Embedding => parse_embedding(block),
        })
        .collect()
}

/// 读取描述子文件；未指定类型时按文件名推断
pub fn read_descriptor_file(
    path: impl AsRef<Path>,
    kind: Option<DescriptorKind>,
) -> Result<(DescriptorKind, Vec<Descriptor>), SamplingError> {
    let path = path.as_ref();
    let kind = match kind {
        Some(kind) => kind,
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(DescriptorKind::from_file_name)
            .ok_or_else(|| {
                SamplingError::invalid(
                    "kind",
                    format!("cannot infer descriptor kind from `{}`", path.display()),
                )
            })?,
    };

    let text = fs::read_to_string(path)?;
    let descriptors = parse_descriptors(&text, kind)?;
    info!(
        "📄 loaded {} {} descriptors from {}",
        descriptors.len(),
        kind,
        path.display()
    );
    Ok((kind, descriptors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_vectors() {
        let text = "[0.5, 1.0, 2]\n\n[3, 4, 5]\n";
        let d = parse_descriptors(text, DescriptorKind::Vector).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0], Descriptor::Vector(vec![0.5, 1.0, 2.0]));
    }

    #[test]
    fn test_parse_matrices() {
        let text = "2: 3: 0\nff 00 0a 01 02 03\n\n0: 0: 5\n";
        let d = parse_descriptors(text, DescriptorKind::Matrix).unwrap();
        assert_eq!(d.len(), 2);
        match &d[0] {
            Descriptor::Matrix(m) => {
                assert_eq!(m.rows(), 2);
                assert_eq!(m.row(0), &[0xff, 0x00, 0x0a]);
                assert_eq!(m.row(1), &[1, 2, 3]);
            }
            other => panic!("unexpected {:?}", other),
        }
        // 空矩阵不检查类型
        match &d[1] {
            Descriptor::Matrix(m) => assert!(m.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_embedding_multiline() {
        let text = "0.1,0.2\n0.3,0.4\n\n\n1,2\n3,4\n";
        let d = parse_descriptors(text, DescriptorKind::Embedding).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0], Descriptor::Embedding(vec![0.1, 0.2, 0.3, 0.4]));
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_descriptors("[1, 2]\n\n[1, x]\n", DescriptorKind::Vector).unwrap_err();
        assert!(matches!(err, SamplingError::Parse { line: 3, .. }));

        let err = parse_descriptors("1: 2: 0\nff zz\n", DescriptorKind::Matrix).unwrap_err();
        assert!(matches!(err, SamplingError::Parse { line: 2, .. }));

        let err = parse_descriptors("1: 2: 5\nff 00\n", DescriptorKind::Matrix).unwrap_err();
        assert!(matches!(err, SamplingError::Parse { line: 1, .. }));

        let err = parse_descriptors("2: 2: 0\nff 00\n", DescriptorKind::Matrix).unwrap_err();
        assert!(matches!(err, SamplingError::Parse { line: 1, .. }));

        assert!(parse_descriptors("1, 2", DescriptorKind::Vector).is_err());
    }

    #[test]
    fn test_oversized_matrix_header_is_parse_error() {
        let err = parse_descriptors("4294967295: 4294967295: 0\nff\n", DescriptorKind::Matrix).unwrap_err();
        assert!(matches!(err, SamplingError::Parse { line: 1, .. }));

        let err = parse_descriptors("100000: 100000: 0\nff 00\n", DescriptorKind::Matrix).unwrap_err();
        assert!(matches!(err, SamplingError::Parse { line: 1, .. }));

        let err = parse_descriptors(
            "99999999999999999999999: 1: 0\nff\n",
            DescriptorKind::Matrix,
        )
        .unwrap_err();
        assert!(matches!(err, SamplingError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_read_file_infers_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("descritoresCNN.txt");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "1,2,3").unwrap();

        let (kind, d) = read_descriptor_file(&path, None).unwrap();
        assert_eq!(kind, DescriptorKind::Embedding);
        assert_eq!(d.len(), 1);

        let unknown = dir.path().join("frames.txt");
        fs::write(&unknown, "1,2").unwrap();
        assert!(read_descriptor_file(&unknown, None).is_err());
        assert!(read_descriptor_file(&unknown, Some(DescriptorKind::Embedding)).is_ok());
    }

    #[test]
    fn test_empty_file() {
        assert!(parse_descriptors("\n\n", DescriptorKind::Vector).unwrap().is_empty());
    }
}
