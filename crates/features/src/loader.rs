use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{FeatureError, Result};
use crate::matrix::Matrix;

/// How the last CSV column encodes relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelEncoding {
    /// Pairwise preference in {-1, +1}, mapped to {0, 1} by `(raw + 1) / 2`.
    #[default]
    Signed,
    /// Already binary {0, 1}; passed through.
    Binary,
}

impl LabelEncoding {
    pub fn encode(&self, raw: i64) -> Option<i64> {
        match (self, raw) {
            (LabelEncoding::Signed, -1 | 1) => Some((raw + 1).div_euclid(2)),
            (LabelEncoding::Binary, 0 | 1) => Some(raw),
            _ => None,
        }
    }

    /// Inverse of `encode` for a class index in {0, 1}.
    pub fn decode(&self, class: i64) -> i64 {
        match self {
            LabelEncoding::Signed => 2 * class - 1,
            LabelEncoding::Binary => class,
        }
    }
}

/// Feature rows plus binary class labels.
#[derive(Debug, Clone)]
pub struct LabeledData {
    pub features: Matrix,
    pub labels: Vec<i64>,
}

impl LabeledData {
    pub fn new(features: Matrix, labels: Vec<i64>) -> Result<Self> {
        if features.rows() != labels.len() {
            return Err(FeatureError::LengthMismatch {
                rows: features.rows(),
                labels: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.cols()
    }

    pub fn select_rows(&self, indices: &[usize]) -> LabeledData {
        LabeledData {
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Errors unless `other` has the same feature width.
    pub fn ensure_same_width(&self, other: &LabeledData) -> Result<()> {
        if self.n_features() != other.n_features() {
            return Err(FeatureError::ColumnMismatch {
                expected: self.n_features(),
                found: other.n_features(),
            });
        }
        Ok(())
    }
}

/// Reads a CSV whose last column is the label and all others are features.
/// A first row that does not parse as numbers is treated as a header.
pub fn load_csv<P: AsRef<Path>>(path: P, encoding: LabelEncoding) -> Result<LabeledData> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut data = Vec::new();
    let mut labels = Vec::new();
    let mut width: Option<usize> = None;

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // Blank lines are skipped by the reader, so take the line from the record.
        let line = record.position().map_or(idx + 1, |p| p.line() as usize);

        if idx == 0 && record.iter().all(|field| field.parse::<f64>().is_err()) {
            log::debug!("{}: treating first row as header", path.display());
            width = Some(record.len());
            continue;
        }

        if record.len() < 2 {
            return Err(FeatureError::ColumnMismatch {
                expected: 2,
                found: record.len(),
            });
        }
        match width {
            Some(w) if w != record.len() => {
                return Err(FeatureError::ColumnMismatch {
                    expected: w,
                    found: record.len(),
                })
            }
            _ => width = Some(record.len()),
        }

        let n_features = record.len() - 1;
        for (column, field) in record.iter().take(n_features).enumerate() {
            let value = field.parse::<f32>().map_err(|_| FeatureError::Parse {
                line,
                column,
                value: field.to_string(),
            })?;
            data.push(value);
        }

        let raw = &record[n_features];
        let label = parse_label(raw)
            .and_then(|r| encoding.encode(r))
            .ok_or_else(|| FeatureError::InvalidLabel {
                line,
                value: raw.to_string(),
            })?;
        labels.push(label);
    }

    if labels.is_empty() {
        return Err(FeatureError::EmptyInput(path.display().to_string()));
    }

    let cols = width.unwrap_or(1) - 1;
    let features = Matrix::new(labels.len(), cols, data)?;
    log::info!(
        "Loaded {} rows x {} features from {}",
        features.rows(),
        cols,
        path.display()
    );
    LabeledData::new(features, labels)
}

fn parse_label(raw: &str) -> Option<i64> {
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    (v.fract() == 0.0).then_some(v as i64)
}

/// Writes features plus a raw label column, header-less.
pub fn write_csv<P: AsRef<Path>>(path: P, features: &Matrix, raw_labels: &[i64]) -> Result<()> {
    if features.rows() != raw_labels.len() {
        return Err(FeatureError::LengthMismatch {
            rows: features.rows(),
            labels: raw_labels.len(),
        });
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for (i, label) in raw_labels.iter().enumerate() {
        let mut fields: Vec<String> = features.row(i).iter().map(|v| v.to_string()).collect();
        fields.push(label.to_string());
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn signed_labels_map_to_binary() {
        assert_eq!(LabelEncoding::Signed.encode(-1), Some(0));
        assert_eq!(LabelEncoding::Signed.encode(1), Some(1));
        // 0 is not a valid signed label even though (0 + 1) / 2 == 0.
        assert_eq!(LabelEncoding::Signed.encode(0), None);
        assert_eq!(LabelEncoding::Signed.decode(0), -1);
        assert_eq!(LabelEncoding::Binary.decode(1), 1);
        assert_eq!(LabelEncoding::Binary.encode(0), Some(0));
        assert_eq!(LabelEncoding::Binary.encode(-1), None);
    }

    #[test]
    fn loads_with_and_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let with = write(&dir, "a.csv", "f1,f2,label\n1.0,2.0,1\n3.5,-4,-1\n");
        let without = write(&dir, "b.csv", "1.0,2.0,1\n3.5,-4,-1\n");

        for path in [with, without] {
            let data = load_csv(&path, LabelEncoding::Signed).unwrap();
            assert_eq!(data.len(), 2);
            assert_eq!(data.n_features(), 2);
            assert_eq!(data.labels, vec![1, 0]);
            assert_eq!(data.features.row(1), &[3.5, -4.0]);
        }
    }

    #[test]
    fn rejects_out_of_domain_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "c.csv", "1.0,2.0,1\n1.0,2.0,2\n");
        let err = load_csv(&path, LabelEncoding::Signed).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidLabel { line: 2, .. }));
    }

    #[test]
    fn malformed_first_row_is_not_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "d.csv", "1.0,2.O,1\n3.0,4.0,-1\n");
        let err = load_csv(&path, LabelEncoding::Signed).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::Parse { line: 1, column: 1, ref value } if value == "2.O"
        ));
    }

    #[test]
    fn error_lines_count_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "e.csv", "1.0,2.0,1\n\n\n1.0,x,-1\n");
        let err = load_csv(&path, LabelEncoding::Signed).unwrap_err();
        assert!(matches!(err, FeatureError::Parse { line: 4, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_csv("/definitely/not/here.csv", LabelEncoding::Signed).unwrap_err();
        assert!(matches!(err, FeatureError::Io(_)));
    }

    #[test]
    fn width_mismatch_between_splits() {
        let dir = tempfile::tempdir().unwrap();
        let a = load_csv(write(&dir, "a.csv", "1,2,1\n"), LabelEncoding::Signed).unwrap();
        let b = load_csv(write(&dir, "b.csv", "1,2,3,1\n"), LabelEncoding::Signed).unwrap();
        assert!(matches!(
            a.ensure_same_width(&b),
            Err(FeatureError::ColumnMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let m = Matrix::from_rows(&[vec![0.5, 1.5], vec![-2.0, 3.0]]).unwrap();
        write_csv(&path, &m, &[-1, 1]).unwrap();
        let data = load_csv(&path, LabelEncoding::Signed).unwrap();
        assert_eq!(data.features, m);
        assert_eq!(data.labels, vec![0, 1]);
    }
}
