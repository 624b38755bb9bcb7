//! Pairwise examples from LETOR-format relevance judgements
//! (`<relevance> qid:<id> <feature>:<value> ...`).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{FeatureError, Result};
use crate::matrix::Matrix;

/// Feature ids kept by the ranking service.
pub const DEFAULT_FEATURE_IDS: [u32; 24] = [
    5, 10, 15, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70, 75, 80, 85, 90, 95, 110, 126, 127, 128,
    129, 130,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub relevance: i64,
    pub qid: u64,
    pub features: Vec<f32>,
}

/// Parses one line, keeping `feature_ids` in the given order. Missing ids read as 0.
pub fn parse_line(line: &str, line_no: usize, feature_ids: &[u32]) -> Result<Judgement> {
    let mut parts = line.split_whitespace();
    let parse_err = |column: usize, value: &str| FeatureError::Parse {
        line: line_no,
        column,
        value: value.to_string(),
    };

    let rel = parts.next().ok_or_else(|| parse_err(0, line))?;
    let relevance = rel.parse::<i64>().map_err(|_| parse_err(0, rel))?;

    let qid_field = parts.next().ok_or_else(|| parse_err(1, line))?;
    let qid = qid_field
        .strip_prefix("qid:")
        .and_then(|q| q.parse::<u64>().ok())
        .ok_or_else(|| parse_err(1, qid_field))?;

    let mut features = vec![0.0; feature_ids.len()];
    for (column, part) in parts.enumerate() {
        let (id, value) = part.split_once(':').ok_or_else(|| parse_err(column + 2, part))?;
        let id = id.parse::<u32>().map_err(|_| parse_err(column + 2, part))?;
        let value = value.parse::<f32>().map_err(|_| parse_err(column + 2, part))?;
        if let Some(slot) = feature_ids.iter().position(|&f| f == id) {
            features[slot] = value;
        }
    }

    Ok(Judgement {
        relevance,
        qid,
        features,
    })
}

pub fn read_judgements<P: AsRef<Path>>(path: P, feature_ids: &[u32]) -> Result<Vec<Judgement>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(parse_line(&line, i + 1, feature_ids)?);
    }
    Ok(out)
}

/// Pairwise difference vectors with signed labels (+1 when the first
/// document is more relevant, -1 otherwise).
#[derive(Debug, Clone)]
pub struct PairSet {
    pub features: Matrix,
    pub labels: Vec<i64>,
    /// Number of candidate pairs seen before sampling.
    pub candidates: usize,
}

/// Builds every ordered pair within a query whose relevance differs by at
/// least `min_diff`, keeping a uniform reservoir sample of `max_examples`.
pub fn build_pairs(
    judgements: &[Judgement],
    min_diff: i64,
    max_examples: usize,
    seed: u64,
) -> Result<PairSet> {
    let width = judgements.first().map_or(0, |j| j.features.len());
    let mut by_query: BTreeMap<u64, Vec<&Judgement>> = BTreeMap::new();
    for j in judgements {
        by_query.entry(j.qid).or_default().push(j);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut reservoir: Vec<(Vec<f32>, i64)> = Vec::with_capacity(max_examples);
    let mut seen = 0usize;

    for docs in by_query.values() {
        for (i, a) in docs.iter().enumerate() {
            for (j, b) in docs.iter().enumerate() {
                if i == j || (a.relevance - b.relevance).abs() < min_diff {
                    continue;
                }
                seen += 1;
                let slot = if reservoir.len() < max_examples {
                    None
                } else {
                    match rng.gen_range(0..seen) {
                        r if r < max_examples => Some(r),
                        _ => continue,
                    }
                };

                let diff: Vec<f32> = a.features.iter().zip(&b.features).map(|(x, y)| x - y).collect();
                let label = if a.relevance < b.relevance { -1 } else { 1 };
                match slot {
                    Some(r) => reservoir[r] = (diff, label),
                    None => reservoir.push((diff, label)),
                }
            }
        }
    }

    reservoir.shuffle(&mut rng);
    log::info!(
        "Kept {} of {} candidate pairs across {} queries",
        reservoir.len(),
        seen,
        by_query.len()
    );

    let labels = reservoir.iter().map(|(_, l)| *l).collect();
    let data = reservoir.into_iter().flat_map(|(f, _)| f).collect::<Vec<_>>();
    let rows = data.len() / width.max(1);
    Ok(PairSet {
        features: Matrix::new(rows, width, data)?,
        labels,
        candidates: seen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_letor_line() {
        let j = parse_line("2 qid:10 1:0.5 3:7 9:1", 1, &[3, 1, 4]).unwrap();
        assert_eq!(j.relevance, 2);
        assert_eq!(j.qid, 10);
        assert_eq!(j.features, vec![7.0, 0.5, 0.0]);
    }

    #[test]
    fn rejects_bad_qid() {
        let err = parse_line("2 q:10 1:0.5", 4, &[1]).unwrap_err();
        assert!(matches!(err, FeatureError::Parse { line: 4, column: 1, .. }));
    }

    fn doc(relevance: i64, qid: u64, f: f32) -> Judgement {
        Judgement {
            relevance,
            qid,
            features: vec![f],
        }
    }

    #[test]
    fn pairs_respect_min_diff_and_query_boundaries() {
        let docs = vec![doc(4, 1, 1.0), doc(0, 1, 0.0), doc(3, 1, 5.0), doc(0, 2, 9.0)];
        let pairs = build_pairs(&docs, 3, 100, 0).unwrap();
        // Only (4,0) and (3,0) in query 1 differ by >= 3, in both orders.
        assert_eq!(pairs.candidates, 4);
        assert_eq!(pairs.features.rows(), 4);

        let mut rows: Vec<(i64, f32)> = pairs
            .labels
            .iter()
            .zip(pairs.features.column(0))
            .map(|(l, f)| (*l, f))
            .collect();
        rows.sort_by(|a, b| a.1.total_cmp(&b.1));
        assert_eq!(rows, vec![(-1, -5.0), (-1, -1.0), (1, 1.0), (1, 5.0)]);
    }

    #[test]
    fn reservoir_caps_output() {
        let docs: Vec<Judgement> = (0..20).map(|i| doc(i % 5, 1, i as f32)).collect();
        let pairs = build_pairs(&docs, 1, 10, 3).unwrap();
        assert_eq!(pairs.features.rows(), 10);
        assert_eq!(pairs.labels.len(), 10);
        assert!(pairs.candidates > 10);
    }
}
