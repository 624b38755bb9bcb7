use serde::Serialize;
use std::fmt;

/// Counts indexed `[true class][predicted class]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![vec![0; num_classes]; num_classes],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    /// Out-of-range classes are ignored.
    pub fn record(&mut self, truth: usize, predicted: usize) {
        if let Some(cell) = self.counts.get_mut(truth).and_then(|row| row.get_mut(predicted)) {
            *cell += 1;
        }
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u64 {
        self.counts[truth][predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> u64 {
        (0..self.num_classes()).map(|c| self.counts[c][c]).sum()
    }

    /// Row sum: samples whose true class is `class`.
    pub fn support(&self, class: usize) -> u64 {
        self.counts[class].iter().sum()
    }

    /// Column sum: samples predicted as `class`.
    pub fn predicted(&self, class: usize) -> u64 {
        self.counts.iter().map(|row| row[class]).sum()
    }

    pub fn report(&self) -> ClassificationReport {
        ClassificationReport::from_confusion(self)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .max()
            .unwrap_or(1);
        for (i, row) in self.counts.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>width$}", c)).collect();
            let open = if i == 0 { "[[" } else { " [" };
            let close = if i + 1 == self.counts.len() { "]]" } else { "]\n" };
            write!(f, "{}{}{}", open, cells.join(" "), close)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

/// Per-class precision / recall / F1 plus macro and support-weighted averages.
/// Undefined ratios (no predictions or no support) are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let classes: Vec<ClassMetrics> = (0..cm.num_classes())
            .map(|c| {
                let tp = cm.get(c, c);
                let precision = ratio(tp, cm.predicted(c));
                let recall = ratio(tp, cm.support(c));
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    precision,
                    recall,
                    f1,
                    support: cm.support(c),
                }
            })
            .collect();

        let total = cm.total();
        let n = classes.len().max(1) as f64;
        let macro_avg = ClassMetrics {
            precision: classes.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: classes.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: classes.iter().map(|m| m.f1).sum::<f64>() / n,
            support: total,
        };
        let weighted = |get: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|m| get(m) * m.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support: total,
        };

        Self {
            accuracy: ratio(cm.correct(), total),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.macro_avg.support;
        let support_width = total.to_string().len().max(7);
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>w$}",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            w = support_width + 1
        )?;
        writeln!(f)?;
        for (class, m) in self.classes.iter().enumerate() {
            write_row(f, &class.to_string(), m, support_width)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>w$}",
            "accuracy",
            "",
            "",
            self.accuracy,
            total,
            w = support_width + 1
        )?;
        write_row(f, "macro avg", &self.macro_avg, support_width)?;
        write_row(f, "weighted avg", &self.weighted_avg, support_width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, label: &str, m: &ClassMetrics, support_width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>w$}",
        label,
        m.precision,
        m.recall,
        m.f1,
        m.support,
        w = support_width + 1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(cells: [[u64; 2]; 2]) -> ConfusionMatrix {
        let mut cm = ConfusionMatrix::new(2);
        for (t, row) in cells.iter().enumerate() {
            for (p, &count) in row.iter().enumerate() {
                for _ in 0..count {
                    cm.record(t, p);
                }
            }
        }
        cm
    }

    #[test]
    fn metrics_from_counts() {
        // rows = truth, cols = prediction
        let cm = matrix([[8, 2], [1, 9]]);
        assert_eq!(cm.total(), 20);
        assert_eq!(cm.correct(), 17);

        let r = cm.report();
        assert!((r.accuracy - 0.85).abs() < 1e-12);
        assert!((r.classes[0].precision - 8.0 / 9.0).abs() < 1e-12);
        assert!((r.classes[0].recall - 0.8).abs() < 1e-12);
        assert!((r.classes[1].precision - 9.0 / 11.0).abs() < 1e-12);
        assert!((r.classes[1].recall - 0.9).abs() < 1e-12);
        assert_eq!(r.classes[1].support, 10);
        let expected_f1 = 2.0 * 0.9 * (9.0 / 11.0) / (0.9 + 9.0 / 11.0);
        assert!((r.classes[1].f1 - expected_f1).abs() < 1e-12);
    }

    #[test]
    fn empty_class_yields_zero_not_nan() {
        let cm = matrix([[5, 0], [0, 0]]);
        let r = cm.report();
        assert_eq!(r.classes[1].precision, 0.0);
        assert_eq!(r.classes[1].recall, 0.0);
        assert_eq!(r.classes[1].f1, 0.0);
        assert_eq!(r.weighted_avg.precision, 1.0);
    }

    #[test]
    fn confusion_matrix_display() {
        let cm = matrix([[12, 3], [0, 7]]);
        assert_eq!(cm.to_string(), "[[12  3]\n [ 0  7]]");
    }

    #[test]
    fn report_lists_every_class() {
        let text = matrix([[3, 1], [1, 3]]).report().to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
        assert!(text.lines().any(|l| l.trim_start().starts_with("accuracy")));
    }
}
