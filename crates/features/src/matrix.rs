use crate::error::{FeatureError, Result};

/// Dense row-major feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(FeatureError::Shape {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(FeatureError::ColumnMismatch {
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.cols + j]
    }

    pub fn column(&self, j: usize) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().skip(j).step_by(self.cols.max(1)).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn select_columns(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(self.rows * indices.len());
        for i in 0..self.rows {
            let row = self.row(i);
            data.extend(indices.iter().map(|&j| row[j]));
        }
        Matrix {
            rows: self.rows,
            cols: indices.len(),
            data,
        }
    }

    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Matrix {
            rows: indices.len(),
            cols: self.cols,
            data,
        }
    }

    /// Applies `f(column, value)` to every element.
    pub fn map_columns(&self, f: impl Fn(usize, f32) -> f32) -> Matrix {
        let cols = self.cols.max(1);
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(idx, &v)| f(idx % cols, v))
            .collect();
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_rows_and_columns() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.select_columns(&[2, 0]).as_slice(), &[3.0, 1.0, 6.0, 4.0]);
        assert_eq!(m.select_rows(&[1]).as_slice(), &[4.0, 5.0, 6.0]);
        assert_eq!(m.column(1).collect::<Vec<_>>(), vec![2.0, 5.0]);
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::ColumnMismatch {
                expected: 2,
                found: 1
            }
        ));
    }
}
