use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}, column {column}: cannot parse {value:?} as a number")]
    Parse {
        line: usize,
        column: usize,
        value: String,
    },

    #[error("line {line}: label {value} is outside the expected label domain")]
    InvalidLabel { line: usize, value: String },

    #[error("column count mismatch: expected {expected}, found {found}")]
    ColumnMismatch { expected: usize, found: usize },

    #[error("{rows} feature rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("{len} values cannot form a {rows}x{cols} matrix")]
    Shape { rows: usize, cols: usize, len: usize },

    #[error("{0} used before fit")]
    NotFitted(&'static str),

    #[error("empty input: {0}")]
    EmptyInput(String),
}

pub type Result<T> = std::result::Result<T, FeatureError>;
