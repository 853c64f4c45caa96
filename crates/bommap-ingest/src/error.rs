use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The requested header row is past the end of the sheet or contains no
    /// usable header cells.
    #[error("invalid header row {row}: {reason}")]
    InvalidHeaderRow { row: u32, reason: String },

    #[error("worksheet {0:?} not found")]
    SheetNotFound(String),

    #[error("workbook contains no worksheets")]
    EmptyWorkbook,

    #[error("unsupported source format: {0:?}")]
    UnsupportedFormat(String),

    #[error("failed to read workbook")]
    Workbook(#[from] calamine::XlsxError),

    #[error("failed to read csv data")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Model(#[from] bommap_model::ModelError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
