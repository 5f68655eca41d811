use thiserror::Error;

/// Failures of loading, uploading or exporting budget data.
#[derive(Error, Debug)]
pub enum DataError {
    /// The source could not be fetched (network, HTTP status, auth, payload).
    #[error("data source unavailable: {0}")]
    DataUnavailable(String),

    /// Required fields are absent from a source or an uploaded file.
    #[error("missing required columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// An uploaded file could not be parsed as a spreadsheet.
    #[error("uploaded file could not be read: {0}")]
    UploadUnreadable(String),

    /// The active source is read-only.
    #[error("this data source does not accept uploads")]
    AppendUnsupported,

    #[error("xlsx export failed: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),
}

impl From<reqwest::Error> for DataError {
    fn from(e: reqwest::Error) -> Self {
        DataError::DataUnavailable(e.to_string())
    }
}

impl From<calamine::XlsxError> for DataError {
    fn from(e: calamine::XlsxError) -> Self {
        DataError::UploadUnreadable(e.to_string())
    }
}
