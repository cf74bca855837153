/// Errors that abort a normalization pass.
///
/// Field-level parse failures are not represented here: they degrade to a
/// disabled field on the affected record.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed payload at '{path}': {reason}")]
    MalformedPayload { path: String, reason: String },
    #[error("invalid mapping table '{provider}': {reason}")]
    InvalidMapping { provider: String, reason: String },
}

impl NormalizeError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        NormalizeError::MalformedPayload {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
