/// Errors raised at the vendor boundary.
#[derive(Debug, thiserror::Error)]
pub enum HmipError {
    /// Transport failure; the supervisor retries these.
    #[error("Connection to HomematicIP cloud failed: {0}")]
    Connection(String),

    /// The cloud answered but refused the request.
    #[error("HomematicIP cloud rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode HomematicIP payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid HomematicIP URL: {0}")]
    InvalidUrl(String),
}

impl HmipError {
    /// Whether this error means the link is gone, as opposed to a refused command.
    pub fn is_connection(&self) -> bool {
        matches!(self, HmipError::Connection(_))
    }
}

impl From<reqwest::Error> for HmipError {
    fn from(e: reqwest::Error) -> Self {
        HmipError::Connection(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for HmipError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        HmipError::Connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_taxonomy() {
        assert!(HmipError::Connection("reset".into()).is_connection());
        let rejected = HmipError::Rejected {
            status: 400,
            message: "INVALID_NUMBER_PARAMETER_VALUE".into(),
        };
        assert!(!rejected.is_connection());
        assert_eq!(
            rejected.to_string(),
            "HomematicIP cloud rejected the request (400): INVALID_NUMBER_PARAMETER_VALUE"
        );
    }
}
