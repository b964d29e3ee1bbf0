//! Error helpers.

use worker::Response;

/// Error helper type.
#[derive(Debug)]
pub enum HfError {
    /// [`worker::Error`]
    WorkerError(worker::Error),
    /// [`hodlerfc::Error`]
    Core(hodlerfc::Error),
    /// Malformed request.
    BadRequest(String),
    /// Nothing at this path.
    NotFound(String),
    /// Missing or wrong API token.
    Unauthorized,
    /// A service the worker depends on failed.
    Upstream(String),
}
impl From<worker::Error> for HfError {
    fn from(value: worker::Error) -> Self {
        Self::WorkerError(value)
    }
}
impl From<hodlerfc::Error> for HfError {
    fn from(value: hodlerfc::Error) -> Self {
        Self::Core(value)
    }
}
impl From<HfError> for worker::Error {
    fn from(value: HfError) -> Self {
        match value {
            HfError::WorkerError(worker_error) => worker_error,
            other => Self::RustError(other.to_string()),
        }
    }
}
impl std::fmt::Display for HfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkerError(worker_error) => write!(f, "Worker error: {}", worker_error),
            Self::Core(core_error) => core_error.fmt(f),
            Self::BadRequest(msg) | Self::NotFound(msg) | Self::Upstream(msg) => f.write_str(msg),
            Self::Unauthorized => f.write_str("Missing or invalid API token."),
        }
    }
}
impl HfError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        use hodlerfc::Error::*;
        match self {
            Self::WorkerError(_) => 500,
            Self::BadRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::Upstream(_) => 502,
            Self::NotFound(_) => 404,
            Self::Core(InvalidInput { .. }) => 400,
            Self::Core(NotRegistered { .. }) => 403,
            Self::Core(_) => 502,
        }
    }

    /// Convert into an error [`Response`].
    pub fn into_response(self) -> worker::Result<Response> {
        let status = self.status_code();
        if 500 <= status {
            log::error!("Request failed ({}): {}", status, self);
        }
        Response::error(self.to_string(), status)
    }
}

#[cfg(test)]
mod test {
    use hodlerfc::model::{Address, RegistrationStatus};
    use hodlerfc::Error;

    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(400, HfError::from(Error::invalid("position", "nope")).status_code());
        let not_registered = Error::NotRegistered {
            address: Address([1; 20]),
            status: RegistrationStatus::Waitlisted,
        };
        assert_eq!(403, HfError::from(not_registered).status_code());
        let feed = Error::FeedUnavailable {
            source: "503".into(),
        };
        assert_eq!(502, HfError::from(feed).status_code());
        assert_eq!(404, HfError::NotFound("no".to_owned()).status_code());
        assert_eq!(401, HfError::Unauthorized.status_code());
        assert_eq!(502, HfError::Upstream("node down".to_owned()).status_code());
    }
}
