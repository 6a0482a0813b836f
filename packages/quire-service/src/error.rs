pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Timed out after {timeout_ms} ms during {stage}.")]
	Timeout { stage: &'static str, timeout_ms: u64 },
	#[error("Engine rebuild failed: {message}")]
	Rebuild { message: String },
	#[error("Completion failed: {message}")]
	Completion { message: String },
}

impl From<quire_domain::Error> for Error {
	fn from(err: quire_domain::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<quire_providers::Error> for Error {
	fn from(err: quire_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
