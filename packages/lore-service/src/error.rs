pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Configuration error: {message}")]
	Config { message: String },
}
impl Error {
	/// Whether the caller sent something unusable, as opposed to a fault on our side.
	pub fn is_validation(&self) -> bool {
		matches!(self, Self::InvalidRequest { .. })
	}
}

impl From<lore_storage::Error> for Error {
	fn from(err: lore_storage::Error) -> Self {
		if err.is_validation() {
			return Self::InvalidRequest { message: err.to_string() };
		}

		Self::Storage { message: err.to_string() }
	}
}

impl From<lore_providers::Error> for Error {
	fn from(err: lore_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
