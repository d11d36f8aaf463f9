#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Vector dimension mismatch: expected {expected}, got {actual}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}
impl Error {
	/// Caller mistakes as opposed to storage faults.
	pub fn is_validation(&self) -> bool {
		matches!(self, Self::DimensionMismatch { .. } | Self::InvalidArgument(_))
	}
}
