use sea_orm::DbErr;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("{what} must be between {min} and {max}, got {value}")]
  OutOfRange { what: &'static str, value: f64, min: f64, max: f64 },

  #[error(
    "level {level} percentage {value}% exceeds level {} ({previous}%)",
    .level.saturating_sub(1)
  )]
  ExceedsPreviousLevel { level: u32, value: f64, previous: f64 },

  #[error(
    "level {level} percentage {value}% is below level {} ({next}%)",
    .level.saturating_add(1)
  )]
  BelowNextLevel { level: u32, value: f64, next: f64 },

  #[error("reward level {0} not found")]
  LevelNotFound(u32),

  #[error("affiliate tree {0} not found")]
  TreeNotFound(i64),

  #[error("cycle in parent links at wallet {0}")]
  CycleDetected(i64),

  #[error("backend rejected the update: {0}")]
  Persistence(String),

  #[error("backend API error: {0}")]
  Api(String),

  #[error("invalid arguments: {0}")]
  InvalidArgs(String),

  #[error("database error: {0}")]
  Database(#[from] DbErr),
}

impl Error {
  /// Text shown to an operator when a request is rejected.
  pub fn user_message(&self) -> String {
    match self {
      Error::OutOfRange { what, min, max, .. } => {
        format!("{what} must be between {min} and {max}")
      }
      Error::ExceedsPreviousLevel { level, previous, .. } => format!(
        "Level {level} cannot pay more than level {} ({previous}%)",
        level.saturating_sub(1)
      ),
      Error::BelowNextLevel { level, next, .. } => format!(
        "Level {level} cannot pay less than level {} ({next}%)",
        level.saturating_add(1)
      ),
      Error::LevelNotFound(level) => format!("Level {level} does not exist"),
      Error::TreeNotFound(id) => format!("Affiliate tree {id} not found"),
      Error::CycleDetected(wallet) => {
        format!("Affiliate tree is corrupted: wallet {wallet} is its own ancestor")
      }
      Error::Persistence(msg) => format!("Update failed: {msg}"),
      Error::Api(_) => "Backend is unavailable, try again later".into(),
      Error::InvalidArgs(msg) => msg.clone(),
      Error::Database(_) => "Internal error".into(),
    }
  }

  /// Wraps a failed backend write.
  pub fn into_persistence(self) -> Self {
    match self {
      Error::Api(msg) => Error::Persistence(msg),
      other @ Error::Persistence(_) => other,
      other => Error::Persistence(other.to_string()),
    }
  }

  /// Validation failures are rejected before any write is attempted.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Error::OutOfRange { .. }
        | Error::ExceedsPreviousLevel { .. }
        | Error::BelowNextLevel { .. }
        | Error::InvalidArgs(_)
    )
  }
}
