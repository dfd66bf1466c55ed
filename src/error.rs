use thiserror::Error;

use crate::domain::id::{AccountId, ProductId, UserId};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Business-rule failures.
///
/// Every operation that returns one of these has left the store untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("user {user_id} not found")]
    UserNotFound { user_id: UserId },

    #[error("product {product} not found")]
    ProductNotFound { product: String },

    #[error("account '{username}' already exists")]
    AccountAlreadyExists { username: String },

    #[error("invalid username or password")]
    IncorrectPassword,

    #[error("token not valid")]
    InvalidToken,

    #[error("not enough money: need {required}, have {available}")]
    NotEnoughMoney { required: i64, available: i64 },

    #[error("tried to buy {requested} units, but only {available} are in stock")]
    OutOfStock { requested: i64, available: i64 },

    #[error("tried to sell {requested} units, but only {available} are in inventory")]
    NotInInventory { requested: i64, available: i64 },

    #[error("amount must be positive, got {amount}")]
    InvalidAmount { amount: i64 },
}

impl ExchangeError {
    pub(crate) fn product_not_found(id: ProductId) -> Self {
        Self::ProductNotFound {
            product: id.to_string(),
        }
    }
}

/// Error categories, for callers that dispatch on kind rather than variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UserNotFound,
    ProductNotFound,
    AccountAlreadyExists,
    IncorrectPassword,
    InvalidToken,
    NotEnoughMoney,
    OutOfStock,
    NotInInventory,
    InvalidAmount,
    /// Store busy or unreachable; the operation had no effect and may be retried.
    Unavailable,
    /// A stored invariant does not hold (e.g. a stocked product without a price).
    Invariant,
    Config,
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database busy: {0}")]
    Busy(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("no price record for product {product_id}")]
    MissingPrice { product_id: ProductId },

    #[error("account {account_id} has no user row")]
    OrphanAccount { account_id: AccountId },

    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Exchange(e) => match e {
                ExchangeError::UserNotFound { .. } => ErrorKind::UserNotFound,
                ExchangeError::ProductNotFound { .. } => ErrorKind::ProductNotFound,
                ExchangeError::AccountAlreadyExists { .. } => ErrorKind::AccountAlreadyExists,
                ExchangeError::IncorrectPassword => ErrorKind::IncorrectPassword,
                ExchangeError::InvalidToken => ErrorKind::InvalidToken,
                ExchangeError::NotEnoughMoney { .. } => ErrorKind::NotEnoughMoney,
                ExchangeError::OutOfStock { .. } => ErrorKind::OutOfStock,
                ExchangeError::NotInInventory { .. } => ErrorKind::NotInInventory,
                ExchangeError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            },
            Error::Connection(_) | Error::Busy(_) => ErrorKind::Unavailable,
            Error::MissingPrice { .. } | Error::OrphanAccount { .. } => ErrorKind::Invariant,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) | Error::Database(_) | Error::InvalidState(_) => ErrorKind::Internal,
        }
    }

    /// True when the failure is transient and the same call may succeed later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// The business-rule failure, if this is one.
    #[must_use]
    pub fn as_exchange(&self) -> Option<&ExchangeError> {
        match self {
            Error::Exchange(e) => Some(e),
            _ => None,
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::DatabaseErrorKind;

        match &err {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::Unknown, info)
                if is_busy_message(info.message()) =>
            {
                Error::Busy(info.message().to_string())
            }
            _ => Error::Database(err.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for Error {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Error::Connection(err.to_string())
    }
}

fn is_busy_message(message: &str) -> bool {
    message.contains("database is locked") || message.contains("database is busy")
}
