//! Crate-wide error type shared by the acquisition pipeline, balance
//! sources, price sources and the record store.

#[derive(Debug)]
pub enum Error {
    /// Config file could not be read, parsed or validated.
    Config(String),
    /// The pipeline ran with zero configured wallets.
    NoWallets,
    /// Network-level failure (connect, timeout, TLS) from reqwest.
    Transport(reqwest::Error),
    /// Non-success HTTP status; body text kept for context.
    Http {
        context: String,
        status: u16,
        body: String,
    },
    /// A response arrived but its payload did not match the expected shape.
    Decode { context: String, detail: String },
    /// The price resolver exhausted every source with symbols still unpriced.
    PricesUnresolved(Vec<String>),
    /// SQLite failure from the record store.
    Store(sqlx::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::NoWallets => write!(f, "No wallets configured"),
            Error::Transport(err) => write!(f, "Transport error: {}", err),
            Error::Http {
                context,
                status,
                body,
            } => write!(f, "{}: unexpected status {}: {}", context, status, body),
            Error::Decode { context, detail } => {
                write!(f, "{}: failed to decode response: {}", context, detail)
            }
            Error::PricesUnresolved(tokens) => {
                write!(f, "Prices unresolved for tokens {}", tokens.join(", "))
            }
            Error::Store(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            Error::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err)
    }
}
