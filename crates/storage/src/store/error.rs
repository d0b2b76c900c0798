#![forbid(unsafe_code)]

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    InvalidInput(&'static str),
    NodeNotFound {
        id: String,
    },
    VersionNotFound {
        node_id: String,
        prestige: i64,
    },
    /// A trade leg asked for more of `key` than the version holds.
    InsufficientFunds {
        node_id: String,
        key: String,
        requested: f64,
        available: f64,
    },
    InvalidState(&'static str),
    TreeDepthExceeded,
    NodeCycle,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NodeNotFound { id } => write!(f, "node not found: {id}"),
            Self::VersionNotFound { node_id, prestige } => {
                write!(f, "version not found: {node_id} prestige={prestige}")
            }
            Self::InsufficientFunds {
                node_id,
                key,
                requested,
                available,
            } => write!(
                f,
                "insufficient funds on {node_id}: key={key} requested={requested} available={available}"
            ),
            Self::InvalidState(message) => write!(f, "invalid state: {message}"),
            Self::TreeDepthExceeded => write!(f, "tree depth limit exceeded"),
            Self::NodeCycle => write!(f, "parent chain contains a cycle"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
