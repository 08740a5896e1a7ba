use std::fmt;

use tonic::{Code, Status};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Empty endpoint list")]
    NoEndpoints,
    #[error("Invalid endpoint address {addr}: {reason}")]
    InvalidAddr { addr: String, reason: String },
    #[error("Connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),
    #[error("Connection pool closed: {0}")]
    PoolClosed(String),
    #[error("Deadline exceeded")]
    DeadlineExceeded,
    #[error("Rpc error: {0}")]
    Rpc(#[from] Status),
    #[error("Worker on {0} panicked")]
    WorkerPanicked(String),
    #[error("{name} failed on all endpoints: {}", Failures(.failures))]
    AllFailed {
        name: String,
        failures: Vec<(String, Error)>,
    },
    #[error("{name} returned status code {code}")]
    Mds { name: String, code: String },
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config decode error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// 只有这几类错误会在单个 endpoint 内部重试
pub fn is_transient_status(status: &Status) -> bool {
    matches!(
        status.code(),
        Code::Unknown | Code::Unavailable | Code::DeadlineExceeded
    )
}

/// 以 `addr:error` 的形式拼接所有 endpoint 的错误，分号分隔
struct Failures<'a>(&'a Vec<(String, Error)>);

impl fmt::Display for Failures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (addr, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}:{}", addr, err)?;
        }
        Ok(())
    }
}
