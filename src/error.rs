pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("queue is full, not able to add the task")]
    QueueFull,

    #[error("pool is closed")]
    PoolClosed,

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    /// `QueueFull` is the only error a caller is expected to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::QueueFull)
    }
}
