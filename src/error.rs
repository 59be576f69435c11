use thiserror::Error;

/// Errors raised while setting up a reclaimer, a queue or a shortest-path run.
///
/// Empty queues and lock contention are not errors; they surface as `None` or
/// are retried internally.
///
/// 设置回收器、队列或最短路径运行时产生的错误。
/// 空队列与锁竞争不属于错误：前者以 `None` 表示，后者在内部重试。
#[derive(Debug, Error)]
pub enum Error {
    #[error("thread id {tid} is out of range for {num_threads} participants")]
    ThreadIdOutOfRange { tid: usize, num_threads: usize },

    #[error("thread id {0} already has a live participant")]
    ParticipantInUse(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems in a textual graph description.
///
/// Line numbers are 1-based.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("missing header line `<vertices> <edges> <source>`")]
    MissingHeader,

    #[error("line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: {field} `{value}` is not a valid integer")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: vertex {vertex} is out of range for {num_vertices} vertices")]
    VertexOutOfRange {
        line: usize,
        vertex: u64,
        num_vertices: usize,
    },

    #[error("source vertex {vertex} is out of range for {num_vertices} vertices")]
    SourceOutOfRange { vertex: u64, num_vertices: usize },

    #[error("{num_vertices} vertices is more than a graph can hold")]
    TooManyVertices { num_vertices: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
