// error.rs
// 定义调度器通用的错误类型（配置、子任务执行、队列容量、IO等）和Result类型。
use std::fmt;
use std::io;

/// 调度器通用错误类型，涵盖配置、子任务执行、队列容量、IO等错误
#[derive(Debug)]
pub enum Error {
    /// IO错误
    Io(io::Error),
    /// 配置错误（非法策略名、拓扑不匹配等），构造期致命，不会内部重试
    ConfigError(String),
    /// 子任务执行错误，作为请求级失败返回给提交线程
    SubtaskError(String),
    /// 队列容量错误（非阻塞提交路径下投递箱已满）
    QueueError(String),
    /// 其他类型错误
    Other(String),
}

/// 通用结果类型
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO错误: {}", e),
            Error::ConfigError(msg) => write!(f, "配置错误: {}", msg),
            Error::SubtaskError(msg) => write!(f, "子任务执行错误: {}", msg),
            Error::QueueError(msg) => write!(f, "队列容量错误: {}", msg),
            Error::Other(msg) => write!(f, "其他错误: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
