//! 一个面向多地址元数据服务集群的 rpc 客户端库
//! 同一个调用并发发往集群的所有地址，返回最先成功的结果，全部失败时返回聚合后的错误

pub use config::{ClientOption, PoolOption};
pub use context::{CallContext, CallOutcome};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use invoker::{Operation, RetryPolicy};
pub use mds::MdsClient;
pub use pool::{ConnPool, PooledConn};
pub use transport::{Connector, GrpcConnector};

pub mod config;
mod context;
mod dispatcher;
pub mod error;
mod invoker;
pub mod mds;
mod pool;
mod transport;

#[cfg(test)]
mod testing;
