//! 元数据服务客户端
//! 每个方法构造一个具体接口的调用，交给 Dispatcher 在集群所有地址上并发执行

use log::debug;
use tokio::time::Instant;

use crate::{
    config::ClientOption,
    context::CallContext,
    dispatcher::Dispatcher,
    error::Result,
    transport::GrpcConnector,
};

pub use fanout_rpc_proto::topology::{AllocateStatus, LogicalPoolType};
pub use namespace::GET_FILE_SIZE;
pub use topology::{LogicalPool, PhysicalPool, LIST_LOGICAL_POOL, LIST_PHYSICAL_POOL};

mod namespace;
mod topology;

pub const GIB: u64 = 1024 * 1024 * 1024;

pub struct MdsClient {
    addrs: Vec<String>,
    init_size: usize,
    dispatcher: Dispatcher<GrpcConnector>,
}

impl MdsClient {
    /// 创建客户端，连接按需建立
    pub fn new(opt: ClientOption) -> Result<Self> {
        opt.validate()?;
        let connector = GrpcConnector::new(opt.pool.connect_timeout());
        Ok(Self {
            dispatcher: Dispatcher::new(connector, &opt),
            init_size: opt.pool.init_size,
            addrs: opt.addrs,
        })
    }

    /// 创建客户端并按照 pool.init_size 预先建立连接
    pub async fn connect(opt: ClientOption) -> Result<Self> {
        let client = Self::new(opt)?;
        client.dispatcher.warm_up(client.init_size).await;
        Ok(client)
    }

    pub fn addrs(&self) -> &[String] {
        &self.addrs
    }

    pub fn dispatcher(&self) -> &Dispatcher<GrpcConnector> {
        &self.dispatcher
    }

    fn context(&self, name: &str) -> CallContext {
        debug!("send {} to {:?}", name, self.addrs);
        CallContext::new(self.addrs.clone(), name)
    }
}

/// 把剩余时间设置为 grpc 超时，服务端可以感知到截止时间
fn request_with_deadline<T>(message: T, deadline: Instant) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    request.set_timeout(deadline.saturating_duration_since(Instant::now()));
    request
}
