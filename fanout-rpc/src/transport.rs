//! 传输层
//! 只负责建立和关闭到单个 endpoint 的连接，不关心具体调用的接口

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::time;
use tonic::transport::{Channel, Endpoint};

use crate::error::{Error, Result};

/// 创建传输连接的能力，连接池通过它建立新连接
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Send + 'static;

    /// 建立到 addr 的新连接，握手超时或者地址不可达时返回错误
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;

    /// 连接是否还能继续使用
    fn is_alive(&self, _conn: &Self::Conn) -> bool {
        true
    }

    fn close(&self, conn: Self::Conn) {
        drop(conn)
    }
}

/// 基于 tonic channel 的 grpc 连接，明文传输
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    connect_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    type Conn = Channel;

    async fn connect(&self, addr: &str) -> Result<Channel> {
        let uri = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };
        let endpoint = Endpoint::from_shared(uri).map_err(|e| Error::InvalidAddr {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        debug!("dial {} with timeout {:?}", addr, self.connect_timeout);
        // 阻塞直到握手完成
        let endpoint = endpoint.connect_timeout(self.connect_timeout);
        let dial = endpoint.connect();
        match time::timeout(self.connect_timeout, dial).await {
            Ok(Ok(channel)) => Ok(channel),
            Ok(Err(e)) => Err(Error::Connect {
                addr: addr.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::Connect {
                addr: addr.to_string(),
                reason: "handshake deadline exceeded".into(),
            }),
        }
    }
}
