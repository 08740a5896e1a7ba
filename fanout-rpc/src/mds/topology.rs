use async_trait::async_trait;
use fanout_rpc_proto::{
    topology::{
        AllocateStatus, ListLogicalPoolRequest, ListLogicalPoolResponse, ListPhysicalPoolRequest,
        ListPhysicalPoolResponse, LogicalPoolType,
    },
    TopologyServiceClient,
};
use tokio::time::Instant;
use tonic::{transport::Channel, Status};

use crate::{
    error::{Error, Result},
    invoker::Operation,
};

use super::{request_with_deadline, MdsClient};

pub const LIST_PHYSICAL_POOL: &str = "ListPhysicalPool";
pub const LIST_LOGICAL_POOL: &str = "ListLogicalPool";

const TOPO_OK: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalPool {
    pub id: u32,
    pub name: String,
    pub desc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPool {
    pub id: u32,
    pub name: String,
    pub physical_pool_id: u32,
    /// 无法识别的类型为 None
    pub kind: Option<LogicalPoolType>,
    pub create_time: u64,
    pub allocate_status: Option<AllocateStatus>,
    pub scan_enable: bool,
}

struct ListPhysicalPool {
    request: ListPhysicalPoolRequest,
}

#[async_trait]
impl Operation<Channel> for ListPhysicalPool {
    type Stub = TopologyServiceClient<Channel>;
    type Response = ListPhysicalPoolResponse;

    fn bind(&self, conn: &Channel) -> Self::Stub {
        TopologyServiceClient::new(conn.clone())
    }

    async fn invoke(
        &self,
        stub: &mut Self::Stub,
        deadline: Instant,
    ) -> std::result::Result<Self::Response, Status> {
        let request = request_with_deadline(self.request.clone(), deadline);
        Ok(stub.list_physical_pool(request).await?.into_inner())
    }
}

struct ListLogicalPool {
    request: ListLogicalPoolRequest,
}

#[async_trait]
impl Operation<Channel> for ListLogicalPool {
    type Stub = TopologyServiceClient<Channel>;
    type Response = ListLogicalPoolResponse;

    fn bind(&self, conn: &Channel) -> Self::Stub {
        TopologyServiceClient::new(conn.clone())
    }

    async fn invoke(
        &self,
        stub: &mut Self::Stub,
        deadline: Instant,
    ) -> std::result::Result<Self::Response, Status> {
        let request = request_with_deadline(self.request.clone(), deadline);
        Ok(stub.list_logical_pool(request).await?.into_inner())
    }
}

impl MdsClient {
    pub async fn list_physical_pool(&self) -> Result<Vec<PhysicalPool>> {
        let op = ListPhysicalPool {
            request: ListPhysicalPoolRequest {},
        };
        let response = self
            .dispatcher
            .send_rpc(&self.context(LIST_PHYSICAL_POOL), op)
            .await
            .into_result()?;
        physical_pools(response)
    }

    pub async fn list_logical_pool(&self, physical_pool_id: u32) -> Result<Vec<LogicalPool>> {
        let op = ListLogicalPool {
            request: ListLogicalPoolRequest {
                physical_pool_id: Some(physical_pool_id),
                physical_pool_name: None,
            },
        };
        let response = self
            .dispatcher
            .send_rpc(&self.context(LIST_LOGICAL_POOL), op)
            .await
            .into_result()?;
        logical_pools(response)
    }
}

fn check_status(name: &str, code: i32) -> Result<()> {
    if code == TOPO_OK {
        Ok(())
    } else {
        Err(Error::Mds {
            name: name.to_string(),
            code: code.to_string(),
        })
    }
}

fn physical_pools(response: ListPhysicalPoolResponse) -> Result<Vec<PhysicalPool>> {
    check_status(LIST_PHYSICAL_POOL, response.status_code)?;
    Ok(response
        .physical_pool_infos
        .into_iter()
        .map(|info| PhysicalPool {
            id: info.physical_pool_id,
            name: info.physical_pool_name,
            desc: info.desc,
        })
        .collect())
}

fn logical_pools(response: ListLogicalPoolResponse) -> Result<Vec<LogicalPool>> {
    check_status(LIST_LOGICAL_POOL, response.status_code)?;
    Ok(response
        .logical_pool_infos
        .into_iter()
        .map(|info| LogicalPool {
            id: info.logical_pool_id,
            name: info.logical_pool_name,
            physical_pool_id: info.physical_pool_id,
            kind: LogicalPoolType::from_i32(info.r#type),
            create_time: info.create_time,
            allocate_status: AllocateStatus::from_i32(info.allocate_status),
            scan_enable: info.scan_enable.unwrap_or_default(),
        })
        .collect())
}
