use async_trait::async_trait;
use fanout_rpc_proto::{
    nameserver::{GetFileSizeRequest, GetFileSizeResponse, StatusCode},
    CurveFsServiceClient,
};
use tokio::time::Instant;
use tonic::{transport::Channel, Status};

use crate::{
    error::{Error, Result},
    invoker::Operation,
};

use super::{request_with_deadline, MdsClient, GIB};

pub const GET_FILE_SIZE: &str = "GetFileSize";

struct GetFileSize {
    request: GetFileSizeRequest,
}

#[async_trait]
impl Operation<Channel> for GetFileSize {
    type Stub = CurveFsServiceClient<Channel>;
    type Response = GetFileSizeResponse;

    fn bind(&self, conn: &Channel) -> Self::Stub {
        CurveFsServiceClient::new(conn.clone())
    }

    async fn invoke(
        &self,
        stub: &mut Self::Stub,
        deadline: Instant,
    ) -> std::result::Result<Self::Response, Status> {
        let request = request_with_deadline(self.request.clone(), deadline);
        Ok(stub.get_file_size(request).await?.into_inner())
    }
}

impl MdsClient {
    /// 文件（目录）大小，单位 GiB
    pub async fn get_file_size(&self, file_name: &str) -> Result<u64> {
        let op = GetFileSize {
            request: GetFileSizeRequest {
                file_name: file_name.to_string(),
            },
        };
        let response = self
            .dispatcher
            .send_rpc(&self.context(GET_FILE_SIZE), op)
            .await
            .into_result()?;
        file_size_gib(response)
    }
}

fn file_size_gib(response: GetFileSizeResponse) -> Result<u64> {
    match StatusCode::from_i32(response.status_code) {
        Some(StatusCode::KOk) => Ok(response.file_size.unwrap_or_default() / GIB),
        Some(code) => Err(Error::Mds {
            name: GET_FILE_SIZE.to_string(),
            code: format!("{:?}", code),
        }),
        None => Err(Error::Mds {
            name: GET_FILE_SIZE.to_string(),
            code: response.status_code.to_string(),
        }),
    }
}
