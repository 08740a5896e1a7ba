//! 元数据服务的线上协议，由 proto/ 下的定义生成

pub mod topology {
    tonic::include_proto!("curve.mds.topology");
}

pub mod nameserver {
    tonic::include_proto!("curve.mds");
}

pub use nameserver::curve_fs_service_client::CurveFsServiceClient;
pub use topology::topology_service_client::TopologyServiceClient;
