use crate::error::{Error, Result};

/// 一次逻辑调用的描述：目标地址列表和接口名
/// 构建后不可修改，调用结束即丢弃
#[derive(Debug, Clone)]
pub struct CallContext {
    /// endpoint: 127.0.0.1:6666，允许重复，每个都会独立发起调用
    addrs: Vec<String>,
    /// 接口名，仅用于日志和错误信息
    name: String,
}

impl CallContext {
    pub fn new(addrs: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            addrs,
            name: name.into(),
        }
    }

    pub fn addrs(&self) -> &[String] {
        &self.addrs
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 单个 endpoint 的调用结果，或者整个调用的最终结果
#[derive(Debug)]
pub struct CallOutcome<R> {
    /// 产生该结果的 endpoint，聚合结果为空字符串
    pub addr: String,
    pub result: Result<R>,
}

impl<R> CallOutcome<R> {
    pub(crate) fn new(addr: impl Into<String>, result: Result<R>) -> Self {
        Self {
            addr: addr.into(),
            result,
        }
    }

    pub(crate) fn failed(err: Error) -> Self {
        Self::new("", Err(err))
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<R> {
        self.result
    }
}
