//! 单个 endpoint 上的一次调用
//! 把连接绑定到具体接口的客户端，在截止时间内调用并按固定策略重试

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::time::{self, Instant};
use tonic::Status;

use crate::error::{is_transient_status, Error, Result};

/// 一个远端接口的调用能力，由具体接口实现
/// * bind: 把传输连接绑定到接口的客户端桩
/// * invoke: 用绑定好的桩发起一次调用
#[async_trait]
pub trait Operation<T>: Send + Sync + 'static {
    type Stub: Send;
    type Response: Send + 'static;

    fn bind(&self, conn: &T) -> Self::Stub;

    async fn invoke(
        &self,
        stub: &mut Self::Stub,
        deadline: Instant,
    ) -> std::result::Result<Self::Response, Status>;
}

/// 重试策略，所有重试共享同一个截止时间
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数，0 视为 1
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

/// 用已经绑定好连接的 stub 调用 op，只对 Unknown/Unavailable/DeadlineExceeded 重试
/// 截止时间到达时无论处于调用还是等待重试都立即返回 DeadlineExceeded
pub(crate) async fn invoke<T, O>(
    op: &O,
    mut stub: O::Stub,
    deadline: Instant,
    policy: &RetryPolicy,
) -> Result<O::Response>
where
    O: Operation<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let status = match time::timeout_at(deadline, op.invoke(&mut stub, deadline)).await {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(status)) => status,
            Err(_) => return Err(Error::DeadlineExceeded),
        };

        if !is_transient_status(&status) {
            debug!("attempt {} failed with non-retryable status: {}", attempt, status);
            return Err(Error::Rpc(status));
        }
        if attempt >= max_attempts {
            warn!("retry exhausted after {} attempts: {}", attempt, status);
            return Err(Error::Rpc(status));
        }

        let next = Instant::now() + policy.backoff;
        if next >= deadline {
            return Err(Error::DeadlineExceeded);
        }
        warn!(
            "attempt {}/{} failed: {}, retry after {:?}",
            attempt, max_attempts, status, policy.backoff
        );
        time::sleep_until(next).await;
    }
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;
    use crate::{
        testing::{MockConn, MockConnector, MockOperation, Step},
        transport::Connector,
    };

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    fn deadline(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    /// 在 a:1 上调用一次 op
    async fn run(op: &MockOperation, deadline_ms: u64, max_attempts: u32) -> Result<u32> {
        let conn = MockConnector::new().connect("a:1").await.unwrap();
        let stub = op.bind(&conn);
        invoke::<MockConn, _>(op, stub, deadline(deadline_ms), &policy(max_attempts)).await
    }

    #[tokio::test]
    async fn succeed_after_transient_failures() {
        let op = MockOperation::new();
        op.script(
            "a:1",
            vec![
                Step::fail(Code::Unavailable),
                Step::fail(Code::Unknown),
                Step::ok(7),
            ],
        );

        let resp = run(&op, 500, 3).await.unwrap();
        assert_eq!(resp, 7);
        assert_eq!(op.attempts("a:1"), 3);
        assert_eq!(op.binds(), 1);
    }

    #[tokio::test]
    async fn fail_when_attempts_exhausted() {
        let op = MockOperation::new();
        op.script("a:1", vec![Step::fail(Code::DeadlineExceeded)]);

        let err = run(&op, 500, 3).await.unwrap_err();
        assert!(matches!(&err, Error::Rpc(s) if s.code() == Code::DeadlineExceeded));
        assert_eq!(op.attempts("a:1"), 3);
    }

    #[tokio::test]
    async fn zero_attempts_means_one() {
        let op = MockOperation::new();
        op.script("a:1", vec![Step::fail(Code::Unavailable)]);

        assert!(run(&op, 500, 0).await.is_err());
        assert_eq!(op.attempts("a:1"), 1);
    }

    #[tokio::test]
    async fn non_transient_is_not_retried() {
        let op = MockOperation::new();
        op.script("a:1", vec![Step::fail(Code::NotFound), Step::ok(1)]);

        let err = run(&op, 500, 3).await.unwrap_err();
        assert!(matches!(&err, Error::Rpc(s) if s.code() == Code::NotFound));
        assert_eq!(op.attempts("a:1"), 1);
    }

    #[tokio::test]
    async fn retries_share_deadline() {
        let op = MockOperation::new();
        op.script(
            "a:1",
            vec![Step::fail(Code::Unavailable).after(Duration::from_millis(40))],
        );

        let start = Instant::now();
        let err = run(&op, 100, 10).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded), "got {:?}", err);
        assert!(start.elapsed() < Duration::from_millis(300));
        assert!(op.attempts("a:1") < 10);
    }
}
