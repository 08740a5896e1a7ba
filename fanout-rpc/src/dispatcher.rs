//! 分发层
//! 对同一个逻辑调用，每个 endpoint 启动一个独立的 worker 并发调用，返回最先成功的结果

use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::{future::join_all, FutureExt};
use log::{debug, info, warn};
use tokio::{sync::mpsc, time::Instant};
use tonic::Code;

use crate::{
    config::ClientOption,
    context::{CallContext, CallOutcome},
    error::{Error, Result},
    invoker::{self, Operation, RetryPolicy},
    pool::{ConnPool, PooledConn},
    transport::Connector,
};

/// 持有所有 endpoint 的连接池，在客户端构建时一次性创建，随客户端一起销毁
/// 每次 send_rpc 相互独立，除了连接池之外不共享任何状态
pub struct Dispatcher<C: Connector> {
    connector: Arc<C>,
    /// key = endpoint
    pools: HashMap<String, Arc<ConnPool<C>>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<C: Connector> Dispatcher<C> {
    pub fn new(connector: C, opt: &ClientOption) -> Self {
        let connector = Arc::new(connector);
        let mut pools = HashMap::new();
        for addr in opt.addrs.iter() {
            pools
                .entry(addr.clone())
                .or_insert_with(|| ConnPool::new(addr.clone(), connector.clone(), &opt.pool));
        }
        info!("dispatcher created with {} endpoint pools", pools.len());
        Self {
            connector,
            pools,
            timeout: opt.timeout(),
            retry: RetryPolicy::new(opt.retry_times, opt.retry_backoff()),
        }
    }

    /// 为每个连接池预先建立 n 个连接
    pub async fn warm_up(&self, n: usize) {
        if n == 0 {
            return;
        }
        let created = join_all(self.pools.values().map(|pool| pool.warm_up(n))).await;
        info!(
            "warm up {} connections over {} endpoints",
            created.iter().sum::<usize>(),
            self.pools.len()
        );
    }

    pub fn pool(&self, addr: &str) -> Option<&Arc<ConnPool<C>>> {
        self.pools.get(addr)
    }

    /// 向 ctx 中的所有 endpoint 并发发起调用
    /// * 地址列表为空直接返回 NoEndpoints，不启动任何 worker
    /// * 第一个成功的结果立即返回，其余 worker 在后台继续运行，结果被丢弃
    /// * 全部失败时返回聚合了每个 endpoint 错误的 AllFailed
    pub async fn send_rpc<O>(&self, ctx: &CallContext, op: O) -> CallOutcome<O::Response>
    where
        O: Operation<C::Conn>,
    {
        let addrs = ctx.addrs();
        let size = addrs.len();
        if size == 0 {
            return CallOutcome::failed(Error::NoEndpoints);
        }

        // 容量等于 endpoint 数量，提前返回后 worker 发送也不会阻塞
        let (results_tx, results_rx) = mpsc::channel(size);
        let op = Arc::new(op);
        for addr in addrs {
            let worker = Worker {
                addr: addr.clone(),
                pool: self.pools.get(addr).cloned(),
                connector: self.connector.clone(),
                timeout: self.timeout,
                retry: self.retry.clone(),
                op: op.clone(),
            };
            let results_tx = results_tx.clone();
            tokio::spawn(async move {
                let addr = worker.addr.clone();
                let result = match AssertUnwindSafe(worker.run()).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(Error::WorkerPanicked(addr.clone())),
                };
                if results_tx.send(CallOutcome::new(addr, result)).await.is_err() {
                    debug!("call already finished, outcome discarded");
                }
            });
        }
        drop(results_tx);

        reduce(ctx.name(), size, results_rx).await
    }

    /// 关闭所有连接池
    pub fn close(&self) {
        for pool in self.pools.values() {
            pool.close();
        }
    }
}

impl<C: Connector> Drop for Dispatcher<C> {
    fn drop(&mut self) {
        self.close()
    }
}

/// 逐个接收 worker 的结果，第一个成功的直接返回
/// 收齐 size 个失败结果（或通道提前关闭）后返回聚合错误
async fn reduce<R>(
    name: &str,
    size: usize,
    mut results_rx: mpsc::Receiver<CallOutcome<R>>,
) -> CallOutcome<R> {
    let mut failures = Vec::with_capacity(size);
    while failures.len() < size {
        let Some(CallOutcome { addr, result }) = results_rx.recv().await else {
            // 只有运行时关闭导致 worker 被取消时才会发生
            warn!(
                "{} result channel closed early, {} of {} outcomes received",
                name,
                failures.len(),
                size
            );
            break;
        };
        match result {
            Ok(response) => {
                debug!("{} succeeded on {}", name, addr);
                return CallOutcome::new(addr, Ok(response));
            }
            Err(e) => {
                warn!("{} failed on {}: {}", name, addr, e);
                failures.push((addr, e));
            }
        }
    }

    CallOutcome::failed(Error::AllFailed {
        name: name.to_string(),
        failures,
    })
}

/// 一个 endpoint 上的调用单元
struct Worker<C: Connector, O> {
    addr: String,
    /// 没有为该地址配置连接池时为 None，使用一次性连接
    pool: Option<Arc<ConnPool<C>>>,
    connector: Arc<C>,
    timeout: Duration,
    retry: RetryPolicy,
    op: Arc<O>,
}

impl<C, O> Worker<C, O>
where
    C: Connector,
    O: Operation<C::Conn>,
{
    async fn run(self) -> Result<O::Response> {
        // 每个 worker 独立计算截止时间，互不影响
        let deadline = Instant::now() + self.timeout;
        let conn = match &self.pool {
            Some(pool) => pool.acquire(deadline).await?,
            None => PooledConn::one_shot(self.connector.clone(), &self.addr, deadline).await?,
        };

        let stub = self.op.bind(&conn);
        let result =
            invoker::invoke::<C::Conn, O>(self.op.as_ref(), stub, deadline, &self.retry).await;
        match &result {
            Err(Error::Rpc(status)) if status.code() == Code::Unavailable => conn.discard(),
            _ => drop(conn),
        }
        result
    }
}
