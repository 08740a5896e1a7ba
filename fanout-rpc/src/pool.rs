//! 连接池
//! 每个 endpoint 一个连接池，复用已经建立的传输连接，摊薄建连开销

use std::{
    collections::VecDeque,
    fmt,
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use log::{debug, info, warn};
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{self, Instant},
};

use crate::{
    config::PoolOption,
    error::{Error, Result},
    transport::Connector,
};

/// 空闲连接，记录放回池中的时间用于过期回收
struct IdleConn<T> {
    conn: T,
    since: Instant,
}

/// 单个 endpoint 的连接池
/// * 空闲连接后进先出，优先使用最近归还的连接
/// * 借出的连接数不超过 max_size，超出时阻塞等待直到调用方的截止时间
/// * 空闲超过 idle_timeout 的连接在下一次借出或归还时回收
pub struct ConnPool<C: Connector> {
    addr: String,
    connector: Arc<C>,
    idle: Mutex<VecDeque<IdleConn<C::Conn>>>,
    /// 每个借出的连接持有一个许可
    permits: Arc<Semaphore>,
    max_size: usize,
    idle_timeout: Duration,
}

impl<C: Connector> ConnPool<C> {
    pub fn new(addr: impl Into<String>, connector: Arc<C>, opt: &PoolOption) -> Arc<Self> {
        Arc::new(Self {
            addr: addr.into(),
            connector,
            idle: Mutex::new(VecDeque::with_capacity(opt.max_size)),
            permits: Arc::new(Semaphore::new(opt.max_size)),
            max_size: opt.max_size,
            idle_timeout: opt.idle_timeout(),
        })
    }

    /// 预先建立 n 个空闲连接，返回实际建立成功的数量
    /// 失败只记录日志，后续借出时会按需重新创建
    pub async fn warm_up(&self, n: usize) -> usize {
        let n = n.min(self.max_size);
        let mut created = 0;
        for _ in 0..n {
            match self.connector.connect(&self.addr).await {
                Ok(conn) => {
                    self.lock_idle().push_back(IdleConn {
                        conn,
                        since: Instant::now(),
                    });
                    created += 1;
                }
                Err(e) => {
                    warn!("warm up connection to {} failed: {}", self.addr, e);
                    break;
                }
            }
        }
        created
    }

    /// 借出一个连接：优先复用空闲连接，没有则新建
    /// 池已满时等待其他调用归还，直到 deadline
    pub async fn acquire(self: &Arc<Self>, deadline: Instant) -> Result<PooledConn<C>> {
        let permit = match time::timeout_at(deadline, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Error::PoolClosed(self.addr.clone())),
            Err(_) => return Err(Error::PoolExhausted(self.addr.clone())),
        };

        let conn = match self.take_idle() {
            Some(conn) => conn,
            None => {
                debug!("create new connection to {}", self.addr);
                time::timeout_at(deadline, self.connector.connect(&self.addr))
                    .await
                    .map_err(|_| Error::DeadlineExceeded)??
            }
        };

        Ok(PooledConn {
            addr: self.addr.clone(),
            conn: Some(conn),
            owner: Owner::Pool {
                pool: self.clone(),
                _permit: permit,
            },
        })
    }

    /// 关闭连接池，之后的借出全部失败，已借出的连接归还时直接关闭
    pub fn close(&self) {
        self.permits.close();
        let drained: Vec<_> = self.lock_idle().drain(..).collect();
        info!(
            "connection pool {} closed, {} idle connections released",
            self.addr,
            drained.len()
        );
        for idle in drained {
            self.connector.close(idle.conn);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    /// 当前借出的连接数
    pub fn in_use(&self) -> usize {
        self.max_size - self.permits.available_permits()
    }

    fn take_idle(&self) -> Option<C::Conn> {
        let mut expired = Vec::new();
        let found = {
            let mut idle = self.lock_idle();
            loop {
                let Some(entry) = idle.pop_back() else {
                    break None;
                };
                if entry.since.elapsed() >= self.idle_timeout {
                    // 越靠前越旧，剩下的也都过期了
                    expired.push(entry.conn);
                    expired.extend(idle.drain(..).map(|e| e.conn));
                    break None;
                }
                if self.connector.is_alive(&entry.conn) {
                    break Some(entry.conn);
                }
                expired.push(entry.conn);
            }
        };
        self.close_all(expired);
        found
    }

    fn put_back(&self, conn: C::Conn) {
        if self.is_closed() || !self.connector.is_alive(&conn) {
            self.connector.close(conn);
            return;
        }

        let mut expired = Vec::new();
        {
            let mut idle = self.lock_idle();
            while idle
                .front()
                .map_or(false, |e| e.since.elapsed() >= self.idle_timeout)
            {
                if let Some(e) = idle.pop_front() {
                    expired.push(e.conn);
                }
            }
            idle.push_back(IdleConn {
                conn,
                since: Instant::now(),
            });
        }
        self.close_all(expired);
    }

    fn close_all(&self, conns: Vec<C::Conn>) {
        if !conns.is_empty() {
            debug!("reclaim {} idle connections to {}", conns.len(), self.addr);
        }
        for conn in conns {
            self.connector.close(conn);
        }
    }

    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<IdleConn<C::Conn>>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

enum Owner<C: Connector> {
    Pool {
        pool: Arc<ConnPool<C>>,
        _permit: OwnedSemaphorePermit,
    },
    /// 没有为该 endpoint 配置连接池，用完即关闭
    OneShot(Arc<C>),
}

/// 借出的连接，drop 时自动归还（或关闭）
/// 无论调用成功、失败还是 panic 都会释放
pub struct PooledConn<C: Connector> {
    addr: String,
    conn: Option<C::Conn>,
    owner: Owner<C>,
}

impl<C: Connector> PooledConn<C> {
    /// 不经过连接池，直接建立一个一次性连接
    pub async fn one_shot(connector: Arc<C>, addr: &str, deadline: Instant) -> Result<Self> {
        let conn = time::timeout_at(deadline, connector.connect(addr))
            .await
            .map_err(|_| Error::DeadlineExceeded)??;
        Ok(Self {
            addr: addr.to_string(),
            conn: Some(conn),
            owner: Owner::OneShot(connector),
        })
    }

    fn is_pooled(&self) -> bool {
        matches!(self.owner, Owner::Pool { .. })
    }

    /// 关闭连接而不是放回池中
    pub fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.connector().close(conn);
        }
    }

    fn connector(&self) -> &C {
        match &self.owner {
            Owner::Pool { pool, .. } => &pool.connector,
            Owner::OneShot(connector) => connector,
        }
    }
}

impl<C: Connector> fmt::Debug for PooledConn<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConn")
            .field("addr", &self.addr)
            .field("pooled", &self.is_pooled())
            .field("released", &self.conn.is_none())
            .finish()
    }
}

impl<C: Connector> Deref for PooledConn<C> {
    type Target = C::Conn;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already released")
    }
}

impl<C: Connector> Drop for PooledConn<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        // 先放回空闲队列，许可随后随 owner 一起释放，等待者一定能拿到这个连接
        match &self.owner {
            Owner::Pool { pool, .. } => pool.put_back(conn),
            Owner::OneShot(connector) => connector.close(conn),
        }
    }
}
