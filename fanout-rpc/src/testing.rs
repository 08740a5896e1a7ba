//! 测试用的内存连接和接口

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::{self, Instant};
use tonic::{Code, Status};

use crate::{
    error::{Error, Result},
    invoker::Operation,
    transport::Connector,
};

#[derive(Debug)]
pub(crate) struct MockConn {
    pub id: usize,
    pub addr: String,
    alive: Arc<AtomicBool>,
}

impl MockConn {
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst)
    }
}

pub(crate) struct MockConnector {
    next_id: AtomicUsize,
    closed: AtomicUsize,
    refused: Mutex<HashSet<String>>,
    connect_delay: Mutex<Duration>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            refused: Mutex::new(HashSet::new()),
            connect_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// 拒绝到 addr 的连接
    pub fn refuse(&self, addr: &str) {
        self.refused.lock().unwrap().insert(addr.to_string());
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = delay;
    }

    pub fn connects(&self) -> usize {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Conn = MockConn;

    async fn connect(&self, addr: &str) -> Result<MockConn> {
        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        if self.refused.lock().unwrap().contains(addr) {
            return Err(Error::Connect {
                addr: addr.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(MockConn {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            addr: addr.to_string(),
            alive: Arc::new(AtomicBool::new(true)),
        })
    }

    fn is_alive(&self, conn: &MockConn) -> bool {
        conn.alive.load(Ordering::SeqCst)
    }

    fn close(&self, _conn: MockConn) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// 接口的一次调用表现
#[derive(Debug, Clone)]
pub(crate) struct Step {
    delay: Duration,
    result: std::result::Result<u32, (Code, String)>,
}

impl Step {
    pub fn ok(v: u32) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(v),
        }
    }

    pub fn fail(code: Code) -> Self {
        Self::fail_with(code, &format!("{:?}", code))
    }

    pub fn fail_with(code: Code, msg: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err((code, msg.to_string())),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// 按 endpoint 预设每次调用的结果，超出脚本长度后重复最后一步
pub(crate) struct MockOperation {
    scripts: Mutex<HashMap<String, Vec<Step>>>,
    attempts: Mutex<HashMap<String, usize>>,
    binds: AtomicUsize,
}

impl MockOperation {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            binds: AtomicUsize::new(0),
        }
    }

    pub fn script(&self, addr: &str, steps: Vec<Step>) {
        self.scripts.lock().unwrap().insert(addr.to_string(), steps);
    }

    pub fn attempts(&self, addr: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(addr)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operation<MockConn> for MockOperation {
    type Stub = String;
    type Response = u32;

    fn bind(&self, conn: &MockConn) -> String {
        self.binds.fetch_add(1, Ordering::SeqCst);
        conn.addr.clone()
    }

    async fn invoke(
        &self,
        stub: &mut String,
        _deadline: Instant,
    ) -> std::result::Result<u32, Status> {
        let step = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(stub.clone()).or_default();
            *n += 1;
            let scripts = self.scripts.lock().unwrap();
            scripts
                .get(stub.as_str())
                .and_then(|steps| steps.get(*n - 1).or_else(|| steps.last()))
                .cloned()
        };
        let step = step.unwrap_or_else(|| Step::fail_with(Code::Unimplemented, "no script"));
        if !step.delay.is_zero() {
            time::sleep(step.delay).await;
        }
        step.result.map_err(|(code, msg)| Status::new(code, msg))
    }
}
