use std::time::Duration;

use tokio::{fs, io::AsyncReadExt};

use crate::error::{Error, Result};

/// 客户端配置，构建客户端后只读
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ClientOption {
    /// 元数据服务集群的所有地址, 例如 127.0.0.1:6666
    pub addrs: Vec<String>,
    /// 单个 endpoint 一次调用的超时时间，包含内部重试
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 最大尝试次数
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub pool: PoolOption,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PoolOption {
    /// 客户端启动时为每个 endpoint 预先建立的连接数，0 表示按需创建
    #[serde(default)]
    pub init_size: usize,
    /// 每个 endpoint 的连接数上限，超出时阻塞等待
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// 建立连接（握手）的超时时间
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for PoolOption {
    fn default() -> Self {
        Self {
            init_size: 0,
            max_size: default_max_size(),
            idle_timeout_ms: default_idle_timeout_ms(),
            connect_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    500
}

fn default_retry_times() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

fn default_max_size() -> usize {
    4
}

fn default_idle_timeout_ms() -> u64 {
    60_000
}

impl ClientOption {
    pub fn new(addrs: Vec<String>) -> Self {
        Self {
            addrs,
            timeout_ms: default_timeout_ms(),
            retry_times: default_retry_times(),
            retry_backoff_ms: default_retry_backoff_ms(),
            pool: PoolOption::default(),
        }
    }

    pub async fn from_path(path: &str) -> Result<Self> {
        let mut file = fs::File::open(path).await?;
        let mut s = String::new();
        file.read_to_string(&mut s).await?;

        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let opt = toml::from_str::<ClientOption>(s)?;
        opt.validate()?;
        Ok(opt)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool.max_size == 0 {
            return Err(Error::InvalidConfig("pool.max_size must be positive".into()));
        }
        if self.pool.init_size > self.pool.max_size {
            return Err(Error::InvalidConfig(format!(
                "pool.init_size {} exceeds pool.max_size {}",
                self.pool.init_size, self.pool.max_size
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl PoolOption {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
