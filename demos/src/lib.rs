use fanout_rpc::{ClientOption, Result};

/// 环境变量覆盖配置文件，例如 MDS_ADDRS=127.0.0.1:6666,127.0.0.1:6667
#[derive(Debug, Default, serde::Deserialize)]
pub struct EnvOverride {
    #[serde(default)]
    pub addrs: Option<Vec<String>>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry_times: Option<u32>,
}

impl EnvOverride {
    pub fn from_env() -> Self {
        match envy::prefixed("MDS_").from_env::<EnvOverride>() {
            Ok(o) => o,
            Err(e) => {
                log::warn!("ignore invalid MDS_* environment: {}", e);
                Self::default()
            }
        }
    }

    pub fn apply(self, opt: &mut ClientOption) {
        if let Some(addrs) = self.addrs {
            opt.addrs = addrs;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            opt.timeout_ms = timeout_ms;
        }
        if let Some(retry_times) = self.retry_times {
            opt.retry_times = retry_times;
        }
    }
}

/// 读取配置文件，文件不存在时只使用环境变量
pub async fn load_option(path: &str) -> Result<ClientOption> {
    let mut opt = match ClientOption::from_path(path).await {
        Ok(opt) => opt,
        Err(fanout_rpc::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("config {} not found, use environment only", path);
            ClientOption::new(vec![])
        }
        Err(e) => return Err(e),
    };
    EnvOverride::from_env().apply(&mut opt);
    opt.validate()?;
    Ok(opt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_fields() {
        let mut opt = ClientOption::new(vec!["127.0.0.1:6666".into()]);
        EnvOverride {
            addrs: Some(vec!["10.0.0.1:6666".into(), "10.0.0.2:6666".into()]),
            timeout_ms: None,
            retry_times: Some(1),
        }
        .apply(&mut opt);
        assert_eq!(opt.addrs.len(), 2);
        assert_eq!(opt.timeout_ms, 500);
        assert_eq!(opt.retry_times, 1);
    }

    #[test]
    fn parse_env_list() {
        let env = vec![
            ("MDS_ADDRS".to_string(), "a:1,b:2".to_string()),
            ("MDS_TIMEOUT_MS".to_string(), "1000".to_string()),
        ];
        let o: EnvOverride = envy::prefixed("MDS_").from_iter(env).unwrap();
        assert_eq!(o.addrs.unwrap(), vec!["a:1".to_string(), "b:2".to_string()]);
        assert_eq!(o.timeout_ms, Some(1000));
        assert_eq!(o.retry_times, None);
    }
}
