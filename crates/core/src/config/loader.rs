use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};

use super::models::{ProvisionerConfig, RawSettings};
use crate::{ProvisionerError, ProvisionerResult};

/// 配置加载器
///
/// 环境变量名即配置键（如 `WORKER_BATCH_SIZE`）；TOML文件使用对应的小写键。
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_override: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个必须存在的TOML配置文件
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// 使用给定的键值对代替进程环境变量
    pub fn with_env_map(mut self, vars: HashMap<String, String>) -> Self {
        self.env_override = Some(vars);
        self
    }

    /// 加载并校验配置
    pub fn load(&self) -> ProvisionerResult<ProvisionerConfig> {
        let mut builder = Config::builder();

        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(ProvisionerError::Configuration(format!(
                    "配置文件不存在: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(Environment::default().source(self.env_override.clone()));

        let raw: RawSettings = builder
            .build()
            .map_err(|e| ProvisionerError::Configuration(format!("构建配置失败: {e}")))?
            .try_deserialize()
            .map_err(|e| ProvisionerError::Configuration(format!("解析配置失败: {e}")))?;

        raw.into_config()
    }
}
