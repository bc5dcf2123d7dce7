pub mod deployment;
pub mod error;

pub use deployment::DeploymentConfig;
pub use error::*;

use std::path::{Path, PathBuf};

/// Environment variable naming a config file directly
pub const CONFIG_PATH_ENV: &str = "ECSFLOW_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["ecsflow.yaml", "ecsflow.yml"];

/// プロジェクトの設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 ECSFLOW_CONFIG_PATH (直接パス指定、存在しなければエラー)
/// 2. カレントディレクトリ: ecsflow.yaml, ecsflow.yml
/// 3. ./.ecsflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/ecsflow/ecsflow.yaml (グローバル設定)
///
/// どれも見つからなければ `Ok(None)`（デフォルト設定で動作する）
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // 3. ./.ecsflow/ ディレクトリで検索
    let local_dir = current_dir.join(".ecsflow");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(Some(path));
            }
        }
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("ecsflow").join("ecsflow.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Parse and validate a config file
pub fn load_from(path: &Path) -> Result<DeploymentConfig> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: DeploymentConfig =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load the deployment config.
///
/// An explicit path wins; otherwise the discovery order of
/// [`find_config_file`] applies, falling back to the built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<(DeploymentConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file()?,
    };

    match path {
        Some(path) => {
            let config = load_from(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Ok((DeploymentConfig::default(), None))
        }
    }
}
