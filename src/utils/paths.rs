use anyhow::{Result, anyhow};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "todo-sync";

pub fn get_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("Could not find a data directory"))?;
    Ok(base.join(APP_DIR_NAME))
}

pub fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("Could not find a config directory"))?;
    Ok(base.join(APP_DIR_NAME))
}

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

pub fn get_default_database_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("todo-sync.db"))
}

/// Log files live next to the data, e.g. `~/.local/share/todo-sync/logs`
pub fn get_logs_dir() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_app_dir() {
        let data_dir = get_data_dir().unwrap();
        assert!(data_dir.ends_with(APP_DIR_NAME));

        let db_path = get_default_database_path().unwrap();
        assert_eq!(db_path.parent().unwrap(), data_dir);
        assert!(db_path.ends_with("todo-sync.db"));

        let logs_dir = get_logs_dir().unwrap();
        assert!(logs_dir.starts_with(&data_dir));
    }

    #[test]
    fn test_config_path() {
        let config_path = get_config_path().unwrap();
        assert!(config_path.ends_with("config.toml"));
        assert!(config_path.parent().unwrap().ends_with(APP_DIR_NAME));
    }
}
