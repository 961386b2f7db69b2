use std::path::PathBuf;

const APP_DIR: &str = "nvr";

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/nvr/ (XDG standard)
    // instead of macOS Application Support for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        // On Windows, check for portable data directory in executable directory first
        if let Some(exe_dir) = portable_dir() {
            let portable_data = exe_dir.join("data");
            if portable_data.exists() {
                return portable_data;
            }
        }

        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    // On Windows, a config.toml beside the executable wins
    #[cfg(windows)]
    {
        if let Some(exe_dir) = portable_dir() {
            if exe_dir.join("config.toml").exists() {
                return exe_dir;
            }
        }
    }

    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn log_path() -> PathBuf {
    data_dir().join("nvr.log")
}

#[cfg(windows)]
fn portable_dir() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    exe_path.parent().map(|p| p.to_path_buf())
}
