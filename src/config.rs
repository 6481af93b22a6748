use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Tricoclinic";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_ADDR: &str = "127.0.0.1:4000";

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Address the API server binds to.
    pub bind_addr: SocketAddr,
    /// Public base URL, used to build upload URLs.
    pub base_url: String,
    /// Frontend origin, used for CORS and mock checkout redirects.
    pub frontend_url: String,
    /// Directory uploaded files are stored in.
    pub uploads_dir: PathBuf,
}

impl AppConfig {
    /// Read configuration from `CLINIC_DB`, `CLINIC_ADDR`, `BASE_URL`,
    /// `FRONTEND_URL` and `CLINIC_UPLOADS`, falling back to defaults under
    /// the per-user data directory.
    pub fn from_env() -> Self {
        let database_path = std::env::var("CLINIC_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| app_data_dir().join("clinic.db"));

        let bind_addr = std::env::var("CLINIC_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| DEFAULT_ADDR.parse().expect("default addr parses"));

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{bind_addr}"));

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let uploads_dir = std::env::var("CLINIC_UPLOADS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| app_data_dir().join("uploads"));

        Self {
            database_path,
            bind_addr,
            base_url,
            frontend_url,
            uploads_dir,
        }
    }
}

/// Get the application data directory (~/Tricoclinic/).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn defaults_are_coherent() {
        let cfg = AppConfig::from_env();
        assert!(cfg.database_path.to_string_lossy().ends_with(".db"));
        assert!(cfg.base_url.starts_with("http"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
