//! Server Configuration
//!
//! Everything is environment-driven with development defaults, logged when
//! a fallback kicks in. Configuration problems never abort startup here;
//! `store::connect` surfaces real failures.

use std::path::PathBuf;

/// `DATABASE_URL`, defaulting to a local SQLite file.
pub fn database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::warn!("DATABASE_URL not set, using sqlite:chatway.db");
        "sqlite:chatway.db".to_string()
    })
}

/// `SERVER_PORT`, defaulting to 3000.
pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3000)
}

/// `UPLOAD_DIR`, defaulting to `uploads/`.
pub fn upload_dir() -> PathBuf {
    std::env::var("UPLOAD_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("uploads"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        std::env::remove_var("SERVER_PORT");
        std::env::remove_var("UPLOAD_DIR");
        assert_eq!(server_port(), 3000);
        assert_eq!(upload_dir(), PathBuf::from("uploads"));
    }

    #[test]
    #[serial]
    fn test_port_from_env() {
        std::env::set_var("SERVER_PORT", "8080");
        assert_eq!(server_port(), 8080);
        std::env::set_var("SERVER_PORT", "not-a-port");
        assert_eq!(server_port(), 3000);
        std::env::remove_var("SERVER_PORT");
    }
}
