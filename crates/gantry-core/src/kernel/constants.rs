/// Application name
pub const APP_NAME: &str = "Gantry";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding a comma-separated list of active profiles
pub const PROFILES_ENV: &str = "GANTRY_PROFILES";

/// Environment variable naming the override directory
pub const OVERRIDE_DIR_ENV: &str = "GANTRY_OVERRIDE_DIR";

/// Default primary configuration file
pub const DEFAULT_CONFIG_FILE: &str = "gantry.yaml";

/// Default override directory, relative to the primary file
pub const DEFAULT_OVERRIDE_DIR: &str = "gantry.d";

/// Default address the TCP endpoint listens on
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7700";
