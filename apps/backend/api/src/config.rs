use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
}

impl Config {
    /// Reads and checks the environment up front so a misconfigured
    /// deployment fails at startup instead of on the first request.
    pub fn from_env() -> Result<Self, ConfigError> {
        for var in ["DATABASE_URL", "WOOFADAAR_JWT_SECRET"] {
            if env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true) {
                return Err(ConfigError::MissingVar(var));
            }
        }

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVar(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(var) => write!(f, "Invalid value for: {}", var),
        }
    }
}

impl std::error::Error for ConfigError {}
