use std::{collections::HashMap, sync::Arc, time::Duration};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use woofadaar_types::{Result, Value, anyhow};

use crate::config::{Environment, PlatformConfig};

pub type AppState = Arc<State>;

const CONFIG: &str = include_str!("../../../woofadaar.config.json");

pub struct State {
    pub platform_config: PlatformConfig,
    pub db: DatabaseConnection,
    pub stripe_client: Option<stripe::Client>,
    /// sub -> permission bits, short TTL
    pub permission_cache: moka::sync::Cache<String, i64>,
    jwt_decoding_key: DecodingKey,
    jwt_validation: Validation,
}

impl State {
    pub async fn new() -> Self {
        let platform_config: PlatformConfig =
            serde_json::from_str(CONFIG).expect("Failed to parse config file");

        // No fallback secret: refuse to start without one.
        let jwt_secret =
            std::env::var("WOOFADAAR_JWT_SECRET").expect("WOOFADAAR_JWT_SECRET must be set");
        let jwt_decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
        let mut jwt_validation = Validation::new(Algorithm::HS256);
        jwt_validation.validate_aud = false;

        let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let mut opt = ConnectOptions::new(db_url.to_owned());
        opt.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(platform_config.environment == Environment::Development);

        let db = Database::connect(opt)
            .await
            .expect("Failed to connect to database");

        let stripe_client = if platform_config.features.premium {
            let stripe_key =
                std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set");
            Some(stripe::Client::new(stripe_key))
        } else {
            None
        };

        Self {
            platform_config,
            db,
            stripe_client,
            permission_cache: moka::sync::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(120))
                .build(),
            jwt_decoding_key,
            jwt_validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<HashMap<String, Value>> {
        let decoded = decode::<HashMap<String, Value>>(
            token,
            &self.jwt_decoding_key,
            &self.jwt_validation,
        )?;
        Ok(decoded.claims)
    }

    pub fn invalidate_permission(&self, sub: &str) {
        self.permission_cache.invalidate(sub);
    }

    pub fn require_stripe(&self) -> Result<&stripe::Client> {
        self.stripe_client
            .as_ref()
            .ok_or_else(|| anyhow!("Premium features are not enabled"))
    }
}
