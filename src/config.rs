use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub materials_bucket: String,
    pub avatars_bucket: String,
    /// Base under which uploaded objects are publicly resolvable.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "campus".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "campus-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let endpoint = std::env::var("S3_ENDPOINT")?;
        let storage = StorageConfig {
            public_base_url: std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| endpoint.clone()),
            endpoint,
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            materials_bucket: std::env::var("MATERIALS_BUCKET")
                .unwrap_or_else(|_| "materials".into()),
            avatars_bucket: std::env::var("AVATARS_BUCKET").unwrap_or_else(|_| "avatars".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
        })
    }
}
