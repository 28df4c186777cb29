use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub admin_password: String,
}

/// Upload directory and image encoder settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the canonical (converted) files, also served at `/uploads`
    pub upload_dir: PathBuf,
    /// Directory for encoder input scratch files
    pub scratch_dir: PathBuf,
    /// Primary cwebp executable
    pub cwebp_path: PathBuf,
    /// Alternate cwebp install location tried when the primary fails
    pub cwebp_fallback_path: PathBuf,
    /// Encoder quality (1-100)
    pub webp_quality: u8,
    /// Upper bound for a single conversion
    pub encoder_timeout: Duration,
    /// Per-file size limit inside an upload batch
    pub max_file_size: usize,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 50 * 1024 * 1024; // 50MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size = env::var("MAX_REQUEST_BODY_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUEST_BODY_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_REQUEST_BODY_SIZE must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_URL: &'static str = "sqlite://./memes.db";
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| Self::DEFAULT_URL.to_string());

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl AuthConfig {
    const DEFAULT_JWT_SECRET: &'static str = "your-secret-key-change-in-production";
    const DEFAULT_ADMIN_PASSWORD: &'static str = "admin123";
    const DEFAULT_TOKEN_TTL_HOURS: u64 = 24 * 7;
    const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365 * 10;

    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("JWT_SECRET not set, using the development default");
                Self::DEFAULT_JWT_SECRET.to_string()
            });

        let admin_password = env::var("ADMIN_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("ADMIN_PASSWORD not set, using the development default");
                Self::DEFAULT_ADMIN_PASSWORD.to_string()
            });

        let token_ttl = Self::parse_token_ttl(
            &env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| Self::DEFAULT_TOKEN_TTL_HOURS.to_string()),
        )?;

        Ok(Self {
            jwt_secret,
            token_ttl,
            admin_password,
        })
    }

    fn parse_token_ttl(raw: &str) -> Result<Duration, String> {
        let hours = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| "JWT_EXPIRY_HOURS must be a valid number".to_string())?;

        if !(1..=Self::MAX_TOKEN_TTL_HOURS).contains(&hours) {
            return Err(format!(
                "JWT_EXPIRY_HOURS must be between 1 and {}",
                Self::MAX_TOKEN_TTL_HOURS
            ));
        }

        hours
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or_else(|| "JWT_EXPIRY_HOURS is too large".to_string())
    }
}

impl StorageConfig {
    const DEFAULT_UPLOAD_DIR: &'static str = "./uploads";
    const DEFAULT_CWEBP_PATH: &'static str = "cwebp";
    #[cfg(windows)]
    const DEFAULT_CWEBP_FALLBACK_PATH: &'static str = "./.bin/webp/cwebp.exe";
    #[cfg(not(windows))]
    const DEFAULT_CWEBP_FALLBACK_PATH: &'static str = "./.bin/webp/cwebp";
    const DEFAULT_WEBP_QUALITY: u8 = 75;
    const DEFAULT_ENCODER_TIMEOUT_SECS: u64 = 60;
    const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024; // 10MB

    pub fn from_env() -> Result<Self, String> {
        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_UPLOAD_DIR));

        let scratch_dir = env::var("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());

        let cwebp_path = env::var("CWEBP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_CWEBP_PATH));

        let cwebp_fallback_path = env::var("CWEBP_FALLBACK_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_CWEBP_FALLBACK_PATH));

        let webp_quality = env::var("WEBP_QUALITY")
            .unwrap_or_else(|_| Self::DEFAULT_WEBP_QUALITY.to_string())
            .parse::<u8>()
            .ok()
            .filter(|q| (1..=100).contains(q))
            .ok_or_else(|| "WEBP_QUALITY must be a number between 1 and 100".to_string())?;

        let encoder_timeout_secs = env::var("ENCODER_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ENCODER_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "ENCODER_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_file_size = env::var("MAX_UPLOAD_FILE_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_FILE_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_UPLOAD_FILE_SIZE must be a valid number".to_string())?;

        Ok(Self {
            upload_dir,
            scratch_dir,
            cwebp_path,
            cwebp_fallback_path,
            webp_quality,
            encoder_timeout: Duration::from_secs(encoder_timeout_secs),
            max_file_size,
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Webpics API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Image gallery with a moderation queue".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}
