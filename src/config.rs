use std::{env, fmt::Display, path::PathBuf, str::FromStr, sync::Arc};

use chrono::Duration;

use crate::{error::TypeError, media::Media};

const DEVELOPMENT_SECRET: &str = "insecure-development-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub jwt_secret: Arc<String>,
    pub session_hours: i64,
    pub media_root: PathBuf,
    pub media_url: String,
    pub public_scheme: String,
}

impl Config {
    pub fn load() -> Result<Self, TypeError> {
        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("JWT_SECRET not set, sessions are signed with a development key");
            DEVELOPMENT_SECRET.to_string()
        });

        Ok(Self {
            database_url: try_load("DATABASE_URL", "postgres://postgres@localhost/cookbook")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            port: try_load("PORT", "8000")?,
            jwt_secret: Arc::new(jwt_secret),
            session_hours: try_load("SESSION_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
            media_url: try_load("MEDIA_URL", "/media/")?,
            public_scheme: try_load("PUBLIC_SCHEME", "http")?,
        })
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::hours(self.session_hours)
    }

    pub fn media(&self) -> Media {
        Media::new(self.media_root.clone(), &self.media_url)
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        log::debug!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, TypeError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            log::warn!("Invalid {key} value: {e}");
            TypeError::new(&format!("Environment misconfigured: {key}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let port: u16 = try_load("COOKBOOK_TEST_UNSET_PORT", "8000").unwrap();

        assert_eq!(port, 8000);
    }

    #[test]
    fn unparsable_values_are_reported() {
        let result: Result<u16, TypeError> = try_load("COOKBOOK_TEST_UNSET_PORT", "not-a-port");

        assert!(result.is_err());
    }
}
