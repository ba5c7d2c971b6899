use std::fmt;

use anyhow::{Context, Result, anyhow};
use axum::http::HeaderValue;
use axum_extra::extract::cookie::Key;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use products_projects::DEFAULT_MAX_UPLOAD_BYTES;
use tracing::warn;

const DEFAULT_SEED_ADMIN_EMAIL: &str = "admin@projectdesk.local";
const DEFAULT_SEED_ADMIN_PASSWORD: &str = "projectdesk";

#[derive(Clone, Debug)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub cookie_key: Key,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub seed_admin: SeedAdmin,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("seed_admin", &self.seed_admin.email)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Read the process environment. With `in_memory` a missing cookie
    /// secret is replaced by a random key.
    pub fn load(in_memory: bool) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), in_memory)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, in_memory: bool) -> Result<Self> {
        let cookie_key = match lookup("COOKIE_SECRET_BASE64") {
            Some(secret) => decode_cookie_key(&secret)?,
            None if in_memory => {
                warn!("COOKIE_SECRET_BASE64 not set; sessions will not survive a restart");
                Key::generate()
            }
            None => return Err(anyhow!("COOKIE_SECRET_BASE64 missing")),
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();
        if cors_allowed_origins.is_empty() {
            return Err(anyhow!("CORS_ALLOWED_ORIGINS must list at least one origin"));
        }
        if let Some(bad) = cors_allowed_origins
            .iter()
            .find(|origin| HeaderValue::from_str(origin).is_err())
        {
            return Err(anyhow!("CORS_ALLOWED_ORIGINS contains an invalid origin: {bad:?}"));
        }

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let seed_admin = SeedAdmin {
            email: lookup("SEED_ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_SEED_ADMIN_EMAIL.into()),
            password: lookup("SEED_ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_SEED_ADMIN_PASSWORD.into()),
        };

        Ok(Self {
            cookie_key,
            cors_allowed_origins,
            max_upload_bytes,
            seed_admin,
        })
    }
}

fn decode_cookie_key(secret: &str) -> Result<Key> {
    let secret_bytes = STANDARD
        .decode(secret.trim())
        .context("invalid COOKIE_SECRET_BASE64")?;
    Key::try_from(secret_bytes.as_slice())
        .map_err(|_| anyhow!("COOKIE_SECRET_BASE64 must decode to at least 64 bytes"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn cookie_secret_is_required_outside_memory_mode() {
        assert!(AppConfig::from_lookup(lookup(&[]), false).is_err());
        let config = AppConfig::from_lookup(lookup(&[]), true).unwrap();
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.seed_admin.email, DEFAULT_SEED_ADMIN_EMAIL);
    }

    #[test]
    fn short_cookie_secrets_are_rejected() {
        let short = STANDARD.encode([7u8; 32]);
        let err = AppConfig::from_lookup(lookup(&[("COOKIE_SECRET_BASE64", short.as_str())]), true)
            .unwrap_err();
        assert!(err.to_string().contains("at least 64 bytes"));
    }

    #[test]
    fn parses_origins_and_upload_limit() {
        let secret = STANDARD.encode([9u8; 64]);
        let config = AppConfig::from_lookup(
            lookup(&[
                ("COOKIE_SECRET_BASE64", secret.as_str()),
                ("CORS_ALLOWED_ORIGINS", "https://a.test, ,https://b.test"),
                ("MAX_UPLOAD_BYTES", "2048"),
            ]),
            false,
        )
        .unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.test", "https://b.test"]
        );
        assert_eq!(config.max_upload_bytes, 2048);
    }

    #[test]
    fn empty_origin_lists_are_rejected() {
        for origins in ["", " , "] {
            let err = AppConfig::from_lookup(lookup(&[("CORS_ALLOWED_ORIGINS", origins)]), true)
                .unwrap_err();
            assert!(err.to_string().contains("at least one origin"), "{err}");
        }
        let err = AppConfig::from_lookup(
            lookup(&[("CORS_ALLOWED_ORIGINS", "https://ok.test,bad\norigin")]),
            true,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid origin"), "{err}");
    }
}
