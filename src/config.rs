//! Runtime configuration loaded from environment variables.
//!
//! `main` calls `dotenvy::dotenv()` first, so a `.env` file next to the binary works too.
//! Unset or blank variables fall back to the defaults below; malformed values stop startup.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

use crate::qrcode::{QrCodeEcc, Version};

// Upper bounds keep the largest image (version 40) around 7200 pixels square.
const MAX_BOX_SIZE: u32 = 32;
const MAX_QUIET_ZONE: u32 = 16;
const MAX_BORDER_SIZE: u32 = 256;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Payee VPA written into every URI.
    pub payee_id: String,
    pub default_name: String,
    pub default_currency: String,
    pub error_correction: QrCodeEcc,
    /// Smallest symbol version; larger ones are used when the payload needs them.
    pub min_version: Version,
    pub box_size: u32,
    pub quiet_zone: u32,
    pub border_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            payee_id: "satyam84ya@fam".into(),
            default_name: "Satyam".into(),
            default_currency: "INR".into(),
            error_correction: QrCodeEcc::High,
            min_version: Version::MIN,
            box_size: 15,
            quiet_zone: 2,
            border_size: 40,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let min_version: u8 = parse(&lookup, "QR_MIN_VERSION", defaults.min_version.value())?;
        let min_version = Version::try_from(min_version).map_err(|e| anyhow!("invalid QR_MIN_VERSION: {e}"))?;

        let box_size = parse(&lookup, "QR_BOX_SIZE", defaults.box_size)?;
        if !(1..=MAX_BOX_SIZE).contains(&box_size) {
            bail!("invalid QR_BOX_SIZE={box_size}: must be between 1 and {MAX_BOX_SIZE}");
        }
        let quiet_zone = parse(&lookup, "QR_QUIET_ZONE", defaults.quiet_zone)?;
        if quiet_zone > MAX_QUIET_ZONE {
            bail!("invalid QR_QUIET_ZONE={quiet_zone}: must be at most {MAX_QUIET_ZONE}");
        }
        let border_size = parse(&lookup, "QR_BORDER_SIZE", defaults.border_size)?;
        if border_size > MAX_BORDER_SIZE {
            bail!("invalid QR_BORDER_SIZE={border_size}: must be at most {MAX_BORDER_SIZE}");
        }

        Ok(Self {
            host: text("SERVER_HOST", defaults.host),
            port: parse(&lookup, "SERVER_PORT", defaults.port)?,
            payee_id: text("UPI_PAYEE_ID", defaults.payee_id),
            default_name: text("UPI_DEFAULT_NAME", defaults.default_name),
            default_currency: text("UPI_DEFAULT_CURRENCY", defaults.default_currency),
            error_correction: parse(&lookup, "QR_ERROR_CORRECTION", defaults.error_correction)?,
            min_version,
            box_size,
            quiet_zone,
            border_size,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}")),
        _ => Ok(default),
    }
}
