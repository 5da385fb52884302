//! Clinic configuration parsing and defaults.
//!
//! Quotas, lockout rules, and the session timeout are configuration,
//! not state: the engine reads them once at startup and never mutates
//! them. Files are TOML; every field has a default matching the
//! clinic's historical settings, so an empty file is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::credentials::LockoutPolicy;
use crate::session::SessionPolicy;
use crate::slot::HalfDay;

/// Top-level clinic configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ClinicConfig {
    /// Clinic identity, used in notification content.
    #[serde(default)]
    pub clinic: ClinicInfo,

    /// Half-day booking quotas.
    #[serde(default)]
    pub capacity: CapacityConfig,

    /// Credential hashing and lockout settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Admin session settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl ClinicConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "clinic configuration loaded");
        Ok(config)
    }

    /// Parses configuration from a TOML string and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a field is out of
    /// range (zero quota, weakened hash iterations, zero windows).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity.am_quota == 0 || self.capacity.pm_quota == 0 {
            return Err(ConfigError::Validation(
                "capacity quotas must be at least 1".to_string(),
            ));
        }
        if self.auth.hash_iterations < 10_000 {
            return Err(ConfigError::Validation(
                "auth.hash_iterations must be at least 10000".to_string(),
            ));
        }
        if self.auth.max_failed_attempts == 0 {
            return Err(ConfigError::Validation(
                "auth.max_failed_attempts must be at least 1".to_string(),
            ));
        }
        if self.auth.lockout_minutes == 0 {
            return Err(ConfigError::Validation(
                "auth.lockout_minutes must be at least 1".to_string(),
            ));
        }
        if self.session.timeout_minutes == 0 {
            return Err(ConfigError::Validation(
                "session.timeout_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Clinic identity block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClinicInfo {
    /// Display name.
    #[serde(default = "default_clinic_name")]
    pub name: String,
    /// Street address.
    #[serde(default = "default_clinic_address")]
    pub address: String,
    /// Front-desk phone.
    #[serde(default = "default_clinic_phone")]
    pub phone: String,
}

impl Default for ClinicInfo {
    fn default() -> Self {
        Self {
            name: default_clinic_name(),
            address: default_clinic_address(),
            phone: default_clinic_phone(),
        }
    }
}

/// Half-day booking quotas. Symmetric by default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityConfig {
    /// Maximum appointments admitted into any AM slot.
    #[serde(default = "default_quota")]
    pub am_quota: u32,
    /// Maximum appointments admitted into any PM slot.
    #[serde(default = "default_quota")]
    pub pm_quota: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            am_quota: default_quota(),
            pm_quota: default_quota(),
        }
    }
}

impl CapacityConfig {
    /// The quota that applies to one half-day bucket.
    #[must_use]
    pub const fn quota_for(&self, half_day: HalfDay) -> u32 {
        match half_day {
            HalfDay::Am => self.am_quota,
            HalfDay::Pm => self.pm_quota,
        }
    }
}

/// Credential hashing and lockout settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    /// SHA-256 rounds applied to `secret || salt`.
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    /// Consecutive failures that lock the account.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    /// Lock duration in minutes.
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hash_iterations: default_hash_iterations(),
            max_failed_attempts: default_max_failed_attempts(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

impl AuthConfig {
    /// The lockout policy these settings describe.
    #[must_use]
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_failures: self.max_failed_attempts,
            lock_minutes: i64::from(self.lockout_minutes),
        }
    }
}

/// Admin session settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Session timeout in minutes; renewal extends expiry by this much.
    #[serde(default = "default_session_timeout")]
    pub timeout_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_session_timeout(),
        }
    }
}

impl SessionConfig {
    /// The session policy these settings describe.
    #[must_use]
    pub fn policy(&self) -> SessionPolicy {
        SessionPolicy {
            timeout_minutes: i64::from(self.timeout_minutes),
        }
    }
}

fn default_clinic_name() -> String {
    "DermaClinic".to_string()
}

fn default_clinic_address() -> String {
    "123 Skin Care St, Dermatology City".to_string()
}

fn default_clinic_phone() -> String {
    "09170000000".to_string()
}

const fn default_quota() -> u32 {
    20
}

const fn default_hash_iterations() -> u32 {
    10_000
}

const fn default_max_failed_attempts() -> u32 {
    5
}

const fn default_lockout_minutes() -> u32 {
    30
}

const fn default_session_timeout() -> u32 {
    30
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field is out of range.
    #[error("config validation failed: {0}")]
    Validation(String),
}
