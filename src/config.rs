//! Service configuration.
//!
//! Every tunable has a serde default so a partial JSON config file (or none
//! at all) yields a working service.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Bearer token lifetime in seconds (default: 3600)
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,

    /// Secret for token signing. Must be overridden in production.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Consecutive failed logins before a principal is locked out (default: 5)
    #[serde(default = "default_lockout_threshold")]
    pub lockout_threshold: u32,

    /// Lockout duration in seconds (default: 900)
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: i64,

    /// Per-subscription event queue capacity (default: 256)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds a principal may linger in Grace before it is considered gone
    /// (default: 30)
    #[serde(default = "default_grace_secs")]
    pub grace_secs: i64,

    /// Interval between lock-state reconciliation emissions, in milliseconds
    /// (default: 2000)
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,

    /// Capacity of the in-memory audit fallback ring (default: 10000)
    #[serde(default = "default_audit_ring_capacity")]
    pub audit_ring_capacity: usize,

    /// When true, an audit append that cannot reach the store is fatal
    /// instead of degrading to the in-memory ring (default: false)
    #[serde(default)]
    pub strict_audit: bool,

    /// Maximum accepted request size in bytes (default: 1 MiB)
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    /// Username seeded with the admin role at first startup (default: "admin")
    #[serde(default = "default_seed_admin")]
    pub seed_admin: String,

    /// Password for the seeded admin; no admin is seeded when unset
    #[serde(default)]
    pub seed_admin_password: Option<String>,

    /// Chat database path; `None` selects the in-memory store
    #[serde(default)]
    pub chat_db_path: Option<PathBuf>,

    /// Audit database path; `None` selects the in-memory store
    #[serde(default)]
    pub logs_db_path: Option<PathBuf>,
}

fn default_token_ttl_secs() -> i64 {
    3600
}

fn default_token_secret() -> String {
    "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string()
}

fn default_lockout_threshold() -> u32 {
    5
}

fn default_lockout_secs() -> i64 {
    900
}

fn default_queue_capacity() -> usize {
    256
}

fn default_grace_secs() -> i64 {
    30
}

fn default_reconcile_interval_ms() -> u64 {
    2000
}

fn default_audit_ring_capacity() -> usize {
    10_000
}

fn default_max_request_bytes() -> usize {
    1024 * 1024
}

fn default_seed_admin() -> String {
    "admin".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl_secs(),
            token_secret: default_token_secret(),
            lockout_threshold: default_lockout_threshold(),
            lockout_secs: default_lockout_secs(),
            queue_capacity: default_queue_capacity(),
            grace_secs: default_grace_secs(),
            reconcile_interval_ms: default_reconcile_interval_ms(),
            audit_ring_capacity: default_audit_ring_capacity(),
            strict_audit: false,
            max_request_bytes: default_max_request_bytes(),
            seed_admin: default_seed_admin(),
            seed_admin_password: None,
            chat_db_path: None,
            logs_db_path: None,
        }
    }
}
