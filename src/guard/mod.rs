//! Abuse guard: ban list plus per-identity request quota.

pub mod ip_hash;
pub mod rate_limit;

pub use ip_hash::{client_ip, hash_ip};
pub use rate_limit::RateLimiter;

use sqlx::{Pool, Sqlite};

use crate::db::BanRepository;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Banned,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow { ip_hash: String },
    Deny { ip_hash: String, reason: DenyReason },
}

impl Admission {
    /// Turn a denial into the caller-facing error.
    pub fn into_result(self) -> Result<String, AppError> {
        match self {
            Admission::Allow { ip_hash } => Ok(ip_hash),
            Admission::Deny { reason: DenyReason::Banned, .. } => Err(AppError::Banned),
            Admission::Deny { reason: DenyReason::RateLimited, .. } => Err(AppError::RateLimited),
        }
    }
}

/// Owns the in-memory quota state. Nothing else touches the counters;
/// they are only reachable through [`AbuseGuard::admit`] and the sweep.
#[derive(Clone)]
pub struct AbuseGuard {
    limiter: RateLimiter,
}

impl AbuseGuard {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            limiter: RateLimiter::new(max_requests, window_secs),
        }
    }

    pub async fn admit(&self, db: &Pool<Sqlite>, client_ip: &str) -> Result<Admission, AppError> {
        let ip_hash = hash_ip(client_ip);

        if BanRepository::is_banned(db, &ip_hash).await? {
            tracing::warn!(ip_hash = %ip_hash, "Banned client rejected");
            return Ok(Admission::Deny { ip_hash, reason: DenyReason::Banned });
        }

        if !self.limiter.check(&ip_hash).await {
            tracing::warn!(ip_hash = %ip_hash, "Rate limit exceeded");
            return Ok(Admission::Deny { ip_hash, reason: DenyReason::RateLimited });
        }

        Ok(Admission::Allow { ip_hash })
    }

    /// Drop expired windows. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        self.limiter.cleanup().await
    }
}
