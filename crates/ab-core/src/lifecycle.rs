//! # Ad Lifecycle
//!
//! Ads stay listed for a fixed window after creation. Once the window has
//! passed, the sweep switches them off. The sweep only ever turns ads off, so
//! overlapping runs end in the same state.

use chrono::{DateTime, Duration, Utc};

use crate::models::Ad;
use crate::traits::BoardRepo;

/// How long an ad stays active after creation.
pub const AD_LIFETIME_DAYS: i64 = 30;

/// Ads created strictly before this instant are stale.
pub fn expiry_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(AD_LIFETIME_DAYS)
}

/// Whether the sweep would deactivate `ad` at `now`.
pub fn is_expired(ad: &Ad, now: DateTime<Utc>) -> bool {
    ad.is_active && ad.created_at < expiry_cutoff(now)
}

/// Whether `ad` falls inside the last-month window.
pub fn is_recent(ad: &Ad, now: DateTime<Utc>) -> bool {
    ad.created_at >= expiry_cutoff(now)
}

/// Deactivates every active ad older than the lifetime window.
pub async fn deactivate_old_ads(repo: &dyn BoardRepo, now: DateTime<Utc>) -> anyhow::Result<u64> {
    let cutoff = expiry_cutoff(now);
    let deactivated = repo.deactivate_ads_created_before(cutoff, now).await?;
    if deactivated > 0 {
        tracing::info!(deactivated, %cutoff, "deactivated stale ads");
    } else {
        tracing::debug!(%cutoff, "no stale ads to deactivate");
    }
    Ok(deactivated)
}
