//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::listing::AdFilter;
use crate::models::{
    Account, AccountId, Ad, AdChanges, AdId, AdWithCommentCount, Category, CategoryId,
    CategorySummary, Comment, NewAccount, NewAd, NewCategory, NewComment, Profile,
    ProfileChanges, ProfileId,
};
use crate::notifications::EmailMessage;

/// Data persistence contract for accounts, categories, ads, and comments.
///
/// Deleting a row removes everything that references it (account → profile →
/// ads → comments, category → ads → comments).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BoardRepo: Send + Sync {
    // Account Operations
    /// Creates the account and its profile atomically.
    async fn register_account(
        &self,
        account: NewAccount,
        joined_at: DateTime<Utc>,
    ) -> anyhow::Result<(Account, Profile)>;
    async fn get_account(&self, id: AccountId) -> anyhow::Result<Option<Account>>;
    async fn username_taken(&self, username: &str) -> anyhow::Result<bool>;
    /// True when any account or profile already uses this email.
    async fn email_in_use(&self, email: &str) -> anyhow::Result<bool>;
    async fn count_active_accounts(&self) -> anyhow::Result<i64>;
    async fn delete_account(&self, id: AccountId) -> anyhow::Result<bool>;

    // Profile Operations
    async fn get_profile(&self, id: ProfileId) -> anyhow::Result<Option<Profile>>;
    async fn get_profile_by_account(&self, account_id: AccountId)
        -> anyhow::Result<Option<Profile>>;
    async fn update_profile(
        &self,
        id: ProfileId,
        changes: ProfileChanges,
    ) -> anyhow::Result<Option<Profile>>;
    async fn list_profile_emails(&self) -> anyhow::Result<Vec<String>>;

    // Category Operations
    async fn create_category(&self, category: NewCategory) -> anyhow::Result<Category>;
    async fn get_category(&self, id: CategoryId) -> anyhow::Result<Option<Category>>;
    async fn category_name_taken(&self, name: &str) -> anyhow::Result<bool>;
    /// All categories by name, each with its active ad count.
    async fn list_categories(&self) -> anyhow::Result<Vec<CategorySummary>>;
    async fn delete_category(&self, id: CategoryId) -> anyhow::Result<bool>;

    // Ad Operations
    async fn create_ad(&self, ad: NewAd, now: DateTime<Utc>) -> anyhow::Result<Ad>;
    async fn get_ad(&self, id: AdId) -> anyhow::Result<Option<Ad>>;
    /// Applies `changes` and refreshes `updated_at`. `None` if the ad is gone.
    async fn update_ad(
        &self,
        id: AdId,
        changes: AdChanges,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Ad>>;
    async fn delete_ad(&self, id: AdId) -> anyhow::Result<bool>;
    /// Flips every active ad created before `cutoff` to inactive.
    /// Returns how many rows changed.
    async fn deactivate_ads_created_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<u64>;

    // Ad Queries
    async fn list_ads(&self, filter: &AdFilter) -> anyhow::Result<Vec<Ad>>;
    async fn ads_created_since(&self, since: DateTime<Utc>) -> anyhow::Result<Vec<Ad>>;
    async fn count_ads_created_since(&self, since: DateTime<Utc>) -> anyhow::Result<i64>;
    async fn active_ads_in_category(&self, category_name: &str) -> anyhow::Result<Vec<Ad>>;
    async fn ads_with_comment_counts(&self) -> anyhow::Result<Vec<AdWithCommentCount>>;
    async fn active_ads_by_owner(&self, profile_id: ProfileId) -> anyhow::Result<Vec<Ad>>;
    async fn ads_by_owner(&self, profile_id: ProfileId) -> anyhow::Result<Vec<Ad>>;

    // Comment Operations
    async fn create_comment(
        &self,
        comment: NewComment,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Comment>;
    async fn comments_for_ad(&self, ad_id: AdId) -> anyhow::Result<Vec<Comment>>;
    async fn count_comments_for_ad(&self, ad_id: AdId) -> anyhow::Result<i64>;
    async fn count_comments_by_account(&self, account_id: AccountId) -> anyhow::Result<i64>;
}

/// Media storage contract for ad images.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Saves raw bytes and returns a media_id for the Ad model.
    async fn save_upload(&self, data: Vec<u8>, content_type: &str) -> anyhow::Result<String>;
    /// Returns the URL or path to the original media.
    fn url(&self, media_id: &str) -> String;
    /// Returns the URL or path to the thumbnail.
    fn thumbnail_url(&self, media_id: &str) -> String;
}

/// Credential handling contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthProvider: Send + Sync {
    /// Produces a self-describing hash (salt included) for storage.
    fn hash_password(&self, password: &str) -> anyhow::Result<String>;
}

/// Outbound email transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}
