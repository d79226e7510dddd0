//! # Domain Models
//!
//! These structs represent the core entities of the Ad Board.
//! Identifiers are store-assigned integers so they can travel in URLs as-is.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type AccountId = i64;
pub type ProfileId = i64;
pub type CategoryId = i64;
pub type AdId = i64;
pub type CommentId = i64;

/// Number of characters kept by [`Ad::short_description`].
pub const SHORT_DESCRIPTION_LEN: usize = 100;

/// Base identity a person registers with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Contact data layered on top of an [`Account`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: ProfileId,
    pub account_id: AccountId,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub email: String,
}

/// A grouping for ads (e.g., Electronics, Cars, Jobs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A category paired with the number of its currently active ads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub active_ads_count: i64,
}

/// A classified listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ad {
    pub id: AdId,
    pub title: String,
    pub description: String,
    /// Always positive, two fraction digits
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    /// Owning profile
    pub profile_id: ProfileId,
    pub category_id: CategoryId,
    /// Media id handed out by the MediaStore
    pub image: Option<String>,
}

impl Ad {
    /// The description cut down to at most 100 characters.
    pub fn short_description(&self) -> &str {
        match self.description.char_indices().nth(SHORT_DESCRIPTION_LEN) {
            Some((cut, _)) => &self.description[..cut],
            None => &self.description,
        }
    }
}

impl fmt::Display for Ad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.price)
    }
}

/// An ad annotated with the number of comments left on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdWithCommentCount {
    #[serde(flatten)]
    pub ad: Ad,
    pub comments_count: i64,
}

/// A remark left by an account on an ad.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub ad_id: AdId,
    pub account_id: AccountId,
}

// ── Write models ────────────────────────────────────────────────────────────

/// Account + profile data produced by a successful registration.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAd {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub profile_id: ProfileId,
    pub category_id: CategoryId,
    pub is_active: bool,
    pub image: Option<String>,
}

/// Partial update of an ad. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct AdChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub is_active: Option<bool>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub ad_id: AdId,
    pub account_id: AccountId,
}
