//! # ab-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `ab-core` domain models.

use std::str::FromStr;

use ab_core::error::Conflict;
use ab_core::listing::{AdFilter, AdSort};
use ab_core::models::{
    Account, AccountId, Ad, AdChanges, AdId, AdWithCommentCount, Category, CategoryId,
    CategorySummary, Comment, NewAccount, NewAd, NewCategory, NewComment, Profile,
    ProfileChanges, ProfileId,
};
use ab_core::traits::BoardRepo;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};

const SCHEMA: &str = include_str!("schema.sql");

const AD_COLUMNS: &str =
    "id, title, description, price_cents, created_at, updated_at, is_active, profile_id, category_id, image";

pub struct SqliteBoardRepo {
    pool: SqlitePool,
}

impl SqliteBoardRepo {
    /// Opens (or creates) the database at `url` and makes sure the schema exists.
    ///
    /// `sqlite::memory:` databases live inside a single connection, so the
    /// pool is pinned to exactly one connection that never expires.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::info!(in_memory, "sqlite schema ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ── Column conversions ──────────────────────────────────────────────────────

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

/// Drops sub-microsecond precision so returned models match what is stored.
fn stored_instant(ts: DateTime<Utc>) -> DateTime<Utc> {
    from_micros(to_micros(ts))
}

fn to_cents(price: Decimal) -> anyhow::Result<i64> {
    price
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.trunc().to_i64())
        .with_context(|| format!("price {price} out of range"))
}

fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Smallest cent amount that is >= `bound`.
fn cents_at_least(bound: Decimal) -> i64 {
    bound
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.ceil().to_i64())
        .unwrap_or_else(|| saturated_cents(bound))
}

/// Largest cent amount that is <= `bound`.
fn cents_at_most(bound: Decimal) -> i64 {
    bound
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.floor().to_i64())
        .unwrap_or_else(|| saturated_cents(bound))
}

fn saturated_cents(bound: Decimal) -> i64 {
    if bound.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    }
}

/// Surfaces a UNIQUE constraint failure as `conflict`, anything else as is.
fn unique_or(conflict: Conflict) -> impl FnOnce(sqlx::Error) -> anyhow::Error {
    move |err| {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return conflict.into();
            }
        }
        err.into()
    }
}

/// `%needle%` with LIKE wildcards in the needle escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn order_clause(sort: Option<AdSort>) -> &'static str {
    match sort {
        Some(AdSort::PriceAsc) => " ORDER BY price_cents ASC, id ASC",
        Some(AdSort::PriceDesc) => " ORDER BY price_cents DESC, id ASC",
        Some(AdSort::CreatedAsc) => " ORDER BY created_at ASC, id ASC",
        Some(AdSort::CreatedDesc) => " ORDER BY created_at DESC, id ASC",
        None => " ORDER BY id ASC",
    }
}

// ── Row mapping ─────────────────────────────────────────────────────────────

fn account_from_row(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_active: row.try_get("is_active")?,
        date_joined: from_micros(row.try_get("date_joined")?),
    })
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile, sqlx::Error> {
    Ok(Profile {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        phone_number: row.try_get("phone_number")?,
        address: row.try_get("address")?,
        email: row.try_get("email")?,
    })
}

fn category_from_row(row: &SqliteRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn ad_from_row(row: &SqliteRow) -> Result<Ad, sqlx::Error> {
    Ok(Ad {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        price: from_cents(row.try_get("price_cents")?),
        created_at: from_micros(row.try_get("created_at")?),
        updated_at: from_micros(row.try_get("updated_at")?),
        is_active: row.try_get("is_active")?,
        profile_id: row.try_get("profile_id")?,
        category_id: row.try_get("category_id")?,
        image: row.try_get("image")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment, sqlx::Error> {
    Ok(Comment {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        created_at: from_micros(row.try_get("created_at")?),
        ad_id: row.try_get("ad_id")?,
        account_id: row.try_get("account_id")?,
    })
}

fn ads_from_rows(rows: &[SqliteRow]) -> Result<Vec<Ad>, sqlx::Error> {
    rows.iter().map(ad_from_row).collect()
}

#[async_trait]
impl BoardRepo for SqliteBoardRepo {
    /// Inserts the account and its profile in one transaction so an account
    /// never exists without a profile.
    async fn register_account(
        &self,
        account: NewAccount,
        joined_at: DateTime<Utc>,
    ) -> anyhow::Result<(Account, Profile)> {
        let joined_at = stored_instant(joined_at);
        let mut tx = self.pool.begin().await?;

        let account_id = sqlx::query(
            "INSERT INTO accounts (username, email, password_hash, is_active, date_joined) VALUES (?, ?, ?, 1, ?)",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(to_micros(joined_at))
        .execute(&mut *tx)
        .await
        .map_err(unique_or(Conflict::Username))?
        .last_insert_rowid();

        let profile_id = sqlx::query("INSERT INTO profiles (account_id, email) VALUES (?, ?)")
            .bind(account_id)
            .bind(&account.email)
            .execute(&mut *tx)
            .await
            .map_err(unique_or(Conflict::Email))?
            .last_insert_rowid();

        tx.commit().await?;

        let profile = Profile {
            id: profile_id,
            account_id,
            phone_number: None,
            address: None,
            email: account.email.clone(),
        };
        let account = Account {
            id: account_id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            is_active: true,
            date_joined: joined_at,
        };
        Ok((account, profile))
    }

    async fn get_account(&self, id: AccountId) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn username_taken(&self, username: &str) -> anyhow::Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(taken)
    }

    async fn email_in_use(&self, email: &str) -> anyhow::Result<bool> {
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = ?1) OR EXISTS(SELECT 1 FROM profiles WHERE email = ?1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(in_use)
    }

    async fn count_active_accounts(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_account(&self, id: AccountId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_profile(&self, id: ProfileId) -> anyhow::Result<Option<Profile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(profile_from_row).transpose()?)
    }

    async fn get_profile_by_account(
        &self,
        account_id: AccountId,
    ) -> anyhow::Result<Option<Profile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(profile_from_row).transpose()?)
    }

    async fn update_profile(
        &self,
        id: ProfileId,
        changes: ProfileChanges,
    ) -> anyhow::Result<Option<Profile>> {
        let result = sqlx::query(
            "UPDATE profiles SET phone_number = COALESCE(?, phone_number), address = COALESCE(?, address) WHERE id = ?",
        )
        .bind(changes.phone_number)
        .bind(changes.address)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_profile(id).await
    }

    async fn list_profile_emails(&self) -> anyhow::Result<Vec<String>> {
        let emails: Vec<String> = sqlx::query_scalar(
            "SELECT p.email FROM profiles p JOIN accounts a ON a.id = p.account_id WHERE a.is_active = 1 ORDER BY p.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(emails)
    }

    async fn create_category(&self, category: NewCategory) -> anyhow::Result<Category> {
        let id = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
            .bind(&category.name)
            .bind(&category.description)
            .execute(&self.pool)
            .await
            .map_err(unique_or(Conflict::CategoryName))?
            .last_insert_rowid();
        Ok(Category {
            id,
            name: category.name,
            description: category.description,
        })
    }

    async fn get_category(&self, id: CategoryId) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(category_from_row).transpose()?)
    }

    async fn category_name_taken(&self, name: &str) -> anyhow::Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE name = ?)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(taken)
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<CategorySummary>> {
        let rows = sqlx::query(
            "SELECT c.id, c.name, c.description, COUNT(a.id) AS active_ads_count \
             FROM categories c LEFT JOIN ads a ON a.category_id = c.id AND a.is_active = 1 \
             GROUP BY c.id ORDER BY c.name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> anyhow::Result<CategorySummary> {
                Ok(CategorySummary {
                    category: category_from_row(row)?,
                    active_ads_count: row.try_get("active_ads_count")?,
                })
            })
            .collect()
    }

    async fn delete_category(&self, id: CategoryId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_ad(&self, ad: NewAd, now: DateTime<Utc>) -> anyhow::Result<Ad> {
        let now = stored_instant(now);
        let id = sqlx::query(
            "INSERT INTO ads (title, description, price_cents, created_at, updated_at, is_active, profile_id, category_id, image) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&ad.title)
        .bind(&ad.description)
        .bind(to_cents(ad.price)?)
        .bind(to_micros(now))
        .bind(to_micros(now))
        .bind(ad.is_active)
        .bind(ad.profile_id)
        .bind(ad.category_id)
        .bind(&ad.image)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Ad {
            id,
            title: ad.title,
            description: ad.description,
            price: ad.price,
            created_at: now,
            updated_at: now,
            is_active: ad.is_active,
            profile_id: ad.profile_id,
            category_id: ad.category_id,
            image: ad.image,
        })
    }

    async fn get_ad(&self, id: AdId) -> anyhow::Result<Option<Ad>> {
        let row = sqlx::query(&format!("SELECT {AD_COLUMNS} FROM ads WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(ad_from_row).transpose()?)
    }

    /// Read-modify-write inside a transaction so concurrent partial updates
    /// do not clobber each other's fields.
    async fn update_ad(
        &self,
        id: AdId,
        changes: AdChanges,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Ad>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {AD_COLUMNS} FROM ads WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(mut ad) = row.as_ref().map(ad_from_row).transpose()? else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            ad.title = title;
        }
        if let Some(description) = changes.description {
            ad.description = description;
        }
        if let Some(price) = changes.price {
            ad.price = price;
        }
        if let Some(category_id) = changes.category_id {
            ad.category_id = category_id;
        }
        if let Some(is_active) = changes.is_active {
            ad.is_active = is_active;
        }
        if let Some(image) = changes.image {
            ad.image = Some(image);
        }
        ad.updated_at = stored_instant(now).max(ad.created_at);

        sqlx::query(
            "UPDATE ads SET title = ?, description = ?, price_cents = ?, updated_at = ?, is_active = ?, category_id = ?, image = ? WHERE id = ?",
        )
        .bind(&ad.title)
        .bind(&ad.description)
        .bind(to_cents(ad.price)?)
        .bind(to_micros(ad.updated_at))
        .bind(ad.is_active)
        .bind(ad.category_id)
        .bind(&ad.image)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ad))
    }

    async fn delete_ad(&self, id: AdId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM ads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_ads_created_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE ads SET is_active = 0, updated_at = MAX(updated_at, ?) WHERE is_active = 1 AND created_at < ?",
        )
        .bind(to_micros(now))
        .bind(to_micros(cutoff))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_ads(&self, filter: &AdFilter) -> anyhow::Result<Vec<Ad>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {AD_COLUMNS} FROM ads WHERE 1 = 1"));

        if let Some(min) = filter.price_min {
            qb.push(" AND price_cents >= ").push_bind(cents_at_least(min));
        }
        if let Some(max) = filter.price_max {
            qb.push(" AND price_cents <= ").push_bind(cents_at_most(max));
        }
        if let Some(category_id) = filter.category_id {
            qb.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(from) = filter.created_from() {
            qb.push(" AND created_at >= ").push_bind(to_micros(from));
        }
        if let Some(until) = filter.created_until() {
            qb.push(" AND created_at < ").push_bind(to_micros(until));
        }
        if let Some(needle) = &filter.title_contains {
            qb.push(" AND title LIKE ")
                .push_bind(like_pattern(needle))
                .push(" ESCAPE '\\'");
        }
        qb.push(order_clause(filter.sort));

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(ads_from_rows(&rows)?)
    }

    async fn ads_created_since(&self, since: DateTime<Utc>) -> anyhow::Result<Vec<Ad>> {
        let rows = sqlx::query(&format!(
            "SELECT {AD_COLUMNS} FROM ads WHERE created_at >= ? ORDER BY id"
        ))
        .bind(to_micros(since))
        .fetch_all(&self.pool)
        .await?;
        Ok(ads_from_rows(&rows)?)
    }

    async fn count_ads_created_since(&self, since: DateTime<Utc>) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads WHERE created_at >= ?")
            .bind(to_micros(since))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn active_ads_in_category(&self, category_name: &str) -> anyhow::Result<Vec<Ad>> {
        let rows = sqlx::query(
            "SELECT a.* FROM ads a JOIN categories c ON c.id = a.category_id \
             WHERE c.name = ? AND a.is_active = 1 ORDER BY a.id",
        )
        .bind(category_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(ads_from_rows(&rows)?)
    }

    async fn ads_with_comment_counts(&self) -> anyhow::Result<Vec<AdWithCommentCount>> {
        let rows = sqlx::query(
            "SELECT a.*, COUNT(c.id) AS comments_count \
             FROM ads a LEFT JOIN comments c ON c.ad_id = a.id \
             GROUP BY a.id ORDER BY a.id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> anyhow::Result<AdWithCommentCount> {
                Ok(AdWithCommentCount {
                    ad: ad_from_row(row)?,
                    comments_count: row.try_get("comments_count")?,
                })
            })
            .collect()
    }

    async fn active_ads_by_owner(&self, profile_id: ProfileId) -> anyhow::Result<Vec<Ad>> {
        let rows = sqlx::query(&format!(
            "SELECT {AD_COLUMNS} FROM ads WHERE profile_id = ? AND is_active = 1 ORDER BY id"
        ))
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ads_from_rows(&rows)?)
    }

    async fn ads_by_owner(&self, profile_id: ProfileId) -> anyhow::Result<Vec<Ad>> {
        let rows = sqlx::query(&format!(
            "SELECT {AD_COLUMNS} FROM ads WHERE profile_id = ? ORDER BY id"
        ))
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ads_from_rows(&rows)?)
    }

    async fn create_comment(
        &self,
        comment: NewComment,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Comment> {
        let now = stored_instant(now);
        let id = sqlx::query(
            "INSERT INTO comments (content, created_at, ad_id, account_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&comment.content)
        .bind(to_micros(now))
        .bind(comment.ad_id)
        .bind(comment.account_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Comment {
            id,
            content: comment.content,
            created_at: now,
            ad_id: comment.ad_id,
            account_id: comment.account_id,
        })
    }

    async fn comments_for_ad(&self, ad_id: AdId) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query("SELECT * FROM comments WHERE ad_id = ? ORDER BY created_at, id")
            .bind(ad_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(comment_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count_comments_for_ad(&self, ad_id: AdId) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE ad_id = ?")
            .bind(ad_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_comments_by_account(&self, account_id: AccountId) -> anyhow::Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
