//! # Board Service
//!
//! Orchestrates the repository, credential handling and the job queue.
//! Every ad write ends in [`BoardService::after_ad_saved`], which enqueues the
//! expiry sweep and, for new ads, the owner notification. Neither is awaited.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use validator::Validate;

use crate::error::{AppError, Conflict, Result};
use crate::forms::{AdForm, AdUpdateForm, CategoryForm, CommentForm, ProfileForm, RegisterForm};
use crate::jobs::{Job, JobQueue};
use crate::lifecycle;
use crate::listing::{AdFilter, ListingParams};
use crate::models::{
    Account, AccountId, Ad, AdChanges, AdId, AdWithCommentCount, Category, CategoryId,
    CategorySummary, Comment, NewAccount, Profile, ProfileId,
};
use crate::traits::{AuthProvider, BoardRepo};

/// A comment with the author's username resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: String,
}

/// Everything the ad page shows.
#[derive(Debug, Clone, Serialize)]
pub struct AdDetail {
    pub ad: Ad,
    pub category: Option<Category>,
    pub comments: Vec<CommentView>,
    pub total_comments: i64,
}

impl AdDetail {
    /// "Comment by {username} on {ad title}"
    pub fn comment_caption(&self, view: &CommentView) -> String {
        format!("Comment by {} on {}", view.author, self.ad.title)
    }
}

/// Everything the user page shows.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub account: Account,
    pub profile: Profile,
    pub ads: Vec<Ad>,
    pub total_ads: usize,
    pub total_comments: i64,
}

#[derive(Clone)]
pub struct BoardService {
    repo: Arc<dyn BoardRepo>,
    auth: Arc<dyn AuthProvider>,
    jobs: JobQueue,
}

impl BoardService {
    pub fn new(repo: Arc<dyn BoardRepo>, auth: Arc<dyn AuthProvider>, jobs: JobQueue) -> Self {
        Self { repo, auth, jobs }
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    // ── Accounts ────────────────────────────────────────────────────────────

    /// Creates an account plus its profile and queues the welcome email.
    #[tracing::instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: RegisterForm) -> Result<(Account, Profile)> {
        form.validate()?;
        if self.repo.email_in_use(&form.email).await? {
            return Err(Conflict::Email.into());
        }
        if self.repo.username_taken(&form.username).await? {
            return Err(Conflict::Username.into());
        }

        let password_hash = self.auth.hash_password(&form.password)?;
        let (account, profile) = self
            .repo
            .register_account(
                NewAccount {
                    username: form.username,
                    email: form.email,
                    password_hash,
                },
                Utc::now(),
            )
            .await?;

        tracing::info!(account_id = account.id, profile_id = profile.id, "account registered");
        self.jobs.dispatch(Job::SendRegistrationEmail {
            email: account.email.clone(),
        });
        Ok((account, profile))
    }

    pub async fn update_profile(&self, id: ProfileId, form: ProfileForm) -> Result<Profile> {
        let changes = form.clean()?;
        self.repo
            .update_profile(id, changes)
            .await?
            .ok_or_else(|| AppError::not_found("Profile", id))
    }

    pub async fn user_detail(&self, account_id: AccountId) -> Result<UserDetail> {
        let account = self
            .repo
            .get_account(account_id)
            .await?
            .ok_or_else(|| AppError::not_found("User", account_id))?;
        let profile = self
            .repo
            .get_profile_by_account(account_id)
            .await?
            .ok_or_else(|| AppError::not_found("Profile", account_id))?;
        let ads = self.repo.ads_by_owner(profile.id).await?;
        let total_comments = self.repo.count_comments_by_account(account_id).await?;
        Ok(UserDetail {
            total_ads: ads.len(),
            account,
            profile,
            ads,
            total_comments,
        })
    }

    // ── Categories ──────────────────────────────────────────────────────────

    pub async fn create_category(&self, form: CategoryForm) -> Result<Category> {
        let new_category = form.clean()?;
        if self.repo.category_name_taken(&new_category.name).await? {
            return Err(Conflict::CategoryName.into());
        }
        Ok(self.repo.create_category(new_category).await?)
    }

    pub async fn categories(&self) -> Result<Vec<CategorySummary>> {
        Ok(self.repo.list_categories().await?)
    }

    /// A category and its currently active ads.
    pub async fn category_detail(&self, id: CategoryId) -> Result<(Category, Vec<Ad>)> {
        let category = self
            .repo
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::not_found("Category", id))?;
        let ads = self.repo.active_ads_in_category(&category.name).await?;
        Ok((category, ads))
    }

    // ── Ads: writes ─────────────────────────────────────────────────────────

    #[tracing::instrument(skip(self, form), fields(title = %form.title))]
    pub async fn create_ad(&self, form: AdForm) -> Result<Ad> {
        let new_ad = form.clean()?;
        let profile = self
            .repo
            .get_profile(new_ad.profile_id)
            .await?
            .ok_or_else(|| {
                AppError::validation(format!("profile {} does not exist", new_ad.profile_id))
            })?;
        self.ensure_category(new_ad.category_id).await?;
        let owner = self
            .repo
            .get_account(profile.account_id)
            .await?
            .ok_or_else(|| AppError::not_found("User", profile.account_id))?;

        let ad = self.repo.create_ad(new_ad, Utc::now()).await?;
        tracing::info!(ad_id = ad.id, profile_id = ad.profile_id, "ad created");

        self.after_ad_saved(&ad);
        self.jobs.dispatch(Job::NotifyAdCreated {
            to: profile.email,
            username: owner.username,
            title: ad.title.clone(),
        });
        Ok(ad)
    }

    #[tracing::instrument(skip(self, form))]
    pub async fn update_ad(&self, id: AdId, form: AdUpdateForm) -> Result<Ad> {
        let changes = form.clean()?;
        if let Some(category_id) = changes.category_id {
            self.ensure_category(category_id).await?;
        }
        self.save_changes(id, changes).await
    }

    /// Points the ad at an uploaded image.
    pub async fn attach_image(&self, id: AdId, media_id: String) -> Result<Ad> {
        let changes = AdChanges {
            image: Some(media_id),
            ..AdChanges::default()
        };
        self.save_changes(id, changes).await
    }

    pub async fn delete_ad(&self, id: AdId) -> Result<()> {
        if !self.repo.delete_ad(id).await? {
            return Err(AppError::not_found("Ad", id));
        }
        tracing::info!(ad_id = id, "ad deleted");
        Ok(())
    }

    /// Runs the expiry sweep inline and reports how many ads were switched off.
    pub async fn sweep_expired_ads(&self) -> Result<u64> {
        Ok(lifecycle::deactivate_old_ads(self.repo.as_ref(), Utc::now()).await?)
    }

    async fn save_changes(&self, id: AdId, changes: AdChanges) -> Result<Ad> {
        let ad = self
            .repo
            .update_ad(id, changes, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("Ad", id))?;
        tracing::info!(ad_id = ad.id, "ad updated");
        self.after_ad_saved(&ad);
        Ok(ad)
    }

    /// Post-save hook shared by every ad write. Any save re-evaluates all ads,
    /// not only the one that changed.
    fn after_ad_saved(&self, ad: &Ad) {
        tracing::debug!(ad_id = ad.id, "queueing expiry sweep");
        self.jobs.dispatch(Job::DeactivateOldAds);
    }

    async fn ensure_category(&self, id: CategoryId) -> Result<()> {
        match self.repo.get_category(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::validation(format!("category {id} does not exist"))),
        }
    }

    // ── Ads: reads ──────────────────────────────────────────────────────────

    pub async fn get_ad(&self, id: AdId) -> Result<Ad> {
        self.repo
            .get_ad(id)
            .await?
            .ok_or_else(|| AppError::not_found("Ad", id))
    }

    pub async fn ad_detail(&self, id: AdId) -> Result<AdDetail> {
        let ad = self.get_ad(id).await?;
        let category = self.repo.get_category(ad.category_id).await?;
        let total_comments = self.repo.count_comments_for_ad(id).await?;

        let mut authors: BTreeMap<AccountId, String> = BTreeMap::new();
        let mut comments = Vec::new();
        for comment in self.repo.comments_for_ad(id).await? {
            if !authors.contains_key(&comment.account_id) {
                let name = self
                    .repo
                    .get_account(comment.account_id)
                    .await?
                    .map(|account| account.username)
                    .unwrap_or_default();
                authors.insert(comment.account_id, name);
            }
            let author = authors.get(&comment.account_id).cloned().unwrap_or_default();
            comments.push(CommentView { comment, author });
        }

        Ok(AdDetail {
            ad,
            category,
            comments,
            total_comments,
        })
    }

    pub async fn list_ads(&self, params: &ListingParams) -> Result<Vec<Ad>> {
        let filter = AdFilter::from_params(params)?;
        Ok(self.repo.list_ads(&filter).await?)
    }

    pub async fn ads_last_month(&self) -> Result<Vec<Ad>> {
        let since = lifecycle::expiry_cutoff(Utc::now());
        Ok(self.repo.ads_created_since(since).await?)
    }

    pub async fn count_ads_last_month(&self) -> Result<i64> {
        let since = lifecycle::expiry_cutoff(Utc::now());
        Ok(self.repo.count_ads_created_since(since).await?)
    }

    pub async fn ads_with_comment_counts(&self) -> Result<Vec<AdWithCommentCount>> {
        Ok(self.repo.ads_with_comment_counts().await?)
    }

    /// Active ads of one owner.
    pub async fn profile_ads(&self, profile_id: ProfileId) -> Result<Vec<Ad>> {
        if self.repo.get_profile(profile_id).await?.is_none() {
            return Err(AppError::not_found("Profile", profile_id));
        }
        Ok(self.repo.active_ads_by_owner(profile_id).await?)
    }

    // ── Comments ────────────────────────────────────────────────────────────

    pub async fn add_comment(&self, ad_id: AdId, form: CommentForm) -> Result<Comment> {
        let new_comment = form.clean(ad_id)?;
        self.get_ad(ad_id).await?;
        if self.repo.get_account(new_comment.account_id).await?.is_none() {
            return Err(AppError::validation(format!(
                "user {} does not exist",
                new_comment.account_id
            )));
        }
        let comment = self.repo.create_comment(new_comment, Utc::now()).await?;
        tracing::info!(comment_id = comment.id, ad_id, "comment added");
        Ok(comment)
    }

    pub async fn comments(&self, ad_id: AdId) -> Result<Vec<Comment>> {
        self.get_ad(ad_id).await?;
        Ok(self.repo.comments_for_ad(ad_id).await?)
    }
}
