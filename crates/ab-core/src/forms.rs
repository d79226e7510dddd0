//! # Input Forms
//!
//! Request payloads as the outside world sends them. Each form validates its
//! own fields and `clean`s into the write model the repository accepts.

use std::fmt;

use serde::Deserialize;
use validator::Validate;

use crate::error::Result;
use crate::models::{
    AccountId, AdChanges, AdId, CategoryId, NewAd, NewCategory, NewComment, ProfileChanges, ProfileId,
};
use crate::validation::{not_blank, price_from_json};

fn default_true() -> bool {
    true
}

#[derive(Clone, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, max = 150), custom(function = "not_blank"))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

impl fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterForm")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileForm {
    #[validate(length(max = 15))]
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

impl ProfileForm {
    pub fn clean(self) -> Result<ProfileChanges> {
        self.validate()?;
        Ok(ProfileChanges {
            phone_number: self.phone_number,
            address: self.address,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CategoryForm {
    #[validate(length(min = 1, max = 250), custom(function = "not_blank"))]
    pub name: String,
    pub description: Option<String>,
}

impl CategoryForm {
    pub fn clean(self) -> Result<NewCategory> {
        self.validate()?;
        Ok(NewCategory {
            name: self.name.trim().to_string(),
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdForm {
    #[validate(length(max = 255), custom(function = "not_blank"))]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub description: String,
    /// JSON number or numeric string
    #[serde(default)]
    pub price: serde_json::Value,
    pub profile_id: ProfileId,
    pub category_id: CategoryId,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl AdForm {
    pub fn clean(self) -> Result<NewAd> {
        self.validate()?;
        let price = price_from_json(&self.price)?;
        Ok(NewAd {
            title: self.title,
            description: self.description,
            price,
            profile_id: self.profile_id,
            category_id: self.category_id,
            is_active: self.is_active,
            image: None,
        })
    }
}

/// Partial ad update; omitted fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AdUpdateForm {
    #[validate(length(max = 255), custom(function = "not_blank"))]
    pub title: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    pub category_id: Option<CategoryId>,
    pub is_active: Option<bool>,
}

impl AdUpdateForm {
    pub fn clean(self) -> Result<AdChanges> {
        self.validate()?;
        let price = self.price.as_ref().map(price_from_json).transpose()?;
        Ok(AdChanges {
            title: self.title,
            description: self.description,
            price,
            category_id: self.category_id,
            is_active: self.is_active,
            image: None,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentForm {
    pub account_id: AccountId,
    #[validate(custom(function = "not_blank"))]
    pub content: String,
}

impl CommentForm {
    pub fn clean(self, ad_id: AdId) -> Result<NewComment> {
        self.validate()?;
        Ok(NewComment {
            content: self.content,
            ad_id,
            account_id: self.account_id,
        })
    }
}
