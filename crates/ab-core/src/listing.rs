//! # Ad Listing Filters
//!
//! Turns the raw `?price_min=..&sort=..` query of the listing page into a
//! typed [`AdFilter`]. Every predicate is optional and they all combine with
//! AND. Storage adapters translate the filter into their own query language;
//! [`AdFilter::matches`] and [`AdSort::compare`] are the reference semantics.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Ad, CategoryId};

/// Raw listing query parameters as they arrive over HTTP.
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListingParams {
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub category: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
}

/// The orderings a listing may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdSort {
    PriceAsc,
    PriceDesc,
    CreatedAsc,
    CreatedDesc,
}

impl AdSort {
    /// Parses the `sort` parameter. Keys outside the allow-list yield `None`.
    pub fn from_param(key: &str) -> Option<Self> {
        match key {
            "price" => Some(AdSort::PriceAsc),
            "-price" => Some(AdSort::PriceDesc),
            "created_at" => Some(AdSort::CreatedAsc),
            "-created_at" => Some(AdSort::CreatedDesc),
            _ => None,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            AdSort::PriceAsc => "price",
            AdSort::PriceDesc => "-price",
            AdSort::CreatedAsc => "created_at",
            AdSort::CreatedDesc => "-created_at",
        }
    }

    /// Orders two ads; ties fall back to ascending id.
    pub fn compare(&self, a: &Ad, b: &Ad) -> Ordering {
        let primary = match self {
            AdSort::PriceAsc => a.price.cmp(&b.price),
            AdSort::PriceDesc => b.price.cmp(&a.price),
            AdSort::CreatedAsc => a.created_at.cmp(&b.created_at),
            AdSort::CreatedDesc => b.created_at.cmp(&a.created_at),
        };
        primary.then(a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdFilter {
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    /// Inclusive, compared against the UTC creation date
    pub date_from: Option<NaiveDate>,
    /// Inclusive, compared against the UTC creation date
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive title substring
    pub title_contains: Option<String>,
    pub sort: Option<AdSort>,
}

fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_decimal(name: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|_| AppError::validation(format!("{name}: must be a number")))
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("{name}: expected a date as YYYY-MM-DD")))
}

impl AdFilter {
    /// Builds a filter from query parameters. Malformed values are rejected;
    /// an unknown sort key is dropped.
    pub fn from_params(params: &ListingParams) -> Result<Self> {
        let price_min = present(&params.price_min)
            .map(|raw| parse_decimal("price_min", raw))
            .transpose()?;
        let price_max = present(&params.price_max)
            .map(|raw| parse_decimal("price_max", raw))
            .transpose()?;
        let category_id = present(&params.category)
            .map(|raw| {
                raw.parse::<CategoryId>()
                    .map_err(|_| AppError::validation("category: must be a numeric id"))
            })
            .transpose()?;
        let date_from = present(&params.date_from)
            .map(|raw| parse_date("date_from", raw))
            .transpose()?;
        let date_to = present(&params.date_to)
            .map(|raw| parse_date("date_to", raw))
            .transpose()?;
        let title_contains = present(&params.q).map(str::to_string);
        let sort = present(&params.sort).and_then(AdSort::from_param);

        Ok(Self {
            price_min,
            price_max,
            category_id,
            date_from,
            date_to,
            title_contains,
            sort,
        })
    }

    /// First instant included by `date_from`.
    pub fn created_from(&self) -> Option<DateTime<Utc>> {
        self.date_from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// First instant excluded by `date_to` (midnight of the following day).
    pub fn created_until(&self) -> Option<DateTime<Utc>> {
        self.date_to
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub fn matches(&self, ad: &Ad) -> bool {
        if self.price_min.is_some_and(|min| ad.price < min) {
            return false;
        }
        if self.price_max.is_some_and(|max| ad.price > max) {
            return false;
        }
        if self.category_id.is_some_and(|id| ad.category_id != id) {
            return false;
        }
        if self.created_from().is_some_and(|from| ad.created_at < from) {
            return false;
        }
        if self.created_until().is_some_and(|until| ad.created_at >= until) {
            return false;
        }
        if let Some(needle) = &self.title_contains {
            if !ad.title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }

    /// Filters and orders `ads`. Without a sort key the input order is kept.
    pub fn apply(&self, ads: Vec<Ad>) -> Vec<Ad> {
        let mut kept: Vec<Ad> = ads.into_iter().filter(|ad| self.matches(ad)).collect();
        if let Some(sort) = self.sort {
            kept.sort_by(|a, b| sort.compare(a, b));
        }
        kept
    }
}
