//! # ab-ui
//!
//! Askama page templates for the public board pages.

use ab_core::listing::{AdSort, ListingParams};
use ab_core::models::{Ad, Category, CategorySummary};
use ab_core::services::{AdDetail, UserDetail};
use askama::Template;

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate<'a> {
    pub title: &'a str,
    pub last_month_ads_count: i64,
}

/// Raw filter values echoed back into the listing form.
#[derive(Debug, Default)]
pub struct FilterValues {
    pub price_min: String,
    pub price_max: String,
    pub category: String,
    pub date_from: String,
    pub date_to: String,
    pub q: String,
}

impl From<&ListingParams> for FilterValues {
    fn from(params: &ListingParams) -> Self {
        let text = |raw: &Option<String>| raw.clone().unwrap_or_default();
        Self {
            price_min: text(&params.price_min),
            price_max: text(&params.price_max),
            category: text(&params.category),
            date_from: text(&params.date_from),
            date_to: text(&params.date_to),
            q: text(&params.q),
        }
    }
}

pub struct SortOption {
    pub key: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// The allowed orderings, with the requested one marked.
pub fn sort_options(requested: Option<&str>) -> Vec<SortOption> {
    [
        (AdSort::PriceAsc, "Price: low to high"),
        (AdSort::PriceDesc, "Price: high to low"),
        (AdSort::CreatedAsc, "Oldest first"),
        (AdSort::CreatedDesc, "Newest first"),
    ]
    .into_iter()
    .map(|(sort, label)| SortOption {
        key: sort.as_param(),
        label,
        selected: requested == Some(sort.as_param()),
    })
    .collect()
}

#[derive(Template)]
#[template(path = "ad_list.html")]
pub struct AdListTemplate<'a> {
    pub title: &'a str,
    pub ads: &'a [Ad],
    pub categories: &'a [CategorySummary],
    pub filters: FilterValues,
    pub sort_options: Vec<SortOption>,
}

#[derive(Template)]
#[template(path = "ad_detail.html")]
pub struct AdDetailTemplate<'a> {
    pub title: &'a str,
    pub detail: &'a AdDetail,
    pub image_url: Option<String>,
    pub thumb_url: Option<String>,
}

#[derive(Template)]
#[template(path = "categories.html")]
pub struct CategoriesTemplate<'a> {
    pub title: &'a str,
    pub categories: &'a [CategorySummary],
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryTemplate<'a> {
    pub title: &'a str,
    pub category: &'a Category,
    pub ads: &'a [Ad],
}

#[derive(Template)]
#[template(path = "user.html")]
pub struct UserTemplate<'a> {
    pub title: &'a str,
    pub detail: &'a UserDetail,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_core::models::{Account, Comment, Profile};
    use ab_core::services::CommentView;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn ad(id: i64, title: &str) -> Ad {
        let created = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        Ad {
            id,
            title: title.into(),
            description: "x".repeat(150),
            price: Decimal::new(19_999, 2),
            created_at: created,
            updated_at: created,
            is_active: true,
            profile_id: 1,
            category_id: 1,
            image: None,
        }
    }

    fn category() -> Category {
        Category {
            id: 7,
            name: "Electronics".into(),
            description: Some("Gadgets".into()),
        }
    }

    #[test]
    fn home_shows_the_monthly_count() {
        let html = HomeTemplate {
            title: "Home",
            last_month_ads_count: 12,
        }
        .render()
        .unwrap();
        assert!(html.contains("<strong>12</strong>"));
    }

    #[test]
    fn listing_echoes_filters_and_truncates_descriptions() {
        let params = ListingParams {
            q: Some("bike".into()),
            category: Some("7".into()),
            sort: Some("-price".into()),
            ..Default::default()
        };
        let ads = vec![ad(1, "Red <bike>")];
        let categories = vec![CategorySummary {
            category: category(),
            active_ads_count: 1,
        }];
        let html = AdListTemplate {
            title: "Ads",
            ads: &ads,
            categories: &categories,
            filters: FilterValues::from(&params),
            sort_options: sort_options(params.sort.as_deref()),
        }
        .render()
        .unwrap();

        assert!(html.contains(r#"value="bike""#));
        assert!(html.contains(r#"<option value="7" selected>Electronics</option>"#));
        assert!(html.contains(r#"<option value="-price" selected>"#));
        assert!(html.contains("Red &lt;bike&gt;"));
        assert!(html.contains(&"x".repeat(100)));
        assert!(!html.contains(&"x".repeat(101)));
    }

    #[test]
    fn ad_page_captions_comments() {
        let stored = ad(3, "Phone");
        let detail = AdDetail {
            comments: vec![CommentView {
                comment: Comment {
                    id: 1,
                    content: "Still available?".into(),
                    created_at: stored.created_at,
                    ad_id: 3,
                    account_id: 2,
                },
                author: "buyer".into(),
            }],
            ad: stored,
            category: Some(category()),
            total_comments: 1,
        };
        let html = AdDetailTemplate {
            title: "Phone",
            detail: &detail,
            image_url: None,
            thumb_url: None,
        }
        .render()
        .unwrap();
        assert!(html.contains("Comments (1)"));
        assert!(html.contains("Comment by buyer on Phone"));
        assert!(html.contains(r#"href="/category/7/""#));
    }

    #[test]
    fn user_page_lists_totals() {
        let joined = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let detail = UserDetail {
            account: Account {
                id: 2,
                username: "seller".into(),
                email: "seller@test.com".into(),
                password_hash: String::new(),
                is_active: true,
                date_joined: joined,
            },
            profile: Profile {
                id: 1,
                account_id: 2,
                phone_number: Some("+15550100".into()),
                address: None,
                email: "seller@test.com".into(),
            },
            ads: vec![ad(1, "Lamp")],
            total_ads: 1,
            total_comments: 4,
        };
        let html = UserTemplate {
            title: "seller",
            detail: &detail,
        }
        .render()
        .unwrap();
        assert!(html.contains("Total ads: 1 | Total comments: 4"));
        assert!(html.contains("+15550100"));
        assert!(html.contains("Lamp: 199.99"));
        assert!(html.contains("2024-01-02"));
    }

    #[test]
    fn category_page_handles_no_ads() {
        let category = category();
        let html = CategoryTemplate {
            title: "Electronics",
            category: &category,
            ads: &[],
        }
        .render()
        .unwrap();
        assert!(html.contains("No active ads in this category."));
    }
}
