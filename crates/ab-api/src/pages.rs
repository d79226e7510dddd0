//! Server-rendered HTML pages.

use ab_core::listing::ListingParams;
use ab_core::models::{AccountId, AdId, CategoryId};
use ab_ui::{
    sort_options, AdDetailTemplate, AdListTemplate, CategoriesTemplate, CategoryTemplate,
    FilterValues, HomeTemplate, UserTemplate,
};
use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::Html;

use crate::error::PageError;
use crate::handlers::AppState;

type Page = Result<Html<String>, PageError>;

pub async fn home(State(state): State<AppState>) -> Page {
    let last_month_ads_count = state.service.count_ads_last_month().await?;
    let html = HomeTemplate {
        title: "Ad Board",
        last_month_ads_count,
    }
    .render()?;
    Ok(Html(html))
}

pub async fn ads(State(state): State<AppState>, Query(params): Query<ListingParams>) -> Page {
    let ads = state.service.list_ads(&params).await?;
    let categories = state.service.categories().await?;
    let html = AdListTemplate {
        title: "All ads",
        ads: &ads,
        categories: &categories,
        filters: FilterValues::from(&params),
        sort_options: sort_options(params.sort.as_deref()),
    }
    .render()?;
    Ok(Html(html))
}

pub async fn ad_detail(State(state): State<AppState>, Path(id): Path<AdId>) -> Page {
    let detail = state.service.ad_detail(id).await?;
    let (image_url, thumb_url) = state.image_urls(&detail.ad);
    let html = AdDetailTemplate {
        title: &detail.ad.title,
        detail: &detail,
        image_url,
        thumb_url,
    }
    .render()?;
    Ok(Html(html))
}

pub async fn categories(State(state): State<AppState>) -> Page {
    let categories = state.service.categories().await?;
    let html = CategoriesTemplate {
        title: "Categories",
        categories: &categories,
    }
    .render()?;
    Ok(Html(html))
}

pub async fn category_detail(State(state): State<AppState>, Path(id): Path<CategoryId>) -> Page {
    let (category, ads) = state.service.category_detail(id).await?;
    let html = CategoryTemplate {
        title: &category.name,
        category: &category,
        ads: &ads,
    }
    .render()?;
    Ok(Html(html))
}

pub async fn user_detail(State(state): State<AppState>, Path(id): Path<AccountId>) -> Page {
    let detail = state.service.user_detail(id).await?;
    let html = UserTemplate {
        title: &detail.account.username,
        detail: &detail,
    }
    .render()?;
    Ok(Html(html))
}
