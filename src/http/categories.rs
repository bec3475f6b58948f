use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::{EntityTrait, QueryOrder};

use crate::entities::category;
use crate::models::category::CategoryView;
use crate::state::AppState;

use super::HttpError;

const CATEGORY_CACHE_KEY: &str = "all";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{id_or_slug}", get(get_category))
}

async fn load_categories(state: &AppState) -> Result<Arc<Vec<CategoryView>>, HttpError> {
    if let Some(cached) = state.cache.categories.get(CATEGORY_CACHE_KEY).await {
        return Ok(cached);
    }

    let categories = category::Entity::find()
        .order_by_asc(category::Column::SortOrder)
        .order_by_asc(category::Column::Id)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let views = Arc::new(
        categories
            .into_iter()
            .map(CategoryView::from)
            .collect::<Vec<_>>(),
    );

    state
        .cache
        .categories
        .insert(CATEGORY_CACHE_KEY.to_string(), views.clone())
        .await;
    Ok(views)
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryView>>, HttpError> {
    let categories = load_categories(&state).await?;
    Ok(Json((*categories).clone()))
}

async fn get_category(
    Path(id_or_slug): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CategoryView>, HttpError> {
    let categories = load_categories(&state).await?;
    let needle = id_or_slug.trim();
    let found = match needle.parse::<i32>() {
        Ok(id) => categories.iter().find(|c| c.id == id),
        Err(_) => categories
            .iter()
            .find(|c| c.slug.eq_ignore_ascii_case(needle)),
    };

    found.cloned().map(Json).ok_or_else(|| {
        HttpError::new(
            StatusCode::NOT_FOUND,
            format!("category {id_or_slug} not found"),
        )
    })
}
