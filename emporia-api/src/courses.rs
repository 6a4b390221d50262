use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use emporia_catalog::{CatalogError, CourseAdmin, CourseListPage, CourseQuery, CourseRow, FilterChoices};

use crate::error::AppError;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/courses", get(list_courses))
        .route("/v1/admin/courses/filters", get(course_filters))
        .route("/v1/admin/courses/{id}", get(get_course))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

// ============================================================================
// Course Admin Handlers
// ============================================================================

/// GET /v1/admin/courses?q=&site=&partner=&page=&page_size=
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> Result<Json<CourseListPage>, AppError> {
    let page = CourseAdmin::changelist(state.courses.as_ref(), &query)
        .await
        .map_err(AppError::from_catalog)?;

    tracing::debug!(count = page.count, term = ?query.term(), "Course changelist");
    Ok(Json(page))
}

/// GET /v1/admin/courses/filters
pub async fn course_filters(
    State(state): State<AppState>,
) -> Result<Json<FilterChoices>, AppError> {
    let choices = state.courses.filter_choices().await.map_err(AppError::from_catalog)?;
    Ok(Json(choices))
}

/// GET /v1/admin/courses/{id}
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseRow>, AppError> {
    let course = state
        .courses
        .get_course(&id)
        .await
        .map_err(AppError::from_catalog)?
        .ok_or_else(|| AppError::from_catalog(CatalogError::NotFound(id.clone())))?;

    Ok(Json(CourseRow::from(&course)))
}
