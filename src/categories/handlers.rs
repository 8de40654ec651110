use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    categories::{
        dto::{CategoriesEnvelope, CategoryEnvelope, CreateCategoryRequest, UpdateCategoryRequest},
        services::CategoryService,
    },
    dto::MessageResponse,
    error::AppError,
    extract::{parse_id, ApiJson},
    state::AppState,
    todos::{dto::TodosEnvelope, services::TodoService},
};

const NOT_FOUND: &str = "Category not found";

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/categories/:id/todos", get(list_category_todos))
}

#[instrument(skip(categories, user), fields(user_id = %user.id))]
pub async fn list_categories(
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
) -> Result<Json<CategoriesEnvelope>, AppError> {
    let categories = categories.list(user.id).await?;
    Ok(Json(CategoriesEnvelope { categories }))
}

#[instrument(skip(categories, user, payload), fields(user_id = %user.id))]
pub async fn create_category(
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryEnvelope>), AppError> {
    let category = categories
        .create(
            user.id,
            payload.name.as_deref().unwrap_or_default(),
            payload.color.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(CategoryEnvelope { category })))
}

#[instrument(skip(categories, user), fields(user_id = %user.id))]
pub async fn get_category(
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CategoryEnvelope>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    let category = categories.get(user.id, id).await?;
    Ok(Json(CategoryEnvelope { category }))
}

#[instrument(skip(categories, user, payload), fields(user_id = %user.id))]
pub async fn update_category(
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateCategoryRequest>,
) -> Result<Json<CategoryEnvelope>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    let category = categories
        .update(user.id, id, payload.name.as_deref(), payload.color.as_deref())
        .await?;
    Ok(Json(CategoryEnvelope { category }))
}

#[instrument(skip(categories, user), fields(user_id = %user.id))]
pub async fn delete_category(
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    categories.delete(user.id, id).await?;
    Ok(Json(MessageResponse {
        message: "Category deleted successfully",
    }))
}

/// Todos of the caller filed under this category.
#[instrument(skip(todos, user), fields(user_id = %user.id))]
pub async fn list_category_todos(
    State(todos): State<TodoService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TodosEnvelope>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    let todos = todos.list_for_category(user.id, id).await?;
    Ok(Json(TodosEnvelope { todos }))
}
