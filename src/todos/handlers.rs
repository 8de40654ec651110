use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    dto::MessageResponse,
    error::AppError,
    extract::{parse_id, ApiJson, ApiQuery},
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, ListTodosQuery, TodoEnvelope, TodosEnvelope, UpdateTodoRequest},
        repo_types::{NewTodo, TodoFilters, TodoPatch},
        services::TodoService,
    },
};

const NOT_FOUND: &str = "Todo not found";

pub fn collection_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/overdue", get(list_overdue))
}

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/todos/:id", get(get_todo).put(update_todo).delete(delete_todo))
        .route("/todos/:id/toggle", patch(toggle_todo))
}

#[instrument(skip(todos, user, query), fields(user_id = %user.id))]
pub async fn list_todos(
    State(todos): State<TodoService>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<ListTodosQuery>,
) -> Result<Json<TodosEnvelope>, AppError> {
    let filters = TodoFilters::try_from(query)?;
    let todos = todos.list(user.id, &filters).await?;
    Ok(Json(TodosEnvelope { todos }))
}

#[instrument(skip(todos, user, payload), fields(user_id = %user.id))]
pub async fn create_todo(
    State(todos): State<TodoService>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoEnvelope>), AppError> {
    let new = NewTodo::try_from(payload)?;
    let todo = todos.create(user.id, new).await?;
    Ok((StatusCode::CREATED, Json(TodoEnvelope { todo })))
}

#[instrument(skip(todos, user), fields(user_id = %user.id))]
pub async fn get_todo(
    State(todos): State<TodoService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    let todo = todos.get(user.id, id).await?;
    Ok(Json(TodoEnvelope { todo }))
}

#[instrument(skip(todos, user, payload), fields(user_id = %user.id))]
pub async fn update_todo(
    State(todos): State<TodoService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateTodoRequest>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    let patch = TodoPatch::try_from(payload)?;
    let todo = todos.update(user.id, id, patch).await?;
    Ok(Json(TodoEnvelope { todo }))
}

#[instrument(skip(todos, user), fields(user_id = %user.id))]
pub async fn delete_todo(
    State(todos): State<TodoService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    todos.delete(user.id, id).await?;
    Ok(Json(MessageResponse {
        message: "Todo deleted successfully",
    }))
}

#[instrument(skip(todos, user), fields(user_id = %user.id))]
pub async fn toggle_todo(
    State(todos): State<TodoService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    let todo = todos.toggle_status(user.id, id).await?;
    info!(todo_id = %todo.id, status = %todo.status, "todo toggled");
    Ok(Json(TodoEnvelope { todo }))
}

#[instrument(skip(todos, user), fields(user_id = %user.id))]
pub async fn list_overdue(
    State(todos): State<TodoService>,
    AuthUser(user): AuthUser,
) -> Result<Json<TodosEnvelope>, AppError> {
    let todos = todos.list_overdue(user.id).await?;
    Ok(Json(TodosEnvelope { todos }))
}
