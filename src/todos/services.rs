use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    categories::services::CategoryService,
    clock,
    error::AppError,
    state::AppState,
    todos::{
        repo::TodoRepo,
        repo_types::{NewTodo, Status, Todo, TodoDraft, TodoFilters, TodoPatch},
    },
};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
const NOT_FOUND: &str = "Todo not found";

fn validate_title(raw: &str) -> Result<String, AppError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation("Title must be 200 characters or less"));
    }
    Ok(title.to_string())
}

fn validate_description(raw: Option<String>) -> Result<Option<String>, AppError> {
    let Some(raw) = raw else { return Ok(None) };
    let description = raw.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::validation(
            "Description must be 1000 characters or less",
        ));
    }
    Ok((!description.is_empty()).then(|| description.to_string()))
}

/// Per-user todos. Category references are checked against the category
/// store before every write that sets one.
#[derive(Clone)]
pub struct TodoService {
    todos: Arc<dyn TodoRepo>,
    categories: CategoryService,
}

impl FromRef<AppState> for TodoService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.todos.clone(), CategoryService::from_ref(state))
    }
}

impl TodoService {
    pub fn new(todos: Arc<dyn TodoRepo>, categories: CategoryService) -> Self {
        Self { todos, categories }
    }

    /// Blank names mean "no category"; anything else must exist for the user.
    async fn resolve_category(
        &self,
        user_id: Uuid,
        raw: Option<String>,
    ) -> Result<Option<String>, AppError> {
        let Some(name) = raw.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        if !self.categories.exists(user_id, &name).await? {
            warn!(%user_id, category = %name, "todo references unknown category");
            return Err(AppError::validation("Category not found"));
        }
        Ok(Some(name))
    }

    pub async fn create(&self, user_id: Uuid, new: NewTodo) -> Result<Todo, AppError> {
        let title = validate_title(&new.title)?;
        let description = validate_description(new.description)?;
        let category = self.resolve_category(user_id, new.category).await?;

        let draft = TodoDraft {
            title,
            description,
            due_date: new.due_date,
            priority: new.priority.unwrap_or_default(),
            category,
            status: Status::Pending,
        };
        let todo = self.todos.insert(user_id, draft).await?;
        info!(%user_id, todo_id = %todo.id, "todo created");
        Ok(todo)
    }

    pub async fn list(&self, user_id: Uuid, filters: &TodoFilters) -> Result<Vec<Todo>, AppError> {
        Ok(self.todos.list(user_id, filters).await?)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Todo, AppError> {
        self.todos
            .find(user_id, id)
            .await?
            .ok_or(AppError::NotFound(NOT_FOUND))
    }

    /// Only the fields present in `patch` are written.
    pub async fn update(&self, user_id: Uuid, id: Uuid, mut patch: TodoPatch) -> Result<Todo, AppError> {
        self.get(user_id, id).await?;

        if let Some(title) = &patch.title {
            patch.title = Some(validate_title(title)?);
        }
        if let Some(description) = patch.description.take() {
            patch.description = Some(validate_description(description)?);
        }
        if let Some(category) = patch.category.take() {
            patch.category = Some(self.resolve_category(user_id, category).await?);
        }

        self.todos
            .update(user_id, id, patch)
            .await?
            .ok_or(AppError::NotFound(NOT_FOUND))
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        if !self.todos.delete(user_id, id).await? {
            return Err(AppError::NotFound(NOT_FOUND));
        }
        info!(%user_id, todo_id = %id, "todo deleted");
        Ok(())
    }

    pub async fn toggle_status(&self, user_id: Uuid, id: Uuid) -> Result<Todo, AppError> {
        self.todos
            .toggle_status(user_id, id)
            .await?
            .ok_or(AppError::NotFound(NOT_FOUND))
    }

    pub async fn list_overdue(&self, user_id: Uuid) -> Result<Vec<Todo>, AppError> {
        Ok(self.todos.overdue(user_id, clock::now()).await?)
    }

    /// Todos naming the given category, newest first.
    pub async fn list_for_category(
        &self,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<Vec<Todo>, AppError> {
        let category = self.categories.get(user_id, category_id).await?;
        let filters = TodoFilters {
            category: Some(category.name),
            ..TodoFilters::default()
        };
        self.list(user_id, &filters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::StoreError, memory::MemoryStore, todos::repo_types::Priority};
    use async_trait::async_trait;
    use std::time::Duration as StdDuration;
    use time::{Duration, OffsetDateTime};

    /// Memory store whose reads lag behind, so concurrent writers interleave.
    struct SlowReads(Arc<MemoryStore>);

    #[async_trait]
    impl TodoRepo for SlowReads {
        async fn insert(&self, user_id: Uuid, draft: TodoDraft) -> Result<Todo, StoreError> {
            TodoRepo::insert(self.0.as_ref(), user_id, draft).await
        }
        async fn list(&self, user_id: Uuid, filters: &TodoFilters) -> Result<Vec<Todo>, StoreError> {
            TodoRepo::list(self.0.as_ref(), user_id, filters).await
        }
        async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, StoreError> {
            let found = TodoRepo::find(self.0.as_ref(), user_id, id).await;
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            found
        }
        async fn update(
            &self,
            user_id: Uuid,
            id: Uuid,
            patch: TodoPatch,
        ) -> Result<Option<Todo>, StoreError> {
            TodoRepo::update(self.0.as_ref(), user_id, id, patch).await
        }
        async fn toggle_status(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, StoreError> {
            self.0.toggle_status(user_id, id).await
        }
        async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
            TodoRepo::delete(self.0.as_ref(), user_id, id).await
        }
        async fn overdue(&self, user_id: Uuid, now: OffsetDateTime) -> Result<Vec<Todo>, StoreError> {
            self.0.overdue(user_id, now).await
        }
    }

    fn service() -> TodoService {
        TodoService::from_ref(&AppState::fake())
    }

    fn titled(title: &str) -> NewTodo {
        NewTodo {
            title: title.into(),
            ..NewTodo::default()
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let todos = service();
        let user = Uuid::new_v4();
        let todo = todos.create(user, titled("  Buy milk ")).await.unwrap();
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.status, Status::Pending);
        assert_eq!(todo.category, None);
        assert_eq!(todo.user_id, user);
    }

    #[tokio::test]
    async fn create_validates_title_and_description() {
        let todos = service();
        let user = Uuid::new_v4();
        assert!(matches!(
            todos.create(user, titled("   ")).await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            todos.create(user, titled(&"t".repeat(201))).await.unwrap_err(),
            AppError::Validation(_)
        ));
        let long_description = NewTodo {
            title: "ok".into(),
            description: Some("d".repeat(1001)),
            ..NewTodo::default()
        };
        assert!(matches!(
            todos.create(user, long_description).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn unknown_category_is_a_validation_error() {
        let todos = service();
        let new = NewTodo {
            title: "x".into(),
            category: Some("Nope".into()),
            ..NewTodo::default()
        };
        let err = todos.create(Uuid::new_v4(), new).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Category not found"));
    }

    #[tokio::test]
    async fn category_must_belong_to_the_same_user() {
        let state = AppState::fake();
        let categories = CategoryService::from_ref(&state);
        let todos = TodoService::from_ref(&state);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        categories.create(a, "Work", None).await.unwrap();

        let new = NewTodo {
            title: "x".into(),
            category: Some("Work".into()),
            ..NewTodo::default()
        };
        assert!(todos.create(b, new.clone()).await.is_err());
        assert_eq!(
            todos.create(a, new).await.unwrap().category.as_deref(),
            Some("Work")
        );
    }

    #[tokio::test]
    async fn toggle_twice_restores_status_and_advances_timestamp() {
        let todos = service();
        let user = Uuid::new_v4();
        let created = todos.create(user, titled("x")).await.unwrap();

        let once = todos.toggle_status(user, created.id).await.unwrap();
        assert_eq!(once.status, Status::Completed);
        assert!(once.updated_at > created.updated_at);

        let twice = todos.toggle_status(user, created.id).await.unwrap();
        assert_eq!(twice.status, Status::Pending);
        assert!(twice.updated_at > once.updated_at);
    }

    #[tokio::test]
    async fn concurrent_update_and_toggle_both_land() {
        let state = AppState::fake();
        let store = MemoryStore::new();
        let todos = TodoService::new(
            Arc::new(SlowReads(store.clone())),
            CategoryService::from_ref(&state),
        );
        let user = Uuid::new_v4();
        let todo = todos.create(user, titled("x")).await.unwrap();

        let raise = TodoPatch {
            priority: Some(Priority::High),
            ..TodoPatch::default()
        };
        let (updated, toggled) = tokio::join!(
            todos.update(user, todo.id, raise),
            todos.toggle_status(user, todo.id)
        );
        updated.unwrap();
        toggled.unwrap();

        let stored = todos.get(user, todo.id).await.unwrap();
        assert_eq!(
            (stored.priority, stored.status),
            (Priority::High, Status::Completed)
        );
    }

    #[tokio::test]
    async fn update_revalidates_category_and_touches() {
        let state = AppState::fake();
        let categories = CategoryService::from_ref(&state);
        let todos = TodoService::from_ref(&state);
        let user = Uuid::new_v4();
        categories.create(user, "Home", None).await.unwrap();
        let todo = todos.create(user, titled("x")).await.unwrap();

        let err = todos
            .update(
                user,
                todo.id,
                TodoPatch {
                    category: Some(Some("Missing".into())),
                    ..TodoPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let updated = todos
            .update(
                user,
                todo.id,
                TodoPatch {
                    category: Some(Some("Home".into())),
                    priority: Some(Priority::High),
                    ..TodoPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.category.as_deref(), Some("Home"));
        assert_eq!(updated.priority, Priority::High);
        assert!(updated.updated_at > todo.updated_at);

        let cleared = todos
            .update(
                user,
                todo.id,
                TodoPatch {
                    category: Some(None),
                    ..TodoPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.category, None);
    }

    #[tokio::test]
    async fn other_users_todos_are_invisible() {
        let todos = service();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let todo = todos.create(a, titled("mine")).await.unwrap();

        assert!(matches!(todos.get(b, todo.id).await.unwrap_err(), AppError::NotFound(_)));
        assert!(matches!(
            todos
                .update(
                    b,
                    todo.id,
                    TodoPatch {
                        title: Some("stolen".into()),
                        ..TodoPatch::default()
                    }
                )
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            todos.toggle_status(b, todo.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(todos.delete(b, todo.id).await.unwrap_err(), AppError::NotFound(_)));
        assert!(todos.list(b, &TodoFilters::default()).await.unwrap().is_empty());

        let still_mine = todos.get(a, todo.id).await.unwrap();
        assert_eq!(still_mine.title, "mine");
        assert_eq!(still_mine.status, Status::Pending);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filters_by_status() {
        let todos = service();
        let user = Uuid::new_v4();
        let first = todos.create(user, titled("first")).await.unwrap();
        let second = todos.create(user, titled("second")).await.unwrap();
        todos.toggle_status(user, first.id).await.unwrap();

        let all = todos.list(user, &TodoFilters::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let done = todos
            .list(
                user,
                &TodoFilters {
                    status: Some(Status::Completed),
                    ..TodoFilters::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, first.id);
    }

    #[tokio::test]
    async fn overdue_lists_pending_past_due_earliest_first() {
        let todos = service();
        let user = Uuid::new_v4();
        let now = clock::now();
        let due = |title: &str, offset: Duration| NewTodo {
            title: title.into(),
            due_date: Some(now + offset),
            ..NewTodo::default()
        };

        let recent = todos.create(user, due("recent", Duration::hours(-1))).await.unwrap();
        let oldest = todos.create(user, due("oldest", Duration::days(-3))).await.unwrap();
        todos.create(user, due("future", Duration::days(1))).await.unwrap();
        todos.create(user, titled("undated")).await.unwrap();
        let done = todos.create(user, due("done", Duration::days(-2))).await.unwrap();
        todos.toggle_status(user, done.id).await.unwrap();

        let overdue = todos.list_overdue(user).await.unwrap();
        let ids: Vec<_> = overdue.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![oldest.id, recent.id]);
    }

    #[tokio::test]
    async fn list_for_category_scopes_by_owner() {
        let state = AppState::fake();
        let categories = CategoryService::from_ref(&state);
        let todos = TodoService::from_ref(&state);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let work = categories.create(a, "Work", None).await.unwrap();
        todos
            .create(
                a,
                NewTodo {
                    title: "report".into(),
                    category: Some("Work".into()),
                    ..NewTodo::default()
                },
            )
            .await
            .unwrap();
        todos.create(a, titled("unrelated")).await.unwrap();

        let listed = todos.list_for_category(a, work.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "report");

        assert!(matches!(
            todos.list_for_category(b, work.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
