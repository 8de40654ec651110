use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    categories::{
        repo::{CategoryRepo, TodoReferences},
        repo_types::{Category, CategoryPatch, NewCategory, DEFAULT_COLOR},
    },
    error::{AppError, StoreError},
    state::AppState,
};

pub const MAX_NAME_LEN: usize = 50;
const NOT_FOUND: &str = "Category not found";

fn validate_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("Category name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(
            "Category name must be 50 characters or less",
        ));
    }
    Ok(name.to_string())
}

fn validate_color(raw: &str) -> Result<String, AppError> {
    lazy_static! {
        static ref COLOR_RE: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
    }
    let color = raw.trim();
    if !COLOR_RE.is_match(color) {
        return Err(AppError::validation("Color must be a valid hex color code"));
    }
    Ok(color.to_string())
}

fn duplicate_category() -> AppError {
    AppError::conflict("Category with this name already exists")
}

/// Per-user categories. Todo usage is observed only through
/// [`TodoReferences`], so this store never depends on the todo store.
#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryRepo>,
    todos: Arc<dyn TodoReferences>,
}

impl FromRef<AppState> for CategoryService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.categories.clone(), state.todo_refs.clone())
    }
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryRepo>, todos: Arc<dyn TodoReferences>) -> Self {
        Self { categories, todos }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        color: Option<&str>,
    ) -> Result<Category, AppError> {
        let name = validate_name(name)?;
        let color = match color {
            Some(c) => validate_color(c)?,
            None => DEFAULT_COLOR.to_string(),
        };

        if self
            .categories
            .find_by_name(user_id, &name, None)
            .await?
            .is_some()
        {
            warn!(%user_id, name = %name, "duplicate category");
            return Err(duplicate_category());
        }

        match self.categories.insert(user_id, NewCategory { name, color }).await {
            Ok(category) => {
                info!(%user_id, category_id = %category.id, "category created");
                Ok(category)
            }
            Err(StoreError::Duplicate(_)) => Err(duplicate_category()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Category>, AppError> {
        Ok(self.categories.list(user_id).await?)
    }

    /// Another user's category is reported exactly like a missing one.
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Category, AppError> {
        self.categories
            .find(user_id, id)
            .await?
            .ok_or(AppError::NotFound(NOT_FOUND))
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<Category, AppError> {
        self.get(user_id, id).await?;
        let patch = CategoryPatch {
            name: name.map(validate_name).transpose()?,
            color: color.map(validate_color).transpose()?,
        };

        if let Some(name) = &patch.name {
            if self
                .categories
                .find_by_name(user_id, name, Some(id))
                .await?
                .is_some()
            {
                return Err(duplicate_category());
            }
        }

        match self.categories.update(user_id, id, patch).await {
            Ok(Some(category)) => Ok(category),
            Ok(None) => Err(AppError::NotFound(NOT_FOUND)),
            Err(StoreError::Duplicate(_)) => Err(duplicate_category()),
            Err(e) => Err(e.into()),
        }
    }

    /// Refuses while any of the user's todos names this category. The check
    /// and the delete are separate operations; a todo created in between
    /// keeps a dangling category name.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let category = self.get(user_id, id).await?;

        let in_use = self
            .todos
            .count_referencing(user_id, &category.name)
            .await?;
        if in_use > 0 {
            warn!(%user_id, category_id = %id, in_use, "category still referenced");
            return Err(AppError::conflict(
                "Cannot delete category that is being used by todos",
            ));
        }

        if !self.categories.delete(user_id, id).await? {
            return Err(AppError::NotFound(NOT_FOUND));
        }
        info!(%user_id, category_id = %id, "category deleted");
        Ok(())
    }

    pub async fn exists(&self, user_id: Uuid, name: &str) -> Result<bool, AppError> {
        Ok(self
            .categories
            .find_by_name(user_id, name, None)
            .await?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::MemoryStore,
        todos::{repo_types::NewTodo, services::TodoService},
    };
    use async_trait::async_trait;

    /// Name lookups always miss, so only the store's unique index can
    /// catch a duplicate.
    struct NameLookupMisses(Arc<MemoryStore>);

    #[async_trait]
    impl CategoryRepo for NameLookupMisses {
        async fn insert(&self, user_id: Uuid, new: NewCategory) -> Result<Category, StoreError> {
            CategoryRepo::insert(self.0.as_ref(), user_id, new).await
        }
        async fn list(&self, user_id: Uuid) -> Result<Vec<Category>, StoreError> {
            CategoryRepo::list(self.0.as_ref(), user_id).await
        }
        async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Category>, StoreError> {
            CategoryRepo::find(self.0.as_ref(), user_id, id).await
        }
        async fn find_by_name(
            &self,
            _user_id: Uuid,
            _name: &str,
            _excluding: Option<Uuid>,
        ) -> Result<Option<Category>, StoreError> {
            Ok(None)
        }
        async fn update(
            &self,
            user_id: Uuid,
            id: Uuid,
            patch: CategoryPatch,
        ) -> Result<Option<Category>, StoreError> {
            CategoryRepo::update(self.0.as_ref(), user_id, id, patch).await
        }
        async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
            CategoryRepo::delete(self.0.as_ref(), user_id, id).await
        }
    }

    fn services() -> (CategoryService, TodoService) {
        let state = AppState::fake();
        (
            CategoryService::from_ref(&state),
            TodoService::from_ref(&state),
        )
    }

    #[test]
    fn name_and_color_validation() {
        assert_eq!(validate_name("  Work ").unwrap(), "Work");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(51)).is_err());
        assert!(validate_name(&"x".repeat(50)).is_ok());

        assert_eq!(validate_color("#a1B2c3").unwrap(), "#a1B2c3");
        assert!(validate_color("a1b2c3").is_err());
        assert!(validate_color("#12345").is_err());
        assert!(validate_color("#GGGGGG").is_err());
    }

    #[tokio::test]
    async fn create_uses_default_color_and_rejects_duplicates() {
        let (categories, _) = services();
        let user = Uuid::new_v4();
        let c = categories.create(user, " Work ", None).await.unwrap();
        assert_eq!(c.name, "Work");
        assert_eq!(c.color, DEFAULT_COLOR);
        assert_eq!(c.user_id, user);

        let err = categories.create(user, "Work", Some("#000000")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // same name for another user is fine
        categories.create(Uuid::new_v4(), "Work", None).await.unwrap();
    }

    #[tokio::test]
    async fn unique_index_violation_is_reported_as_conflict() {
        let store = MemoryStore::new();
        let categories = CategoryService::new(
            Arc::new(NameLookupMisses(store.clone())),
            store,
        );
        let user = Uuid::new_v4();
        categories.create(user, "Work", None).await.unwrap();
        let home = categories.create(user, "Home", None).await.unwrap();

        let err = categories.create(user, "Work", None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = categories
            .update(user, home.id, Some("Work"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(categories.get(user, home.id).await.unwrap().name, "Home");
    }

    #[tokio::test]
    async fn invalid_color_is_rejected() {
        let (categories, _) = services();
        let err = categories
            .create(Uuid::new_v4(), "Work", Some("blue"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let (categories, _) = services();
        let user = Uuid::new_v4();
        for name in ["Zeta", "Alpha", "Mid"] {
            categories.create(user, name, None).await.unwrap();
        }
        let names: Vec<_> = categories
            .list(user)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[tokio::test]
    async fn other_users_categories_are_not_found() {
        let (categories, _) = services();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = categories.create(a, "Work", None).await.unwrap();

        assert!(matches!(
            categories.get(b, c.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            categories.update(b, c.id, Some("Hijacked"), None).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            categories.delete(b, c.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert_eq!(categories.get(a, c.id).await.unwrap().name, "Work");
    }

    #[tokio::test]
    async fn update_rechecks_uniqueness_excluding_self() {
        let (categories, _) = services();
        let user = Uuid::new_v4();
        let work = categories.create(user, "Work", None).await.unwrap();
        categories.create(user, "Home", None).await.unwrap();

        let same = categories
            .update(user, work.id, Some("Work"), Some("#111111"))
            .await
            .unwrap();
        assert_eq!(same.color, "#111111");

        let err = categories
            .update(user, work.id, Some("Home"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = categories.update(user, work.id, Some(""), None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_is_blocked_while_referenced() {
        let (categories, todos) = services();
        let user = Uuid::new_v4();
        let used = categories.create(user, "Work", None).await.unwrap();
        let unused = categories.create(user, "Spare", None).await.unwrap();

        todos
            .create(
                user,
                NewTodo {
                    title: "Ship it".into(),
                    category: Some("Work".into()),
                    ..NewTodo::default()
                },
            )
            .await
            .unwrap();

        let err = categories.delete(user, used.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        categories.delete(user, unused.id).await.unwrap();
        assert!(matches!(
            categories.get(user, unused.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn another_users_todo_does_not_block_delete() {
        let (categories, todos) = services();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mine = categories.create(a, "Work", None).await.unwrap();
        categories.create(b, "Work", None).await.unwrap();
        todos
            .create(
                b,
                NewTodo {
                    title: "Theirs".into(),
                    category: Some("Work".into()),
                    ..NewTodo::default()
                },
            )
            .await
            .unwrap();

        categories.delete(a, mine.id).await.unwrap();
    }
}
