//! In-process document store used when no database is configured and by tests.
//!
//! Collections live behind one `tokio::sync::RwLock` each and enforce the same
//! unique indexes as the PostgreSQL schema.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepo,
        repo_types::{User, UserDraft},
    },
    categories::{
        repo::{CategoryRepo, TodoReferences},
        repo_types::{Category, CategoryPatch, NewCategory},
    },
    clock,
    error::StoreError,
    todos::{
        repo::TodoRepo,
        repo_types::{Status, Todo, TodoDraft, TodoFilters, TodoPatch},
    },
};

pub const USERS_EMAIL_INDEX: &str = "users_email_key";
pub const CATEGORIES_NAME_INDEX: &str = "categories_name_user_id_key";

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    categories: RwLock<Vec<Category>>,
    // insertion order; newest-first listings walk it backwards
    todos: RwLock<Vec<Todo>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn newest_first<'a>(todos: impl DoubleEndedIterator<Item = &'a Todo>) -> Vec<Todo> {
    let mut out: Vec<Todo> = todos.rev().cloned().collect();
    // stable: equal timestamps keep reverse insertion order
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, draft: UserDraft) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == draft.email) {
            return Err(StoreError::Duplicate(USERS_EMAIL_INDEX.into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: draft.email,
            password_hash: draft.password_hash,
            name: draft.name,
            created_at: clock::now(),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl CategoryRepo for MemoryStore {
    async fn insert(&self, user_id: Uuid, new: NewCategory) -> Result<Category, StoreError> {
        let mut categories = self.categories.write().await;
        if categories
            .iter()
            .any(|c| c.user_id == user_id && c.name == new.name)
        {
            return Err(StoreError::Duplicate(CATEGORIES_NAME_INDEX.into()));
        }
        let category = Category {
            id: Uuid::new_v4(),
            user_id,
            name: new.name,
            color: new.color,
            created_at: clock::now(),
        };
        categories.push(category.clone());
        Ok(category)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Category>, StoreError> {
        let categories = self.categories.read().await;
        let mut out: Vec<Category> = categories
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Category>, StoreError> {
        let categories = self.categories.read().await;
        Ok(categories
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .cloned())
    }

    async fn find_by_name(
        &self,
        user_id: Uuid,
        name: &str,
        excluding: Option<Uuid>,
    ) -> Result<Option<Category>, StoreError> {
        let categories = self.categories.read().await;
        Ok(categories
            .iter()
            .find(|c| c.user_id == user_id && c.name == name && Some(c.id) != excluding)
            .cloned())
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: CategoryPatch,
    ) -> Result<Option<Category>, StoreError> {
        let mut categories = self.categories.write().await;
        if let Some(name) = &patch.name {
            if categories
                .iter()
                .any(|c| c.user_id == user_id && c.id != id && &c.name == name)
            {
                return Err(StoreError::Duplicate(CATEGORIES_NAME_INDEX.into()));
            }
        }
        let Some(category) = categories
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id)
        else {
            return Ok(None);
        };
        patch.apply(category);
        Ok(Some(category.clone()))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut categories = self.categories.write().await;
        let before = categories.len();
        categories.retain(|c| !(c.id == id && c.user_id == user_id));
        Ok(categories.len() < before)
    }
}

#[async_trait]
impl TodoRepo for MemoryStore {
    async fn insert(&self, user_id: Uuid, draft: TodoDraft) -> Result<Todo, StoreError> {
        let now = clock::now();
        let todo = Todo {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title,
            description: draft.description,
            due_date: draft.due_date,
            priority: draft.priority,
            category: draft.category,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };
        self.todos.write().await.push(todo.clone());
        Ok(todo)
    }

    async fn list(&self, user_id: Uuid, filters: &TodoFilters) -> Result<Vec<Todo>, StoreError> {
        let todos = self.todos.read().await;
        Ok(newest_first(
            todos
                .iter()
                .filter(|t| t.user_id == user_id && filters.matches(t)),
        ))
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let todos = self.todos.read().await;
        Ok(todos
            .iter()
            .find(|t| t.id == id && t.user_id == user_id)
            .cloned())
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: TodoPatch,
    ) -> Result<Option<Todo>, StoreError> {
        let mut todos = self.todos.write().await;
        let Some(stored) = todos
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        patch.apply(stored);
        stored.touch_updated_at();
        Ok(Some(stored.clone()))
    }

    async fn toggle_status(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let mut todos = self.todos.write().await;
        let Some(stored) = todos
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        stored.status = stored.status.toggled();
        stored.touch_updated_at();
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut todos = self.todos.write().await;
        let before = todos.len();
        todos.retain(|t| !(t.id == id && t.user_id == user_id));
        Ok(todos.len() < before)
    }

    async fn overdue(&self, user_id: Uuid, now: OffsetDateTime) -> Result<Vec<Todo>, StoreError> {
        let todos = self.todos.read().await;
        let mut out: Vec<Todo> = todos
            .iter()
            .filter(|t| {
                t.user_id == user_id
                    && t.status == Status::Pending
                    && t.due_date.is_some_and(|due| due < now)
            })
            .cloned()
            .collect();
        out.sort_by_key(|t| t.due_date);
        Ok(out)
    }
}

#[async_trait]
impl TodoReferences for MemoryStore {
    async fn count_referencing(&self, user_id: Uuid, category: &str) -> Result<i64, StoreError> {
        let todos = self.todos.read().await;
        let count = todos
            .iter()
            .filter(|t| t.user_id == user_id && t.category.as_deref() == Some(category))
            .count();
        Ok(count as i64)
    }
}
