use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::categories::repo_types::{Category, CategoryPatch, NewCategory};
use crate::error::StoreError;

/// Category persistence. Every call is scoped by the owning user.
#[async_trait]
pub trait CategoryRepo: Send + Sync {
    /// Fails with `StoreError::Duplicate` when `(name, user_id)` is taken.
    async fn insert(&self, user_id: Uuid, new: NewCategory) -> Result<Category, StoreError>;
    /// Ordered by name ascending.
    async fn list(&self, user_id: Uuid) -> Result<Vec<Category>, StoreError>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Category>, StoreError>;
    async fn find_by_name(
        &self,
        user_id: Uuid,
        name: &str,
        excluding: Option<Uuid>,
    ) -> Result<Option<Category>, StoreError>;
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: CategoryPatch,
    ) -> Result<Option<Category>, StoreError>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

/// Read-only view over todos that the category store needs to refuse
/// deleting a category still in use.
#[async_trait]
pub trait TodoReferences: Send + Sync {
    async fn count_referencing(&self, user_id: Uuid, category: &str) -> Result<i64, StoreError>;
}

#[derive(Clone)]
pub struct PgCategoryRepo {
    db: PgPool,
}

impl PgCategoryRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryRepo for PgCategoryRepo {
    async fn insert(&self, user_id: Uuid, new: NewCategory) -> Result<Category, StoreError> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (user_id, name, color)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, name, color, created_at
            "#,
        )
        .bind(user_id)
        .bind(&new.name)
        .bind(&new.color)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, user_id, name, color, created_at
            FROM categories
            WHERE user_id = $1
            ORDER BY name COLLATE "C" ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, user_id, name, color, created_at
            FROM categories
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_name(
        &self,
        user_id: Uuid,
        name: &str,
        excluding: Option<Uuid>,
    ) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, user_id, name, color, created_at
            FROM categories
            WHERE user_id = $1 AND name = $2
              AND ($3::uuid IS NULL OR id <> $3)
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(excluding)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: CategoryPatch,
    ) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
               SET name = COALESCE($3, name),
                   color = COALESCE($4, color)
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name, color, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(patch.name)
        .bind(patch.color)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
