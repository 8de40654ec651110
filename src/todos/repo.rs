use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    categories::repo::TodoReferences,
    error::StoreError,
    todos::repo_types::{Todo, TodoDraft, TodoFilters, TodoPatch, TodoRow},
};

const TODO_COLUMNS: &str =
    "id, user_id, title, description, due_date, priority, category, status, created_at, updated_at";

/// Strictly later than the stored value even within one clock tick.
const NEXT_UPDATED_AT: &str =
    "GREATEST(clock_timestamp(), updated_at + interval '1 microsecond')";

/// Todo persistence. Every call is scoped by the owning user.
#[async_trait]
pub trait TodoRepo: Send + Sync {
    async fn insert(&self, user_id: Uuid, draft: TodoDraft) -> Result<Todo, StoreError>;
    /// Newest first.
    async fn list(&self, user_id: Uuid, filters: &TodoFilters) -> Result<Vec<Todo>, StoreError>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, StoreError>;
    /// Writes only the fields present in `patch` and advances `updated_at`;
    /// `None` when the record is gone.
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: TodoPatch,
    ) -> Result<Option<Todo>, StoreError>;
    /// Flips pending/completed in a single write.
    async fn toggle_status(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, StoreError>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
    /// Pending todos due strictly before `now`, earliest due first.
    async fn overdue(&self, user_id: Uuid, now: OffsetDateTime) -> Result<Vec<Todo>, StoreError>;
}

/// Escape `LIKE` metacharacters so user input matches literally.
pub(crate) fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn into_todos(rows: Vec<TodoRow>) -> Result<Vec<Todo>, StoreError> {
    rows.into_iter()
        .map(Todo::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::Backend)
}

#[derive(Clone)]
pub struct PgTodoRepo {
    db: PgPool,
}

impl PgTodoRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoRepo for PgTodoRepo {
    async fn insert(&self, user_id: Uuid, draft: TodoDraft) -> Result<Todo, StoreError> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            INSERT INTO todos (user_id, title, description, due_date, priority, category, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.due_date)
        .bind(draft.priority.as_str())
        .bind(&draft.category)
        .bind(draft.status.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(Todo::try_from(row)?)
    }

    async fn list(&self, user_id: Uuid, filters: &TodoFilters) -> Result<Vec<Todo>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {TODO_COLUMNS} FROM todos WHERE user_id = "));
        qb.push_bind(user_id);

        if let Some(status) = filters.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(priority) = filters.priority {
            qb.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(category) = &filters.category {
            qb.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(start) = filters.due_date_start {
            qb.push(" AND due_date >= ").push_bind(start);
        }
        if let Some(end) = filters.due_date_end {
            qb.push(" AND due_date <= ").push_bind(end);
        }
        if let Some(search) = &filters.search {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb.build_query_as::<TodoRow>().fetch_all(&self.db).await?;
        into_todos(rows)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Todo::try_from).transpose()?)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: TodoPatch,
    ) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            UPDATE todos
               SET title = COALESCE($3, title),
                   description = CASE WHEN $4::boolean THEN $5::text ELSE description END,
                   due_date = CASE WHEN $6::boolean THEN $7::timestamptz ELSE due_date END,
                   priority = COALESCE($8, priority),
                   category = CASE WHEN $9::boolean THEN $10::text ELSE category END,
                   status = COALESCE($11, status),
                   updated_at = {NEXT_UPDATED_AT}
             WHERE id = $1 AND user_id = $2
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.title)
        .bind(patch.description.is_some())
        .bind(patch.description.flatten())
        .bind(patch.due_date.is_some())
        .bind(patch.due_date.flatten())
        .bind(patch.priority.map(|p| p.as_str()))
        .bind(patch.category.is_some())
        .bind(patch.category.flatten())
        .bind(patch.status.map(|s| s.as_str()))
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Todo::try_from).transpose()?)
    }

    async fn toggle_status(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            UPDATE todos
               SET status = CASE status WHEN 'pending' THEN 'completed' ELSE 'pending' END,
                   updated_at = {NEXT_UPDATED_AT}
             WHERE id = $1 AND user_id = $2
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Todo::try_from).transpose()?)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn overdue(&self, user_id: Uuid, now: OffsetDateTime) -> Result<Vec<Todo>, StoreError> {
        let rows = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            SELECT {TODO_COLUMNS}
            FROM todos
            WHERE user_id = $1 AND status = 'pending' AND due_date < $2
            ORDER BY due_date ASC
            "#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.db)
        .await?;
        into_todos(rows)
    }
}

#[async_trait]
impl TodoReferences for PgTodoRepo {
    async fn count_referencing(&self, user_id: Uuid, category: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM todos WHERE user_id = $1 AND category = $2")
                .bind(user_id)
                .bind(category)
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("milk"), "milk");
    }
}
