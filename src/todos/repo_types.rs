use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::clock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("Invalid priority '{other}': expected low, medium or high")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Completed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Status::Pending => Status::Completed,
            Status::Completed => Status::Pending,
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "completed" => Ok(Status::Completed),
            other => Err(format!("Invalid status '{other}': expected pending or completed")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub priority: Priority,
    pub category: Option<String>,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Todo {
    /// Must run before every mutating write.
    pub fn touch_updated_at(&mut self) {
        self.updated_at = clock::after(self.updated_at);
    }
}

/// Raw `todos` row; enums are stored as text.
#[derive(Debug, FromRow)]
pub struct TodoRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<OffsetDateTime>,
    pub priority: String,
    pub category: Option<String>,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<TodoRow> for Todo {
    type Error = anyhow::Error;

    fn try_from(r: TodoRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            due_date: r.due_date,
            priority: r.priority.parse().map_err(anyhow::Error::msg)?,
            category: r.category,
            status: r.status.parse().map_err(anyhow::Error::msg)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Creation input as received; the service validates and trims it.
#[derive(Debug, Clone, Default)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<OffsetDateTime>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
}

/// A validated todo ready to insert.
#[derive(Debug, Clone)]
pub struct TodoDraft {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<OffsetDateTime>,
    pub priority: Priority,
    pub category: Option<String>,
    pub status: Status,
}

/// Partial update. The outer `Option` is "field present"; for nullable
/// fields the inner `None` clears the value.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<OffsetDateTime>>,
    pub priority: Option<Priority>,
    pub category: Option<Option<String>>,
    pub status: Option<Status>,
}

impl TodoPatch {
    pub fn apply(self, todo: &mut Todo) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(description) = self.description {
            todo.description = description;
        }
        if let Some(due_date) = self.due_date {
            todo.due_date = due_date;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(category) = self.category {
            todo.category = category;
        }
        if let Some(status) = self.status {
            todo.status = status;
        }
    }
}

/// Conjunctive list filter. The due-date range is inclusive on both ends.
#[derive(Debug, Clone, Default)]
pub struct TodoFilters {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub due_date_start: Option<OffsetDateTime>,
    pub due_date_end: Option<OffsetDateTime>,
    pub search: Option<String>,
}

impl TodoFilters {
    pub fn matches(&self, todo: &Todo) -> bool {
        if self.status.is_some_and(|s| s != todo.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != todo.priority) {
            return false;
        }
        if let Some(category) = &self.category {
            if todo.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if self.due_date_start.is_some() || self.due_date_end.is_some() {
            let Some(due) = todo.due_date else {
                return false;
            };
            if self.due_date_start.is_some_and(|start| due < start) {
                return false;
            }
            if self.due_date_end.is_some_and(|end| due > end) {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let in_title = todo.title.to_lowercase().contains(&needle);
            let in_description = todo
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}
