use serde::{Deserialize, Deserializer, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    UtcOffset,
};

use crate::{
    error::AppError,
    todos::repo_types::{NewTodo, Priority, Status, Todo, TodoFilters, TodoPatch},
};

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(t.to_offset(UtcOffset::UTC));
    }
    let date = Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()?;
    Some(date.midnight().assume_utc())
}

fn date_field(field: &str, raw: &str) -> Result<OffsetDateTime, AppError> {
    parse_datetime(raw).ok_or_else(|| AppError::validation(format!("Invalid {field}")))
}

fn enum_field<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, AppError> {
    raw.trim().parse::<T>().map_err(AppError::Validation)
}

/// Blank query values count as absent.
fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl TryFrom<CreateTodoRequest> for NewTodo {
    type Error = AppError;

    fn try_from(req: CreateTodoRequest) -> Result<Self, Self::Error> {
        Ok(NewTodo {
            title: req.title.unwrap_or_default(),
            description: req.description,
            due_date: present(req.due_date)
                .map(|d| date_field("due_date", &d))
                .transpose()?,
            priority: present(req.priority)
                .map(|p| enum_field::<Priority>(&p))
                .transpose()?,
            category: req.category,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TryFrom<UpdateTodoRequest> for TodoPatch {
    type Error = AppError;

    fn try_from(req: UpdateTodoRequest) -> Result<Self, Self::Error> {
        let due_date = match req.due_date {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) if raw.trim().is_empty() => Some(None),
            Some(Some(raw)) => Some(Some(date_field("due_date", &raw)?)),
        };
        Ok(TodoPatch {
            title: req.title,
            description: req.description,
            due_date,
            priority: req.priority.map(|p| enum_field::<Priority>(&p)).transpose()?,
            category: req.category,
            status: req.status.map(|s| enum_field::<Status>(&s)).transpose()?,
        })
    }
}

/// Query string of `GET /api/todos`.
#[derive(Debug, Default, Deserialize)]
pub struct ListTodosQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub due_date_start: Option<String>,
    pub due_date_end: Option<String>,
    pub search: Option<String>,
}

impl TryFrom<ListTodosQuery> for TodoFilters {
    type Error = AppError;

    fn try_from(q: ListTodosQuery) -> Result<Self, Self::Error> {
        Ok(TodoFilters {
            status: present(q.status)
                .map(|s| enum_field::<Status>(&s))
                .transpose()?,
            priority: present(q.priority)
                .map(|p| enum_field::<Priority>(&p))
                .transpose()?,
            category: present(q.category),
            due_date_start: present(q.due_date_start)
                .map(|d| date_field("due_date_start", &d))
                .transpose()?,
            due_date_end: present(q.due_date_end)
                .map(|d| date_field("due_date_end", &d))
                .transpose()?,
            search: present(q.search),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TodoEnvelope {
    pub todo: Todo,
}

#[derive(Debug, Serialize)]
pub struct TodosEnvelope {
    pub todos: Vec<Todo>,
}
