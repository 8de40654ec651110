use serde::{Deserialize, Serialize};

use crate::categories::repo_types::Category;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryEnvelope {
    pub category: Category,
}

#[derive(Debug, Serialize)]
pub struct CategoriesEnvelope {
    pub categories: Vec<Category>,
}
