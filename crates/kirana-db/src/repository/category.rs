//! Product categories of a shop.

use chrono::Utc;
use kirana_core::validation::validate_name;
use kirana_core::{Category, CategoryType, ValidationError};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::non_blank;

const CATEGORY_COLUMNS: &str = "id, name, category_type, description, is_active, created_at";

/// Input for creating or editing a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub category_type: CategoryType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn create(&self, input: &CategoryInput) -> DbResult<Category> {
        let name = input.name.trim();
        validate_name("name", name, 100)?;

        let sql = format!(
            "INSERT INTO categories (name, category_type, description, is_active, created_at) \
             VALUES (?1, ?2, ?3, 1, ?4) RETURNING {CATEGORY_COLUMNS}"
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .bind(input.category_type)
            .bind(non_blank(input.description.as_deref()))
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| duplicate_name(e, name))?;

        debug!(id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn get(&self, id: i64) -> DbResult<Category> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1");
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Finds a category by name, case-insensitively.
    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    /// All categories, optionally of one type, by name.
    pub async fn list(&self, category_type: Option<CategoryType>) -> DbResult<Vec<Category>> {
        let categories = match category_type {
            Some(kind) => {
                let sql = format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories WHERE category_type = ?1 ORDER BY name"
                );
                sqlx::query_as::<_, Category>(&sql)
                    .bind(kind)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name");
                sqlx::query_as::<_, Category>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(categories)
    }

    pub async fn update(&self, id: i64, input: &CategoryInput) -> DbResult<Category> {
        let name = input.name.trim();
        validate_name("name", name, 100)?;

        let result = sqlx::query(
            "UPDATE categories SET name = ?1, category_type = ?2, description = ?3 WHERE id = ?4",
        )
        .bind(name)
        .bind(input.category_type)
        .bind(non_blank(input.description.as_deref()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, name))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        self.get(id).await
    }

    /// Deletes a category. Its products keep existing without a category.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        Ok(())
    }
}

fn duplicate_name(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        e if e.is_unique_violation_on("categories.name") => ValidationError::Duplicate {
            field: "Category".to_string(),
            value: name.to_string(),
        }
        .into(),
        other => other,
    }
}
