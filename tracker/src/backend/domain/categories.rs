//! Category list rules.
//!
//! Categories are an ordered list; insertion order is display order. Ids are
//! immutable, and a category cannot be deleted while any item still files
//! under it.

use shared::{Category, FinanceItem};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CategoryError {
    #[error("Category id cannot be empty")]
    EmptyId,
    #[error("Category name cannot be empty")]
    EmptyName,
    #[error("Category '{0}' already exists")]
    DuplicateId(String),
    #[error("Category '{0}' not found")]
    NotFound(String),
    #[error("Category '{id}' is still used by {item_count} item(s)")]
    InUse { id: String, item_count: usize },
}

/// Append a category, rejecting empty or duplicate ids
pub fn add_category(categories: &mut Vec<Category>, category: Category) -> Result<(), CategoryError> {
    if category.id.trim().is_empty() {
        return Err(CategoryError::EmptyId);
    }
    if category.name.trim().is_empty() {
        return Err(CategoryError::EmptyName);
    }
    if categories.iter().any(|c| c.id == category.id) {
        return Err(CategoryError::DuplicateId(category.id));
    }
    categories.push(category);
    Ok(())
}

/// Replace name, effect and color of the category with the same id, in place
pub fn update_category(categories: &mut [Category], category: Category) -> Result<(), CategoryError> {
    if category.name.trim().is_empty() {
        return Err(CategoryError::EmptyName);
    }
    let existing = categories
        .iter_mut()
        .find(|c| c.id == category.id)
        .ok_or_else(|| CategoryError::NotFound(category.id.clone()))?;
    *existing = category;
    Ok(())
}

/// Remove a category. Blocked while items reference it.
pub fn delete_category(
    categories: &mut Vec<Category>,
    items: &[FinanceItem],
    id: &str,
) -> Result<Category, CategoryError> {
    let position = categories
        .iter()
        .position(|c| c.id == id)
        .ok_or_else(|| CategoryError::NotFound(id.to_string()))?;

    let item_count = items.iter().filter(|item| item.category == id).count();
    if item_count > 0 {
        return Err(CategoryError::InUse {
            id: id.to_string(),
            item_count,
        });
    }

    Ok(categories.remove(position))
}
