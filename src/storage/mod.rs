//! # Storage Module
//!
//! Entities and the repository trait behind the menu API. The cache layer never talks to the
//! repository; it only sees the JSON that handlers produce from these rows.

pub mod memory;

pub use memory::InMemoryRepository;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Repository operation result
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Errors raised by repository implementations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} {id} belongs to another restaurant")]
    OwnershipMismatch { entity: &'static str, id: i64 },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Repository unavailable: {message}")]
    Unavailable { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub address: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRestaurant {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub restaurant_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub restaurant_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category_id: Option<i64>,
    pub restaurant_id: i64,
    /// Joined from the category at read time
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMenuItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub restaurant_id: i64,
}

/// Data access for restaurants, categories and menu items
///
/// Update and delete of categories and menu items take the caller's `restaurant_id` and fail
/// with [`RepositoryError::OwnershipMismatch`] when the row belongs to another restaurant.
#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn list_restaurants(&self) -> RepoResult<Vec<Restaurant>>;
    async fn get_restaurant(&self, id: i64) -> RepoResult<Restaurant>;
    async fn find_restaurant_by_slug(&self, slug: &str) -> RepoResult<Option<Restaurant>>;
    async fn create_restaurant(&self, new: NewRestaurant) -> RepoResult<Restaurant>;
    async fn update_restaurant(&self, id: i64, update: NewRestaurant) -> RepoResult<Restaurant>;
    /// Removes the restaurant together with its categories and menu items
    async fn delete_restaurant(&self, id: i64) -> RepoResult<Restaurant>;

    async fn list_categories(&self, restaurant_id: i64) -> RepoResult<Vec<Category>>;
    async fn create_category(&self, new: NewCategory) -> RepoResult<Category>;
    async fn update_category(&self, id: i64, update: NewCategory) -> RepoResult<Category>;
    /// Menu items of the category are kept with `category_id` cleared
    async fn delete_category(&self, id: i64, restaurant_id: i64) -> RepoResult<Category>;

    async fn list_menu_items(&self, restaurant_id: i64) -> RepoResult<Vec<MenuItem>>;
    async fn get_menu_item(&self, id: i64) -> RepoResult<MenuItem>;
    async fn create_menu_item(&self, new: NewMenuItem) -> RepoResult<MenuItem>;
    async fn update_menu_item(&self, id: i64, update: NewMenuItem) -> RepoResult<MenuItem>;
    async fn delete_menu_item(&self, id: i64, restaurant_id: i64) -> RepoResult<MenuItem>;
}
