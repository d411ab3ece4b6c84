//! In-memory [`MenuRepository`] backed by `DashMap` tables with monotonically increasing ids.

use super::{
    Category, MenuItem, MenuRepository, NewCategory, NewMenuItem, NewRestaurant, RepoResult,
    RepositoryError, Restaurant,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone)]
struct StoredMenuItem {
    id: i64,
    name: String,
    description: Option<String>,
    price: f64,
    category_id: Option<i64>,
    restaurant_id: i64,
}

/// Process-local repository for development and tests
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    restaurants: DashMap<i64, Restaurant>,
    categories: DashMap<i64, Category>,
    menu_items: DashMap<i64, StoredMenuItem>,
    next_id: AtomicI64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn ensure_restaurant(&self, id: i64) -> RepoResult<()> {
        if self.restaurants.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::NotFound {
                entity: "restaurant",
                id,
            })
        }
    }

    fn ensure_slug_free(&self, slug: &str, except: Option<i64>) -> RepoResult<()> {
        let taken = self
            .restaurants
            .iter()
            .any(|r| r.slug == slug && Some(r.id) != except);
        if taken {
            return Err(RepositoryError::Conflict {
                message: format!("slug '{}' is already in use", slug),
            });
        }
        Ok(())
    }

    /// A menu item may only reference a category of its own restaurant
    fn ensure_category_usable(&self, category_id: Option<i64>, restaurant_id: i64) -> RepoResult<()> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let category = self
            .categories
            .get(&category_id)
            .ok_or(RepositoryError::NotFound {
                entity: "category",
                id: category_id,
            })?;
        if category.restaurant_id != restaurant_id {
            return Err(RepositoryError::Conflict {
                message: format!(
                    "category {} does not belong to restaurant {}",
                    category_id, restaurant_id
                ),
            });
        }
        Ok(())
    }

    fn hydrate(&self, item: &StoredMenuItem) -> MenuItem {
        let category_name = item
            .category_id
            .and_then(|id| self.categories.get(&id).map(|c| c.name.clone()));

        MenuItem {
            id: item.id,
            name: item.name.clone(),
            description: item.description.clone(),
            price: item.price,
            category_id: item.category_id,
            restaurant_id: item.restaurant_id,
            category_name,
        }
    }
}

#[async_trait]
impl MenuRepository for InMemoryRepository {
    async fn list_restaurants(&self) -> RepoResult<Vec<Restaurant>> {
        let mut restaurants: Vec<Restaurant> =
            self.restaurants.iter().map(|r| r.value().clone()).collect();
        restaurants.sort_by_key(|r| r.id);
        Ok(restaurants)
    }

    async fn get_restaurant(&self, id: i64) -> RepoResult<Restaurant> {
        self.restaurants
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(RepositoryError::NotFound {
                entity: "restaurant",
                id,
            })
    }

    async fn find_restaurant_by_slug(&self, slug: &str) -> RepoResult<Option<Restaurant>> {
        Ok(self
            .restaurants
            .iter()
            .find(|r| r.slug == slug)
            .map(|r| r.value().clone()))
    }

    async fn create_restaurant(&self, new: NewRestaurant) -> RepoResult<Restaurant> {
        self.ensure_slug_free(&new.slug, None)?;

        let restaurant = Restaurant {
            id: self.allocate_id(),
            name: new.name,
            slug: new.slug,
            address: new.address,
            contact_number: new.contact_number,
        };
        self.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(restaurant)
    }

    async fn update_restaurant(&self, id: i64, update: NewRestaurant) -> RepoResult<Restaurant> {
        self.ensure_restaurant(id)?;
        self.ensure_slug_free(&update.slug, Some(id))?;

        let mut restaurant = self
            .restaurants
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound {
                entity: "restaurant",
                id,
            })?;
        restaurant.name = update.name;
        restaurant.slug = update.slug;
        restaurant.address = update.address;
        restaurant.contact_number = update.contact_number;
        Ok(restaurant.clone())
    }

    async fn delete_restaurant(&self, id: i64) -> RepoResult<Restaurant> {
        let (_, restaurant) = self
            .restaurants
            .remove(&id)
            .ok_or(RepositoryError::NotFound {
                entity: "restaurant",
                id,
            })?;
        self.categories.retain(|_, c| c.restaurant_id != id);
        self.menu_items.retain(|_, m| m.restaurant_id != id);
        Ok(restaurant)
    }

    async fn list_categories(&self, restaurant_id: i64) -> RepoResult<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .categories
            .iter()
            .filter(|c| c.restaurant_id == restaurant_id)
            .map(|c| c.value().clone())
            .collect();
        categories.sort_by_key(|c| c.id);
        Ok(categories)
    }

    async fn create_category(&self, new: NewCategory) -> RepoResult<Category> {
        self.ensure_restaurant(new.restaurant_id)?;

        let category = Category {
            id: self.allocate_id(),
            name: new.name,
            restaurant_id: new.restaurant_id,
        };
        self.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: i64, update: NewCategory) -> RepoResult<Category> {
        let mut category = self
            .categories
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound {
                entity: "category",
                id,
            })?;
        if category.restaurant_id != update.restaurant_id {
            return Err(RepositoryError::OwnershipMismatch {
                entity: "category",
                id,
            });
        }
        category.name = update.name;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: i64, restaurant_id: i64) -> RepoResult<Category> {
        let owner = self
            .categories
            .get(&id)
            .map(|c| c.restaurant_id)
            .ok_or(RepositoryError::NotFound {
                entity: "category",
                id,
            })?;
        if owner != restaurant_id {
            return Err(RepositoryError::OwnershipMismatch {
                entity: "category",
                id,
            });
        }

        let (_, category) = self
            .categories
            .remove(&id)
            .ok_or(RepositoryError::NotFound {
                entity: "category",
                id,
            })?;
        for mut item in self.menu_items.iter_mut() {
            if item.category_id == Some(id) {
                item.category_id = None;
            }
        }
        Ok(category)
    }

    async fn list_menu_items(&self, restaurant_id: i64) -> RepoResult<Vec<MenuItem>> {
        let mut items: Vec<MenuItem> = self
            .menu_items
            .iter()
            .filter(|m| m.restaurant_id == restaurant_id)
            .map(|m| self.hydrate(m.value()))
            .collect();
        items.sort_by_key(|m| m.id);
        Ok(items)
    }

    async fn get_menu_item(&self, id: i64) -> RepoResult<MenuItem> {
        self.menu_items
            .get(&id)
            .map(|m| self.hydrate(m.value()))
            .ok_or(RepositoryError::NotFound {
                entity: "menu item",
                id,
            })
    }

    async fn create_menu_item(&self, new: NewMenuItem) -> RepoResult<MenuItem> {
        self.ensure_restaurant(new.restaurant_id)?;
        self.ensure_category_usable(new.category_id, new.restaurant_id)?;

        let item = StoredMenuItem {
            id: self.allocate_id(),
            name: new.name,
            description: new.description,
            price: new.price,
            category_id: new.category_id,
            restaurant_id: new.restaurant_id,
        };
        let hydrated = self.hydrate(&item);
        self.menu_items.insert(item.id, item);
        Ok(hydrated)
    }

    async fn update_menu_item(&self, id: i64, update: NewMenuItem) -> RepoResult<MenuItem> {
        let owner = self
            .menu_items
            .get(&id)
            .map(|m| m.restaurant_id)
            .ok_or(RepositoryError::NotFound {
                entity: "menu item",
                id,
            })?;
        if owner != update.restaurant_id {
            return Err(RepositoryError::OwnershipMismatch {
                entity: "menu item",
                id,
            });
        }
        self.ensure_category_usable(update.category_id, owner)?;

        let stored = {
            let mut item = self
                .menu_items
                .get_mut(&id)
                .ok_or(RepositoryError::NotFound {
                    entity: "menu item",
                    id,
                })?;
            item.name = update.name;
            item.description = update.description;
            item.price = update.price;
            item.category_id = update.category_id;
            item.clone()
        };
        Ok(self.hydrate(&stored))
    }

    async fn delete_menu_item(&self, id: i64, restaurant_id: i64) -> RepoResult<MenuItem> {
        let owner = self
            .menu_items
            .get(&id)
            .map(|m| m.restaurant_id)
            .ok_or(RepositoryError::NotFound {
                entity: "menu item",
                id,
            })?;
        if owner != restaurant_id {
            return Err(RepositoryError::OwnershipMismatch {
                entity: "menu item",
                id,
            });
        }

        let (_, item) = self
            .menu_items
            .remove(&id)
            .ok_or(RepositoryError::NotFound {
                entity: "menu item",
                id,
            })?;
        Ok(self.hydrate(&item))
    }
}
