use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::MediaLibrary;
use crate::{
    error::{AppError, AppResult},
    models::{CollectionState, LibraryItem, LibraryMovie, RatingKey},
};

/// Mutation recorded by [`InMemoryLibrary`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LibraryCall {
    Create(Vec<RatingKey>),
    Add(Vec<RatingKey>),
    Remove(Vec<RatingKey>),
    CustomOrder,
    Move(RatingKey, Option<RatingKey>),
    DeleteCopy(RatingKey, String),
}

/// Library double that keeps everything in memory and records mutations
#[derive(Default)]
pub(crate) struct InMemoryLibrary {
    items: Mutex<HashMap<RatingKey, LibraryItem>>,
    collection: Mutex<Option<CollectionState>>,
    calls: Mutex<Vec<LibraryCall>>,
    inventory: Mutex<Vec<LibraryMovie>>,
    failing_moves: Mutex<HashSet<RatingKey>>,
    failing_deletes: Mutex<HashSet<String>>,
    fail_fetch: Mutex<bool>,
    fail_custom_order: Mutex<bool>,
}

fn keys_of(items: &[LibraryItem]) -> Vec<RatingKey> {
    items.iter().map(|item| item.key.clone()).collect()
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(self, items: &[LibraryItem]) -> Self {
        {
            let mut stored = self.items.lock().unwrap();
            for item in items {
                stored.insert(item.key.clone(), item.clone());
            }
        }
        self
    }

    pub fn with_collection(self, name: &str, items: &[LibraryItem]) -> Self {
        let library = self.with_items(items);
        *library.collection.lock().unwrap() = Some(CollectionState {
            id: "900".to_string(),
            name: name.to_string(),
            items: items.to_vec(),
        });
        library
    }

    pub fn with_inventory(self, movies: &[LibraryMovie]) -> Self {
        *self.inventory.lock().unwrap() = movies.to_vec();
        self
    }

    pub fn fail_delete(&self, copy_id: &str) {
        self.failing_deletes.lock().unwrap().insert(copy_id.to_string());
    }

    pub fn deleted_copies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LibraryCall::DeleteCopy(_, id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn fail_move(&self, key: &str) {
        self.failing_moves.lock().unwrap().insert(RatingKey::from(key));
    }

    pub fn fail_fetch(&self) {
        *self.fail_fetch.lock().unwrap() = true;
    }

    pub fn fail_custom_order(&self) {
        *self.fail_custom_order.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<LibraryCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn moves(&self) -> Vec<(RatingKey, Option<RatingKey>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LibraryCall::Move(item, after) => Some((item, after)),
                _ => None,
            })
            .collect()
    }

    pub fn collection_keys(&self) -> Vec<RatingKey> {
        self.collection
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| keys_of(&c.items))
            .unwrap_or_default()
    }

    fn record(&self, call: LibraryCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl MediaLibrary for InMemoryLibrary {
    async fn search_movies(&self, title: &str) -> AppResult<Vec<LibraryItem>> {
        let needle = title.to_lowercase();
        let mut found: Vec<LibraryItem> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|item| item.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    async fn fetch_item(&self, key: &RatingKey) -> AppResult<Option<LibraryItem>> {
        Ok(self.items.lock().unwrap().get(key).cloned())
    }

    async fn collection(&self, name: &str) -> AppResult<Option<CollectionState>> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(AppError::ExternalApi("library unreachable".to_string()));
        }
        Ok(self
            .collection
            .lock()
            .unwrap()
            .clone()
            .filter(|c| c.name == name))
    }

    async fn create_collection(&self, name: &str, items: &[LibraryItem]) -> AppResult<CollectionState> {
        self.record(LibraryCall::Create(keys_of(items)));
        let state = CollectionState {
            id: "900".to_string(),
            name: name.to_string(),
            items: items.to_vec(),
        };
        *self.collection.lock().unwrap() = Some(state.clone());
        Ok(state)
    }

    async fn add_items(&self, _collection: &CollectionState, items: &[LibraryItem]) -> AppResult<()> {
        self.record(LibraryCall::Add(keys_of(items)));
        let mut guard = self.collection.lock().unwrap();
        let state = guard
            .as_mut()
            .ok_or_else(|| AppError::NotFound("collection".to_string()))?;
        for item in items {
            if !state.items.iter().any(|i| i.key == item.key) {
                state.items.push(item.clone());
            }
        }
        Ok(())
    }

    async fn remove_items(&self, _collection: &CollectionState, items: &[LibraryItem]) -> AppResult<()> {
        self.record(LibraryCall::Remove(keys_of(items)));
        let removed: HashSet<RatingKey> = keys_of(items).into_iter().collect();
        if let Some(state) = self.collection.lock().unwrap().as_mut() {
            state.items.retain(|item| !removed.contains(&item.key));
        }
        Ok(())
    }

    async fn set_custom_order(&self, _collection: &CollectionState) -> AppResult<()> {
        if *self.fail_custom_order.lock().unwrap() {
            return Err(AppError::ExternalApi("sort rejected".to_string()));
        }
        self.record(LibraryCall::CustomOrder);
        Ok(())
    }

    async fn move_item(
        &self,
        _collection: &CollectionState,
        item: &RatingKey,
        after: Option<&RatingKey>,
    ) -> AppResult<()> {
        self.record(LibraryCall::Move(item.clone(), after.cloned()));
        if self.failing_moves.lock().unwrap().contains(item) {
            return Err(AppError::ExternalApi(format!("400 bad_request moving {}", item)));
        }

        let mut guard = self.collection.lock().unwrap();
        let state = guard
            .as_mut()
            .ok_or_else(|| AppError::NotFound("collection".to_string()))?;
        let from = state
            .items
            .iter()
            .position(|i| &i.key == item)
            .ok_or_else(|| AppError::NotFound(item.to_string()))?;
        if let Some(anchor) = after {
            if !state.items.iter().any(|i| &i.key == anchor) {
                return Err(AppError::NotFound(anchor.to_string()));
            }
        }
        let moved = state.items.remove(from);
        let to = match after {
            Some(anchor) => state
                .items
                .iter()
                .position(|i| &i.key == anchor)
                .map(|p| p + 1)
                .ok_or_else(|| AppError::NotFound(anchor.to_string()))?,
            None => 0,
        };
        state.items.insert(to, moved);
        Ok(())
    }

    async fn movie_inventory(&self) -> AppResult<Vec<LibraryMovie>> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(AppError::ExternalApi("library unreachable".to_string()));
        }
        Ok(self.inventory.lock().unwrap().clone())
    }

    async fn delete_copy(&self, item: &RatingKey, copy_id: &str) -> AppResult<()> {
        self.record(LibraryCall::DeleteCopy(item.clone(), copy_id.to_string()));
        if self.failing_deletes.lock().unwrap().contains(copy_id) {
            return Err(AppError::ExternalApi(format!("cannot delete media {}", copy_id)));
        }
        for movie in self.inventory.lock().unwrap().iter_mut() {
            if &movie.item.key == item {
                movie.copies.retain(|copy| copy.id != copy_id);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
