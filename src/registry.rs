//! Subscriber registry: a separately chained hash table keyed by `UserId`.
//!
//! Buckets are plain vectors, so entries that collide keep their insertion
//! order. The table doubles its bucket count whenever an insert would push
//! the load factor past the configured threshold.

use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, BuildHasherDefault};

use crate::config::RegistryConfig;
use crate::ids::UserId;
use crate::user::User;

/// Fixed-key SipHash, so bucket placement is reproducible between runs.
pub type DeterministicState = BuildHasherDefault<DefaultHasher>;

#[derive(Debug, Clone)]
pub struct UserRegistry<S = DeterministicState> {
    buckets: Vec<Vec<(UserId, User)>>,
    len: usize,
    max_load_factor: f64,
    hasher: S,
}

impl UserRegistry<DeterministicState> {
    pub fn new() -> Self {
        Self::with_config(&RegistryConfig::default())
    }

    pub fn with_config(config: &RegistryConfig) -> Self {
        Self::with_hasher(config, DeterministicState::default())
    }
}

impl Default for UserRegistry<DeterministicState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> UserRegistry<S> {
    pub fn with_hasher(config: &RegistryConfig, hasher: S) -> Self {
        let bucket_count = config.initial_buckets.max(1);
        let max_load_factor = if config.max_load_factor.is_finite() && config.max_load_factor > 0.0
        {
            config.max_load_factor
        } else {
            RegistryConfig::default().max_load_factor
        };
        Self {
            buckets: (0..bucket_count).map(|_| Vec::new()).collect(),
            len: 0,
            max_load_factor,
            hasher,
        }
    }

    /// Inserts or replaces the user stored under `id`, returning the
    /// replaced value.
    pub fn put(&mut self, id: UserId, user: User) -> Option<User> {
        let index = self.bucket_of(&id);
        if let Some(slot) = self.buckets[index].iter_mut().find(|(key, _)| *key == id) {
            return Some(std::mem::replace(&mut slot.1, user));
        }

        if (self.len + 1) as f64 / self.buckets.len() as f64 > self.max_load_factor {
            self.grow();
        }
        let index = self.bucket_of(&id);
        self.buckets[index].push((id, user));
        self.len += 1;
        None
    }

    pub fn get(&self, id: &UserId) -> Option<&User> {
        self.buckets[self.bucket_of(id)]
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, user)| user)
    }

    pub fn get_mut(&mut self, id: &UserId) -> Option<&mut User> {
        let index = self.bucket_of(id);
        self.buckets[index]
            .iter_mut()
            .find(|(key, _)| key == id)
            .map(|(_, user)| user)
    }

    /// Removes and returns the user; `None` means the id was not present.
    pub fn remove(&mut self, id: &UserId) -> Option<User> {
        let index = self.bucket_of(id);
        let bucket = &mut self.buckets[index];
        let position = bucket.iter().position(|(key, _)| key == id)?;
        self.len -= 1;
        // `remove`, not `swap_remove`: the rest of the chain keeps its order.
        Some(bucket.remove(position).1)
    }

    pub fn contains_key(&self, id: &UserId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.buckets.len() as f64
    }

    /// Bucket order, then insertion order within each bucket. Not a stable
    /// global order: a resize reshuffles buckets.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &User)> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|(id, user)| (id, user)))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.iter().map(|(_, user)| user)
    }

    fn bucket_of(&self, id: &UserId) -> usize {
        (self.hasher.hash_one(id) % self.buckets.len() as u64) as usize
    }

    fn grow(&mut self) {
        let new_count = self.buckets.len() * 2;
        let old = std::mem::replace(
            &mut self.buckets,
            (0..new_count).map(|_| Vec::new()).collect(),
        );
        for (id, user) in old.into_iter().flatten() {
            let index = self.bucket_of(&id);
            self.buckets[index].push((id, user));
        }
    }
}
