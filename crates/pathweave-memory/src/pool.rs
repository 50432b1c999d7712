// Dweve Pathweave - Multi-Path Grammar Parsing Engine
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reuse of frequently created objects.
//!
//! An [`ObjectPool`] hands out [`Pooled`] guards. A guard owns its object
//! exclusively (it is not `Clone`), remembers which pool created it, and is
//! given back with [`ObjectPool::release`]. Released objects are reset and
//! kept on a bounded free list; a guard that is simply dropped frees its
//! object normally.
//!
//! [`SyncObjectPool`] wraps a pool in a mutex for sharing across threads.

use crate::error::ResourceError;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Objects that can be returned to a pool.
pub trait Reusable {
    /// Restore the object to a fresh state, keeping allocations where possible.
    fn reset(&mut self);
}

impl<T> Reusable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Reusable for String {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    max_idle: usize,
    prefill: usize,
}

impl PoolConfig {
    /// Default free-list bound.
    pub const DEFAULT_MAX_IDLE: usize = 64;

    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of idle objects kept for reuse.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Create this many objects up front.
    pub fn with_prefill(mut self, prefill: usize) -> Self {
        self.prefill = prefill;
        self
    }

    /// Free-list bound.
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: Self::DEFAULT_MAX_IDLE,
            prefill: 0,
        }
    }
}

/// Pool usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Objects built by the factory.
    pub created: u64,
    /// Acquisitions served from the free list.
    pub reused: u64,
    /// Guards handed out and not yet released.
    pub outstanding: u64,
    /// Objects currently on the free list.
    pub idle: usize,
}

/// Exclusive handle to a pooled object.
pub struct Pooled<T> {
    value: T,
    origin: u64,
}

impl<T> Pooled<T> {
    /// Id of the pool that created this object.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Detach the object from pool accounting and return it.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled")
            .field("origin", &self.origin)
            .field("value", &self.value)
            .finish()
    }
}

/// Single-threaded object pool.
pub struct ObjectPool<T> {
    id: u64,
    config: PoolConfig,
    idle: Vec<T>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    created: u64,
    reused: u64,
    outstanding: u64,
}

impl<T: Reusable> ObjectPool<T> {
    /// Create a pool that builds new objects with `factory`.
    pub fn new<F>(config: PoolConfig, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let mut pool = Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            config,
            idle: Vec::with_capacity(config.max_idle.min(config.prefill.max(1))),
            factory: Box::new(factory),
            created: 0,
            reused: 0,
            outstanding: 0,
        };
        for _ in 0..config.prefill.min(config.max_idle) {
            let value = (pool.factory)();
            pool.created += 1;
            pool.idle.push(value);
        }
        pool
    }

    /// Unique id of this pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Take an object from the free list, or build one.
    pub fn acquire(&mut self) -> Pooled<T> {
        let value = match self.idle.pop() {
            Some(value) => {
                self.reused += 1;
                value
            }
            None => {
                self.created += 1;
                (self.factory)()
            }
        };
        self.outstanding += 1;
        Pooled {
            value,
            origin: self.id,
        }
    }

    /// Return an object to this pool.
    ///
    /// The object is reset and kept if the free list has room. Releasing a
    /// guard into a pool that did not create it is an error, and the object
    /// is dropped.
    pub fn release(&mut self, mut item: Pooled<T>) -> Result<(), ResourceError> {
        if item.origin != self.id {
            return Err(ResourceError::PoolMisuse {
                origin: item.origin,
                target: self.id,
            });
        }
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.idle.len() < self.config.max_idle {
            item.value.reset();
            self.idle.push(item.value);
        }
        Ok(())
    }

    /// Usage counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created,
            reused: self.reused,
            outstanding: self.outstanding,
            idle: self.idle.len(),
        }
    }

    /// Drop every idle object.
    pub fn shrink(&mut self) {
        self.idle.clear();
        self.idle.shrink_to_fit();
    }
}

impl<T> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("id", &self.id)
            .field("idle", &self.idle.len())
            .field("outstanding", &self.outstanding)
            .finish()
    }
}

/// Thread-safe [`ObjectPool`].
pub struct SyncObjectPool<T> {
    inner: Mutex<ObjectPool<T>>,
}

impl<T: Reusable> SyncObjectPool<T> {
    /// Create a shared pool.
    pub fn new<F>(config: PoolConfig, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(ObjectPool::new(config, factory)),
        }
    }

    /// Take an object.
    pub fn acquire(&self) -> Pooled<T> {
        self.inner.lock().acquire()
    }

    /// Return an object.
    pub fn release(&self, item: Pooled<T>) -> Result<(), ResourceError> {
        self.inner.lock().release(item)
    }

    /// Usage counters.
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats()
    }

    /// Unique id of the wrapped pool.
    pub fn id(&self) -> u64 {
        self.inner.lock().id()
    }
}

impl<T> std::fmt::Debug for SyncObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncObjectPool").finish_non_exhaustive()
    }
}
