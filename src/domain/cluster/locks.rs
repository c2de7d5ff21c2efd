// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One exclusion token per cluster name.
///
/// Tokens are created on first use and never removed. Waiters are served in
/// FIFO order, so operations on one name run in the order they were issued.
#[derive(Debug, Default)]
pub struct NameLocks {
    tokens: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn token(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        self.token(name).lock_owned().await
    }

    pub fn try_acquire(&self, name: &str) -> Option<OwnedMutexGuard<()>> {
        self.token(name).try_lock_owned().ok()
    }

    /// Whether an operation currently holds the token of `name`.
    pub fn is_busy(&self, name: &str) -> bool {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens
            .get(name)
            .is_some_and(|token| token.try_lock().is_err())
    }
}
