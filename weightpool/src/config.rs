// MIT License
//
// Copyright (c) 2025 Jai Veilleux
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PoolError, PoolResult};

/// Settings for a [PoolStore](crate::PoolStore) and its JSON collaborator.
///
/// ```toml
/// path = "user_agent_pool.json"
/// lock_timeout_ms = 250
/// seed = 42
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// JSON document backing the pool.
    pub path: Option<PathBuf>,
    /// Bounded wait for the pool lock; blocks indefinitely when absent.
    pub lock_timeout_ms: Option<u64>,
    /// Fixed seed for the store's sampler.
    pub seed: Option<u64>,
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> PoolResult<Self> {
        Self::parse(text, "<inline>")
    }

    pub fn from_file(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PoolError::io(path, e))?;
        let mut config = Self::parse(&text, &path.display().to_string())?;
        // relative pool paths are relative to the config file
        if let (Some(pool_path), Some(dir)) = (&config.path, path.parent()) {
            if pool_path.is_relative() {
                config.path = Some(dir.join(pool_path));
            }
        }
        Ok(config)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    fn parse(text: &str, origin: &str) -> PoolResult<Self> {
        toml::from_str(text).map_err(|error| PoolError::Toml {
            origin: origin.to_string(),
            error,
        })
    }
}
