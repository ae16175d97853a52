// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared command context: configuration plus the resolved storage root.

use crate::exit_error::ExitError;
use rn_core::Config;
use std::path::PathBuf;

pub struct Context {
    pub config: Config,
    pub storage_root: PathBuf,
}

impl Context {
    /// Load config (defaults < file < env) and resolve the storage root,
    /// with the `--storage` flag taking final precedence.
    pub fn load(storage_flag: Option<PathBuf>) -> Result<Self, ExitError> {
        let mut config = Config::load().map_err(|e| ExitError::general(e.to_string()))?;
        if let Some(dir) = storage_flag {
            config.storage.user_root_dir = Some(dir);
        }
        let storage_root = config
            .storage_root()
            .map_err(|e| ExitError::general(e.to_string()))?;
        Ok(Self { config, storage_root })
    }

    pub fn layout(&self) -> rn_storage::StorageLayout {
        rn_storage::StorageLayout::new(&self.storage_root)
    }

    pub fn open_pool(&self) -> Result<rn_storage::DbPool, ExitError> {
        std::fs::create_dir_all(&self.storage_root)
            .map_err(|e| ExitError::general(e.to_string()))?;
        rn_storage::DbPool::open(&self.layout().db_path())
            .map_err(|e| ExitError::general(e.to_string()))
    }

    pub fn open_store(&self) -> Result<rn_archive::BlobStore, ExitError> {
        rn_archive::BlobStore::open(&self.config.archive_dir(&self.storage_root))
            .map_err(|e| ExitError::general(e.to_string()))
    }
}
