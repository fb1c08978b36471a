/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Worker and employer directories.
//!
//! Membership and employer master data live outside this engine. These
//! traits are lookup-only; the engine never writes through them. The
//! in-memory implementations back the integration tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::database::UniversalUuid;

/// A worker as known to the external membership system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: UniversalUuid,
    pub name: String,
    /// Priority tier assigned to this worker's new registrations
    pub tier: i32,
}

/// An employer as known to the external employer master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerProfile {
    pub id: UniversalUuid,
    pub name: String,
}

/// Read-only lookup into the external membership system.
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    async fn lookup(&self, id: UniversalUuid) -> Option<WorkerProfile>;
}

/// Read-only lookup into the external employer master.
#[async_trait]
pub trait EmployerDirectory: Send + Sync {
    async fn lookup(&self, id: UniversalUuid) -> Option<EmployerProfile>;
}

/// In-memory worker directory.
#[derive(Debug, Default)]
pub struct InMemoryWorkerDirectory {
    workers: RwLock<HashMap<UniversalUuid, WorkerProfile>>,
}

impl InMemoryWorkerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: WorkerProfile) {
        self.workers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(profile.id, profile);
    }
}

#[async_trait]
impl WorkerDirectory for InMemoryWorkerDirectory {
    async fn lookup(&self, id: UniversalUuid) -> Option<WorkerProfile> {
        self.workers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }
}

/// In-memory employer directory.
#[derive(Debug, Default)]
pub struct InMemoryEmployerDirectory {
    employers: RwLock<HashMap<UniversalUuid, EmployerProfile>>,
}

impl InMemoryEmployerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: EmployerProfile) {
        self.employers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(profile.id, profile);
    }
}

#[async_trait]
impl EmployerDirectory for InMemoryEmployerDirectory {
    async fn lookup(&self, id: UniversalUuid) -> Option<EmployerProfile> {
        self.employers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }
}
