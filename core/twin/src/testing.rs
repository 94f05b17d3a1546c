//! In-memory twin registry.
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dsx_client::{ApiError, Result, TwinRegistry};
use dsx_model::{ShellDescriptor, SpecificAssetId, SubmodelDescriptor};

#[derive(Default)]
struct RegistryState {
    shells: Vec<ShellDescriptor>,
    shells_created: usize,
    submodels_created: usize,
}

/// Registry matching shells by subset of their specific asset ids, like the
/// AAS lookup api does.
#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<RegistryState>,
    conflict_on_create: bool,
}

impl FakeRegistry {
    pub fn new() -> FakeRegistry {
        FakeRegistry::default()
    }

    pub fn with_shell(self, shell: ShellDescriptor) -> Self {
        self.lock().shells.push(shell);
        self
    }

    /// Every shell creation fails with 409, as if another writer won the race.
    pub fn with_conflict_on_create(mut self) -> Self {
        self.conflict_on_create = true;
        self
    }

    pub fn shells(&self) -> Vec<ShellDescriptor> {
        self.lock().shells.clone()
    }

    pub fn shells_created(&self) -> usize {
        self.lock().shells_created
    }

    pub fn submodels_created(&self) -> usize {
        self.lock().submodels_created
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_shell(&self, shell_id: &str) -> Result<ShellDescriptor> {
        self.lock()
            .shells
            .iter()
            .find(|shell| shell.id == shell_id)
            .cloned()
            .ok_or_else(|| not_found(shell_id))
    }
}

fn not_found(shell_id: &str) -> ApiError {
    ApiError::Status {
        code: 404,
        url: format!("fake://registry/{}", shell_id),
        body: "shell not found".to_string(),
    }
}

#[async_trait]
impl TwinRegistry for FakeRegistry {
    async fn lookup_shells(&self, asset_ids: &[SpecificAssetId]) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .shells
            .iter()
            .filter(|shell| asset_ids.iter().all(|id| shell.specific_asset_ids.contains(id)))
            .map(|shell| shell.id.clone())
            .collect())
    }

    async fn create_shell(&self, shell: &ShellDescriptor) -> Result<ShellDescriptor> {
        if self.conflict_on_create {
            return Err(ApiError::Conflict {
                url: "fake://registry/shell-descriptors".to_string(),
                body: format!("shell {} already exists", shell.id),
            });
        }
        let mut state = self.lock();
        state.shells.push(shell.clone());
        state.shells_created += 1;
        Ok(shell.clone())
    }

    async fn list_submodels(&self, shell_id: &str) -> Result<Vec<SubmodelDescriptor>> {
        self.find_shell(shell_id).map(|shell| shell.submodel_descriptors)
    }

    async fn create_submodel(&self, shell_id: &str, submodel: &SubmodelDescriptor) -> Result<SubmodelDescriptor> {
        let mut state = self.lock();
        let shell = state
            .shells
            .iter_mut()
            .find(|shell| shell.id == shell_id)
            .ok_or_else(|| not_found(shell_id))?;
        shell.submodel_descriptors.push(submodel.clone());
        state.submodels_created += 1;
        Ok(submodel.clone())
    }
}
