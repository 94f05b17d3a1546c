//! Idempotent find-or-create of twin shells and their submodels.
//!
//! Shells are always resolved again by business identifiers; nothing read
//! from the registry is kept between calls.
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use dsx_client::TwinRegistry;
use dsx_model::twin::{Endpoint, SemanticId, SUBMODEL_PATH_SUFFIX};
use dsx_model::{
    new_urn_uuid, BatchResult, BusinessIdentifiers, ItemResult, ShellDescriptor, SpecificAssetId,
    SubmodelDescriptor,
};
use dsx_utils_futures::ParallelBatchRunner;

use crate::config::TwinConfig;
use crate::error::ReconcileError;

/// One input row describing a produced part.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwinRow {
    pub row_number: usize,
    /// Stable content id, used as the shell's global asset id.
    #[serde(default)]
    pub uuid: Option<String>,
    pub name_at_manufacturer: String,
    pub part_instance_id: String,
    pub manufacturer_part_id: String,
    /// Falls back to the configured manufacturer.
    #[serde(default)]
    pub manufacturer_id: Option<String>,
    #[serde(default)]
    pub optional_identifier: Option<SpecificAssetId>,
}

impl TwinRow {
    pub fn identifiers(&self, default_manufacturer_id: &str) -> BusinessIdentifiers {
        BusinessIdentifiers {
            part_instance_id: self.part_instance_id.clone(),
            manufacturer_part_id: self.manufacturer_part_id.clone(),
            manufacturer_id: self
                .manufacturer_id
                .clone()
                .unwrap_or_else(|| default_manufacturer_id.to_string()),
            optional_identifier: self.optional_identifier.clone(),
        }
    }
}

/// Submodel every reconciled shell must carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmodelSpec {
    pub id_short: String,
    pub semantic_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled {
    pub shell_id: String,
    pub submodel_id: String,
    pub shell_created: bool,
    /// `false` means the submodel already existed and the row is an update.
    pub was_created: bool,
}

#[derive(Clone)]
pub struct TwinReconciler {
    registry: Arc<dyn TwinRegistry>,
    manufacturer_id: String,
    edc_endpoint_base: String,
    runner: ParallelBatchRunner,
}

impl TwinReconciler {
    pub fn new(registry: Arc<dyn TwinRegistry>, config: &TwinConfig) -> TwinReconciler {
        TwinReconciler {
            registry,
            manufacturer_id: config.manufacturer_id.clone(),
            edc_endpoint_base: config.edc_endpoint_base.clone(),
            runner: ParallelBatchRunner::new(config.batch_concurrency),
        }
    }

    pub async fn reconcile(&self, row: &TwinRow, submodel: &SubmodelSpec) -> Result<Reconciled, ReconcileError> {
        let identifiers = row.identifiers(&self.manufacturer_id);
        let asset_ids = identifiers.specific_asset_ids();

        let shell_ids = self.registry.lookup_shells(&asset_ids).await?;
        if shell_ids.len() > 1 {
            return Err(ReconcileError::MultipleShells {
                identifiers: describe(&identifiers),
                shell_ids,
            });
        }
        let (shell_id, shell_created) = match shell_ids.into_iter().next() {
            Some(shell_id) => {
                log::debug!("Shell [{}] found for row {}.", shell_id, row.row_number);
                (shell_id, false)
            }
            None => (self.create_shell(row, &identifiers, asset_ids).await?, true),
        };

        let existing = self
            .registry
            .list_submodels(&shell_id)
            .await?
            .into_iter()
            .find(|descriptor| descriptor.id_short == submodel.id_short);
        if let Some(existing) = existing {
            log::debug!(
                "Submodel {} [{}] of shell [{}] exists, row {} is an update.",
                submodel.id_short,
                existing.id,
                shell_id,
                row.row_number
            );
            return Ok(Reconciled {
                shell_id,
                submodel_id: existing.id,
                shell_created,
                was_created: false,
            });
        }

        let submodel_id = self
            .create_submodel(&shell_id, &identifiers.manufacturer_id, submodel)
            .await?;
        Ok(Reconciled {
            shell_id,
            submodel_id,
            shell_created,
            was_created: true,
        })
    }

    /// Reconciles rows concurrently; results are keyed by row number.
    pub async fn reconcile_batch(&self, rows: Vec<TwinRow>, submodel: SubmodelSpec) -> BatchResult {
        let reconciler = self.clone();
        let submodel = Arc::new(submodel);
        let results = self
            .runner
            .run(
                rows,
                |row: &TwinRow| row.row_number.to_string(),
                move |row| {
                    let reconciler = reconciler.clone();
                    let submodel = submodel.clone();
                    async move {
                        match reconciler.reconcile(&row, &submodel).await {
                            Ok(reconciled) => match serde_json::to_value(&reconciled) {
                                Ok(data) => ItemResult::success().with_data(data),
                                Err(e) => ItemResult::failed(e.to_string()),
                            },
                            Err(e) => {
                                log::warn!("Row {} failed: {}", row.row_number, e);
                                ItemResult::failed(format!("{}: DigitalTwins: {}", row.row_number, e))
                            }
                        }
                    }
                },
            )
            .await;

        results
            .into_iter()
            .map(|(row, result)| (row, result.unwrap_or_else(|e| ItemResult::failed(e.to_string()))))
            .collect()
    }

    async fn create_shell(
        &self,
        row: &TwinRow,
        identifiers: &BusinessIdentifiers,
        asset_ids: Vec<SpecificAssetId>,
    ) -> Result<String, ReconcileError> {
        let shell = ShellDescriptor {
            id: new_urn_uuid(),
            id_short: Some(format!(
                "{}_{}_{}",
                row.name_at_manufacturer, identifiers.manufacturer_id, identifiers.manufacturer_part_id
            )),
            global_asset_id: Some(row.uuid.clone().unwrap_or_else(new_urn_uuid)),
            specific_asset_ids: asset_ids,
            submodel_descriptors: vec![],
        };
        let created = self.registry.create_shell(&shell).await?;
        log::info!(
            "Shell [{}] created for {}.",
            created.id,
            describe(identifiers)
        );
        Ok(created.id)
    }

    async fn create_submodel(
        &self,
        shell_id: &str,
        manufacturer_id: &str,
        submodel: &SubmodelSpec,
    ) -> Result<String, ReconcileError> {
        let submodel_id = new_urn_uuid();
        let address = format!(
            "{}{}/{}-{}{}",
            self.edc_endpoint_base, manufacturer_id, shell_id, submodel_id, SUBMODEL_PATH_SUFFIX
        );
        let descriptor = SubmodelDescriptor {
            id: submodel_id,
            id_short: submodel.id_short.clone(),
            semantic_id: SemanticId::global(submodel.semantic_id.as_str()),
            endpoints: vec![Endpoint::http(address)],
        };
        let created = self.registry.create_submodel(shell_id, &descriptor).await?;
        log::info!(
            "Submodel {} [{}] created in shell [{}].",
            created.id_short,
            created.id,
            shell_id
        );
        Ok(created.id)
    }
}

fn describe(identifiers: &BusinessIdentifiers) -> String {
    identifiers
        .specific_asset_ids()
        .iter()
        .map(|id| format!("{}={}", id.name, id.value))
        .collect::<Vec<_>>()
        .join(",")
}
