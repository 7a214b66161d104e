// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Flow Checkpoints
//!
//! A [`Checkpoint`] is an immutable snapshot of a flow taken at a phase
//! boundary. Core attributes (status, phase, progress) are stored as typed
//! columns; each payload field on the allow-list is encoded independently so
//! one bad field never sinks the whole snapshot:
//!
//! | Encoding | Used for | Restore |
//! |----------|----------|---------|
//! | `primitive` | JSON scalars (null, bool, number, string) | pass-through |
//! | `json` | structured values, as JSON text | parsed back into the field type |
//! | `text` | fallback when structured serialization fails | only into string-like fields |
//!
//! Restoration is typed: every payload field comes back as a [`FieldState`],
//! `Unavailable` when it could not be decoded, `Missing` when it was never
//! captured. There is no opaque binary encoding.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

use crate::domain::flow::{Flow, FlowId, FlowPayload, FlowStatus, PayloadField};

/// Version written into every checkpoint; restore rejects anything else.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

pub type CheckpointMetadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub Uuid);

impl CheckpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CheckpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "snake_case")]
pub enum EncodedField {
    Primitive(serde_json::Value),
    Json(String),
    Text(String),
}

impl EncodedField {
    pub fn encoded_len(&self) -> usize {
        match self {
            EncodedField::Primitive(v) => v.to_string().len(),
            EncodedField::Json(s) | EncodedField::Text(s) => s.len(),
        }
    }
}

/// Outcome of restoring one payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState<T> {
    Restored(T),
    /// Captured, but could not be decoded into the field type.
    Unavailable,
    /// Not present in the checkpoint (dropped at capture time).
    Missing,
}

impl<T> FieldState<T> {
    pub fn is_restored(&self) -> bool {
        matches!(self, FieldState::Restored(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, FieldState::Unavailable)
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            FieldState::Restored(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint not found: {0}")]
    NotFound(CheckpointId),

    #[error("Phase '{0}' is not eligible for checkpointing")]
    PhaseNotCheckpointable(String),

    #[error("Unsupported checkpoint format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("Repository error: {0}")]
    Repository(#[from] crate::domain::repository::RepositoryError),
}

/// Why a field was left out of a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDropReason {
    TooLarge { size: usize, limit: usize },
}

/// Encodes one value: scalars pass through, structured values become JSON
/// text, and anything serde refuses falls back to its `Debug` rendering.
pub fn encode_field<T>(value: &T) -> EncodedField
where
    T: Serialize + std::fmt::Debug,
{
    match serde_json::to_value(value) {
        Ok(v) if !v.is_array() && !v.is_object() => EncodedField::Primitive(v),
        Ok(v) => match serde_json::to_string(&v) {
            Ok(text) => EncodedField::Json(text),
            Err(e) => {
                warn!(error = %e, "Structured encoding failed, falling back to text");
                EncodedField::Text(format!("{:?}", value))
            }
        },
        Err(e) => {
            warn!(error = %e, "Structured encoding failed, falling back to text");
            EncodedField::Text(format!("{:?}", value))
        }
    }
}

/// Encodes a value and enforces the per-field size limit.
pub fn encode_field_limited<T>(value: &T, max_bytes: usize) -> Result<EncodedField, FieldDropReason>
where
    T: Serialize + std::fmt::Debug,
{
    let encoded = encode_field(value);
    let size = encoded.encoded_len();
    if size > max_bytes {
        return Err(FieldDropReason::TooLarge { size, limit: max_bytes });
    }
    Ok(encoded)
}

/// Decodes one field into its typed form.
pub fn decode_field<T: DeserializeOwned>(encoded: &EncodedField) -> FieldState<T> {
    let decoded = match encoded {
        EncodedField::Primitive(v) => serde_json::from_value(v.clone()),
        EncodedField::Json(text) => serde_json::from_str(text),
        EncodedField::Text(text) => serde_json::from_value(serde_json::Value::String(text.clone())),
    };
    match decoded {
        Ok(v) => FieldState::Restored(v),
        Err(_) => FieldState::Unavailable,
    }
}

/// Immutable snapshot of a flow at a phase boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub flow_id: FlowId,
    /// Phase this checkpoint was taken for.
    pub phase: String,
    pub format_version: u32,
    pub status: FlowStatus,
    pub current_phase: String,
    pub progress_percentage: f64,
    pub fields: BTreeMap<PayloadField, EncodedField>,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Captures `flow`. Returns the checkpoint and the fields that were dropped.
    pub fn capture(
        flow: &Flow,
        phase: &str,
        metadata: CheckpointMetadata,
        max_field_bytes: usize,
    ) -> (Self, Vec<(PayloadField, FieldDropReason)>) {
        let mut fields = BTreeMap::new();
        let mut dropped = Vec::new();

        let payload = &flow.payload;
        let limit = max_field_bytes;
        for field in PayloadField::ALL {
            let encoded = match field {
                PayloadField::RawData => encode_field_limited(&payload.raw_data, limit),
                PayloadField::FieldMappings => encode_field_limited(&payload.field_mappings, limit),
                PayloadField::CleanedData => encode_field_limited(&payload.cleaned_data, limit),
                PayloadField::AssetInventory => {
                    encode_field_limited(&payload.asset_inventory, limit)
                }
                PayloadField::Dependencies => encode_field_limited(&payload.dependencies, limit),
                PayloadField::TechDebtAnalysis => {
                    encode_field_limited(&payload.tech_debt_analysis, limit)
                }
            };
            match encoded {
                Ok(value) => {
                    fields.insert(field, value);
                }
                Err(reason) => {
                    warn!(
                        flow_id = %flow.id,
                        field = %field,
                        reason = ?reason,
                        "Dropping payload field from checkpoint"
                    );
                    dropped.push((field, reason));
                }
            }
        }

        let checkpoint = Self {
            id: CheckpointId::new(),
            flow_id: flow.id,
            phase: phase.to_string(),
            format_version: CHECKPOINT_FORMAT_VERSION,
            status: flow.status,
            current_phase: flow.current_phase.clone(),
            progress_percentage: flow.progress_percentage,
            fields,
            metadata,
            created_at: Utc::now(),
        };
        (checkpoint, dropped)
    }

    /// Reverses [`Checkpoint::capture`], field by field.
    pub fn restore(&self) -> Result<RestoredCheckpoint, CheckpointError> {
        if self.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedFormat {
                found: self.format_version,
                expected: CHECKPOINT_FORMAT_VERSION,
            });
        }

        let payload = RestoredPayload {
            raw_data: self.decode(PayloadField::RawData),
            field_mappings: self.decode(PayloadField::FieldMappings),
            cleaned_data: self.decode(PayloadField::CleanedData),
            asset_inventory: self.decode(PayloadField::AssetInventory),
            dependencies: self.decode(PayloadField::Dependencies),
            tech_debt_analysis: self.decode(PayloadField::TechDebtAnalysis),
        };

        for field in payload.unavailable_fields() {
            warn!(
                checkpoint_id = %self.id,
                field = %field,
                "Checkpoint field could not be restored"
            );
        }

        Ok(RestoredCheckpoint {
            checkpoint_id: self.id,
            flow_id: self.flow_id,
            phase: self.phase.clone(),
            state: RestoredFlowState {
                flow_id: self.flow_id,
                status: self.status,
                current_phase: self.current_phase.clone(),
                progress_percentage: self.progress_percentage,
                payload,
            },
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        })
    }

    fn decode<T: DeserializeOwned>(&self, field: PayloadField) -> FieldState<T> {
        match self.fields.get(&field) {
            Some(encoded) => decode_field(encoded),
            None => FieldState::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoredPayload {
    pub raw_data: FieldState<Vec<serde_json::Value>>,
    pub field_mappings: FieldState<BTreeMap<String, String>>,
    pub cleaned_data: FieldState<Vec<serde_json::Value>>,
    pub asset_inventory: FieldState<Vec<serde_json::Value>>,
    pub dependencies: FieldState<Option<serde_json::Value>>,
    pub tech_debt_analysis: FieldState<Option<serde_json::Value>>,
}

impl RestoredPayload {
    pub fn unavailable_fields(&self) -> Vec<PayloadField> {
        let states = [
            (PayloadField::RawData, self.raw_data.is_unavailable()),
            (PayloadField::FieldMappings, self.field_mappings.is_unavailable()),
            (PayloadField::CleanedData, self.cleaned_data.is_unavailable()),
            (PayloadField::AssetInventory, self.asset_inventory.is_unavailable()),
            (PayloadField::Dependencies, self.dependencies.is_unavailable()),
            (PayloadField::TechDebtAnalysis, self.tech_debt_analysis.is_unavailable()),
        ];
        states.into_iter().filter(|(_, bad)| *bad).map(|(f, _)| f).collect()
    }

    /// Writes every restored field into `payload`; unavailable and missing
    /// fields keep their current value.
    pub fn apply_to(&self, payload: &mut FlowPayload) {
        fn put<T: Clone>(state: &FieldState<T>, slot: &mut T) {
            if let FieldState::Restored(v) = state {
                *slot = v.clone();
            }
        }
        put(&self.raw_data, &mut payload.raw_data);
        put(&self.field_mappings, &mut payload.field_mappings);
        put(&self.cleaned_data, &mut payload.cleaned_data);
        put(&self.asset_inventory, &mut payload.asset_inventory);
        put(&self.dependencies, &mut payload.dependencies);
        put(&self.tech_debt_analysis, &mut payload.tech_debt_analysis);
    }
}

/// Flow state rebuilt from a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredFlowState {
    pub flow_id: FlowId,
    pub status: FlowStatus,
    pub current_phase: String,
    pub progress_percentage: f64,
    pub payload: RestoredPayload,
}

impl RestoredFlowState {
    /// Rewinds `flow` to this state. Status is left to the caller.
    pub fn apply_to(&self, flow: &mut Flow) {
        if flow.current_phase != self.current_phase {
            flow.enter_phase(&self.current_phase);
        }
        flow.progress_percentage = self.progress_percentage;
        self.payload.apply_to(&mut flow.payload);
        flow.touch();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoredCheckpoint {
    pub checkpoint_id: CheckpointId,
    pub flow_id: FlowId,
    pub phase: String,
    pub state: RestoredFlowState,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
}
