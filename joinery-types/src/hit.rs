use serde::{Deserialize, Serialize};

use crate::coverage::ColumnGroup;

/// Matched catalog document, decoded into the shape it was indexed as.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitSource {
    /// Per-column record from the `columns` index.
    Column {
        dataset_id: String,
        name: String,
        index: usize,
    },
    /// Dataset-level spatial or temporal coverage record.
    Coverage {
        dataset_id: String,
        column_names: Vec<String>,
        column_indexes: Vec<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        temporal_resolution: Option<String>,
    },
}

impl HitSource {
    pub fn dataset_id(&self) -> &str {
        match self {
            HitSource::Column { dataset_id, .. } | HitSource::Coverage { dataset_id, .. } => dataset_id,
        }
    }

    pub fn right_columns(&self) -> Vec<usize> {
        match self {
            HitSource::Column { index, .. } => vec![*index],
            HitSource::Coverage { column_indexes, .. } => column_indexes.clone(),
        }
    }

    pub fn right_names(&self) -> Vec<String> {
        match self {
            HitSource::Column { name, .. } => vec![name.clone()],
            HitSource::Coverage { column_names, .. } => column_names.clone(),
        }
    }

    pub fn temporal_resolution(&self) -> Option<&str> {
        match self {
            HitSource::Column { .. } => None,
            HitSource::Coverage {
                temporal_resolution, ..
            } => temporal_resolution.as_deref(),
        }
    }
}

/// One scored document returned by a modality query, tied back to the input group
/// that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub score: f64,
    pub source: HitSource,
    pub companion: ColumnGroup,
    pub companion_resolution: Option<String>,
}

/// Candidate column returned by the sketch service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SketchMatch {
    pub dataset_id: String,
    pub column_name: String,
    pub score: f64,
}

impl SketchMatch {
    pub fn new(dataset_id: impl Into<String>, column_name: impl Into<String>, score: f64) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            column_name: column_name.into(),
            score,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    #[serde(rename = "type")]
    pub join_type: String,
    pub left_columns: Vec<Vec<usize>>,
    pub right_columns: Vec<Vec<usize>>,
    pub left_columns_names: Vec<Vec<String>>,
    pub right_columns_names: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_resolution: Option<String>,
}

/// A suggested join between the input dataset and one catalog dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AugmentationProposal {
    pub id: String,
    pub score: f64,
    pub metadata: serde_json::Value,
    pub augmentation: JoinSpec,
}
