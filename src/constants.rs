//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.
//!
//! # Relation Invariants
//!
//! The relation codes are a closed partition shared by [`crate::graph`] and the
//! convolution layers in [`crate::model`]. Adding a relation means resizing every
//! layer's per-relation parameter set, so [`NUM_RELATIONS`] is the single source
//! of truth and checkpoints saved with a different count fail strict loading.

/// Default width of node embeddings.
pub const DEFAULT_EMBEDDING_DIM: usize = 128;

/// Number of relation codes (liquor-ingredient, same-type, ingredient-compound).
pub const NUM_RELATIONS: usize = 3;

/// Default number of stacked convolution layers in the encoder.
pub const DEFAULT_NUM_LAYERS: usize = 3;

/// Dropout rate used by the encoder and the deep scorer branch.
pub const DEFAULT_DROPOUT_RATE: f32 = 0.2;

/// Widths of the deep scorer branch after the concatenated `2 * d` input.
pub const DEFAULT_HIDDEN_LAYER_WIDTHS: [usize; 3] = [128, 64, 32];

pub const DEFAULT_LAYER_NORM_EPS: f64 = 1e-5;

/// Edge weight stored when the source measurement is missing.
pub const DEFAULT_MISSING_EDGE_WEIGHT: f32 = 0.1;

pub const DEFAULT_RECOMMEND_LIMIT: usize = 10;

/// Validates that a runtime node count matches the size of an embedding table.
///
/// Use this at start-up, where a mismatch between the graph and a restored
/// checkpoint is fatal rather than recoverable per request.
///
/// # Example
///
/// ```
/// use pairing::constants::validate_node_count;
///
/// validate_node_count(8298, 8298).unwrap();
/// assert!(validate_node_count(8298, 8000).is_err());
/// ```
pub fn validate_node_count(graph_nodes: usize, table_rows: usize) -> Result<(), DimValidationError> {
    if graph_nodes != table_rows {
        return Err(DimValidationError::NodeCountMismatch {
            graph_nodes,
            table_rows,
        });
    }
    Ok(())
}

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimValidationError {
    /// Graph and embedding table disagree on the number of nodes.
    NodeCountMismatch {
        graph_nodes: usize,
        table_rows: usize,
    },
}

impl std::fmt::Display for DimValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeCountMismatch {
                graph_nodes,
                table_rows,
            } => {
                write!(
                    f,
                    "embedding table has {} rows but graph has {} nodes",
                    table_rows, graph_nodes
                )
            }
        }
    }
}

impl std::error::Error for DimValidationError {}
