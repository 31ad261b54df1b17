use serde::{Deserialize, Serialize};

use crate::constants::NUM_RELATIONS;

/// External, stable node identifier.
pub type NodeId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Kind of entity a node represents.
pub enum NodeType {
    Liquor,
    Ingredient,
    Compound,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Liquor => "liquor",
            NodeType::Ingredient => "ingredient",
            NodeType::Compound => "compound",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "liquor" => Ok(Self::Liquor),
            "ingredient" => Ok(Self::Ingredient),
            "compound" => Ok(Self::Compound),
            _ => Err(format!("Unknown node type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Relation code carried by every edge.
pub enum Relation {
    /// Cross-type pair (liquor with ingredient).
    LiquorIngredient,
    /// Same-type pair (liquor-liquor or ingredient-ingredient).
    SameType,
    /// Ingredient (or liquor) linked to a flavor or odor compound.
    Compound,
}

impl Relation {
    pub const ALL: [Relation; NUM_RELATIONS] = [
        Relation::LiquorIngredient,
        Relation::SameType,
        Relation::Compound,
    ];

    pub fn code(self) -> usize {
        match self {
            Relation::LiquorIngredient => 0,
            Relation::SameType => 1,
            Relation::Compound => 2,
        }
    }

    pub fn from_code(code: usize) -> Option<Self> {
        Self::ALL.get(code).copied()
    }

    /// Maps a raw edge-table row onto a relation code.
    ///
    /// Compound-linking families (`ingr-fcomp`, `ingr-dcomp`) and any edge touching a
    /// compound node collapse into [`Relation::Compound`]. Everything else is decided by
    /// the endpoint types, so an `ingr-ingr` row joining a liquor and an ingredient
    /// becomes [`Relation::LiquorIngredient`].
    pub fn classify(edge_type: &str, src: NodeType, tgt: NodeType) -> Self {
        let family = edge_type.trim().to_lowercase();
        if family.ends_with("comp") || src == NodeType::Compound || tgt == NodeType::Compound {
            Relation::Compound
        } else if src != tgt {
            Relation::LiquorIngredient
        } else {
            Relation::SameType
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub name: String,
    /// Dense index, fixed at graph-construction time.
    pub idx: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub src: usize,
    pub tgt: usize,
    pub relation: Relation,
    pub weight: f32,
}
