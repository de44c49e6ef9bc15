//! Proof kinds and their task payloads

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Asset file names for one circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetFiles {
    /// Serialized circuit used to set up the prover
    pub circuit: &'static str,
    /// Intermediate representation the worker solves the witness against
    pub representation: &'static str,
}

/// Circuit categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofKind {
    /// Commitment to a board layout
    Board,
    /// Hit/miss answer to a shot against a committed board
    Shot,
}

impl ProofKind {
    pub const ALL: [ProofKind; 2] = [ProofKind::Board, ProofKind::Shot];

    /// Circuit size the prover must be set up with
    pub fn circuit_size(self) -> u32 {
        match self {
            ProofKind::Board => 8192,
            ProofKind::Shot => 4096,
        }
    }

    pub fn assets(self) -> AssetFiles {
        match self {
            ProofKind::Board => AssetFiles {
                circuit: "boardCircuit.buf",
                representation: "boardAcir.buf",
            },
            ProofKind::Shot => AssetFiles {
                circuit: "shotCircuit.buf",
                representation: "shotAcir.buf",
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProofKind::Board => "board",
            ProofKind::Shot => "shot",
        }
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "board" => Ok(ProofKind::Board),
            "shot" => Ok(ProofKind::Shot),
            other => Err(Error::UnsupportedProofKind(other.to_string())),
        }
    }
}

/// Board commitment input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInput {
    /// Hash of the ship placement
    pub hash: String,
    /// Flattened (x, y, z) triples for every ship
    pub ships: Vec<u32>,
}

/// Shot answer input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotInput {
    pub hash: String,
    #[serde(deserialize_with = "hit_flag")]
    pub hit: bool,
    pub ships: Vec<u32>,
    /// (x, y) coordinate fired at
    pub shot: (u32, u32),
}

/// Accept both `true`/`false` and the circuit's `1`/`0`
fn hit_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(n) => Err(serde::de::Error::custom(format!(
            "hit must be 0 or 1, got {}",
            n
        ))),
    }
}

/// One unit of proving work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "input", rename_all = "lowercase")]
pub enum ProofTask {
    Board(BoardInput),
    Shot(ShotInput),
}

impl ProofTask {
    pub fn kind(&self) -> ProofKind {
        match self {
            ProofTask::Board(_) => ProofKind::Board,
            ProofTask::Shot(_) => ProofKind::Shot,
        }
    }

    /// Build a task from a kind and an untyped payload
    pub fn from_json(kind: ProofKind, input: Value) -> Result<Self> {
        let task = match kind {
            ProofKind::Board => ProofTask::Board(serde_json::from_value(input)?),
            ProofKind::Shot => ProofTask::Shot(serde_json::from_value(input)?),
        };
        Ok(task)
    }

    /// Named circuit inputs in the shape the backend consumes
    pub fn abi(&self) -> Value {
        match self {
            ProofTask::Board(input) => json!({
                "hash": input.hash,
                "ships": input.ships,
            }),
            ProofTask::Shot(input) => json!({
                "hash": input.hash,
                "hit": u8::from(input.hit),
                "ships": input.ships,
                "shot": [input.shot.0, input.shot.1],
            }),
        }
    }
}
