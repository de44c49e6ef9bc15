//! In-memory fetcher and backend doubles for proof tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};

use super::assets::AssetFetcher;
use super::backend::{CircuitProver, ProvingBackend};
use super::kind::{BoardInput, ProofKind, ProofTask, ShotInput};

pub(crate) fn board_task() -> ProofTask {
    ProofTask::Board(BoardInput {
        hash: "0x1c8d".to_string(),
        ships: vec![0, 0, 0, 0, 1, 0, 0, 2, 0, 0, 3, 0, 0, 4, 0],
    })
}

pub(crate) fn shot_task() -> ProofTask {
    ProofTask::Shot(ShotInput {
        hash: "0x1c8d".to_string(),
        hit: true,
        ships: vec![0, 0, 0, 0, 1, 0, 0, 2, 0, 0, 3, 0, 0, 4, 0],
        shot: (0, 0),
    })
}

/// Asset store keyed by file name; absent files fail like a 404
pub(crate) struct MemoryFetcher {
    assets: HashMap<String, Vec<u8>>,
    fetched: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn with_all_assets() -> Self {
        let mut assets = HashMap::new();
        for kind in ProofKind::ALL {
            let files = kind.assets();
            assets.insert(
                files.circuit.to_string(),
                format!("circuit:{}", files.circuit).into_bytes(),
            );
            assets.insert(
                files.representation.to_string(),
                format!("repr:{}", files.representation).into_bytes(),
            );
        }
        Self {
            assets,
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn without(mut self, locator: &str) -> Self {
        self.assets.remove(locator);
        self
    }

    pub fn with_asset(mut self, locator: &str, bytes: Vec<u8>) -> Self {
        self.assets.insert(locator.to_string(), bytes);
        self
    }

    /// Locators requested so far, in request order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for MemoryFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(locator.to_string());
        self.assets
            .get(locator)
            .cloned()
            .ok_or_else(|| Error::AssetFetch {
                locator: locator.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum WitnessBehavior {
    Solve,
    Fail(&'static str),
    FailFirst(&'static str),
    Panic,
}

/// Backend whose witness is the task ABI tagged with the representation
pub(crate) struct MockBackend {
    behavior: WitnessBehavior,
    rejects_proofs: bool,
    solves: AtomicUsize,
    worker_threads: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            behavior: WitnessBehavior::Solve,
            rejects_proofs: false,
            solves: AtomicUsize::new(0),
            worker_threads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_witness(mut self, behavior: WitnessBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Verifier refuses every proof it is shown
    pub fn rejecting_proofs(mut self) -> Self {
        self.rejects_proofs = true;
        self
    }

    pub fn solves(&self) -> usize {
        self.solves.load(Ordering::SeqCst)
    }

    /// Names of the threads `solve_witness` ran on
    pub fn worker_threads(&self) -> Vec<String> {
        self.worker_threads.lock().unwrap().clone()
    }
}

pub(crate) struct MockProver {
    circuit_size: u32,
    rejects_proofs: bool,
}

impl CircuitProver for MockProver {
    type Witness = Vec<u8>;

    fn create_proof(&self, witness: &Vec<u8>) -> anyhow::Result<Vec<u8>> {
        let mut proof = self.circuit_size.to_be_bytes().to_vec();
        proof.extend_from_slice(witness);
        Ok(proof)
    }

    fn verify_proof(&self, proof: &[u8]) -> anyhow::Result<bool> {
        Ok(!self.rejects_proofs && proof.starts_with(&self.circuit_size.to_be_bytes()))
    }
}

impl ProvingBackend for MockBackend {
    type Representation = String;
    type Witness = Vec<u8>;
    type Prover = MockProver;

    fn parse_representation(&self, bytes: &[u8]) -> anyhow::Result<String> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    fn setup_prover(&self, circuit: &[u8], circuit_size: u32) -> anyhow::Result<MockProver> {
        if circuit.is_empty() {
            anyhow::bail!("empty circuit");
        }
        Ok(MockProver {
            circuit_size,
            rejects_proofs: self.rejects_proofs,
        })
    }

    fn solve_witness(&self, representation: &String, task: &ProofTask) -> anyhow::Result<Vec<u8>> {
        let call = self.solves.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = std::thread::current().name() {
            self.worker_threads.lock().unwrap().push(name.to_string());
        }

        match self.behavior {
            WitnessBehavior::Solve => {}
            WitnessBehavior::Fail(message) => anyhow::bail!("{}", message),
            WitnessBehavior::FailFirst(message) if call == 0 => anyhow::bail!("{}", message),
            WitnessBehavior::FailFirst(_) => {}
            WitnessBehavior::Panic => panic!("witness solver crashed"),
        }

        Ok(serde_json::to_vec(&json!({
            "representation": representation,
            "abi": task.abi(),
        }))?)
    }
}
