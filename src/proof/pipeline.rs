//! Proof generation entry point

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::assets::ProofAssetLoader;
use super::backend::{CircuitProver, ProvingBackend};
use super::kind::{ProofKind, ProofTask};
use super::worker::ProofWorkerChannel;

/// Loads assets, solves the witness off-thread and produces proof bytes
pub struct ProofPipeline<B: ProvingBackend> {
    loader: ProofAssetLoader,
    backend: Arc<B>,
    workers: ProofWorkerChannel<B>,
}

impl<B: ProvingBackend> ProofPipeline<B> {
    pub fn new(loader: ProofAssetLoader, backend: Arc<B>) -> Self {
        let workers = ProofWorkerChannel::new(Arc::clone(&backend));
        Self {
            loader,
            backend,
            workers,
        }
    }

    pub fn loader(&self) -> &ProofAssetLoader {
        &self.loader
    }

    /// Workers started by this pipeline
    pub fn workers_spawned(&self) -> u64 {
        self.workers.spawned()
    }

    /// Generate a proof for an untyped `(kind, input)` pair
    ///
    /// Unknown kinds and payloads that do not fit the kind are rejected
    /// before any asset is fetched.
    pub async fn generate_named(&self, kind: &str, input: Value) -> Result<Vec<u8>> {
        let kind: ProofKind = kind.parse()?;
        let task = ProofTask::from_json(kind, input)?;
        self.generate(task).await
    }

    /// Generate a proof for one task
    pub async fn generate(&self, task: ProofTask) -> Result<Vec<u8>> {
        let kind = task.kind();
        let job = Uuid::new_v4();
        let started = Instant::now();
        debug!("Proof job {} started ({})", job, kind);

        let assets = self.loader.load(kind).await?;

        let representation = self
            .backend
            .parse_representation(&assets.representation)
            .map_err(|e| {
                Error::ProofExecution(format!("Invalid {} representation: {:#}", kind, e))
            })?;
        let prover = self
            .backend
            .setup_prover(&assets.circuit, kind.circuit_size())
            .map_err(|e| Error::ProofExecution(format!("Prover setup failed for {}: {:#}", kind, e)))?;
        drop(assets);

        let witness = self.workers.run(representation, task).await?;
        debug!("Proof job {} witness ready", job);

        let (proof, verified) = tokio::task::spawn_blocking(move || -> anyhow::Result<(Vec<u8>, bool)> {
            let proof = prover.create_proof(&witness)?;
            if proof.is_empty() {
                return Ok((proof, false));
            }
            let verified = prover.verify_proof(&proof)?;
            Ok((proof, verified))
        })
        .await
        .map_err(|e| Error::ProofExecution(format!("Prover task failed: {}", e)))?
        .map_err(|e| Error::ProofExecution(format!("{:#}", e)))?;

        if proof.is_empty() {
            return Err(Error::ProofExecution(format!(
                "Prover returned an empty {} proof",
                kind
            )));
        }
        if !verified {
            return Err(Error::ProofExecution(format!(
                "Generated {} proof failed verification",
                kind
            )));
        }
        debug!("Proof job {} verified", job);

        info!(
            "Proof job {} generated {} proof ({} bytes) in {}ms",
            job,
            kind,
            proof.len(),
            started.elapsed().as_millis()
        );
        Ok(proof)
    }
}
