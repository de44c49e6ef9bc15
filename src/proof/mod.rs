//! Proof module - asset loading and off-thread proof generation
//!
//! ```text
//! ProofPipeline::generate(task)
//!     ├─ ProofAssetLoader::load(kind)      circuit + representation, fetched together
//!     ├─ ProvingBackend::setup_prover       bound to the kind's circuit size
//!     ├─ ProofWorkerChannel::run            fresh thread, first_of(result, error)
//!     ├─ CircuitProver::create_proof        witness -> proof bytes
//!     └─ CircuitProver::verify_proof        rejected proofs never leave the pipeline
//! ```

pub mod assets;
pub mod backend;
pub mod kind;
pub mod pipeline;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use assets::{fetcher_from_config, AssetFetcher, FsAssetFetcher, HttpAssetFetcher, ProofAssetLoader, ProofAssets};
pub use backend::{CircuitProver, ProvingBackend};
pub use kind::{AssetFiles, BoardInput, ProofKind, ProofTask, ShotInput};
pub use pipeline::ProofPipeline;
pub use worker::{first_of, ProofWorkerChannel, Settled, WorkerHandle, WorkerRequest};
