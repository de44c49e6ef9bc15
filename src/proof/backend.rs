//! Proving backend seam
//!
//! The pipeline owns orchestration only. Parsing the intermediate
//! representation, solving the witness and producing proof bytes are
//! delegated to an implementation of [`ProvingBackend`].

use super::kind::ProofTask;

/// Prover and matching verifier bound to one circuit and circuit size
pub trait CircuitProver: Send + 'static {
    type Witness;

    fn create_proof(&self, witness: &Self::Witness) -> anyhow::Result<Vec<u8>>;

    /// Check a proof produced by [`CircuitProver::create_proof`]
    fn verify_proof(&self, proof: &[u8]) -> anyhow::Result<bool>;
}

/// External proof system
///
/// `solve_witness` runs on the worker thread; everything else runs on the
/// calling context.
pub trait ProvingBackend: Send + Sync + 'static {
    /// Parsed intermediate representation, moved into the worker
    type Representation: Send + 'static;
    /// Worker output handed back to the prover
    type Witness: Send + 'static;
    type Prover: CircuitProver<Witness = Self::Witness>;

    fn parse_representation(&self, bytes: &[u8]) -> anyhow::Result<Self::Representation>;

    fn setup_prover(&self, circuit: &[u8], circuit_size: u32) -> anyhow::Result<Self::Prover>;

    fn solve_witness(
        &self,
        representation: &Self::Representation,
        task: &ProofTask,
    ) -> anyhow::Result<Self::Witness>;
}
