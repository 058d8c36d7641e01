//! Progress pipeline services: minting, score tracking, certification.

pub mod certifier;
pub mod minter;
pub mod tracker;

pub use certifier::{CertificationEvaluator, CertifyOutcome};
pub use minter::{MintOutcome, MintStatus, TokenMinter, MAX_BATCH};
pub use tracker::{ModuleUpdateOutcome, ModuleUpdateStatus, ProgressTracker};
