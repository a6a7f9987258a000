//! Crate root: public surface, signature types, and protocol-wide invariants
//!
//! This crate implements the core of the Picnic3 post-quantum signature
//! scheme: a non-interactive zero-knowledge proof of knowledge of a LowMC
//! key, built from an N-party MPC simulation with pre-processing, seed
//! trees, a cut-and-choose challenge and a Merkle commitment over view
//! hashes.
//!
//! ## Invariants
//!
//! - **Determinism.** Signing is deterministic in the key and message, and
//!   the byte output is identical across runs; every hash binds the salt and
//!   the relevant repetition/party/node indices in a fixed order, with
//!   little-endian `u16` integers.
//! - **Opened/unopened asymmetry.** Which repetitions are opened, and which
//!   party stays hidden inside each, is decided only by the (public)
//!   expanded challenge. All other branching avoids secret data: seeds,
//!   tapes, aux bits, key shares and masked keys flow through branch-free
//!   bit operations, and digest comparisons are constant-time.
//! - **Explicit parameters.** There is no global state. A [`ParamBundle`] is
//!   handed to every operation; the L1/L3/L5 bundles mirror the published
//!   Picnic3 instance sizes.
//! - **Opaque rejection.** Verification reports a single rejected state at
//!   the public boundary; the discriminating cause is available to `debug`
//!   logging only.
//!
//! ## Module map
//!
//! Parameters ([`params`]) and hashing ([`hashing`]) underpin everything.
//! Trees ([`tree`]) provide seed derivation and the Merkle commitment.
//! Tapes ([`tape`]), LowMC ([`lowmc`]) and commitments ([`commit`]) make up
//! one repetition's worth of work; the transcript ([`transcript`]) turns T
//! repetitions into a challenge; the scheme ([`scheme`]) orchestrates the
//! signer and verifier; serialization ([`serialize`]) pins the wire format.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Instance constants and their validation.
pub mod params;

/// SHAKE-backed XOF with the 4-way batched variant.
pub mod hashing;

/// Seed trees and Merkle trees over a flat node arena.
pub mod tree;

/// Per-repetition random tapes and bit-cursor plumbing.
pub mod tape;

/// LowMC: plain evaluation, aux pre-processing, online MPC simulation.
pub mod lowmc;

/// Per-party, per-repetition and view commitments.
pub mod commit;

/// Fiat–Shamir transcript and challenge expansion.
pub mod transcript;

/// Key generation and key material.
pub mod keys;

/// Signer and verifier orchestration.
pub mod scheme;

/// Bit-exact signature serialization.
pub mod serialize;

pub use keys::{keygen, SigningKey, VerifyingKey};
pub use params::{ParamBundle, XofKind, SALT_SIZE};
pub use scheme::{SignError, Signer, Verifier, VerifyError};
pub use serialize::{deserialize, serialize, SerializeError};

// ============================================================================
// Signature object
// ============================================================================

/// The opened material for one challenged repetition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundProof {
    /// Seed-tree reveal covering every party except the unopened one.
    pub seed_info: Vec<u8>,
    /// Auxiliary correction of the last party's tape; present exactly when
    /// the unopened party is not the last one.
    pub aux: Option<Vec<u8>>,
    /// The masked key fed to the online simulation.
    pub input: Vec<u8>,
    /// The unopened party's broadcast log.
    pub msgs: Vec<u8>,
    /// The unopened party's seed commitment.
    pub commitment: Vec<u8>,
    /// Index of the party left unopened.
    pub unopened: u16,
}

/// A fully assembled signature.
///
/// `challenge_c` and `challenge_p` are redundant with `challenge`: the
/// verifier re-derives them from the digest and never trusts them off the
/// wire. Carrying them makes the opened/unopened split explicit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Fiat–Shamir challenge digest.
    pub challenge: Vec<u8>,
    /// Per-signature salt.
    pub salt: [u8; SALT_SIZE],
    /// Root seed-tree reveal for the unopened repetitions.
    pub iseed_info: Vec<u8>,
    /// Merkle opening covering the view commitments of unopened repetitions.
    pub cv_info: Vec<u8>,
    /// Challenged (opened) repetition indices, in expansion order.
    pub challenge_c: Vec<u16>,
    /// Unopened party index per challenged repetition, matching
    /// `challenge_c` positionally.
    pub challenge_p: Vec<u16>,
    /// One entry per repetition; `Some` exactly for challenged ones.
    pub proofs: Vec<Option<RoundProof>>,
}
