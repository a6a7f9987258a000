//! Parameter bundles for the Picnic3 instances
//!
//! A [`ParamBundle`] is the single source of truth for every size and count
//! the protocol touches: MPC geometry (`N` parties, `T` repetitions, `τ`
//! opened repetitions), LowMC dimensions (`n` bits, `r` rounds, `m` S-boxes),
//! and the derived byte sizes (seeds, digests, tapes, views). It is
//! constructed once and passed explicitly to every operation; there is no
//! global instance state anywhere in the crate.
//!
//! ## Invariants
//!
//! - `N` is a multiple of 4 (the tape and commitment hashing run in 4-way
//!   batches with no tail case) and at least 16 (party challenge chunks are
//!   4 bits wide).
//! - `τ < T`, and `T` is large enough that repetition challenge chunks are
//!   at least 4 bits wide.
//! - `3·m = n`: the S-box layer covers the full LowMC state.
//! - `view_size = ceil((n + 3·r·m) / 8)`. This one value sizes the message
//!   log (`3·r·m` AND broadcasts plus `n` output-mask broadcasts per party),
//!   bounds the auxiliary correction (`3·r·m` bits), and makes the
//!   `2·view_size`-byte random tape long enough for the `n + 2·3·r·m` bits a
//!   repetition consumes.
//!
//! Violating any of these is a configuration error reported by
//! [`ParamBundle::new`]; the `picnic3_l1/l3/l5` constructors are known-good.

#![allow(missing_docs)] // Error variants carry their text in `#[error]` attributes.

/// Salt length in bytes, common to all instances.
pub const SALT_SIZE: usize = 32;

/// Largest digest any instance may use.
pub const MAX_DIGEST_SIZE: usize = 64;

/// Which SHAKE variant an instance hashes with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XofKind {
    /// SHAKE128 (the L1 instance).
    Shake128,
    /// SHAKE256 (the L3 and L5 instances).
    Shake256,
}

/// Errors raised when assembling a parameter bundle by hand.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("number of parties must be a multiple of 4, got {0}")]
    PartiesNotQuad(usize),
    #[error("number of parties must be in 16..=64, got {0}")]
    PartiesOutOfRange(usize),
    #[error("opened rounds ({opened}) must be nonzero and below total rounds ({total})")]
    BadOpenedCount { opened: usize, total: usize },
    #[error("total rounds must be in 9..=65535, got {0}")]
    RoundsOutOfRange(usize),
    #[error("state must be fully covered by S-boxes (3*{sboxes} != {bits})")]
    PartialSboxLayer { sboxes: usize, bits: usize },
    #[error("state width must be in 1..=255 bits, got {0}")]
    StateOutOfRange(usize),
    #[error("digest size must be in 16..={MAX_DIGEST_SIZE} bytes, got {0}")]
    BadDigestSize(usize),
    #[error("seed size must be in 16..=32 bytes, got {0}")]
    BadSeedSize(usize),
    #[error("LowMC must have at least one round")]
    NoLowmcRounds,
}

/// Immutable instance constants, shared by the signer and the verifier.
#[derive(Clone, Debug)]
pub struct ParamBundle {
    /// Number of simulated MPC parties per repetition (`N`).
    pub num_parties: usize,
    /// Total parallel repetitions (`T`).
    pub num_rounds: usize,
    /// Repetitions opened by the challenge (`τ`).
    pub num_opened: usize,
    /// LowMC state and key width in bits (`n`).
    pub state_bits: usize,
    /// LowMC rounds (`r`).
    pub lowmc_rounds: usize,
    /// S-boxes per LowMC round (`m`).
    pub num_sboxes: usize,
    /// Seed length in bytes.
    pub seed_size: usize,
    /// Commitment / challenge digest length in bytes.
    pub digest_size: usize,
    /// Salt length in bytes (always [`SALT_SIZE`]).
    pub salt_size: usize,
    /// Byte length of keys, plaintexts and ciphertexts (`ceil(n / 8)`).
    pub io_size: usize,
    /// Byte length of one party's view (message log, aux correction).
    pub view_size: usize,
    /// SHAKE variant used throughout the instance.
    pub xof: XofKind,
}

impl ParamBundle {
    /// Assemble and validate a bundle from raw constants.
    pub fn new(
        xof: XofKind,
        state_bits: usize,
        num_sboxes: usize,
        lowmc_rounds: usize,
        num_parties: usize,
        num_rounds: usize,
        num_opened: usize,
        seed_size: usize,
        digest_size: usize,
    ) -> Result<Self, ParamError> {
        if num_parties % 4 != 0 {
            return Err(ParamError::PartiesNotQuad(num_parties));
        }
        if !(16..=64).contains(&num_parties) {
            return Err(ParamError::PartiesOutOfRange(num_parties));
        }
        if !(9..=u16::MAX as usize).contains(&num_rounds) {
            return Err(ParamError::RoundsOutOfRange(num_rounds));
        }
        if num_opened == 0 || num_opened >= num_rounds {
            return Err(ParamError::BadOpenedCount { opened: num_opened, total: num_rounds });
        }
        if 3 * num_sboxes != state_bits {
            return Err(ParamError::PartialSboxLayer { sboxes: num_sboxes, bits: state_bits });
        }
        if !(1..=255).contains(&state_bits) {
            return Err(ParamError::StateOutOfRange(state_bits));
        }
        if lowmc_rounds == 0 {
            return Err(ParamError::NoLowmcRounds);
        }
        if !(16..=MAX_DIGEST_SIZE).contains(&digest_size) {
            return Err(ParamError::BadDigestSize(digest_size));
        }
        if !(16..=32).contains(&seed_size) {
            return Err(ParamError::BadSeedSize(seed_size));
        }
        let and_bits = 3 * lowmc_rounds * num_sboxes;
        let view_size = (state_bits + and_bits + 7) / 8;
        Ok(Self {
            num_parties,
            num_rounds,
            num_opened,
            state_bits,
            lowmc_rounds,
            num_sboxes,
            seed_size,
            digest_size,
            salt_size: SALT_SIZE,
            io_size: (state_bits + 7) / 8,
            view_size,
            xof,
        })
    }

    /// The Picnic3-L1 instance (128-bit security).
    pub fn picnic3_l1() -> Self {
        Self::new(XofKind::Shake128, 129, 43, 4, 16, 250, 36, 16, 32)
            .expect("L1 constants are valid")
    }

    /// The Picnic3-L3 instance (192-bit security).
    pub fn picnic3_l3() -> Self {
        Self::new(XofKind::Shake256, 192, 64, 4, 16, 419, 52, 24, 48)
            .expect("L3 constants are valid")
    }

    /// The Picnic3-L5 instance (256-bit security).
    pub fn picnic3_l5() -> Self {
        Self::new(XofKind::Shake256, 255, 85, 4, 16, 601, 68, 32, 64)
            .expect("L5 constants are valid")
    }

    /// Total AND gates in one LowMC evaluation (`3·r·m`).
    #[inline]
    pub fn and_gates(&self) -> usize {
        3 * self.lowmc_rounds * self.num_sboxes
    }

    /// Bytes of random tape per party per repetition.
    #[inline]
    pub fn tape_size(&self) -> usize {
        2 * self.view_size
    }

    /// Bits a party's message log holds after one online simulation:
    /// one broadcast per AND gate plus the output-mask broadcast.
    #[inline]
    pub fn msgs_bits(&self) -> usize {
        self.and_gates() + self.state_bits
    }

    /// Challenge chunk width for repetition indices (`ceil(log2 T)`).
    #[inline]
    pub fn round_chunk_bits(&self) -> usize {
        ceil_log2(self.num_rounds)
    }

    /// Challenge chunk width for party indices (`ceil(log2 N)`).
    #[inline]
    pub fn party_chunk_bits(&self) -> usize {
        ceil_log2(self.num_parties)
    }
}

/// Smallest `k` with `2^k >= x`; 0 for `x <= 1`.
#[inline]
pub(crate) fn ceil_log2(x: usize) -> usize {
    if x <= 1 {
        return 0;
    }
    (usize::BITS - (x - 1).leading_zeros()) as usize
}
