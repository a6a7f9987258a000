//! Key generation and key material
//!
//! A keypair is a LowMC evaluation: the secret is an `n`-bit cipher key,
//! the public key is a random `n`-bit plaintext together with its
//! encryption under that key. Signing proves knowledge of the key for the
//! published pair.
//!
//! The secret key bytes are wiped on drop. Padding bits above `n` are zero
//! in all three buffers; external material is validated on construction.

#![allow(missing_docs)] // Error variants carry their text in `#[error]` attributes.

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::lowmc::Lowmc;
use crate::params::ParamBundle;
use crate::tape::{mask_trailing_bits, padding_bits_zero};

/// Failures while importing externally supplied key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("{field} has wrong length (got {got}, want {want})")]
    BadLength { field: &'static str, got: usize, want: usize },
    #[error("{field} has nonzero padding bits")]
    BadPadding { field: &'static str },
}

/// The public half of a keypair: a LowMC plaintext/ciphertext pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKey {
    /// The public LowMC output block.
    pub ciphertext: Vec<u8>,
    /// The public LowMC input block.
    pub plaintext: Vec<u8>,
}

impl VerifyingKey {
    /// Import a verifying key, checking lengths and padding.
    pub fn from_parts(
        params: &ParamBundle,
        ciphertext: Vec<u8>,
        plaintext: Vec<u8>,
    ) -> Result<Self, KeyError> {
        check_block(params, "ciphertext", &ciphertext)?;
        check_block(params, "plaintext", &plaintext)?;
        Ok(Self { ciphertext, plaintext })
    }
}

/// The secret half of a keypair. Holds its verifying key so signing can
/// bind the public pair; the cipher key is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    #[zeroize(skip)]
    public: VerifyingKey,
    key: Vec<u8>,
}

impl SigningKey {
    /// Import a signing key, checking lengths and padding.
    pub fn from_parts(
        params: &ParamBundle,
        key: Vec<u8>,
        public: VerifyingKey,
    ) -> Result<Self, KeyError> {
        check_block(params, "secret key", &key)?;
        Ok(Self { public, key })
    }

    /// The public half.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.public
    }

    /// The raw cipher key bits.
    pub(crate) fn key_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Expose the key bytes for export. Handle with care.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.key.clone()
    }
}

fn check_block(params: &ParamBundle, field: &'static str, data: &[u8]) -> Result<(), KeyError> {
    if data.len() != params.io_size {
        return Err(KeyError::BadLength { field, got: data.len(), want: params.io_size });
    }
    if !padding_bits_zero(data, params.state_bits) {
        return Err(KeyError::BadPadding { field });
    }
    Ok(())
}

/// Sample a fresh keypair from `rng`.
pub fn keygen<R: RngCore + CryptoRng>(
    params: &ParamBundle,
    lowmc: &Lowmc,
    rng: &mut R,
) -> SigningKey {
    let mut key = vec![0u8; params.io_size];
    rng.fill_bytes(&mut key);
    mask_trailing_bits(&mut key, params.state_bits);

    let mut plaintext = vec![0u8; params.io_size];
    rng.fill_bytes(&mut plaintext);
    mask_trailing_bits(&mut plaintext, params.state_bits);

    let mut ciphertext = vec![0u8; params.io_size];
    lowmc.encrypt(&key, &plaintext, &mut ciphertext);

    SigningKey { public: VerifyingKey { ciphertext, plaintext }, key }
}
