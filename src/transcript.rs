//! Fiat–Shamir transcript and challenge expansion
//!
//! The challenge digest binds, in order: every repetition commitment
//! `Ch[t]`, the Merkle root over the view commitments, the salt, the public
//! key pair (ciphertext then plaintext) and the message. Expansion turns the
//! digest into `τ` pairwise-distinct repetition indices and `τ` party
//! indices by slicing successive digests into fixed-width chunks, re-hashing
//! with [`HASH_PREFIX_1`] whenever a digest runs dry. The party pass
//! continues from the final digest state of the repetition pass.
//!
//! The digest and both index lists are public once expansion is done;
//! branching on them afterwards is fine.

use crate::hashing::{Xof, HASH_PREFIX_1};
use crate::params::ParamBundle;
use crate::tape::get_bit;

/// The Fiat–Shamir challenge digest over the full signing transcript.
pub fn challenge_digest(
    params: &ParamBundle,
    round_commits: &[Vec<u8>],
    cv_root: &[u8],
    salt: &[u8],
    ciphertext: &[u8],
    plaintext: &[u8],
    message: &[u8],
) -> Vec<u8> {
    debug_assert_eq!(round_commits.len(), params.num_rounds);
    let mut xof = Xof::new(params);
    for ch in round_commits {
        xof.update(ch);
    }
    xof.update(cv_root);
    xof.update(salt);
    xof.update(ciphertext);
    xof.update(plaintext);
    xof.update(message);
    xof.squeeze_vec(params.digest_size)
}

/// Re-hash a challenge digest to mint more chunk material.
fn next_digest(params: &ParamBundle, h: &[u8]) -> Vec<u8> {
    let mut xof = Xof::new_prefixed(params, HASH_PREFIX_1);
    xof.update(h);
    xof.squeeze_vec(params.digest_size)
}

/// Slice a digest into `chunk_bits`-wide integers, bits taken in stream
/// order and packed LSB-first within each chunk.
fn bits_to_chunks(chunk_bits: usize, input: &[u8]) -> Vec<u16> {
    let count = input.len() * 8 / chunk_bits;
    let mut chunks = Vec::with_capacity(count);
    for i in 0..count {
        let mut v = 0u16;
        for j in 0..chunk_bits {
            v |= u16::from(get_bit(input, i * chunk_bits + j)) << j;
        }
        chunks.push(v);
    }
    chunks
}

/// Expand a challenge digest into `(challengeC, challengeP)`.
///
/// Repetition indices are deduplicated; party indices may repeat. The
/// output is a pure function of the digest and the parameters.
pub fn expand_challenge(params: &ParamBundle, digest: &[u8]) -> (Vec<u16>, Vec<u16>) {
    let tau = params.num_opened;
    let mut h = digest.to_vec();

    let mut rounds = Vec::with_capacity(tau);
    while rounds.len() < tau {
        for v in bits_to_chunks(params.round_chunk_bits(), &h) {
            if (v as usize) < params.num_rounds && !rounds.contains(&v) {
                rounds.push(v);
                if rounds.len() == tau {
                    break;
                }
            }
        }
        h = next_digest(params, &h);
    }

    let mut parties = Vec::with_capacity(tau);
    while parties.len() < tau {
        for v in bits_to_chunks(params.party_chunk_bits(), &h) {
            if (v as usize) < params.num_parties {
                parties.push(v);
                if parties.len() == tau {
                    break;
                }
            }
        }
        h = next_digest(params, &h);
    }

    (rounds, parties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::XofKind;

    fn tiny() -> ParamBundle {
        ParamBundle::new(XofKind::Shake128, 9, 3, 2, 16, 31, 8, 16, 32).unwrap()
    }

    #[test]
    fn chunks_are_lsb_first() {
        // 0b1010_1100 → 4-bit chunks from the MSB-first bit stream:
        // bits 1,0,1,0 → 0b0101 = 5; bits 1,1,0,0 → 0b0011 = 3.
        assert_eq!(bits_to_chunks(4, &[0b1010_1100]), vec![5, 3]);
        // A 3-bit width over two bytes leaves trailing bits unused.
        assert_eq!(bits_to_chunks(3, &[0xFF, 0x00]).len(), 5);
    }

    #[test]
    fn expansion_is_deterministic_distinct_and_in_range() {
        let p = tiny();
        for fill in 0..8u8 {
            let digest = vec![fill.wrapping_mul(0x37); p.digest_size];
            let (c1, p1) = expand_challenge(&p, &digest);
            let (c2, p2) = expand_challenge(&p, &digest);
            assert_eq!(c1, c2);
            assert_eq!(p1, p2);

            assert_eq!(c1.len(), p.num_opened);
            assert_eq!(p1.len(), p.num_opened);
            for (i, &t) in c1.iter().enumerate() {
                assert!((t as usize) < p.num_rounds);
                assert!(!c1[..i].contains(&t), "duplicate repetition index");
            }
            for &j in &p1 {
                assert!((j as usize) < p.num_parties);
            }
        }
    }

    #[test]
    fn different_digests_give_different_challenges() {
        let p = tiny();
        let a = expand_challenge(&p, &vec![0u8; p.digest_size]);
        let b = expand_challenge(&p, &vec![1u8; p.digest_size]);
        assert_ne!(a, b);
    }

    #[test]
    fn transcript_binds_every_input() {
        let p = tiny();
        let ch: Vec<Vec<u8>> = (0..p.num_rounds).map(|t| vec![t as u8; p.digest_size]).collect();
        let root = vec![7u8; p.digest_size];
        let salt = [3u8; 32];
        let base = challenge_digest(&p, &ch, &root, &salt, &[1, 2], &[3, 4], b"msg");

        let mut ch2 = ch.clone();
        ch2[30][0] ^= 1;
        assert_ne!(base, challenge_digest(&p, &ch2, &root, &salt, &[1, 2], &[3, 4], b"msg"));
        let mut root2 = root.clone();
        root2[0] ^= 1;
        assert_ne!(base, challenge_digest(&p, &ch, &root2, &salt, &[1, 2], &[3, 4], b"msg"));
        assert_ne!(base, challenge_digest(&p, &ch, &root, &[4u8; 32], &[1, 2], &[3, 4], b"msg"));
        assert_ne!(base, challenge_digest(&p, &ch, &root, &salt, &[1, 3], &[3, 4], b"msg"));
        assert_ne!(base, challenge_digest(&p, &ch, &root, &salt, &[1, 2], &[3, 5], b"msg"));
        assert_ne!(base, challenge_digest(&p, &ch, &root, &salt, &[1, 2], &[3, 4], b"msh"));
    }
}
