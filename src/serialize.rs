//! Bit-exact signature serialization
//!
//! Wire layout, in order: challenge digest, salt, root seed-tree reveal,
//! Merkle opening for the unopened view commitments, then for every opened
//! repetition in ascending index order: per-repetition seed reveal, the aux
//! correction (only when the unopened party is not the last), the masked
//! key, the unopened party's message log and its commitment.
//!
//! Deserialization first reads the challenge and salt, re-expands the
//! challenge, computes the exact byte length the expanded challenge
//! implies, and rejects any other length outright. Trailing padding bits of
//! the aux correction (`3·r·m` bits), the masked key (`n` bits) and the
//! message log (`3·r·m + n` bits) must be zero; a set padding bit rejects
//! the signature before any cryptography runs.

#![forbid(unsafe_code)]
#![allow(missing_docs)] // Error variants carry their text in `#[error]` attributes.

use crate::params::ParamBundle;
use crate::tape::padding_bits_zero;
use crate::transcript::expand_challenge;
use crate::tree::Tree;
use crate::{RoundProof, Signature, SALT_SIZE};

/// Rejections raised while decoding untrusted signature bytes.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("signature length {got} does not match the challenge-implied {want}")]
    BadSignatureLength { got: usize, want: usize },
    #[error("nonzero padding bits in {field}")]
    BadPadding { field: &'static str },
}

/// Read `len` bytes at the cursor and advance it.
fn take<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> &'a [u8] {
    let piece = &bytes[*cursor..*cursor + len];
    *cursor += len;
    piece
}

/// Repetition indices *not* selected by the challenge, ascending.
pub(crate) fn missing_rounds(params: &ParamBundle, challenge_c: &[u16]) -> Vec<u16> {
    (0..params.num_rounds as u16)
        .filter(|t| !challenge_c.contains(t))
        .collect()
}

/// Exact byte length of a signature with this expanded challenge.
pub(crate) fn signature_len(
    params: &ParamBundle,
    challenge_c: &[u16],
    challenge_p: &[u16],
) -> usize {
    let last = (params.num_parties - 1) as u16;
    let mut len = params.digest_size + params.salt_size;
    len += Tree::reveal_seeds_size(params, params.num_rounds, challenge_c);
    len += Tree::open_merkle_size(
        params,
        params.num_rounds,
        &missing_rounds(params, challenge_c),
    );
    for t in 0..params.num_rounds as u16 {
        let Some(idx) = challenge_c.iter().position(|&c| c == t) else {
            continue;
        };
        len += Tree::reveal_seeds_size(params, params.num_parties, &[challenge_p[idx]]);
        if challenge_p[idx] != last {
            len += params.view_size;
        }
        len += params.io_size + params.view_size + params.digest_size;
    }
    len
}

/// Encode a signature into its wire bytes.
pub fn serialize(params: &ParamBundle, sig: &Signature) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(signature_len(params, &sig.challenge_c, &sig.challenge_p));
    out.extend_from_slice(&sig.challenge);
    out.extend_from_slice(&sig.salt);
    out.extend_from_slice(&sig.iseed_info);
    out.extend_from_slice(&sig.cv_info);
    for proof in sig.proofs.iter().flatten() {
        out.extend_from_slice(&proof.seed_info);
        if let Some(aux) = &proof.aux {
            out.extend_from_slice(aux);
        }
        out.extend_from_slice(&proof.input);
        out.extend_from_slice(&proof.msgs);
        out.extend_from_slice(&proof.commitment);
    }
    out
}

/// Decode and structurally validate wire bytes.
///
/// On success the expanded challenge lists are populated and every
/// variable-length field has the exact size the challenge dictates.
pub fn deserialize(params: &ParamBundle, bytes: &[u8]) -> Result<Signature, SerializeError> {
    let header = params.digest_size + SALT_SIZE;
    if bytes.len() < header {
        return Err(SerializeError::BadSignatureLength { got: bytes.len(), want: header });
    }
    let challenge = bytes[..params.digest_size].to_vec();
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&bytes[params.digest_size..header]);

    let (challenge_c, challenge_p) = expand_challenge(params, &challenge);
    let want = signature_len(params, &challenge_c, &challenge_p);
    if bytes.len() != want {
        return Err(SerializeError::BadSignatureLength { got: bytes.len(), want });
    }

    let mut cursor = header;
    let iseed_len = Tree::reveal_seeds_size(params, params.num_rounds, &challenge_c);
    let iseed_info = take(bytes, &mut cursor, iseed_len).to_vec();
    let cv_len = Tree::open_merkle_size(
        params,
        params.num_rounds,
        &missing_rounds(params, &challenge_c),
    );
    let cv_info = take(bytes, &mut cursor, cv_len).to_vec();

    let last = (params.num_parties - 1) as u16;
    let mut proofs: Vec<Option<RoundProof>> = vec![None; params.num_rounds];
    for t in 0..params.num_rounds as u16 {
        let Some(idx) = challenge_c.iter().position(|&c| c == t) else {
            continue;
        };
        let unopened = challenge_p[idx];
        let seed_len = Tree::reveal_seeds_size(params, params.num_parties, &[unopened]);
        let seed_info = take(bytes, &mut cursor, seed_len).to_vec();
        let aux = if unopened != last {
            let aux = take(bytes, &mut cursor, params.view_size).to_vec();
            if !padding_bits_zero(&aux, params.and_gates()) {
                return Err(SerializeError::BadPadding { field: "aux" });
            }
            Some(aux)
        } else {
            None
        };
        let input = take(bytes, &mut cursor, params.io_size).to_vec();
        if !padding_bits_zero(&input, params.state_bits) {
            return Err(SerializeError::BadPadding { field: "input" });
        }
        let msgs = take(bytes, &mut cursor, params.view_size).to_vec();
        if !padding_bits_zero(&msgs, params.msgs_bits()) {
            return Err(SerializeError::BadPadding { field: "msgs" });
        }
        let commitment = take(bytes, &mut cursor, params.digest_size).to_vec();
        proofs[t as usize] = Some(RoundProof {
            seed_info,
            aux,
            input,
            msgs,
            commitment,
            unopened,
        });
    }
    debug_assert_eq!(cursor, bytes.len());

    Ok(Signature {
        challenge,
        salt,
        iseed_info,
        cv_info,
        challenge_c,
        challenge_p,
        proofs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::XofKind;

    fn tiny() -> ParamBundle {
        ParamBundle::new(XofKind::Shake128, 9, 3, 2, 16, 31, 8, 16, 32).unwrap()
    }

    /// Hand-build a structurally valid signature for the tiny instance by
    /// running the expansion and filling each field with the exact sizes the
    /// challenge implies.
    fn synthetic_signature(params: &ParamBundle, fill: u8) -> Signature {
        let challenge = vec![fill; params.digest_size];
        let (challenge_c, challenge_p) = expand_challenge(params, &challenge);
        let last = (params.num_parties - 1) as u16;
        let mut proofs: Vec<Option<RoundProof>> = vec![None; params.num_rounds];
        for (idx, &t) in challenge_c.iter().enumerate() {
            let unopened = challenge_p[idx];
            let seed_len =
                Tree::reveal_seeds_size(params, params.num_parties, &[unopened]);
            proofs[t as usize] = Some(RoundProof {
                seed_info: vec![0xA0 ^ fill; seed_len],
                aux: (unopened != last).then(|| {
                    let mut aux = vec![0u8; params.view_size];
                    aux[0] = 0xC0; // bits 0..2 only; padding stays clear
                    aux
                }),
                input: vec![0x80; params.io_size],
                msgs: {
                    let mut m = vec![0u8; params.view_size];
                    m[0] = 0x55;
                    m
                },
                commitment: vec![fill ^ 1; params.digest_size],
                unopened,
            });
        }
        Signature {
            challenge,
            salt: [fill ^ 2; 32],
            iseed_info: vec![
                0x11;
                Tree::reveal_seeds_size(params, params.num_rounds, &challenge_c)
            ],
            cv_info: vec![
                0x22;
                Tree::open_merkle_size(
                    params,
                    params.num_rounds,
                    &missing_rounds(params, &challenge_c),
                )
            ],
            challenge_c,
            challenge_p,
            proofs,
        }
    }

    #[test]
    fn roundtrip_is_canonical() {
        let p = tiny();
        for fill in [0u8, 3, 0x5a, 0xff] {
            let sig = synthetic_signature(&p, fill);
            let bytes = serialize(&p, &sig);
            assert_eq!(bytes.len(), signature_len(&p, &sig.challenge_c, &sig.challenge_p));
            let back = deserialize(&p, &bytes).unwrap();
            assert_eq!(back, sig);
            assert_eq!(serialize(&p, &back), bytes);
        }
    }

    #[test]
    fn length_changes_are_rejected() {
        let p = tiny();
        let bytes = serialize(&p, &synthetic_signature(&p, 7));
        let mut short = bytes.clone();
        short.pop();
        assert!(matches!(
            deserialize(&p, &short),
            Err(SerializeError::BadSignatureLength { .. })
        ));
        let mut long = bytes.clone();
        long.push(0);
        assert!(matches!(
            deserialize(&p, &long),
            Err(SerializeError::BadSignatureLength { .. })
        ));
        assert!(matches!(
            deserialize(&p, &bytes[..4]),
            Err(SerializeError::BadSignatureLength { .. })
        ));
    }

    #[test]
    fn aux_presence_follows_the_party_challenge() {
        let p = tiny();
        let last = (p.num_parties - 1) as u16;
        // Scan fills until both shapes (with and without an aux field)
        // appear; the serialized length must differ by view_size per
        // last-party repetition.
        let mut seen_with = false;
        let mut seen_without = false;
        for fill in 0..64u8 {
            let sig = synthetic_signature(&p, fill);
            let withouts =
                sig.challenge_p.iter().filter(|&&j| j == last).count();
            let all_open = signature_len(
                &p,
                &sig.challenge_c,
                &vec![0u16; sig.challenge_p.len()],
            );
            let actual = serialize(&p, &sig).len();
            assert_eq!(actual, all_open - withouts * p.view_size);
            seen_with |= withouts > 0;
            seen_without |= withouts == 0;
            if seen_with && seen_without {
                break;
            }
        }
        assert!(seen_with, "no fill produced a hidden last party");
    }

    #[test]
    fn padding_bits_must_be_zero() {
        let p = tiny();
        let sig = synthetic_signature(&p, 9);
        let bytes = serialize(&p, &sig);
        let base = deserialize(&p, &bytes).unwrap();

        // Locate one opened repetition with an aux field and flip a padding
        // bit in each checked field through re-serialization.
        let t = (0..p.num_rounds)
            .find(|&t| base.proofs[t].as_ref().is_some_and(|pr| pr.aux.is_some()))
            .expect("an opened repetition with aux");

        let mut aux_bad = base.clone();
        let aux = aux_bad.proofs[t].as_mut().unwrap().aux.as_mut().unwrap();
        let last_byte = aux.len() - 1;
        aux[last_byte] ^= 0x01; // bit 31 of an 18-bit field
        assert!(matches!(
            deserialize(&p, &serialize(&p, &aux_bad)),
            Err(SerializeError::BadPadding { field: "aux" })
        ));

        let mut input_bad = base.clone();
        input_bad.proofs[t].as_mut().unwrap().input[p.io_size - 1] ^= 0x01;
        assert!(matches!(
            deserialize(&p, &serialize(&p, &input_bad)),
            Err(SerializeError::BadPadding { field: "input" })
        ));

        let mut msgs_bad = base.clone();
        msgs_bad.proofs[t].as_mut().unwrap().msgs[p.view_size - 1] ^= 0x01;
        assert!(matches!(
            deserialize(&p, &serialize(&p, &msgs_bad)),
            Err(SerializeError::BadPadding { field: "msgs" })
        ));
    }
}
