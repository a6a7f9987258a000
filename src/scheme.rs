//! Signer and verifier orchestration
//!
//! ## Signing
//!
//! One pass per phase, T repetitions each:
//!
//! 1. derive the salt and root seed from the key, message and public pair;
//!    grow the root seed tree (one leaf per repetition) and, per
//!    repetition, the party seed tree and all N tapes;
//! 2. pre-process every repetition (`compute_aux`), commit to every party
//!    seed (4-way batched, the last party singly with its aux binding);
//! 3. mask the key and run the online simulation, filling the broadcast
//!    logs;
//! 4. fold the party commitments into per-repetition digests `Ch`, the
//!    views into `Cv`, and `Cv` into a Merkle root; hash the transcript
//!    into the challenge and expand it;
//! 5. reveal the unopened repetitions' seeds from the root tree, open the
//!    Merkle tree over the unopened `Cv` leaves, and assemble one proof per
//!    opened repetition.
//!
//! ## Verification
//!
//! The mirror image over opened data only. Unopened repetitions are
//! regenerated in full from the root-tree reveal (tapes, aux, commitments);
//! opened repetitions reconstruct all-but-one party seed, take the hidden
//! party's commitment and broadcasts from the proof, replay the online
//! simulation against the public key, and recommit the views. The Merkle
//! opening attests the view commitments the verifier cannot recompute, and
//! the final challenge recomputation must match the signature digest
//! byte for byte (constant-time comparison).
//!
//! Every verification failure collapses to [`VerifyError::Rejected`]; the
//! discriminating cause goes to `debug` logging only.

#![forbid(unsafe_code)]
#![allow(missing_docs)] // Error variants carry their text in `#[error]` attributes.

use subtle::ConstantTimeEq;
use tracing::debug;

use crate::commit::{commit_round, commit_round_x4, commit_seed, commit_seed_x4, commit_views};
use crate::hashing::Xof;
use crate::keys::{SigningKey, VerifyingKey};
use crate::lowmc::{Lowmc, Msgs};
use crate::params::ParamBundle;
use crate::serialize::{deserialize, missing_rounds, serialize};
use crate::tape::{mask_trailing_bits, RandomTapes};
use crate::transcript::{challenge_digest, expand_challenge};
use crate::tree::Tree;
use crate::{RoundProof, Signature, SALT_SIZE};

/// Failures while producing a signature.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("signing key does not reproduce its public key")]
    KeyMismatch,
}

/// The single opaque verification failure.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("signature rejected")]
    Rejected,
}

/// Produces signatures for one parameter bundle and LowMC instance.
pub struct Signer<'a> {
    /// Instance constants.
    pub params: &'a ParamBundle,
    /// Expanded cipher constants for the same bundle.
    pub lowmc: &'a Lowmc,
}

/// Checks signatures for one parameter bundle and LowMC instance.
pub struct Verifier<'a> {
    /// Instance constants.
    pub params: &'a ParamBundle,
    /// Expanded cipher constants for the same bundle.
    pub lowmc: &'a Lowmc,
}

/// All N party-seed commitments of one repetition: the bulk through the
/// 4-way batch, then the last party rebound singly with its aux correction.
fn party_commitments(
    params: &ParamBundle,
    seeds: &[&[u8]],
    aux_bits: &[u8],
    salt: &[u8],
    t: usize,
) -> Vec<Vec<u8>> {
    let mut c = party_commitments_base(params, seeds, salt, t);
    let last = params.num_parties - 1;
    c[last] = commit_seed(params, seeds[last], Some(aux_bits), salt, t as u16, last as u16);
    c
}

/// The batched commitments alone, without the last party's aux binding.
fn party_commitments_base(
    params: &ParamBundle,
    seeds: &[&[u8]],
    salt: &[u8],
    t: usize,
) -> Vec<Vec<u8>> {
    let mut c = Vec::with_capacity(params.num_parties);
    for j in (0..params.num_parties).step_by(4) {
        c.extend(commit_seed_x4(
            params,
            [seeds[j], seeds[j + 1], seeds[j + 2], seeds[j + 3]],
            salt,
            t as u16,
            j as u16,
        ));
    }
    c
}

/// Fold per-party commitments into `Ch[0..T]`, quartets first, tail singly.
fn round_commitments(params: &ParamBundle, c: &[Vec<Vec<u8>>]) -> Vec<Vec<u8>> {
    let mut ch = Vec::with_capacity(params.num_rounds);
    let mut t = 0;
    while t + 4 <= params.num_rounds {
        ch.extend(commit_round_x4(
            params,
            [c[t].as_slice(), c[t + 1].as_slice(), c[t + 2].as_slice(), c[t + 3].as_slice()],
        ));
        t += 4;
    }
    while t < params.num_rounds {
        ch.push(commit_round(params, &c[t]));
        t += 1;
    }
    ch
}

impl<'a> Signer<'a> {
    /// Deterministic salt and root seed for this key/message pair.
    fn salt_and_root(&self, sk: &SigningKey, message: &[u8]) -> ([u8; SALT_SIZE], Vec<u8>) {
        let vk = sk.verifying_key();
        let mut xof = Xof::new(self.params);
        xof.update(sk.key_bytes());
        xof.update(message);
        xof.update(&vk.ciphertext);
        xof.update(&vk.plaintext);
        xof.update_u16_le(self.params.state_bits as u16);
        let mut salt = [0u8; SALT_SIZE];
        xof.squeeze(&mut salt);
        (salt, xof.squeeze_vec(self.params.seed_size))
    }

    /// Sign `message`, returning the serialized signature bytes.
    pub fn sign(&self, sk: &SigningKey, message: &[u8]) -> Result<Vec<u8>, SignError> {
        let p = self.params;
        let vk = sk.verifying_key();
        let (salt, root) = self.salt_and_root(sk, message);
        let iseeds = Tree::generate_seeds(p, p.num_rounds, &root, &salt, 0);
        debug!(rounds = p.num_rounds, parties = p.num_parties, "signing");

        // Pre-processing: tapes, aux corrections and seed commitments.
        let mut round_trees = Vec::with_capacity(p.num_rounds);
        let mut tapes = Vec::with_capacity(p.num_rounds);
        let mut inputs = vec![vec![0u8; p.io_size]; p.num_rounds];
        let mut commits = Vec::with_capacity(p.num_rounds);
        for t in 0..p.num_rounds {
            let round_seed = iseeds.leaf(t).expect("generated tree has every leaf");
            let tree = Tree::generate_seeds(p, p.num_parties, round_seed, &salt, t);
            let seeds: Vec<&[u8]> = (0..p.num_parties)
                .map(|j| tree.leaf(j).expect("generated tree has every leaf"))
                .collect();
            let mut tp = RandomTapes::derive(p, &seeds, &salt, t);
            self.lowmc.compute_aux(p, &mut tp, Some(&mut inputs[t]));
            commits.push(party_commitments(p, &seeds, &tp.aux_bits, &salt, t));
            tapes.push(tp);
            round_trees.push(tree);
        }

        // Online phase: mask the key and simulate, one repetition at a time.
        let mut msgs_all = Vec::with_capacity(p.num_rounds);
        for t in 0..p.num_rounds {
            for (m, k) in inputs[t].iter_mut().zip(sk.key_bytes()) {
                *m ^= *k;
            }
            mask_trailing_bits(&mut inputs[t], p.state_bits);
            let mut msgs = Msgs::new(p);
            self.lowmc
                .simulate_online(p, &inputs[t], &mut tapes[t], &mut msgs, &vk.plaintext, &vk.ciphertext)
                .map_err(|_| SignError::KeyMismatch)?;
            msgs_all.push(msgs);
        }

        // Transcript: Ch, Cv, Merkle root, challenge.
        let ch = round_commitments(p, &commits);
        let cv_leaves: Vec<Vec<u8>> = (0..p.num_rounds)
            .map(|t| commit_views(p, &inputs[t], &msgs_all[t]))
            .collect();
        let cv_tree = Tree::build_merkle(p, &cv_leaves, &salt);
        let challenge = challenge_digest(
            p,
            &ch,
            cv_tree.root(),
            &salt,
            &vk.ciphertext,
            &vk.plaintext,
            message,
        );
        let (challenge_c, challenge_p) = expand_challenge(p, &challenge);
        debug!(opened = challenge_c.len(), "challenge expanded");

        // Reveals and per-repetition proofs.
        let iseed_info = iseeds.reveal_seeds(&challenge_c);
        let cv_info = cv_tree.open_merkle(&missing_rounds(p, &challenge_c));
        let mut proofs: Vec<Option<RoundProof>> = vec![None; p.num_rounds];
        for (idx, &t) in challenge_c.iter().enumerate() {
            let t = t as usize;
            let unopened = challenge_p[idx] as usize;
            proofs[t] = Some(RoundProof {
                seed_info: round_trees[t].reveal_seeds(&[challenge_p[idx]]),
                aux: (unopened != p.num_parties - 1).then(|| tapes[t].aux_bits.clone()),
                input: inputs[t].clone(),
                msgs: msgs_all[t].msgs[unopened].clone(),
                commitment: commits[t][unopened].clone(),
                unopened: challenge_p[idx],
            });
        }

        let sig = Signature {
            challenge,
            salt,
            iseed_info,
            cv_info,
            challenge_c,
            challenge_p,
            proofs,
        };
        Ok(serialize(p, &sig))
    }
}

/// Per-repetition state the verifier carries from the commitment phase to
/// the online phase of an opened repetition.
struct OpenedState {
    tapes: RandomTapes,
    unopened: usize,
}

impl<'a> Verifier<'a> {
    /// Check `signature` over `message` against `vk`.
    pub fn verify(
        &self,
        vk: &VerifyingKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), VerifyError> {
        self.verify_inner(vk, message, signature).map_err(|cause| {
            debug!(%cause, "signature rejected");
            VerifyError::Rejected
        })
    }

    fn verify_inner(
        &self,
        vk: &VerifyingKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), anyhow::Error> {
        let p = self.params;
        let sig = deserialize(p, signature)?;
        let salt = sig.salt;
        let last = p.num_parties - 1;
        let zero_seed = vec![0u8; p.seed_size];

        let iseeds =
            Tree::reconstruct_seeds(p, p.num_rounds, &sig.challenge_c, &sig.iseed_info, &salt, 0)?;

        // Commitment phase: every repetition gets its full C[t] array.
        let mut commits = Vec::with_capacity(p.num_rounds);
        let mut opened = Vec::with_capacity(p.num_rounds);
        for t in 0..p.num_rounds {
            if !sig.challenge_c.iter().any(|&c| c as usize == t) {
                let round_seed = iseeds
                    .leaf(t)
                    .ok_or_else(|| anyhow::anyhow!("round seed missing for unopened repetition"))?;
                let tree = Tree::generate_seeds(p, p.num_parties, round_seed, &salt, t);
                let seeds: Vec<&[u8]> = (0..p.num_parties)
                    .map(|j| tree.leaf(j).expect("generated tree has every leaf"))
                    .collect();
                let mut tp = RandomTapes::derive(p, &seeds, &salt, t);
                self.lowmc.compute_aux(p, &mut tp, None);
                commits.push(party_commitments(p, &seeds, &tp.aux_bits, &salt, t));
                opened.push(None);
                continue;
            }

            let proof = sig.proofs[t].as_ref().expect("deserialized proof for opened index");
            let unopened = proof.unopened as usize;
            let tree = Tree::reconstruct_seeds(
                p,
                p.num_parties,
                &[proof.unopened],
                &proof.seed_info,
                &salt,
                t,
            )?;
            let seeds: Vec<&[u8]> = (0..p.num_parties)
                .map(|j| tree.leaf(j).unwrap_or(zero_seed.as_slice()))
                .collect();
            let tp = RandomTapes::derive(p, &seeds, &salt, t);

            let mut c = party_commitments_base(p, &seeds, &salt, t);
            if unopened != last {
                let aux = proof.aux.as_deref().expect("aux accompanies a non-last hidden party");
                c[last] = commit_seed(p, seeds[last], Some(aux), &salt, t as u16, last as u16);
            }
            c[unopened] = proof.commitment.clone();
            commits.push(c);
            opened.push(Some(OpenedState { tapes: tp, unopened }));
        }

        let ch = round_commitments(p, &commits);

        // Online phase for the opened repetitions.
        let mut cv_leaves: Vec<Option<Vec<u8>>> = vec![None; p.num_rounds];
        for (t, state) in opened.into_iter().enumerate() {
            let Some(OpenedState { mut tapes, unopened }) = state else {
                continue;
            };
            let proof = sig.proofs[t].as_ref().expect("deserialized proof for opened index");
            if unopened != last {
                let aux = proof.aux.as_deref().expect("aux accompanies a non-last hidden party");
                tapes.set_aux_bits(p, aux);
            }
            tapes.zero_party(unopened);
            let mut msgs = Msgs::new(p);
            msgs.unopened = Some(unopened);
            msgs.msgs[unopened].copy_from_slice(&proof.msgs);
            self.lowmc
                .simulate_online(p, &proof.input, &mut tapes, &mut msgs, &vk.plaintext, &vk.ciphertext)?;
            cv_leaves[t] = Some(commit_views(p, &proof.input, &msgs));
        }

        // Merkle opening over the unopened view commitments, then the root.
        let mut cv_tree = Tree::new(p.num_rounds, p.digest_size);
        cv_tree.add_merkle_nodes(&missing_rounds(p, &sig.challenge_c), &sig.cv_info)?;
        cv_tree.verify_merkle(p, &cv_leaves, &salt)?;

        let expected = challenge_digest(
            p,
            &ch,
            cv_tree.root(),
            &salt,
            &vk.ciphertext,
            &vk.plaintext,
            message,
        );
        if !bool::from(expected.as_slice().ct_eq(&sig.challenge)) {
            anyhow::bail!("challenge recomputation mismatch");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keygen;
    use crate::params::XofKind;
    use crate::serialize::signature_len;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tiny() -> ParamBundle {
        ParamBundle::new(XofKind::Shake128, 9, 3, 2, 16, 31, 8, 16, 32).unwrap()
    }

    struct Fixture {
        params: ParamBundle,
        lowmc: Lowmc,
        sk: SigningKey,
    }

    impl Fixture {
        fn new(params: ParamBundle, rng_seed: u64) -> Self {
            let lowmc = Lowmc::new(&params);
            let mut rng = StdRng::seed_from_u64(rng_seed);
            let sk = keygen(&params, &lowmc, &mut rng);
            Self { params, lowmc, sk }
        }

        fn signer(&self) -> Signer<'_> {
            Signer { params: &self.params, lowmc: &self.lowmc }
        }

        fn verifier(&self) -> Verifier<'_> {
            Verifier { params: &self.params, lowmc: &self.lowmc }
        }
    }

    #[test]
    fn sign_verify_roundtrip() {
        let fx = Fixture::new(tiny(), 1);
        let sig = fx.signer().sign(&fx.sk, b"roundtrip message").unwrap();
        fx.verifier()
            .verify(fx.sk.verifying_key(), b"roundtrip message", &sig)
            .unwrap();
    }

    #[test]
    fn signing_is_deterministic() {
        let fx = Fixture::new(tiny(), 2);
        let a = fx.signer().sign(&fx.sk, b"same message").unwrap();
        let b = fx.signer().sign(&fx.sk, b"same message").unwrap();
        assert_eq!(a, b);
        let c = fx.signer().sign(&fx.sk, b"same messagf").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn serialization_of_real_signature_is_canonical() {
        let fx = Fixture::new(tiny(), 3);
        let bytes = fx.signer().sign(&fx.sk, b"canonical").unwrap();
        let sig = deserialize(&fx.params, &bytes).unwrap();
        assert_eq!(serialize(&fx.params, &sig), bytes);
        assert_eq!(bytes.len(), signature_len(&fx.params, &sig.challenge_c, &sig.challenge_p));
    }

    #[test]
    fn challenge_lists_rederive_from_the_digest() {
        let fx = Fixture::new(tiny(), 4);
        let bytes = fx.signer().sign(&fx.sk, b"determinism").unwrap();
        let sig = deserialize(&fx.params, &bytes).unwrap();
        let (c, p) = expand_challenge(&fx.params, &sig.challenge);
        assert_eq!(c, sig.challenge_c);
        assert_eq!(p, sig.challenge_p);
        assert_eq!(c.len(), fx.params.num_opened);
        for (i, &t) in c.iter().enumerate() {
            assert!((t as usize) < fx.params.num_rounds);
            assert!(!c[..i].contains(&t));
        }
    }

    #[test]
    fn wrong_message_or_key_is_rejected() {
        let fx = Fixture::new(tiny(), 5);
        let bytes = fx.signer().sign(&fx.sk, b"bound to this").unwrap();
        assert!(fx
            .verifier()
            .verify(fx.sk.verifying_key(), b"bound to that", &bytes)
            .is_err());

        let other = Fixture::new(tiny(), 6);
        assert!(fx
            .verifier()
            .verify(other.sk.verifying_key(), b"bound to this", &bytes)
            .is_err());
    }

    #[test]
    fn bit_flips_anywhere_are_rejected() {
        let fx = Fixture::new(tiny(), 7);
        let bytes = fx.signer().sign(&fx.sk, b"mutation sweep").unwrap();
        let vk = fx.sk.verifying_key();
        // Stride through the signature; every touched byte must break it.
        for pos in (0..bytes.len()).step_by(17) {
            let mut bad = bytes.clone();
            bad[pos] ^= 0x01;
            assert!(
                fx.verifier().verify(vk, b"mutation sweep", &bad).is_err(),
                "flip at byte {pos} survived"
            );
            let mut bad_hi = bytes.clone();
            bad_hi[pos] ^= 0x80;
            assert!(
                fx.verifier().verify(vk, b"mutation sweep", &bad_hi).is_err(),
                "high flip at byte {pos} survived"
            );
        }
        // And specifically the first byte of challenge and salt.
        for pos in [0, fx.params.digest_size] {
            let mut bad = bytes.clone();
            bad[pos] ^= 1;
            assert!(fx.verifier().verify(vk, b"mutation sweep", &bad).is_err());
        }
    }

    #[test]
    fn truncation_and_extension_are_rejected() {
        let fx = Fixture::new(tiny(), 8);
        let bytes = fx.signer().sign(&fx.sk, b"exact length").unwrap();
        let vk = fx.sk.verifying_key();
        let mut short = bytes.clone();
        short.pop();
        assert!(fx.verifier().verify(vk, b"exact length", &short).is_err());
        let mut long = bytes.clone();
        long.push(0);
        assert!(fx.verifier().verify(vk, b"exact length", &long).is_err());
    }

    #[test]
    fn padding_bit_flips_are_rejected() {
        let fx = Fixture::new(tiny(), 9);
        let bytes = fx.signer().sign(&fx.sk, b"padding").unwrap();
        let sig = deserialize(&fx.params, &bytes).unwrap();
        let t = sig.challenge_c[0] as usize;

        // The message-log field of the tiny instance uses 27 of 32 bits.
        let mut bad = sig.clone();
        let msgs = &mut bad.proofs[t].as_mut().unwrap().msgs;
        let last_byte = msgs.len() - 1;
        msgs[last_byte] |= 0x01;
        let bad_bytes = serialize(&fx.params, &bad);
        assert!(fx
            .verifier()
            .verify(fx.sk.verifying_key(), b"padding", &bad_bytes)
            .is_err());
    }

    #[test]
    fn hidden_last_party_omits_the_aux_field() {
        let fx = Fixture::new(tiny(), 10);
        let last = (fx.params.num_parties - 1) as u16;
        let mut found = false;
        for i in 0..32u32 {
            let msg = format!("aux shape {i}");
            let bytes = fx.signer().sign(&fx.sk, msg.as_bytes()).unwrap();
            let sig = deserialize(&fx.params, &bytes).unwrap();
            let hidden_last = sig.challenge_p.iter().filter(|&&j| j == last).count();
            for proof in sig.proofs.iter().flatten() {
                assert_eq!(proof.aux.is_none(), proof.unopened == last);
            }
            let all_open_len =
                signature_len(&fx.params, &sig.challenge_c, &vec![0u16; sig.challenge_p.len()]);
            assert_eq!(bytes.len(), all_open_len - hidden_last * fx.params.view_size);
            if hidden_last > 0 {
                found = true;
                fx.verifier()
                    .verify(fx.sk.verifying_key(), msg.as_bytes(), &bytes)
                    .unwrap();
                break;
            }
        }
        assert!(found, "no challenge hid the last party in 32 attempts");
    }

    #[test]
    fn l1_roundtrip() {
        let fx = Fixture::new(ParamBundle::picnic3_l1(), 11);
        let msg = b"full-size instance roundtrip";
        let bytes = fx.signer().sign(&fx.sk, msg).unwrap();
        fx.verifier().verify(fx.sk.verifying_key(), msg, &bytes).unwrap();

        let sig = deserialize(&fx.params, &bytes).unwrap();
        assert_eq!(serialize(&fx.params, &sig), bytes);
        assert_eq!(sig.challenge_c.len(), 36);

        let mut bad = bytes.clone();
        bad[0] ^= 1;
        assert!(fx.verifier().verify(fx.sk.verifying_key(), msg, &bad).is_err());
    }
}
