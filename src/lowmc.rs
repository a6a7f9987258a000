//! LowMC and its two MPC-in-the-Head evaluation modes
//!
//! Three ways to walk the same cipher:
//!
//! - [`Lowmc::encrypt`]: the plain evaluation, used by key generation.
//! - [`Lowmc::compute_aux`]: the pre-processing pass. It runs over the XOR
//!   parity of all N tapes, and at every AND gate corrects the last party's
//!   and-helper bit so the combined helper equals the AND of the combined
//!   input masks. The corrections are recorded in `tapes.aux_bits`.
//! - [`Lowmc::simulate_online`]: the online N-party pass. The state is
//!   public (masked); the masks are tracked as bitsliced per-party shares,
//!   one `u64` word per state bit with one bit lane per party. Each AND
//!   gate broadcasts one bit per party into the message logs, and the run
//!   ends with the output-mask broadcast that unmasks the result for
//!   comparison against the public key.
//!
//! The linear layers, key matrices and round constants are public instance
//! constants, expanded once from a domain-tagged XOF at construction.
//! State bits and mask shares are secret: every bit operation below is
//! branch-free and index-free with respect to them.

#![allow(missing_docs)] // Error variants carry their text in `#[error]` attributes.

use subtle::ConstantTimeEq;

use crate::params::ParamBundle;
use crate::tape::{get_bit, mask_trailing_bits, parity64, set_bit, RandomTapes};

/// Failures surfaced by the MPC evaluation modes.
#[derive(Debug, thiserror::Error)]
pub enum LowmcError {
    #[error("online simulation output disagrees with the public key")]
    OutputMismatch,
}

// ============================================================================
// Bit blocks
// ============================================================================

/// One cipher state: up to 255 bits, bit `i` at word `i/64`, lane `i%64`.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Block([u64; 4]);

impl Block {
    #[inline]
    fn zero() -> Self {
        Self([0; 4])
    }

    #[inline]
    fn get(&self, i: usize) -> u8 {
        ((self.0[i >> 6] >> (i & 63)) & 1) as u8
    }

    #[inline]
    fn set(&mut self, i: usize, b: u8) {
        let w = &mut self.0[i >> 6];
        let shift = i & 63;
        *w = (*w & !(1u64 << shift)) | (u64::from(b & 1) << shift);
    }

    #[inline]
    fn xor_assign(&mut self, other: &Block) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a ^= *b;
        }
    }

    /// Parity of the AND of two blocks: one row of a matrix product.
    #[inline]
    fn and_parity(&self, other: &Block) -> u8 {
        let mut ones = 0u32;
        for (a, b) in self.0.iter().zip(&other.0) {
            ones ^= (a & b).count_ones();
        }
        (ones & 1) as u8
    }

    /// Read `n` MSB-first bits from a byte buffer.
    fn from_bits(bytes: &[u8], n: usize) -> Self {
        let mut block = Self::zero();
        for i in 0..n {
            block.set(i, get_bit(bytes, i));
        }
        block
    }

    /// Write `n` MSB-first bits into a byte buffer.
    fn to_bits(&self, out: &mut [u8], n: usize) {
        for i in 0..n {
            set_bit(out, i, self.get(i));
        }
    }
}

/// `mat · v` over GF(2); `mat` is one [`Block`] row per output bit.
fn mat_mul(mat: &[Block], v: &Block) -> Block {
    let mut out = Block::zero();
    for (i, row) in mat.iter().enumerate() {
        out.set(i, row.and_parity(v));
    }
    out
}

/// `mat · shares` where each element of `shares` is a word of N party bits.
/// The inner iteration follows the public matrix only.
fn mat_mul_shares(mat: &[Block], shares: &[u64]) -> Vec<u64> {
    let mut out = Vec::with_capacity(mat.len());
    for row in mat {
        let mut acc = 0u64;
        for (wi, &w) in row.0.iter().enumerate() {
            let mut bits = w;
            while bits != 0 {
                acc ^= shares[wi * 64 + bits.trailing_zeros() as usize];
                bits &= bits - 1;
            }
        }
        out.push(acc);
    }
    out
}

// ============================================================================
// Message logs
// ============================================================================

/// Per-party broadcast logs for one repetition, with the shared bit cursor.
pub struct Msgs {
    /// One `view_size`-byte log per party.
    pub msgs: Vec<Vec<u8>>,
    /// Shared bit cursor; all parties broadcast in lockstep.
    pub pos: usize,
    /// During verification, the party whose log is replayed rather than
    /// recomputed.
    pub unopened: Option<usize>,
}

impl Msgs {
    /// Fresh zeroed logs for all N parties.
    pub fn new(params: &ParamBundle) -> Self {
        Self {
            msgs: vec![vec![0u8; params.view_size]; params.num_parties],
            pos: 0,
            unopened: None,
        }
    }

    /// Broadcast one bit per party: write each computed bit into its log,
    /// except the unopened party whose bit is read back from its slot.
    /// Returns the word with the unopened lane substituted.
    fn broadcast(&mut self, word: u64, num_parties: usize) -> u64 {
        let mut out = word;
        for j in 0..num_parties {
            if self.unopened == Some(j) {
                let b = get_bit(&self.msgs[j], self.pos);
                out = (out & !(1u64 << j)) | (u64::from(b) << j);
            } else {
                set_bit(&mut self.msgs[j], self.pos, ((word >> j) & 1) as u8);
            }
        }
        self.pos += 1;
        out
    }
}

// ============================================================================
// The cipher
// ============================================================================

/// A LowMC instance: dimensions plus expanded public constants.
pub struct Lowmc {
    n: usize,
    sboxes: usize,
    rounds: usize,
    linear: Vec<Vec<Block>>,
    key_mats: Vec<Vec<Block>>,
    round_consts: Vec<Block>,
}

/// Expand `rows` rows of `n` bits from the instance constant generator.
fn expand_rows(params: &ParamBundle, tag: u8, index: usize, rows: usize) -> Vec<Block> {
    let n = params.state_bits;
    let mut xof = crate::hashing::Xof::new(params);
    xof.update(b"lowmc-constants");
    xof.update(&[tag]);
    xof.update_u16_le(n as u16);
    xof.update_u16_le(index as u16);
    let mut buf = vec![0u8; (n + 7) / 8];
    (0..rows)
        .map(|_| {
            xof.squeeze(&mut buf);
            mask_trailing_bits(&mut buf, n);
            Block::from_bits(&buf, n)
        })
        .collect()
}

const TAG_LINEAR: u8 = 0;
const TAG_KEY: u8 = 1;
const TAG_CONST: u8 = 2;

impl Lowmc {
    /// Expand the instance constants for a parameter bundle.
    pub fn new(params: &ParamBundle) -> Self {
        let n = params.state_bits;
        let r = params.lowmc_rounds;
        Self {
            n,
            sboxes: params.num_sboxes,
            rounds: r,
            linear: (0..r).map(|i| expand_rows(params, TAG_LINEAR, i, n)).collect(),
            key_mats: (0..=r).map(|i| expand_rows(params, TAG_KEY, i, n)).collect(),
            round_consts: (0..r)
                .map(|i| expand_rows(params, TAG_CONST, i, 1)[0])
                .collect(),
        }
    }

    /// S-box layer on a plain state.
    fn sbox_plain(&self, st: &mut Block) {
        for s in 0..self.sboxes {
            let (ia, ib, ic) = (3 * s, 3 * s + 1, 3 * s + 2);
            let (a, b, c) = (st.get(ia), st.get(ib), st.get(ic));
            st.set(ia, a ^ (b & c));
            st.set(ib, a ^ b ^ (a & c));
            st.set(ic, a ^ b ^ c ^ (a & b));
        }
    }

    /// Plain LowMC encryption of one block.
    pub fn encrypt(&self, key: &[u8], plaintext: &[u8], ciphertext: &mut [u8]) {
        let k = Block::from_bits(key, self.n);
        let mut st = Block::from_bits(plaintext, self.n);
        st.xor_assign(&mat_mul(&self.key_mats[0], &k));
        for round in 0..self.rounds {
            self.sbox_plain(&mut st);
            st = mat_mul(&self.linear[round], &st);
            st.xor_assign(&self.round_consts[round]);
            st.xor_assign(&mat_mul(&self.key_mats[round + 1], &k));
        }
        ciphertext.fill(0);
        st.to_bits(ciphertext, self.n);
    }

    /// Pre-processing: walk the cipher over the tape parity and correct the
    /// last party's and-helper bits so every AND-gate mask invariant holds.
    ///
    /// On return `tapes.aux_bits` holds the corrections, the last party's
    /// tape has them applied in place, and `tapes.pos` is reset so the
    /// online pass consumes the same mask stream. If `input_masks` is given
    /// it receives the combined key mask (`n` bits, padding zeroed).
    pub fn compute_aux(
        &self,
        params: &ParamBundle,
        tapes: &mut RandomTapes,
        mut input_masks: Option<&mut [u8]>,
    ) {
        let parity = tapes.parity_tapes();
        let key_mask = Block::from_bits(&parity, self.n);
        if let Some(out) = input_masks.as_deref_mut() {
            out.fill(0);
            key_mask.to_bits(out, self.n);
        }

        tapes.pos = params.state_bits;
        tapes.aux_pos = 0;
        tapes.aux_bits.fill(0);
        let last = params.num_parties - 1;

        let mut mask = mat_mul(&self.key_mats[0], &key_mask);
        for round in 0..self.rounds {
            let mut out_mask = mask;
            for s in 0..self.sboxes {
                let (ia, ib, ic) = (3 * s, 3 * s + 1, 3 * s + 2);
                let (la, lb, lc) = (mask.get(ia), mask.get(ib), mask.get(ic));
                let g_bc = aux_and(lb & lc, tapes, &parity, last);
                let g_ca = aux_and(lc & la, tapes, &parity, last);
                let g_ab = aux_and(la & lb, tapes, &parity, last);
                out_mask.set(ia, la ^ g_bc);
                out_mask.set(ib, la ^ lb ^ g_ca);
                out_mask.set(ic, la ^ lb ^ lc ^ g_ab);
            }
            mask = mat_mul(&self.linear[round], &out_mask);
            mask.xor_assign(&mat_mul(&self.key_mats[round + 1], &key_mask));
        }
        tapes.pos = 0;
    }

    /// Online phase: simulate all N parties on a masked key, filling the
    /// message logs, and check the unmasked output against the public key.
    pub fn simulate_online(
        &self,
        params: &ParamBundle,
        masked_key: &[u8],
        tapes: &mut RandomTapes,
        msgs: &mut Msgs,
        plaintext: &[u8],
        pub_key: &[u8],
    ) -> Result<(), LowmcError> {
        let n = self.n;
        tapes.pos = 0;
        let key_shares: Vec<u64> = (0..n).map(|_| tapes.tapes_to_word()).collect();

        let mk = Block::from_bits(masked_key, n);
        let mut st = Block::from_bits(plaintext, n);
        st.xor_assign(&mat_mul(&self.key_mats[0], &mk));
        let mut shares = mat_mul_shares(&self.key_mats[0], &key_shares);

        for round in 0..self.rounds {
            for s in 0..self.sboxes {
                let (ia, ib, ic) = (3 * s, 3 * s + 1, 3 * s + 2);
                let (ah, bh, ch) = (st.get(ia), st.get(ib), st.get(ic));
                let (la, lb, lc) = (shares[ia], shares[ib], shares[ic]);
                let (z_bc, g_bc) = mpc_and(bh, ch, lb, lc, tapes, msgs, params.num_parties);
                let (z_ca, g_ca) = mpc_and(ch, ah, lc, la, tapes, msgs, params.num_parties);
                let (z_ab, g_ab) = mpc_and(ah, bh, la, lb, tapes, msgs, params.num_parties);
                st.set(ia, ah ^ z_bc);
                st.set(ib, ah ^ bh ^ z_ca);
                st.set(ic, ah ^ bh ^ ch ^ z_ab);
                shares[ia] = la ^ g_bc;
                shares[ib] = la ^ lb ^ g_ca;
                shares[ic] = la ^ lb ^ lc ^ g_ab;
            }
            st = mat_mul(&self.linear[round], &st);
            st.xor_assign(&self.round_consts[round]);
            st.xor_assign(&mat_mul(&self.key_mats[round + 1], &mk));
            let mut next = mat_mul_shares(&self.linear[round], &shares);
            for (a, b) in next.iter_mut().zip(mat_mul_shares(&self.key_mats[round + 1], &key_shares)) {
                *a ^= b;
            }
            shares = next;
        }

        // Output-mask broadcast, then unmask and compare.
        let mut out = Block::zero();
        for (i, &share) in shares.iter().enumerate() {
            let w = msgs.broadcast(share, params.num_parties);
            out.set(i, st.get(i) ^ parity64(w));
        }
        let mut out_bytes = vec![0u8; params.io_size];
        out.to_bits(&mut out_bytes, n);
        if bool::from(out_bytes.as_slice().ct_eq(pub_key)) {
            Ok(())
        } else {
            Err(LowmcError::OutputMismatch)
        }
    }
}

/// One AND gate of the pre-processing pass. Returns the combined fresh
/// output mask; corrects and records the last party's helper bit.
fn aux_and(desired: u8, tapes: &mut RandomTapes, parity: &[u8], last: usize) -> u8 {
    let fresh = get_bit(parity, tapes.pos);
    let helper = get_bit(parity, tapes.pos + 1);
    let pos = tapes.pos;
    let fixed = get_bit(&tapes.tape[last], pos + 1) ^ helper ^ desired;
    set_bit(&mut tapes.tape[last], pos + 1, fixed);
    let aux_pos = tapes.aux_pos;
    set_bit(&mut tapes.aux_bits, aux_pos, fixed);
    tapes.aux_pos += 1;
    tapes.pos += 2;
    fresh
}

/// One AND gate of the online phase. Each party's broadcast bit is
/// `x̂·λy_j ⊕ ŷ·λx_j ⊕ helper_j ⊕ fresh_j`; the reconstructed parity
/// unmasks the gate output under its fresh mask.
fn mpc_and(
    xh: u8,
    yh: u8,
    lx: u64,
    ly: u64,
    tapes: &mut RandomTapes,
    msgs: &mut Msgs,
    num_parties: usize,
) -> (u8, u64) {
    let fresh = tapes.tapes_to_word();
    let helper = tapes.tapes_to_word();
    let xm = 0u64.wrapping_sub(u64::from(xh));
    let ym = 0u64.wrapping_sub(u64::from(yh));
    let s = msgs.broadcast((xm & ly) ^ (ym & lx) ^ helper ^ fresh, num_parties);
    ((xh & yh) ^ parity64(s), fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::XofKind;

    fn tiny() -> ParamBundle {
        ParamBundle::new(XofKind::Shake128, 9, 3, 2, 16, 31, 8, 16, 32).unwrap()
    }

    fn tapes_for(p: &ParamBundle, t: usize) -> RandomTapes {
        let seeds: Vec<Vec<u8>> = (0..p.num_parties)
            .map(|j| vec![(t as u8) ^ (j as u8).wrapping_mul(31); p.seed_size])
            .collect();
        let refs: Vec<&[u8]> = seeds.iter().map(|s| s.as_slice()).collect();
        RandomTapes::derive(p, &refs, &[0x11; 32], t)
    }

    #[test]
    fn encrypt_depends_on_key_and_plaintext() {
        let p = tiny();
        let lowmc = Lowmc::new(&p);
        let pt = [0x55, 0x80];

        // Sweep keys and plaintexts; the cipher must not collapse.
        let mut by_key = std::collections::HashSet::new();
        let mut by_pt = std::collections::HashSet::new();
        for v in 0..16u8 {
            let mut ct = vec![0u8; p.io_size];
            lowmc.encrypt(&[v << 4, 0x00], &pt, &mut ct);
            assert!(crate::tape::padding_bits_zero(&ct, p.state_bits));
            by_key.insert(ct);
            let mut ct2 = vec![0u8; p.io_size];
            lowmc.encrypt(&[0x80, 0x00], &[v << 4, 0x00], &mut ct2);
            by_pt.insert(ct2);
        }
        assert!(by_key.len() > 8, "key input barely affects the output");
        assert!(by_pt.len() > 8, "plaintext input barely affects the output");

        // Deterministic.
        let mut a = vec![0u8; p.io_size];
        let mut b = vec![0u8; p.io_size];
        lowmc.encrypt(&[0x80, 0x00], &pt, &mut a);
        lowmc.encrypt(&[0x80, 0x00], &pt, &mut b);
        assert_eq!(a, b);
    }

    /// After pre-processing, the shared evaluation on `key ⊕ key_mask`
    /// reproduces the plain LowMC output.
    #[test]
    fn aux_correction_makes_shared_evaluation_consistent() {
        let p = tiny();
        let lowmc = Lowmc::new(&p);
        let mut tapes = tapes_for(&p, 5);

        let mut key_mask = vec![0u8; p.io_size];
        lowmc.compute_aux(&p, &mut tapes, Some(&mut key_mask));

        let key = {
            let mut k = vec![0u8; p.io_size];
            k[0] = 0b1011_0110;
            k[1] = 0b1000_0000;
            k
        };
        let plaintext = {
            let mut pt = vec![0u8; p.io_size];
            pt[0] = 0b0101_1010;
            pt
        };
        let mut pub_key = vec![0u8; p.io_size];
        lowmc.encrypt(&key, &plaintext, &mut pub_key);

        let masked_key: Vec<u8> = key.iter().zip(&key_mask).map(|(a, b)| a ^ b).collect();
        let mut msgs = Msgs::new(&p);
        lowmc
            .simulate_online(&p, &masked_key, &mut tapes, &mut msgs, &plaintext, &pub_key)
            .unwrap();
        assert_eq!(msgs.pos, p.msgs_bits());
        for log in &msgs.msgs {
            assert!(crate::tape::padding_bits_zero(log, p.msgs_bits()));
        }

        // A wrong public key is flagged.
        let mut tapes2 = tapes_for(&p, 5);
        lowmc.compute_aux(&p, &mut tapes2, None);
        let mut bad = pub_key.clone();
        bad[0] ^= 0x80;
        let mut msgs2 = Msgs::new(&p);
        assert!(matches!(
            lowmc.simulate_online(&p, &masked_key, &mut tapes2, &mut msgs2, &plaintext, &bad),
            Err(LowmcError::OutputMismatch)
        ));
    }

    /// Replaying one party's log over zeroed tapes reproduces the full
    /// signer transcript, for every choice of unopened party.
    #[test]
    fn verifier_replay_matches_signer_transcript() {
        let p = tiny();
        let lowmc = Lowmc::new(&p);

        // Signer side.
        let mut tapes = tapes_for(&p, 9);
        let mut key_mask = vec![0u8; p.io_size];
        lowmc.compute_aux(&p, &mut tapes, Some(&mut key_mask));
        let key = vec![0b0100_0101, 0b1000_0000];
        let plaintext = vec![0b1110_0001, 0x00];
        let mut pub_key = vec![0u8; p.io_size];
        lowmc.encrypt(&key, &plaintext, &mut pub_key);
        let masked_key: Vec<u8> = key.iter().zip(&key_mask).map(|(a, b)| a ^ b).collect();
        let mut msgs = Msgs::new(&p);
        lowmc
            .simulate_online(&p, &masked_key, &mut tapes, &mut msgs, &plaintext, &pub_key)
            .unwrap();
        let aux = tapes.aux_bits.clone();

        for unopened in [0usize, 7, p.num_parties - 1] {
            let mut replay_tapes = tapes_for(&p, 9);
            if unopened != p.num_parties - 1 {
                replay_tapes.set_aux_bits(&p, &aux);
            }
            replay_tapes.zero_party(unopened);
            let mut replay = Msgs::new(&p);
            replay.unopened = Some(unopened);
            replay.msgs[unopened].copy_from_slice(&msgs.msgs[unopened]);
            lowmc
                .simulate_online(
                    &p,
                    &masked_key,
                    &mut replay_tapes,
                    &mut replay,
                    &plaintext,
                    &pub_key,
                )
                .unwrap();
            assert_eq!(replay.msgs, msgs.msgs, "unopened = {unopened}");
        }
    }
}
