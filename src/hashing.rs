//! SHAKE-backed extendable-output hashing
//!
//! Every hash in the protocol goes through [`Xof`]: seed-tree expansion,
//! tape derivation, the three commitment layers, Merkle nodes and the
//! Fiat–Shamir transcript. The SHAKE variant is chosen by the parameter
//! bundle (SHAKE128 for L1, SHAKE256 for L3/L5).
//!
//! Domain separation is by construction: every use site binds the salt, the
//! repetition index and/or party or node index, in a fixed absorb order, and
//! a handful of sites additionally prepend a one-byte prefix
//! ([`HASH_PREFIX_1`], [`HASH_PREFIX_3`]). All integers are absorbed as
//! little-endian `u16`.
//!
//! [`Xof4`] is the 4-way batched form used on the hot paths (tape
//! derivation, seed commitments, repetition commitments). It presents the
//! batched absorb/squeeze interface as one linearized call sequence; the
//! four lanes are computed sequentially and are digest-for-digest identical
//! to four independent [`Xof`] runs, which the tests pin down.

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake128, Shake128Reader, Shake256, Shake256Reader,
};

use crate::params::{ParamBundle, XofKind};

/// Prefix byte for iterating the challenge digest and expanding seed-tree
/// nodes into their children.
pub const HASH_PREFIX_1: u8 = 1;

/// Prefix byte for hashing Merkle-tree nodes.
pub const HASH_PREFIX_3: u8 = 3;

enum State {
    Absorb128(Shake128),
    Absorb256(Shake256),
    Squeeze128(Shake128Reader),
    Squeeze256(Shake256Reader),
    /// Transient marker while moving between absorb and squeeze.
    Poisoned,
}

/// One incremental SHAKE computation: absorb, finalize, squeeze.
///
/// `update` after the first `squeeze` is a programming error (debug
/// assertion); squeezing may be repeated to draw any amount of output.
pub struct Xof {
    state: State,
}

impl Xof {
    /// Fresh XOF of the instance's SHAKE variant.
    pub fn new(params: &ParamBundle) -> Self {
        let state = match params.xof {
            XofKind::Shake128 => State::Absorb128(Shake128::default()),
            XofKind::Shake256 => State::Absorb256(Shake256::default()),
        };
        Self { state }
    }

    /// Fresh XOF with a one-byte domain-separation prefix already absorbed.
    pub fn new_prefixed(params: &ParamBundle, prefix: u8) -> Self {
        let mut xof = Self::new(params);
        xof.update(&[prefix]);
        xof
    }

    /// Absorb a byte string.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Absorb128(h) => h.update(data),
            State::Absorb256(h) => h.update(data),
            _ => debug_assert!(false, "update after squeeze"),
        }
    }

    /// Absorb a `u16` in little-endian byte order.
    #[inline]
    pub fn update_u16_le(&mut self, v: u16) {
        self.update(&v.to_le_bytes());
    }

    /// Switch from absorbing to squeezing. Called implicitly by the first
    /// `squeeze`; explicit calls are idempotent in release builds.
    pub fn finalize(&mut self) {
        self.state = match std::mem::replace(&mut self.state, State::Poisoned) {
            State::Absorb128(h) => State::Squeeze128(h.finalize_xof()),
            State::Absorb256(h) => State::Squeeze256(h.finalize_xof()),
            s @ (State::Squeeze128(_) | State::Squeeze256(_)) => {
                debug_assert!(false, "finalize called twice");
                s
            }
            State::Poisoned => unreachable!("xof state poisoned"),
        };
    }

    /// Draw `out.len()` bytes of output, finalizing first if needed.
    pub fn squeeze(&mut self, out: &mut [u8]) {
        if matches!(self.state, State::Absorb128(_) | State::Absorb256(_)) {
            self.finalize();
        }
        match &mut self.state {
            State::Squeeze128(r) => r.read(out),
            State::Squeeze256(r) => r.read(out),
            _ => unreachable!("xof state poisoned"),
        }
    }

    /// Convenience: squeeze a fresh `len`-byte vector.
    pub fn squeeze_vec(&mut self, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.squeeze(&mut out);
        out
    }
}

/// Four independent XOF lanes driven by one call sequence.
pub struct Xof4 {
    lanes: [Xof; 4],
}

impl Xof4 {
    /// Four fresh lanes of the instance's SHAKE variant.
    pub fn new(params: &ParamBundle) -> Self {
        Self {
            lanes: [Xof::new(params), Xof::new(params), Xof::new(params), Xof::new(params)],
        }
    }

    /// Absorb the same bytes into every lane.
    pub fn update_all(&mut self, data: &[u8]) {
        for lane in &mut self.lanes {
            lane.update(data);
        }
    }

    /// Absorb one byte string per lane.
    pub fn update_each(&mut self, data: [&[u8]; 4]) {
        for (lane, d) in self.lanes.iter_mut().zip(data) {
            lane.update(d);
        }
    }

    /// Absorb the same `u16` (little-endian) into every lane.
    #[inline]
    pub fn update_u16_le_all(&mut self, v: u16) {
        self.update_all(&v.to_le_bytes());
    }

    /// Absorb one little-endian `u16` per lane.
    pub fn update_u16s_le(&mut self, vs: &[u16; 4]) {
        for (lane, v) in self.lanes.iter_mut().zip(vs) {
            lane.update_u16_le(*v);
        }
    }

    /// Squeeze each lane into its own output buffer.
    pub fn squeeze_each(&mut self, outs: [&mut [u8]; 4]) {
        for (lane, out) in self.lanes.iter_mut().zip(outs) {
            lane.squeeze(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l1() -> ParamBundle {
        ParamBundle::picnic3_l1()
    }

    #[test]
    fn squeeze_is_incremental() {
        let p = l1();
        let mut a = Xof::new(&p);
        a.update(b"incremental");
        let whole = a.squeeze_vec(64);

        let mut b = Xof::new(&p);
        b.update(b"incremental");
        let mut parts = vec![0u8; 64];
        b.squeeze(&mut parts[..10]);
        b.squeeze(&mut parts[10..37]);
        b.squeeze(&mut parts[37..]);
        assert_eq!(whole, parts);
    }

    #[test]
    fn prefix_separates_domains() {
        let p = l1();
        let mut plain = Xof::new(&p);
        plain.update(b"x");
        let mut pre = Xof::new_prefixed(&p, HASH_PREFIX_1);
        pre.update(b"x");
        assert_ne!(plain.squeeze_vec(32), pre.squeeze_vec(32));
    }

    #[test]
    fn shake_variants_differ() {
        let l1 = ParamBundle::picnic3_l1();
        let l3 = ParamBundle::picnic3_l3();
        let mut a = Xof::new(&l1);
        a.update(b"variant");
        let mut b = Xof::new(&l3);
        b.update(b"variant");
        assert_ne!(a.squeeze_vec(32), b.squeeze_vec(32));
    }

    #[test]
    fn batched_lanes_match_single_lanes() {
        let p = l1();
        let inputs: [&[u8]; 4] = [b"lane-0", b"lane-1!", b"lane-two", b"lane-three"];
        let salt = [0x5a_u8; 32];

        let mut x4 = Xof4::new(&p);
        x4.update_each(inputs);
        x4.update_all(&salt);
        x4.update_u16_le_all(7);
        x4.update_u16s_le(&[4, 5, 6, 7]);
        let mut batched = [[0u8; 48]; 4];
        {
            let [b0, b1, b2, b3] = &mut batched;
            x4.squeeze_each([
                b0.as_mut_slice(),
                b1.as_mut_slice(),
                b2.as_mut_slice(),
                b3.as_mut_slice(),
            ]);
        }

        for (i, input) in inputs.iter().enumerate() {
            let mut single = Xof::new(&p);
            single.update(input);
            single.update(&salt);
            single.update_u16_le(7);
            single.update_u16_le(4 + i as u16);
            assert_eq!(single.squeeze_vec(48), batched[i], "lane {i}");
        }
    }
}
