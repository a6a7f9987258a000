//! The three commitment layers
//!
//! - Per-party seed commitments `C[t][j]`, binding the party seed, the salt
//!   and both indices; only the last party's commitment additionally binds
//!   the auxiliary correction.
//! - Per-repetition commitments `Ch[t]` over all N party commitments.
//! - Per-repetition view commitments `Cv[t]` over the masked key and every
//!   party's message log.
//!
//! `C` and `Ch` have 4-way batched forms used on the bulk of the work; the
//! batched digests are bit-identical to the single-lane forms.

use crate::hashing::{Xof, Xof4};
use crate::lowmc::Msgs;
use crate::params::ParamBundle;

/// Commit to one party's seed, optionally binding its aux correction.
pub fn commit_seed(
    params: &ParamBundle,
    seed: &[u8],
    aux: Option<&[u8]>,
    salt: &[u8],
    t: u16,
    j: u16,
) -> Vec<u8> {
    let mut xof = Xof::new(params);
    xof.update(seed);
    if let Some(aux) = aux {
        xof.update(aux);
    }
    xof.update(salt);
    xof.update_u16_le(t);
    xof.update_u16_le(j);
    xof.squeeze_vec(params.digest_size)
}

/// Commit to four consecutive parties' seeds at once (no aux binding).
pub fn commit_seed_x4(
    params: &ParamBundle,
    seeds: [&[u8]; 4],
    salt: &[u8],
    t: u16,
    j: u16,
) -> Vec<Vec<u8>> {
    let mut xof = Xof4::new(params);
    xof.update_each(seeds);
    xof.update_all(salt);
    xof.update_u16_le_all(t);
    xof.update_u16s_le(&[j, j + 1, j + 2, j + 3]);
    let mut out = vec![vec![0u8; params.digest_size]; 4];
    let [o0, o1, o2, o3] = &mut out[..] else {
        unreachable!("four lanes");
    };
    xof.squeeze_each([
        o0.as_mut_slice(),
        o1.as_mut_slice(),
        o2.as_mut_slice(),
        o3.as_mut_slice(),
    ]);
    out
}

/// `Ch[t]`: one digest over all N party commitments of a repetition.
pub fn commit_round(params: &ParamBundle, party_commits: &[Vec<u8>]) -> Vec<u8> {
    debug_assert_eq!(party_commits.len(), params.num_parties);
    let mut xof = Xof::new(params);
    for c in party_commits {
        xof.update(c);
    }
    xof.squeeze_vec(params.digest_size)
}

/// `Ch` for four consecutive repetitions at once.
pub fn commit_round_x4(params: &ParamBundle, quartet: [&[Vec<u8>]; 4]) -> Vec<Vec<u8>> {
    let mut xof = Xof4::new(params);
    for j in 0..params.num_parties {
        xof.update_each([
            quartet[0][j].as_slice(),
            quartet[1][j].as_slice(),
            quartet[2][j].as_slice(),
            quartet[3][j].as_slice(),
        ]);
    }
    let mut out = vec![vec![0u8; params.digest_size]; 4];
    let [o0, o1, o2, o3] = &mut out[..] else {
        unreachable!("four lanes");
    };
    xof.squeeze_each([
        o0.as_mut_slice(),
        o1.as_mut_slice(),
        o2.as_mut_slice(),
        o3.as_mut_slice(),
    ]);
    out
}

/// `Cv[t]`: commit to the masked key and every party's message log.
///
/// All parties' cursors advance in lockstep, so one shared cursor decides
/// how many log bytes are bound.
pub fn commit_views(params: &ParamBundle, input: &[u8], msgs: &Msgs) -> Vec<u8> {
    debug_assert_eq!(msgs.pos, params.msgs_bits());
    let used = (msgs.pos + 7) / 8;
    let mut xof = Xof::new(params);
    xof.update(input);
    for log in &msgs.msgs {
        xof.update(&log[..used]);
    }
    xof.squeeze_vec(params.digest_size)
}
