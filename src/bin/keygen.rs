//! CLI key generation
//!
//! Samples a fresh Picnic3 keypair from the OS RNG and writes it as two hex
//! files: `<prefix>.sk` (the secret cipher key, one line) and `<prefix>.pk`
//! (ciphertext then plaintext, one line each).

#![forbid(unsafe_code)]

use std::{env, fs};

use picnic3::{keygen, lowmc::Lowmc, ParamBundle};
use rand::rngs::OsRng;
use tracing_subscriber::EnvFilter;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn level_params(level: &str) -> anyhow::Result<ParamBundle> {
    match level {
        "l1" => Ok(ParamBundle::picnic3_l1()),
        "l3" => Ok(ParamBundle::picnic3_l3()),
        "l5" => Ok(ParamBundle::picnic3_l5()),
        other => Err(anyhow::anyhow!("unknown level `{other}` (expected l1, l3 or l5)")),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args: Vec<String> = env::args().collect();
    let level = parse_flag(&args, "--level").unwrap_or_else(|| "l1".to_string());
    let prefix = parse_flag(&args, "--out").unwrap_or_else(|| "picnic3".to_string());

    let params = level_params(&level)?;
    let lowmc = Lowmc::new(&params);
    let sk = keygen(&params, &lowmc, &mut OsRng);
    let vk = sk.verifying_key();

    fs::write(format!("{prefix}.sk"), format!("{}\n", hex::encode(sk.to_bytes())))
        .map_err(|e| anyhow::anyhow!("write {prefix}.sk: {e}"))?;
    fs::write(
        format!("{prefix}.pk"),
        format!("{}\n{}\n", hex::encode(&vk.ciphertext), hex::encode(&vk.plaintext)),
    )
    .map_err(|e| anyhow::anyhow!("write {prefix}.pk: {e}"))?;

    eprintln!("Wrote {prefix}.sk and {prefix}.pk ({level})");
    Ok(())
}
