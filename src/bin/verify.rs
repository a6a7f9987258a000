//! CLI verifier
//!
//! Reads a public key written by `keygen`, a message file and a signature
//! file, and reports acceptance. Exits nonzero on rejection.

#![forbid(unsafe_code)]

use std::{env, fs};

use picnic3::{lowmc::Lowmc, ParamBundle, Verifier, VerifyingKey};
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
    let prefix = parse_flag(&args, "--key").unwrap_or_else(|| "picnic3".to_string());
    let message_path = parse_flag(&args, "--message")
        .ok_or_else(|| anyhow::anyhow!("--message <file> is required"))?;
    let sig_path = parse_flag(&args, "--sig").unwrap_or_else(|| "signature.bin".to_string());

    let params = level_params(&level)?;
    let lowmc = Lowmc::new(&params);

    let pk_path = format!("{prefix}.pk");
    let text = fs::read_to_string(&pk_path).map_err(|e| anyhow::anyhow!("open {pk_path}: {e}"))?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let ciphertext = hex::decode(lines.next().ok_or_else(|| anyhow::anyhow!("{pk_path}: missing ciphertext line"))?.trim())
        .map_err(|e| anyhow::anyhow!("bad hex in {pk_path}: {e}"))?;
    let plaintext = hex::decode(lines.next().ok_or_else(|| anyhow::anyhow!("{pk_path}: missing plaintext line"))?.trim())
        .map_err(|e| anyhow::anyhow!("bad hex in {pk_path}: {e}"))?;
    let vk = VerifyingKey::from_parts(&params, ciphertext, plaintext)
        .map_err(|e| anyhow::anyhow!("bad public key: {e}"))?;

    let message = fs::read(&message_path)
        .map_err(|e| anyhow::anyhow!("open {message_path}: {e}"))?;
    let signature = fs::read(&sig_path).map_err(|e| anyhow::anyhow!("open {sig_path}: {e}"))?;

    let verifier = Verifier { params: &params, lowmc: &lowmc };
    verifier
        .verify(&vk, &message, &signature)
        .map_err(|e| anyhow::anyhow!("verification failed: {e}"))?;

    println!("Verifier result: ok");
    Ok(())
}
