//! CLI signer
//!
//! Reads a keypair written by `keygen`, signs a message file, and writes
//! the raw signature bytes.

#![forbid(unsafe_code)]

use std::{env, fs};

use picnic3::{lowmc::Lowmc, ParamBundle, Signer, SigningKey, VerifyingKey};
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

fn read_hex_lines(path: &str, want: usize) -> anyhow::Result<Vec<Vec<u8>>> {
    let text = fs::read_to_string(path).map_err(|e| anyhow::anyhow!("open {path}: {e}"))?;
    let lines: Vec<Vec<u8>> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| hex::decode(l.trim()).map_err(|e| anyhow::anyhow!("bad hex in {path}: {e}")))
        .collect::<Result<_, _>>()?;
    if lines.len() != want {
        return Err(anyhow::anyhow!("{path}: expected {want} hex line(s), got {}", lines.len()));
    }
    Ok(lines)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args: Vec<String> = env::args().collect();
    let level = parse_flag(&args, "--level").unwrap_or_else(|| "l1".to_string());
    let prefix = parse_flag(&args, "--key").unwrap_or_else(|| "picnic3".to_string());
    let message_path = parse_flag(&args, "--message")
        .ok_or_else(|| anyhow::anyhow!("--message <file> is required"))?;
    let out_path = parse_flag(&args, "--out").unwrap_or_else(|| "signature.bin".to_string());

    let params = level_params(&level)?;
    let lowmc = Lowmc::new(&params);

    let mut pk = read_hex_lines(&format!("{prefix}.pk"), 2)?;
    let plaintext = pk.pop().expect("two lines checked");
    let ciphertext = pk.pop().expect("two lines checked");
    let vk = VerifyingKey::from_parts(&params, ciphertext, plaintext)
        .map_err(|e| anyhow::anyhow!("bad public key: {e}"))?;
    let mut sk_lines = read_hex_lines(&format!("{prefix}.sk"), 1)?;
    let sk = SigningKey::from_parts(&params, sk_lines.pop().expect("one line checked"), vk)
        .map_err(|e| anyhow::anyhow!("bad secret key: {e}"))?;

    let message = fs::read(&message_path)
        .map_err(|e| anyhow::anyhow!("open {message_path}: {e}"))?;

    let signer = Signer { params: &params, lowmc: &lowmc };
    let signature = signer.sign(&sk, &message).map_err(|e| anyhow::anyhow!("signing failed: {e}"))?;
    fs::write(&out_path, &signature).map_err(|e| anyhow::anyhow!("write {out_path}: {e}"))?;

    eprintln!("Signed {} bytes -> {} ({} signature bytes)", message.len(), out_path, signature.len());
    Ok(())
}
