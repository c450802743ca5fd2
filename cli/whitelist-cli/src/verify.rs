use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

use whitelist_cli::{encode_leaf, hex_encode, parse_address, parse_hash, verify};

use crate::prove::ProofOutput;

/// Check a proof file against a Merkle root
#[derive(Args, Debug)]
pub struct Cli {
    /// Proof JSON file written by `prove`
    #[arg(short, long)]
    proof: PathBuf,

    /// Expected Merkle root (defaults to the root recorded in the proof file)
    #[arg(short, long)]
    root: Option<String>,

    /// Address to check (defaults to the address recorded in the proof file)
    #[arg(short, long)]
    address: Option<String>,
}

/// Returns whether the proof in `output` holds for the given address and root.
pub fn check(output: &ProofOutput, address: Option<&str>, root: Option<&str>) -> Result<bool> {
    let address = match address {
        Some(a) => parse_address(a).context("Invalid address")?,
        None => output.address,
    };
    let expected_root = parse_hash(root.unwrap_or(&output.root)).context("Invalid Merkle root")?;
    let leaf = encode_leaf(&address);

    if address == output.address && hex_encode(leaf) != output.leaf.to_lowercase() {
        warn!(
            "Recorded leaf {} does not match leaf of {}",
            output.leaf, address
        );
    }

    let proof = output.to_proof()?;

    let flat = output
        .proof
        .iter()
        .map(|h| parse_hash(h))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid proof entry")?;
    if flat != proof.siblings() {
        warn!("Flat proof list does not match the sibling steps");
        return Ok(false);
    }

    Ok(verify(&leaf, &proof, &expected_root))
}

pub fn run(cli: &Cli) -> Result<()> {
    info!("Reading proof from {:?}...", cli.proof);
    let content = fs::read_to_string(&cli.proof).context("Failed to read proof file")?;
    let output: ProofOutput =
        serde_json::from_str(&content).context("Failed to parse proof JSON")?;

    if check(&output, cli.address.as_deref(), cli.root.as_deref())? {
        println!("valid");
        Ok(())
    } else {
        println!("invalid");
        anyhow::bail!("proof does not lead to the expected root")
    }
}
