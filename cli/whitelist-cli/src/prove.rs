use anyhow::{Context, Result};
use clap::Args;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use whitelist_cli::{
    encode_leaf, hex_encode, parse_address, parse_hash, write_file_atomic, Address, MerkleTree,
    Position, Proof, ProofStep, WhitelistError,
};

use crate::build_tree::{load_addresses, load_tree};

/// Generate an inclusion proof for one address
#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["input", "tree"])))]
pub struct Cli {
    /// Address list to build the tree from
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Merkle tree file written by `build-tree`
    #[arg(short, long)]
    tree: Option<PathBuf>,

    /// Address to prove
    #[arg(short, long)]
    address: String,

    /// Output JSON file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepOutput {
    Sibling { hash: String, position: Position },
    Carried,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofOutput {
    pub address: Address,
    pub leaf: String,
    pub root: String,
    /// Sibling hashes only, the shape a sorted-pair contract verifier takes
    pub proof: Vec<String>,
    pub steps: Vec<StepOutput>,
}

impl ProofOutput {
    pub fn new(address: Address, tree: &MerkleTree, proof: &Proof) -> Self {
        let steps = proof
            .steps()
            .iter()
            .map(|step| match step {
                ProofStep::Sibling { hash, position } => StepOutput::Sibling {
                    hash: hex_encode(hash),
                    position: *position,
                },
                ProofStep::Carried => StepOutput::Carried,
            })
            .collect();

        Self {
            address,
            leaf: hex_encode(encode_leaf(&address)),
            root: tree.root_hex(),
            proof: proof.siblings().iter().map(hex_encode).collect(),
            steps,
        }
    }

    /// Decode the step list back into a [`Proof`].
    pub fn to_proof(&self) -> Result<Proof> {
        let steps = self
            .steps
            .iter()
            .map(|step| match step {
                StepOutput::Sibling { hash, position } => Ok(ProofStep::Sibling {
                    hash: parse_hash(hash)?,
                    position: *position,
                }),
                StepOutput::Carried => Ok(ProofStep::Carried),
            })
            .collect::<Result<Vec<_>, WhitelistError>>()
            .context("Invalid proof step")?;
        Ok(Proof::new(steps))
    }
}

fn load_source(cli: &Cli) -> Result<MerkleTree> {
    if let Some(tree_path) = &cli.tree {
        info!("Loading Merkle tree from {:?}...", tree_path);
        return load_tree(tree_path);
    }
    let input = cli
        .input
        .as_ref()
        .context("Either --input or --tree is required")?;
    info!("Reading addresses from {:?}...", input);
    let addresses = load_addresses(input)?;
    MerkleTree::build(addresses).context("Failed to build tree")
}

pub fn generate(tree: &MerkleTree, address: Address) -> Result<ProofOutput> {
    let proof = match tree.proof(&address) {
        Ok(proof) => proof,
        Err(WhitelistError::AddressNotFound(_)) => {
            anyhow::bail!("address {} not in whitelist", address)
        }
        Err(e) => return Err(e.into()),
    };
    Ok(ProofOutput::new(address, tree, &proof))
}

pub fn run(cli: &Cli) -> Result<()> {
    let address = parse_address(&cli.address).context("Invalid address")?;
    let tree = load_source(cli)?;
    info!(
        "Tree has {} leaves, root {}",
        tree.leaf_count(),
        tree.root_hex()
    );

    let output = generate(&tree, address)?;
    let json = serde_json::to_string_pretty(&output).context("Failed to serialize proof")?;

    match &cli.output {
        Some(path) => {
            info!("Writing proof to {:?}...", path);
            write_file_atomic(path, &json).context("Failed to write proof file")?;
            println!("Proof length: {} nodes", output.proof.len());
        }
        None => println!("{}", json),
    }

    Ok(())
}
