use anyhow::{Context, Result};
use clap::Args;
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use whitelist_cli::{
    hex_encode, parse_hash, read_address_list, write_file_atomic, Address, Hash, MerkleTree,
};

/// Build the Merkle tree of a whitelist
#[derive(Args, Debug)]
pub struct Cli {
    /// Input file containing Ethereum addresses (one per line)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file for Merkle root
    #[arg(short, long)]
    root_output: PathBuf,

    /// Output file for Merkle tree (one `layer:index:hash` line per node)
    #[arg(short, long)]
    tree_output: Option<PathBuf>,

    /// Output JSON file mapping each address to its leaf index
    #[arg(short = 'x', long)]
    index_output: Option<PathBuf>,
}

pub fn load_addresses(path: &Path) -> Result<Vec<Address>> {
    let file = File::open(path).context("Failed to open input file")?;
    read_address_list(BufReader::new(file))
}

pub fn render_tree(tree: &MerkleTree) -> String {
    let mut out = String::new();
    for (level_num, level) in tree.layers().iter().enumerate() {
        for (i, hash) in level.iter().enumerate() {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{}:{}:{}", level_num, i, hex_encode(hash));
        }
    }
    out
}

pub fn load_tree(path: &Path) -> Result<MerkleTree> {
    let file = File::open(path).context("Failed to open Merkle tree file")?;
    let reader = BufReader::new(file);

    let mut level_entries: Vec<HashMap<usize, Hash>> = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 3 {
            anyhow::bail!(
                "Invalid format at line {}: expected 'layer:index:hash', got '{}'",
                line_num + 1,
                trimmed
            );
        }
        let level: usize = parts[0].parse().context("Invalid layer format")?;
        let index: usize = parts[1].parse().context("Invalid index format")?;
        let hash = parse_hash(parts[2]).context("Invalid hash format")?;

        // Layers are dumped in order, so a new layer number is at most one
        // past the last one seen.
        if level > level_entries.len() {
            anyhow::bail!(
                "Layer {} at line {} appears before layer {}",
                level,
                line_num + 1,
                level_entries.len()
            );
        }
        if level == level_entries.len() {
            level_entries.push(HashMap::new());
        }
        if level_entries[level].insert(index, hash).is_some() {
            anyhow::bail!("Duplicate entry at layer {}, index {}", level, index);
        }
    }

    let mut layers: Vec<Vec<Hash>> = Vec::with_capacity(level_entries.len());
    for (level_num, level_map) in level_entries.into_iter().enumerate() {
        let mut level = Vec::with_capacity(level_map.len());
        for i in 0..level_map.len() {
            let hash = level_map
                .get(&i)
                .with_context(|| format!("Layer {} is missing index {}", level_num, i))?;
            level.push(*hash);
        }
        layers.push(level);
    }

    MerkleTree::from_layers(layers).context("Merkle tree file is inconsistent")
}

pub fn run(cli: &Cli) -> Result<()> {
    info!("Reading addresses from {:?}...", cli.input);
    let addresses = load_addresses(&cli.input)?;
    info!("Total addresses: {}", addresses.len());

    info!("Building Merkle tree...");
    let tree = MerkleTree::build(addresses.iter().copied()).context("Failed to build tree")?;
    if tree.leaf_count() != addresses.len() {
        info!(
            "{} duplicate addresses collapsed, {} leaves",
            addresses.len() - tree.leaf_count(),
            tree.leaf_count()
        );
    }

    println!("Merkle root: {}", tree.root_hex());
    write_file_atomic(&cli.root_output, &format!("{}\n", tree.root_hex()))
        .context("Failed to write root")?;

    if let Some(tree_path) = &cli.tree_output {
        info!("Writing Merkle tree to {:?}...", tree_path);
        write_file_atomic(tree_path, &render_tree(&tree)).context("Failed to write tree")?;
    }

    if let Some(index_path) = &cli.index_output {
        info!("Writing index map to {:?}...", index_path);
        let mut index_map = BTreeMap::new();
        for address in &addresses {
            if let Some(index) = tree.leaf_index(address) {
                index_map.insert(address.to_string(), index);
            }
        }
        let json = serde_json::to_string_pretty(&index_map).context("Failed to serialize index")?;
        write_file_atomic(index_path, &json).context("Failed to write index")?;
    }

    info!("Done!");
    Ok(())
}
