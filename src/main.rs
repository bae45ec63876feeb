use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use treefile::bst::BstTree;
use treefile::{load_arena, load_heap, read_header_from_path, save_to_path};

#[derive(Parser, Debug)]
#[command(name = "treefile", about = "Persist binary trees to flat files and rebuild them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a sample ordered tree and persist it.
    Build {
        /// Output file for the persisted tree.
        out: PathBuf,
        /// Number of sequential keys in the sample tree.
        #[arg(long, default_value_t = 10)]
        count: u64,
    },
    /// Load a persisted tree and print its nodes in key order.
    Show {
        /// Persisted tree file.
        file: PathBuf,
        /// Reconstruction strategy.
        #[arg(long, value_enum, default_value = "heap")]
        strategy: Strategy,
    },
    /// Print the file header of a persisted tree.
    Inspect {
        /// Persisted tree file.
        file: PathBuf,
    },
    /// Rebuild with both strategies and check they agree.
    Verify {
        /// Persisted tree file.
        file: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Strategy {
    /// One contiguous allocation backing all nodes.
    Arena,
    /// One allocation per node.
    Heap,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { out, count } => run_build(out, count)?,
        Commands::Show { file, strategy } => run_show(file, strategy)?,
        Commands::Inspect { file } => run_inspect(file)?,
        Commands::Verify { file } => run_verify(file)?,
    }

    Ok(())
}

fn run_build(out: PathBuf, count: u64) -> Result<()> {
    let tree = BstTree::sample(count);
    print_tree(&tree);

    let written = save_to_path(&out, BstTree::layout(), tree.root())
        .with_context(|| format!("failed to persist tree to {}", out.display()))?;
    println!("saved {} nodes to {}", written, out.display());
    Ok(())
}

fn run_show(file: PathBuf, strategy: Strategy) -> Result<()> {
    let tree = rebuild(&file, strategy)?;
    match tree {
        Some(tree) => print_tree(&tree),
        None => println!("{}: no tree in this file", file.display()),
    }
    Ok(())
}

fn run_inspect(file: PathBuf) -> Result<()> {
    let header = read_header_from_path(&file)
        .with_context(|| format!("failed to read header of {}", file.display()))?;
    println!("magic:       {}", String::from_utf8_lossy(&header.magic));
    println!("link_offset: {}", header.link_offset);
    println!("total_count: {}", header.total_count);
    println!("record_size: {}", header.record_size);
    Ok(())
}

fn run_verify(file: PathBuf) -> Result<()> {
    let via_arena = rebuild(&file, Strategy::Arena)?;
    let via_heap = rebuild(&file, Strategy::Heap)?;

    let profiles = (
        via_arena.map(|tree| tree.preorder_profile()),
        via_heap.map(|tree| tree.preorder_profile()),
    );
    match profiles {
        (None, None) => println!("{}: empty tree, strategies agree", file.display()),
        (Some(arena), Some(heap)) if arena == heap => {
            println!("{}: strategies agree on {} nodes", file.display(), (arena.len() - 1) / 2)
        }
        _ => bail!("arena and heap reconstructions disagree for {}", file.display()),
    }
    Ok(())
}

fn rebuild(file: &Path, strategy: Strategy) -> Result<Option<BstTree>> {
    let rebuilt = match strategy {
        Strategy::Arena => {
            let tree = load_arena(file)
                .with_context(|| format!("failed to rebuild tree from {}", file.display()))?;
            match tree {
                Some(tree) => Some(BstTree::from_source(tree.layout(), tree.root())?),
                None => None,
            }
        }
        Strategy::Heap => {
            let tree = load_heap(file)
                .with_context(|| format!("failed to rebuild tree from {}", file.display()))?;
            match tree {
                Some(tree) => Some(BstTree::from_source(tree.layout(), tree.root())?),
                None => None,
            }
        }
    };
    Ok(rebuilt)
}

fn print_tree(tree: &BstTree) {
    tree.visit_in_order(&mut |node| {
        println!("data:{}\tlabel:{}", node.key(), node.label());
    });
}
