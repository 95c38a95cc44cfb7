use clap::{Parser, Subcommand};
use rotating_bloom_rs::common::{bits2hr, bytes2hr};
use rotating_bloom_rs::{
    BloomConfig, BloomFilter, BloomParams, Filter, FilterRef, HashStrategy,
    MembershipFilter, RotatingBloomFilter, RotatingConfig,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty filter snapshot
    Create {
        /// Path to the snapshot file
        #[arg(short, long)]
        path: PathBuf,

        /// Expected number of elements
        #[arg(short, long, default_value = "10000")]
        capacity: usize,

        /// False positive rate (between 0 and 1)
        #[arg(short, long, default_value = "0.01")]
        fpr: f64,

        /// Hash strategy: "default" or "optimal"
        #[arg(long, default_value = "optimal")]
        hash: HashStrategy,

        /// Rotation period in seconds
        #[arg(long, default_value = "60")]
        ttl: u64,

        /// Create a static filter that never rotates
        #[arg(long = "static")]
        is_static: bool,

        /// Overwrite an existing snapshot
        #[arg(long)]
        force: bool,
    },

    /// Add elements and write the snapshot back
    Add {
        #[arg(short, long)]
        path: PathBuf,

        /// Elements to add
        #[arg(required = true)]
        elements: Vec<String>,
    },

    /// Check elements against a snapshot
    Check {
        #[arg(short, long)]
        path: PathBuf,

        /// Elements to check
        #[arg(required = true)]
        elements: Vec<String>,
    },

    /// Display information about a snapshot
    Info {
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Union another snapshot into the first one
    Merge {
        /// Snapshot that receives the union
        #[arg(short, long)]
        path: PathBuf,

        /// Snapshot to merge in, left untouched
        #[arg(short, long)]
        other: PathBuf,
    },
}

// rotating snapshots start a rotation task when loaded
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            path,
            capacity,
            fpr,
            hash,
            ttl,
            is_static,
            force,
        } => {
            if path.exists() && !force {
                println!("Error: Snapshot already exists at {}", path.display());
                println!("Use --force to overwrite it.");
                return Ok(());
            }

            let bloom = BloomConfig {
                capacity,
                false_positive_rate: fpr,
                hash_strategy: hash,
            };
            let filter = if is_static {
                Filter::Static(BloomFilter::new(bloom.clone())?)
            } else {
                Filter::Rotating(RotatingBloomFilter::new(RotatingConfig {
                    bloom: bloom.clone(),
                    ttl: Duration::from_secs(ttl),
                })?)
            };
            save(&path, &filter)?;

            let params = BloomParams::from(&bloom);
            println!("Created new {} filter at {}", filter.kind(), path.display());
            println!("Configuration:");
            println!("  Capacity: {capacity}");
            println!("  False positive rate: {fpr}");
            println!("  Hash strategy: {hash}");
            if !is_static {
                println!("  TTL: {ttl} seconds");
            }
            println!("  Bit vector size: {}", params.bit_vector_size);
            println!("  Number of hash functions: {}", params.num_hashes);
        }
        Commands::Add { path, elements } => {
            let filter = load(&path)?;
            for element in &elements {
                filter.add(element.as_bytes())?;
            }
            save(&path, &filter)?;
            println!("Added {} elements", elements.len());
        }
        Commands::Check { path, elements } => {
            let filter = load(&path)?;
            for element in &elements {
                if filter.check(element.as_bytes())? {
                    println!("Element '{element}' exists in the filter");
                } else {
                    println!("Element '{element}' does not exist in the filter");
                }
            }
        }
        Commands::Info { path } => {
            let size = std::fs::metadata(&path)?.len() as usize;
            let filter = load(&path)?;
            print_info(&path, size, &filter)?;
        }
        Commands::Merge { path, other } => {
            let filter = load(&path)?;
            let other_filter = load(&other)?;
            let fill_ratio = filter.union(FilterRef::from(&other_filter))?;
            save(&path, &filter)?;
            println!(
                "Merged {} into {} (fill ratio {:.4})",
                other.display(),
                path.display(),
                fill_ratio
            );
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<Filter, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    Ok(Filter::from_bytes(&bytes)?)
}

fn save(path: &Path, filter: &Filter) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, filter.to_bytes()?)?;
    Ok(())
}

fn print_info(
    path: &Path,
    size: usize,
    filter: &Filter,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Bloom Filter Snapshot:");
    println!("  Path: {}", path.display());
    println!("  Size on disk: {}", bytes2hr(size));
    println!("  Kind: {}", filter.kind());

    match filter {
        Filter::Static(bloom) => {
            let config = bloom.config();
            println!("  Capacity: {}", config.capacity);
            println!("  False positive rate: {:.6}", config.false_positive_rate);
            println!("  Hash strategy: {}", config.hash_strategy);
            println!("  Bit vector size: {}", bloom.num_bits());
            println!("  Number of hash functions: {}", bloom.num_hashes());
            println!("  Memory: {}", bits2hr(bloom.num_bits()));
        }
        Filter::Rotating(rotating) => {
            let config = rotating.config()?;
            let (bits, hashes) = rotating.params()?;
            println!("  Capacity: {}", config.bloom.capacity);
            println!(
                "  False positive rate: {:.6}",
                config.bloom.false_positive_rate
            );
            println!("  Hash strategy: {}", config.bloom.hash_strategy);
            println!("  TTL: {:?}", config.ttl);
            println!("  Bit vector size: {bits}");
            println!("  Number of hash functions: {hashes}");
            println!("  Memory (3 gens): {}", bits2hr(bits * 3));

            let [previous, current, next] = rotating.generation_fill_ratios()?;
            println!("\nCurrent State:");
            println!("  Previous fill ratio: {previous:.4}");
            println!("  Current fill ratio: {current:.4}");
            println!("  Next fill ratio: {next:.4}");
        }
        Filter::Empty(_) => {}
    }
    println!("  Fill ratio: {:.4}", filter.fill_ratio()?);
    Ok(())
}
