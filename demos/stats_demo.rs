use std::hash::BuildHasher;
use std::hash::Hasher;
use std::hash::RandomState;

use clap::Parser;
use clap::ValueEnum;
use hopscotch_table::GrowthPolicy;
use hopscotch_table::HashTable;
use hopscotch_table::ModGrowthPolicy;
use hopscotch_table::PowerOfTwoGrowthPolicy;
use hopscotch_table::PrimeGrowthPolicy;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    Pow2,
    Prime,
    Mod,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'p', long = "policy", value_enum, default_value_t = Policy::Pow2)]
    policy: Policy,

    #[arg(short = 'l', long = "max_load_factor", default_value_t = 0.95)]
    max_load_factor: f32,

    /// Hash keys with a weak hasher that keeps only the low bits, so
    /// neighborhoods saturate and entries spill into the overflow store.
    #[arg(short = 'w', long = "weak_hash")]
    weak_hash: bool,
}

/// Hashes a `u64` key to itself with the high bits cleared.
#[derive(Default)]
struct WeakHasher(u64);

impl Hasher for WeakHasher {
    fn finish(&self) -> u64 {
        self.0 & 0x1F
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 = (self.0 << 8) | u64::from(*byte);
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.0 = value;
    }
}

#[derive(Clone, Default)]
struct WeakState;

impl BuildHasher for WeakState {
    type Hasher = WeakHasher;

    fn build_hasher(&self) -> Self::Hasher {
        WeakHasher::default()
    }
}

fn run<S: BuildHasher + Default, G: GrowthPolicy>(args: &Args) {
    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let mut table: HashTable<u64, u64, S, G> = HashTable::new();
    table.set_max_load_factor(args.max_load_factor);
    if let Err(err) = table.reserve(args.target_capacity) {
        eprintln!("failed to reserve {} entries: {err}", args.target_capacity);
        return;
    }

    println!(
        "Bucket count: {} (max load factor {:.2})",
        table.bucket_count(),
        table.max_load_factor()
    );
    println!("Filling table with u64 values...");

    let mut num_failures = 0;
    for i in 0..args.target_capacity as u64 {
        match table.insert(i, i) {
            Ok((_, true)) => {}
            Ok((_, false)) => panic!("Value already exists in table: {}", i),
            Err(err) => {
                num_failures += 1;
                if num_failures == 1 {
                    eprintln!("first failed insert at {i}: {err}");
                }
            }
        }
    }

    println!("Inserted {} values into table", table.len());
    println!("Final load factor: {:.2}%", table.load_factor() * 100.0);

    table.probe_histogram().print();
    table.debug_stats().print();
    println!(
        "Number of failed inserts: {} ({:.02}%)",
        num_failures,
        num_failures as f64 / args.target_capacity.max(1) as f64 * 100.0
    );
}

fn main() {
    let args = Args::parse();

    match (args.weak_hash, args.policy) {
        (false, Policy::Pow2) => run::<RandomState, PowerOfTwoGrowthPolicy>(&args),
        (false, Policy::Prime) => run::<RandomState, PrimeGrowthPolicy>(&args),
        (false, Policy::Mod) => run::<RandomState, ModGrowthPolicy>(&args),
        (true, Policy::Pow2) => run::<WeakState, PowerOfTwoGrowthPolicy>(&args),
        (true, Policy::Prime) => run::<WeakState, PrimeGrowthPolicy>(&args),
        (true, Policy::Mod) => run::<WeakState, ModGrowthPolicy>(&args),
    }
}
