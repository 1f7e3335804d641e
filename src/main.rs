//! Test driver: builds A and B, computes C = A · B as a task graph and
//! checks sampled elements of C against the closed form.

use anyhow::{bail, Result};
use block_matmul::{
    create_matrix, expected_product_element, get_element, multiply, Generator, LeafKernel,
    LocalRuntime, RuntimeConfig,
};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KernelArg {
    Optimized,
    Reference,
}

impl From<KernelArg> for LeafKernel {
    fn from(k: KernelArg) -> Self {
        match k {
            KernelArg::Optimized => LeafKernel::Optimized,
            KernelArg::Reference => LeafKernel::Reference,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "block-matmul", about = "Recursive block matrix multiply test driver")]
struct Cli {
    /// Matrix dimension, block size times a power of two
    n: usize,

    /// Leaf block dimension
    #[arg(long, default_value_t = block_matmul::config::DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Worker threads (defaults to available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Task result cache size in GB; negative disables the cache
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    cache_gb: f64,

    /// Leaf kernel
    #[arg(long, value_enum, default_value_t = KernelArg::Optimized)]
    kernel: KernelArg,

    /// Number of C elements to verify
    #[arg(long, default_value_t = 20)]
    samples: usize,

    /// Seed for picking the verified elements
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let mut config = RuntimeConfig::new()
        .with_block_size(cli.block_size)
        .with_kernel(cli.kernel.into());
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    if cli.cache_gb >= 0.0 {
        config = config
            .with_cache(true)
            .with_cache_limit((cli.cache_gb * 1e9) as usize);
        info!(cache_gb = cli.cache_gb, "task cache enabled");
    } else {
        config = config.with_cache(false);
        info!("task cache disabled");
    }

    let n = cli.n;
    let matrix_gb = (n * n * std::mem::size_of::<f64>()) as f64 / 1e9;
    info!(
        n,
        block_size = config.block_size,
        threads = config.threads,
        kernel = config.kernel.description(),
        matrix_gb,
        "starting"
    );

    let rt = LocalRuntime::new(config)?;

    info!(generator = Generator::OperandA.name(), "creating A");
    let a = create_matrix(&rt, n, 0, 0, Generator::OperandA)?;
    info!(generator = Generator::OperandB.name(), "creating B");
    let b = create_matrix(&rt, n, 0, 0, Generator::OperandB)?;

    rt.reset_statistics();
    info!("computing C = A * B");
    let start = Instant::now();
    let c = multiply(&rt, a, b)?;
    let elapsed = start.elapsed().as_secs_f64();
    let gflops = 2.0 * (n as f64).powi(3) / elapsed / 1e9;
    info!(elapsed_ms = elapsed * 1000.0, gflops, "multiply done");
    rt.report_statistics();

    info!(samples = cli.samples, "verifying C");
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut max_abs_diff: f64 = 0.0;
    for _ in 0..cli.samples {
        let row = rng.gen_range(0..n);
        let col = rng.gen_range(0..n);
        let value = get_element(&rt, c, row, col)?;
        let expected =
            expected_product_element(Generator::OperandA, Generator::OperandB, n, row, col);
        max_abs_diff = max_abs_diff.max((value - expected).abs());
    }
    if max_abs_diff > 1e-8 {
        bail!("result seems wrong, max_abs_diff = {}", max_abs_diff);
    }
    info!(max_abs_diff, "result seems correct");

    for id in [a, b, c] {
        rt.delete(&id)?;
    }
    info!("done");
    Ok(())
}
