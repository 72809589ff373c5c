use bfly_demos::parsers::{PrecisionOptions, VariantOptions, parse_log_n};
use bfly_demos::runs::{RunShape, report_result, run_orthogonal, run_plain};
use bfly_multiply::ButterflyMultiply;
use bfly_tensor::Complex;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing_forest::ForestLayer;
use tracing_forest::util::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Plain 2x2 butterfly factors or rotations.
    #[arg(short, long, ignore_case = true, value_enum)]
    variant: VariantOptions,

    /// Element type of the input and of the factors.
    #[arg(short, long, ignore_case = true, value_enum, default_value_t = PrecisionOptions::F32)]
    precision: PrecisionOptions,

    /// The log base 2 of the transform size n.
    #[arg(short, long, value_parser = parse_log_n)]
    log_n: usize,

    /// Number of independent butterfly stacks applied to each batch row.
    #[arg(short, long, default_value_t = 1)]
    nstack: usize,

    /// Number of batch rows.
    #[arg(short, long, default_value_t = 1024)]
    batch: usize,

    /// Traverse the stages from the largest stride down.
    #[arg(short, long)]
    decreasing_stride: bool,

    /// Store plain twiddles in the stage-major fast layout.
    #[arg(short, long)]
    fast_layout: bool,
}

fn main() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    Registry::default()
        .with(env_filter)
        .with(ForestLayer::default())
        .init();

    let args = Args::parse();
    let shape = RunShape {
        batch: args.batch,
        nstack: args.nstack,
        log_n: args.log_n,
        increasing_stride: !args.decreasing_stride,
    };
    println!(
        "Multiplying {} rows by {} {:?} butterfly stack(s) of size 2^{}",
        shape.batch, shape.nstack, args.variant, shape.log_n
    );

    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(1);
    let fast = args.fast_layout;

    let result = match (args.variant, args.precision) {
        (VariantOptions::Plain, PrecisionOptions::F32) => {
            run_plain::<f32, f32, _>(&multiply, &mut rng, shape, fast)
        }
        (VariantOptions::Plain, PrecisionOptions::F64) => {
            run_plain::<f64, f64, _>(&multiply, &mut rng, shape, fast)
        }
        (VariantOptions::Plain, PrecisionOptions::ComplexF32) => {
            run_plain::<Complex<f32>, Complex<f32>, _>(&multiply, &mut rng, shape, fast)
        }
        (VariantOptions::Plain, PrecisionOptions::ComplexF64) => {
            run_plain::<Complex<f64>, Complex<f64>, _>(&multiply, &mut rng, shape, fast)
        }
        (VariantOptions::Orthogonal, PrecisionOptions::F32) => {
            run_orthogonal::<f32, f32, _>(&multiply, &mut rng, shape)
        }
        (VariantOptions::Orthogonal, PrecisionOptions::F64) => {
            run_orthogonal::<f64, f64, _>(&multiply, &mut rng, shape)
        }
        (VariantOptions::Orthogonal, PrecisionOptions::ComplexF32) => {
            run_orthogonal::<f32, Complex<f32>, _>(&multiply, &mut rng, shape)
        }
        (VariantOptions::Orthogonal, PrecisionOptions::ComplexF64) => {
            run_orthogonal::<f64, Complex<f64>, _>(&multiply, &mut rng, shape)
        }
    };
    report_result(result);
}
