use std::any::type_name;
use std::hint::black_box;

use bfly_multiply::{ButterflyMultiply, Twiddle};
use bfly_tensor::{Complex, Element, RealElement, Tensor};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::SmallRng;

const BATCH_SIZE: usize = 256;
const NSTACK: usize = 1;

fn bench_butterfly(c: &mut Criterion) {
    let log_sizes = &[6, 9, 12];

    forward::<f32, f32>(c, log_sizes);
    forward::<f64, f64>(c, log_sizes);
    forward::<Complex<f32>, Complex<f32>>(c, log_sizes);
    forward::<f32, Complex<f32>>(c, log_sizes);
    forward_backward::<f32, f32>(c, log_sizes);
    forward_backward::<Complex<f32>, Complex<f32>>(c, log_sizes);

    ortho_forward::<f32, f32>(c, log_sizes);
    ortho_forward::<f32, Complex<f32>>(c, log_sizes);
    ortho_backward::<f32, f32>(c, log_sizes);
}

fn forward<W, V>(c: &mut Criterion, log_sizes: &[usize])
where
    V: Element,
    W: Twiddle<V>,
{
    let mut group = c.benchmark_group(format!(
        "forward::<{}, {}, {}>",
        type_name::<W>(),
        type_name::<V>(),
        BATCH_SIZE
    ));
    group.sample_size(10);

    let mut rng = SmallRng::seed_from_u64(1);
    let multiply = ButterflyMultiply::default();
    for &log_n in log_sizes {
        let n = 1 << log_n;
        let twiddle = Tensor::<W>::rand(&mut rng, [NSTACK, log_n, n / 2, 2, 2]);
        let input = Tensor::<V>::rand(&mut rng, [BATCH_SIZE, NSTACK, n]);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| black_box(multiply.forward(&twiddle, input, true)));
        });
    }
}

fn forward_backward<W, V>(c: &mut Criterion, log_sizes: &[usize])
where
    V: Element,
    W: Twiddle<V>,
{
    let mut group = c.benchmark_group(format!(
        "forward_backward::<{}, {}, {}>",
        type_name::<W>(),
        type_name::<V>(),
        BATCH_SIZE
    ));
    group.sample_size(10);

    let mut rng = SmallRng::seed_from_u64(2);
    let multiply = ButterflyMultiply::default();
    for &log_n in log_sizes {
        let n = 1 << log_n;
        let twiddle = Tensor::<W>::rand(&mut rng, [NSTACK, log_n, n / 2, 2, 2]);
        let input = Tensor::<V>::rand(&mut rng, [BATCH_SIZE, NSTACK, n]);
        let grad = Tensor::<V>::rand(&mut rng, [BATCH_SIZE, NSTACK, n]);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| black_box(multiply.forward_backward(&twiddle, input, &grad, true)));
        });
    }
}

fn angles<R: RealElement>(rng: &mut SmallRng, log_n: usize) -> (Tensor<R>, Tensor<R>) {
    let n = 1 << log_n;
    let theta = Tensor::<R>::rand(rng, [NSTACK, log_n, n / 2])
        .map(|&t| t * R::PI());
    (theta.map(|t| t.cos()), theta.map(|t| t.sin()))
}

fn ortho_forward<R, V>(c: &mut Criterion, log_sizes: &[usize])
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
    let mut group = c.benchmark_group(format!(
        "ortho_forward::<{}, {}, {}>",
        type_name::<R>(),
        type_name::<V>(),
        BATCH_SIZE
    ));
    group.sample_size(10);

    let mut rng = SmallRng::seed_from_u64(3);
    let multiply = ButterflyMultiply::default();
    for &log_n in log_sizes {
        let n = 1 << log_n;
        let (cos, sin) = angles::<R>(&mut rng, log_n);
        let input = Tensor::<V>::rand(&mut rng, [BATCH_SIZE, NSTACK, n]);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| black_box(multiply.ortho_forward(&cos, &sin, input, true)));
        });
    }
}

fn ortho_backward<R, V>(c: &mut Criterion, log_sizes: &[usize])
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
    let mut group = c.benchmark_group(format!(
        "ortho_backward::<{}, {}, {}>",
        type_name::<R>(),
        type_name::<V>(),
        BATCH_SIZE
    ));
    group.sample_size(10);

    let mut rng = SmallRng::seed_from_u64(4);
    let multiply = ButterflyMultiply::default();
    for &log_n in log_sizes {
        let n = 1 << log_n;
        let (cos, sin) = angles::<R>(&mut rng, log_n);
        let input = Tensor::<V>::rand(&mut rng, [BATCH_SIZE, NSTACK, n]);
        let grad = Tensor::<V>::rand(&mut rng, [BATCH_SIZE, NSTACK, n]);
        let output = multiply
            .ortho_forward(&cos, &sin, &input, true)
            .expect("benchmark inputs are well formed");
        group.bench_with_input(BenchmarkId::from_parameter(n), &output, |b, output| {
            b.iter(|| black_box(multiply.ortho_backward(&cos, &sin, output, &grad, true)));
        });
    }
}

criterion_group!(benches, bench_butterfly);
criterion_main!(benches);
