//! Timing benchmark for the symmetric contraction forward pass
//!
//! Run benchmark:    cargo bench --bench contraction
//! Quick check:      cargo bench --bench contraction -- --small
//! On the GPU:       cargo bench --bench contraction --features cuda -- --cuda
//! Profile:          samply record cargo bench --bench contraction

use std::time::{Duration, Instant};

use equicontract::{
    Cpu, Device, Dtype, Group, Irreps, SymmetricContraction, SymmetricContractionBuilder, Tensor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const NUM_ELEMENTS: usize = 5;

struct Case {
    mul: usize,
    batch: usize,
    iterations: usize,
}

fn time_forward(
    op: &SymmetricContraction<f32>,
    x: &Tensor<f32, Cpu>,
    indices: &Tensor<i32, Cpu>,
    iterations: usize,
) -> Duration {
    // Warm-up (also compiles and loads the kernel on first CUDA use)
    op.forward(x, indices).expect("forward failed");

    let start = Instant::now();
    for _ in 0..iterations {
        op.forward(x, indices).expect("forward failed");
    }
    start.elapsed() / iterations as u32
}

fn run_benchmark(case: &Case, device: Device) {
    let irreps_in = case.mul * Irreps::parse(Group::O3, "0e + 1o + 2e").unwrap();
    let irreps_out = case.mul * Irreps::parse(Group::O3, "0e + 1o").unwrap();
    println!(
        "{} -> {}, degree 3, batch={}, device={}",
        irreps_in, irreps_out, case.batch, device
    );

    let mut rng = StdRng::seed_from_u64(0);
    let dim = irreps_in.dim();
    let data: Vec<f32> = (0..case.batch * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let x = Tensor::<f32, Cpu>::from_data(&data, &[case.batch, dim]);
    let idx: Vec<i32> = (0..case.batch)
        .map(|_| rng.gen_range(0..NUM_ELEMENTS as i32))
        .collect();
    let indices = Tensor::<i32, Cpu>::from_data(&idx, &[case.batch]);

    for math in [Dtype::F32, Dtype::F64] {
        for original_mace in [false, true] {
            let build_start = Instant::now();
            let op = SymmetricContractionBuilder::new(&irreps_in, &irreps_out)
                .contraction_degree(3)
                .num_elements(NUM_ELEMENTS)
                .math_dtype(math)
                .original_mace(original_mace)
                .device(device)
                .build::<f32>()
                .expect("failed to build operator");
            let build = build_start.elapsed();

            let per_call = time_forward(&op, &x, &indices, case.iterations);
            let rows_per_sec = case.batch as f64 / per_call.as_secs_f64();
            println!(
                "  math={:?} original_mace={:<5}  build {:>8.2?}  forward {:>10.2?}  ({:.3e} rows/s)",
                math, original_mace, build, per_call, rows_per_sec
            );
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let device = if args.iter().any(|a| a == "--cuda") {
        Device::Cuda(0)
    } else {
        Device::Cpu
    };

    if args.iter().any(|a| a == "--small") {
        println!("Running small test...");
        run_benchmark(&Case { mul: 8, batch: 64, iterations: 3 }, device);
    } else if args.iter().any(|a| a == "--large") {
        println!("Running large test...");
        run_benchmark(&Case { mul: 128, batch: 8192, iterations: 5 }, device);
    } else {
        run_benchmark(&Case { mul: 64, batch: 4096, iterations: 10 }, device);
    }
}
