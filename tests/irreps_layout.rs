//! Property tests for irreps parsing and layout transposition.

use equicontract::irreps::{transpose, Group, Irrep, Irreps, IrrepsLayout, MulIrrep, Parity};
use equicontract::{Cpu, Tensor};
use proptest::prelude::*;

fn irrep_strategy() -> impl Strategy<Value = Irrep> {
    (0u32..4, any::<bool>()).prop_map(|(l, even)| {
        Irrep::new(l, if even { Parity::Even } else { Parity::Odd })
    })
}

fn irreps_strategy() -> impl Strategy<Value = Irreps> {
    prop::collection::vec((1usize..5, irrep_strategy()), 1..5).prop_map(|blocks| {
        Irreps::new(
            Group::O3,
            blocks.into_iter().map(|(mul, ir)| MulIrrep { mul, ir }).collect(),
        )
    })
}

proptest! {
    #[test]
    fn display_parse_round_trip(irreps in irreps_strategy()) {
        let text = irreps.to_string();
        prop_assert_eq!(Irreps::parse(Group::O3, &text).unwrap(), irreps);
    }

    #[test]
    fn transpose_round_trip(irreps in irreps_strategy(), batch in 0usize..4) {
        let dim = irreps.dim();
        let data: Vec<f32> = (0..batch * dim).map(|i| i as f32).collect();
        let x = Tensor::<f32, Cpu>::from_data(&data, &[batch, dim]);

        let y = transpose(&x, &irreps, IrrepsLayout::MulIr, IrrepsLayout::IrMul).unwrap();
        let back = transpose(&y, &irreps, IrrepsLayout::IrMul, IrrepsLayout::MulIr).unwrap();
        prop_assert_eq!(back.to_vec(), data);
    }

    #[test]
    fn transpose_is_a_permutation_within_blocks(irreps in irreps_strategy()) {
        let dim = irreps.dim();
        let data: Vec<f32> = (0..dim).map(|i| i as f32).collect();
        let x = Tensor::<f32, Cpu>::from_data(&data, &[1, dim]);
        let y = transpose(&x, &irreps, IrrepsLayout::MulIr, IrrepsLayout::IrMul)
            .unwrap()
            .to_vec();

        for range in irreps.slices() {
            let mut block: Vec<f32> = y[range.clone()].to_vec();
            block.sort_by(|a, b| a.partial_cmp(b).unwrap());
            prop_assert_eq!(block, data[range].to_vec());
        }
    }

    #[test]
    fn layout_index_is_a_bijection(mul in 1usize..6, l in 0u32..4) {
        let dim = 2 * l as usize + 1;
        for layout in [IrrepsLayout::MulIr, IrrepsLayout::IrMul] {
            let mut seen = vec![false; mul * dim];
            for u in 0..mul {
                for m in 0..dim {
                    let i = layout.index(0, mul, dim, u, m);
                    prop_assert!(!seen[i]);
                    seen[i] = true;
                }
            }
        }
    }
}

#[test]
fn test_scalar_blocks_unchanged_by_transpose() {
    let irreps = Irreps::parse(Group::O3, "3x0e").unwrap();
    let x = Tensor::<f64, Cpu>::from_data(&[1.0, 2.0, 3.0], &[1, 3]);
    let y = transpose(&x, &irreps, IrrepsLayout::MulIr, IrrepsLayout::IrMul).unwrap();
    assert_eq!(y.to_vec(), x.to_vec());
}
