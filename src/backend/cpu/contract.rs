//! CPU symmetric contraction, parallel over feature rows.

use rayon::prelude::*;

use crate::descriptor::ContractionPlan;
use crate::scalar::Real;

/// Rows handed to one rayon task.
const ROWS_PER_TASK: usize = 16;

/// Contract every row of `x` with the weights of its element.
///
/// `indices` must already be range-checked against the weight buffer.
pub(super) fn symmetric_contract_rows<T: Real, M: Real>(
    plan: &ContractionPlan<M>,
    weights: &[M],
    x: &[T],
    indices: &[u32],
    batch: usize,
) -> Vec<T> {
    let (row_in, row_out) = (plan.row_in(), plan.row_out());
    let per_element = plan.num_weights() * plan.mul();
    debug_assert_eq!(x.len(), batch * row_in);
    debug_assert_eq!(indices.len(), batch);

    let mut out = vec![T::zero(); batch * row_out];
    if batch == 0 || row_out == 0 {
        return out;
    }

    out.par_chunks_mut(row_out * ROWS_PER_TASK)
        .enumerate()
        .for_each_init(
            || plan.scratch(),
            |scratch, (chunk, rows)| {
                let z0 = chunk * ROWS_PER_TASK;
                for (k, out_row) in rows.chunks_exact_mut(row_out).enumerate() {
                    let z = z0 + k;
                    let e = indices[z] as usize;
                    let w = &weights[e * per_element..(e + 1) * per_element];
                    let x_row = &x[z * row_in..(z + 1) * row_in];
                    plan.contract_row(x_row, w, out_row, scratch);
                }
            },
        );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SymmetricContractionDescriptor;
    use crate::irreps::{Group, Irreps, IrrepsLayout};

    #[test]
    fn test_rows_use_their_element_weights() {
        let irreps = Irreps::parse(Group::O3, "2x0e").unwrap();
        let desc = SymmetricContractionDescriptor::new(&irreps, &irreps, 1).unwrap();
        let plan = ContractionPlan::<f64>::new(&desc, IrrepsLayout::MulIr, IrrepsLayout::MulIr);
        let sign = plan.terms().2[0];

        // two elements, one weight, two channels
        let weights = [1.0, 2.0, 10.0, 20.0];
        let x = vec![1.0f64; 2 * 40];
        let indices: Vec<u32> = (0..40).map(|z| (z % 2) as u32).collect();
        let out = symmetric_contract_rows(&plan, &weights, &x, &indices, 40);

        assert_eq!(out.len(), 80);
        assert_eq!(&out[0..2], &[sign, 2.0 * sign]);
        assert_eq!(&out[2..4], &[10.0 * sign, 20.0 * sign]);
        assert_eq!(&out[78..80], &[10.0 * sign, 20.0 * sign]);
    }

    #[test]
    fn test_empty_batch() {
        let irreps = Irreps::parse(Group::O3, "2x0e").unwrap();
        let desc = SymmetricContractionDescriptor::new(&irreps, &irreps, 2).unwrap();
        let plan = ContractionPlan::<f32>::new(&desc, IrrepsLayout::MulIr, IrrepsLayout::MulIr);
        let out = symmetric_contract_rows::<f32, f32>(&plan, &[], &[], &[], 0);
        assert!(out.is_empty());
    }
}
