//! CUDA C source of the symmetric contraction kernel.
//!
//! One thread per `(row, channel)` pair. Each thread walks every sparse term
//! and accumulates into its own output positions, so no atomics are needed.

/// Module name under which the kernels are registered on the device.
pub(super) const MODULE: &str = "equicontract";

/// Entry points, one per `(io, math)` precision pair.
pub(super) const FUNCTIONS: [&str; 4] = ["sc_f32_f32", "sc_f32_f64", "sc_f64_f32", "sc_f64_f64"];

/// Threads per block.
pub(super) const BLOCK_SIZE: u32 = 256;

/// Number of `u32` entries per term in the packed term table.
pub(super) const TERM_STRIDE: usize = 4;

/// `[mul, dim_in, dim_out, num_terms, num_weights]`.
pub(super) const SHAPE_LEN: usize = 5;

pub(super) const SOURCE: &str = r#"
template <typename T, typename M>
__device__ void symmetric_contract(
    const T* __restrict__ x,
    const M* __restrict__ w,
    const unsigned int* __restrict__ indices,
    const unsigned int* __restrict__ gather,
    const unsigned int* __restrict__ scatter,
    const unsigned int* __restrict__ terms,
    const M* __restrict__ coeff,
    const unsigned short* __restrict__ inputs,
    M* __restrict__ out,
    const unsigned int* __restrict__ shape,
    const unsigned int batch)
{
    const unsigned int mul = shape[0];
    const unsigned int dim_in = shape[1];
    const unsigned int dim_out = shape[2];
    const unsigned int num_terms = shape[3];
    const unsigned int num_weights = shape[4];

    const unsigned long long tid =
        (unsigned long long)blockIdx.x * blockDim.x + threadIdx.x;
    if (tid >= (unsigned long long)batch * mul) {
        return;
    }
    const unsigned int z = (unsigned int)(tid / mul);
    const unsigned int u = (unsigned int)(tid % mul);

    const T* xr = x + (size_t)z * mul * dim_in;
    const M* wr = w + (size_t)indices[z] * num_weights * mul;
    M* yr = out + (size_t)z * mul * dim_out;
    const unsigned int* g = gather + (size_t)u * dim_in;
    const unsigned int* s = scatter + (size_t)u * dim_out;

    for (unsigned int t = 0; t < num_terms; ++t) {
        const unsigned int* term = terms + 4 * (size_t)t;
        M p = coeff[t] * wr[(size_t)term[0] * mul + u];
        for (unsigned int k = term[2]; k < term[3]; ++k) {
            p *= (M)xr[g[inputs[k]]];
        }
        yr[s[term[1]]] += p;
    }
}

#define INSTANTIATE(NAME, T, M)                                              \
extern "C" __global__ void NAME(                                             \
    const T* x, const M* w, const unsigned int* indices,                     \
    const unsigned int* gather, const unsigned int* scatter,                 \
    const unsigned int* terms, const M* coeff, const unsigned short* inputs, \
    M* out, const unsigned int* shape, const unsigned int batch)             \
{                                                                            \
    symmetric_contract<T, M>(x, w, indices, gather, scatter, terms, coeff,   \
                             inputs, out, shape, batch);                     \
}

INSTANTIATE(sc_f32_f32, float, float)
INSTANTIATE(sc_f32_f64, float, double)
INSTANTIATE(sc_f64_f32, double, float)
INSTANTIATE(sc_f64_f64, double, double)
"#;
