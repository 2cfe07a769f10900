//! Dense vector primitives used by the optimizers
//!
//! Every function in this module operates on one-dimensional [ndarray] arrays and works in the
//! precision of the array elements. Elementwise kernels are dispatched to the rayon thread pool
//! through [Zip::par_for_each].
//!
//! Reductions (dot products and norms) are computed over fixed-size chunks. The partial results
//! are written to a fixed-capacity stack array and combined sequentially in chunk order, so a
//! reduction never allocates and its result is bitwise identical regardless of the number of
//! threads in the pool or how rayon schedules the chunks.

use ndarray::{s, ArrayBase, ArrayView1, Data, DataMut, Ix1, NdFloat, Zip};
use rayon::prelude::*;

/// Number of elements reduced by a single task
pub const CHUNK: usize = 4096;

/// Upper bound on the number of partial results held by a reduction
const MAX_TASKS: usize = 64;

/// Floating point type used for a solve
///
/// Implemented for [f32] and [f64]. All reductions accumulate in the working type.
pub trait Float: NdFloat + Default {
    /// Convert a literal into the working precision
    fn lit(value: f64) -> Self;
}

impl Float for f64 {
    #[inline]
    fn lit(value: f64) -> Self {
        value
    }
}

impl Float for f32 {
    #[inline]
    fn lit(value: f64) -> Self {
        value as f32
    }
}

/// Reduce `len` elements chunk by chunk and combine the partials in order.
///
/// The chunks are grouped into at most [MAX_TASKS] contiguous runs whose boundaries depend only
/// on `len`. Each run folds its chunks left to right into a slot of a stack array, and the slots
/// are then folded left to right.
fn reduce_chunks<A, F, C>(len: usize, identity: A, partial: F, combine: C) -> A
where
    A: Float,
    F: Fn(usize, usize) -> A + Sync + Send,
    C: Fn(A, A) -> A + Sync + Send,
{
    if len <= CHUNK {
        return combine(identity, partial(0, len));
    }
    let n_chunks = (len + CHUNK - 1) / CHUNK;
    let chunks_per_task = (n_chunks + MAX_TASKS - 1) / MAX_TASKS;
    let n_tasks = (n_chunks + chunks_per_task - 1) / chunks_per_task;

    let mut partials = [identity; MAX_TASKS];
    partials[..n_tasks]
        .par_iter_mut()
        .enumerate()
        .for_each(|(task, slot)| {
            let first = task * chunks_per_task;
            let last = (first + chunks_per_task).min(n_chunks);
            for chunk in first..last {
                let lo = chunk * CHUNK;
                let hi = (lo + CHUNK).min(len);
                *slot = combine(*slot, partial(lo, hi));
            }
        });
    partials[..n_tasks]
        .iter()
        .fold(identity, |acc, &p| combine(acc, p))
}

fn check_len(what: &str, left: usize, right: usize) {
    assert_eq!(
        left, right,
        "{}: vectors have different lengths ({} and {})",
        what, left, right
    );
}

/// Inner product `a·b`
pub fn dot<A, S1, S2>(a: &ArrayBase<S1, Ix1>, b: &ArrayBase<S2, Ix1>) -> A
where
    A: Float,
    S1: Data<Elem = A>,
    S2: Data<Elem = A>,
{
    check_len("dot", a.len(), b.len());
    let a: ArrayView1<A> = a.view();
    let b: ArrayView1<A> = b.view();
    reduce_chunks(
        a.len(),
        A::zero(),
        |lo, hi| a.slice(s![lo..hi]).dot(&b.slice(s![lo..hi])),
        |acc, p| acc + p,
    )
}

/// Sum of all elements
pub fn sum<A, S>(a: &ArrayBase<S, Ix1>) -> A
where
    A: Float,
    S: Data<Elem = A>,
{
    let a: ArrayView1<A> = a.view();
    reduce_chunks(
        a.len(),
        A::zero(),
        |lo, hi| a.slice(s![lo..hi]).fold(A::zero(), |acc, &v| acc + v),
        |acc, p| acc + p,
    )
}

/// L1 norm, `Σ|aᵢ|`
pub fn l1_norm<A, S>(a: &ArrayBase<S, Ix1>) -> A
where
    A: Float,
    S: Data<Elem = A>,
{
    let a: ArrayView1<A> = a.view();
    reduce_chunks(
        a.len(),
        A::zero(),
        |lo, hi| a.slice(s![lo..hi]).fold(A::zero(), |acc, &v| acc + v.abs()),
        |acc, p| acc + p,
    )
}

/// Euclidean norm
pub fn l2_norm<A, S>(a: &ArrayBase<S, Ix1>) -> A
where
    A: Float,
    S: Data<Elem = A>,
{
    dot(a, a).sqrt()
}

/// Largest absolute component, `max |aᵢ|`
///
/// A NaN anywhere in `a` makes the result NaN. An empty vector has norm zero.
pub fn max_abs<A, S>(a: &ArrayBase<S, Ix1>) -> A
where
    A: Float,
    S: Data<Elem = A>,
{
    fn keep_larger<A: Float>(current: A, candidate: A) -> A {
        if current.is_nan() {
            current
        } else if candidate.is_nan() || candidate > current {
            candidate
        } else {
            current
        }
    }
    let a: ArrayView1<A> = a.view();
    reduce_chunks(
        a.len(),
        A::zero(),
        |lo, hi| {
            a.slice(s![lo..hi])
                .fold(A::zero(), |acc, &v| keep_larger(acc, v.abs()))
        },
        keep_larger,
    )
}

/// `y ← y + alpha·x`
pub fn axpy<A, S1, S2>(alpha: A, x: &ArrayBase<S1, Ix1>, y: &mut ArrayBase<S2, Ix1>)
where
    A: Float,
    S1: Data<Elem = A>,
    S2: DataMut<Elem = A>,
{
    check_len("axpy", x.len(), y.len());
    Zip::from(y).and(x).par_for_each(|y, &x| *y = *y + alpha * x);
}

/// `y ← x + beta·y`
pub fn xpby<A, S1, S2>(x: &ArrayBase<S1, Ix1>, beta: A, y: &mut ArrayBase<S2, Ix1>)
where
    A: Float,
    S1: Data<Elem = A>,
    S2: DataMut<Elem = A>,
{
    check_len("xpby", x.len(), y.len());
    Zip::from(y).and(x).par_for_each(|y, &x| *y = x + beta * *y);
}

/// `out ← x + alpha·d`
pub fn linear_combination<A, S1, S2, S3>(
    out: &mut ArrayBase<S1, Ix1>,
    x: &ArrayBase<S2, Ix1>,
    alpha: A,
    d: &ArrayBase<S3, Ix1>,
) where
    A: Float,
    S1: DataMut<Elem = A>,
    S2: Data<Elem = A>,
    S3: Data<Elem = A>,
{
    check_len("linear_combination", out.len(), x.len());
    check_len("linear_combination", x.len(), d.len());
    Zip::from(out)
        .and(x)
        .and(d)
        .par_for_each(|out, &x, &d| *out = x + alpha * d);
}

/// `x ← alpha·x`
pub fn scale<A, S>(alpha: A, x: &mut ArrayBase<S, Ix1>)
where
    A: Float,
    S: DataMut<Elem = A>,
{
    x.par_mapv_inplace(|v| alpha * v);
}

/// Apply `f` to every element in place
pub fn map_inplace<A, S, F>(x: &mut ArrayBase<S, Ix1>, f: F)
where
    A: Float,
    S: DataMut<Elem = A>,
    F: Fn(A) -> A + Sync + Send,
{
    x.par_mapv_inplace(f);
}

/// Set every element to `value`
pub fn fill<A, S>(x: &mut ArrayBase<S, Ix1>, value: A)
where
    A: Float,
    S: DataMut<Elem = A>,
{
    x.par_mapv_inplace(|_| value);
}

/// `dst ← src`
pub fn copy<A, S1, S2>(src: &ArrayBase<S1, Ix1>, dst: &mut ArrayBase<S2, Ix1>)
where
    A: Float,
    S1: Data<Elem = A>,
    S2: DataMut<Elem = A>,
{
    check_len("copy", src.len(), dst.len());
    Zip::from(dst).and(src).par_for_each(|dst, &src| *dst = src);
}
