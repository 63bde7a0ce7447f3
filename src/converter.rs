//! Coordinate converters between external keys (floating point points or
//! boxes) and the internal signed-integer representation.
//!
//! The IEEE converters are lossless: they reinterpret the float bit pattern
//! and fold the payload bits of negative values so that float order matches
//! signed-integer order on the internal representation. The multiply
//! converters are lossy fixed-point scalings by a compile-time ratio.

use std::array;
use std::marker::PhantomData;

use crate::keys::{PhBox, PhPoint, Scalar};

/// How an external query box is turned into the internal query rectangle.
///
/// Point trees use `Point` (the identity). Box trees double every external
/// dimension into min/max halves: `Intersect` matches every box overlapping
/// the query window (rewriting min/max to the half-open ranges
/// `[-inf, max_i] x [min_i, +inf]`), `Include` matches only boxes fully
/// inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Point,
    Intersect,
    Include,
}

/// Order-preserving scalar conversion between an external and the internal
/// representation.
pub trait ScalarConverter {
    type External: Copy;
    type Internal: Scalar;

    fn pre(value: Self::External) -> Self::Internal;
    fn post(value: Self::Internal) -> Self::External;
}

/// Bit-pattern preserving `f64 <-> i64` conversion.
///
/// Non-negative raw bits map to themselves; negative raw bits get their low
/// 63 payload bits inverted, which makes the integer order match the float
/// order (ignoring NaN).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarIeee64;

impl ScalarConverter for ScalarIeee64 {
    type External = f64;
    type Internal = i64;

    #[inline]
    fn pre(value: f64) -> i64 {
        let r = value.to_bits() as i64;
        if r >= 0 {
            r
        } else {
            r ^ 0x7FFF_FFFF_FFFF_FFFF
        }
    }

    #[inline]
    fn post(value: i64) -> f64 {
        let v = if value >= 0 {
            value
        } else {
            value ^ 0x7FFF_FFFF_FFFF_FFFF
        };
        f64::from_bits(v as u64)
    }
}

/// Bit-pattern preserving `f32 <-> i32` conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarIeee32;

impl ScalarConverter for ScalarIeee32 {
    type External = f32;
    type Internal = i32;

    #[inline]
    fn pre(value: f32) -> i32 {
        let r = value.to_bits() as i32;
        if r >= 0 {
            r
        } else {
            r ^ 0x7FFF_FFFF
        }
    }

    #[inline]
    fn post(value: i32) -> f32 {
        let v = if value >= 0 { value } else { value ^ 0x7FFF_FFFF };
        f32::from_bits(v as u32)
    }
}

/// Fixed-point scaling by the compile-time ratio `NUM / DEN`:
/// `pre(x) = trunc(x * NUM / DEN)`, `post(x) = x * DEN / NUM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarMultiply<const NUM: i64, const DEN: i64>;

impl<const NUM: i64, const DEN: i64> ScalarMultiply<NUM, DEN> {
    const RATIO_OK: () = assert!(NUM != 0 && DEN != 0, "conversion ratio must be non-zero");
}

impl<const NUM: i64, const DEN: i64> ScalarConverter for ScalarMultiply<NUM, DEN> {
    type External = f64;
    type Internal = i64;

    #[inline]
    fn pre(value: f64) -> i64 {
        let () = Self::RATIO_OK;
        (value * (NUM as f64 / DEN as f64)) as i64
    }

    #[inline]
    fn post(value: i64) -> f64 {
        let () = Self::RATIO_OK;
        value as f64 * (DEN as f64 / NUM as f64)
    }
}

/// Conversion between an external key type and the internal `N`-dimensional
/// integer point, plus the query-box transformation.
///
/// `pre` and `post` must round-trip for every key in the domain.
pub trait Converter<const N: usize> {
    type Scalar: Scalar;
    /// External key: a point for point trees, a box for box trees.
    type Key;
    /// External query box.
    type QueryBox;

    /// Query type used when the caller does not pick one explicitly.
    const DEFAULT_QUERY: QueryType;

    fn pre(&self, key: &Self::Key) -> PhPoint<N, Self::Scalar>;
    fn post(&self, point: &PhPoint<N, Self::Scalar>) -> Self::Key;
    fn pre_query(&self, query: &Self::QueryBox, query_type: QueryType)
        -> PhBox<N, Self::Scalar>;
}

/// Identity converter for trees keyed directly by internal integer points.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpConverter<const N: usize, S = i64> {
    _scalar: PhantomData<S>,
}

impl<const N: usize, S> NoOpConverter<N, S> {
    pub fn new() -> Self {
        NoOpConverter {
            _scalar: PhantomData,
        }
    }
}

impl<const N: usize, S: Scalar> Converter<N> for NoOpConverter<N, S> {
    type Scalar = S;
    type Key = PhPoint<N, S>;
    type QueryBox = PhBox<N, S>;

    const DEFAULT_QUERY: QueryType = QueryType::Point;

    fn pre(&self, key: &Self::Key) -> PhPoint<N, S> {
        *key
    }

    fn post(&self, point: &PhPoint<N, S>) -> Self::Key {
        *point
    }

    fn pre_query(&self, query: &Self::QueryBox, _query_type: QueryType) -> PhBox<N, S> {
        *query
    }
}

/// Point converter applying a [`ScalarConverter`] per dimension.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplePointConverter<const N: usize, SC> {
    _scalar: PhantomData<SC>,
}

impl<const N: usize, SC> SimplePointConverter<N, SC> {
    pub fn new() -> Self {
        SimplePointConverter {
            _scalar: PhantomData,
        }
    }
}

impl<const N: usize, SC: ScalarConverter> Converter<N> for SimplePointConverter<N, SC> {
    type Scalar = SC::Internal;
    type Key = [SC::External; N];
    type QueryBox = PhBox<N, SC::External>;

    const DEFAULT_QUERY: QueryType = QueryType::Point;

    fn pre(&self, key: &Self::Key) -> PhPoint<N, SC::Internal> {
        array::from_fn(|i| SC::pre(key[i]))
    }

    fn post(&self, point: &PhPoint<N, SC::Internal>) -> Self::Key {
        array::from_fn(|i| SC::post(point[i]))
    }

    fn pre_query(
        &self,
        query: &Self::QueryBox,
        _query_type: QueryType,
    ) -> PhBox<N, SC::Internal> {
        PhBox::new(self.pre(query.min()), self.pre(query.max()))
    }
}

/// Box converter: an external `DIM`-dimensional box becomes an internal
/// `N = 2 * DIM` dimensional point by concatenating min and max corners.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleBoxConverter<const DIM: usize, const N: usize, SC> {
    _scalar: PhantomData<SC>,
}

impl<const DIM: usize, const N: usize, SC> SimpleBoxConverter<DIM, N, SC> {
    const DIMS_OK: () = assert!(N == 2 * DIM, "the internal dimension of a box tree is 2 * DIM");

    pub fn new() -> Self {
        let () = Self::DIMS_OK;
        SimpleBoxConverter {
            _scalar: PhantomData,
        }
    }
}

impl<const DIM: usize, const N: usize, SC: ScalarConverter> SimpleBoxConverter<DIM, N, SC> {
    /// Map an internal query point (one corner, `DIM` dimensional) back to
    /// external coordinates.
    pub fn post_query(&self, point: &[SC::Internal; DIM]) -> [SC::External; DIM] {
        array::from_fn(|i| SC::post(point[i]))
    }
}

impl<const DIM: usize, const N: usize, SC: ScalarConverter> Converter<N>
    for SimpleBoxConverter<DIM, N, SC>
{
    type Scalar = SC::Internal;
    type Key = PhBox<DIM, SC::External>;
    type QueryBox = PhBox<DIM, SC::External>;

    const DEFAULT_QUERY: QueryType = QueryType::Intersect;

    fn pre(&self, key: &Self::Key) -> PhPoint<N, SC::Internal> {
        let () = Self::DIMS_OK;
        let mut out = [SC::Internal::ZERO; N];
        for i in 0..DIM {
            out[i] = SC::pre(key.min()[i]);
            out[i + DIM] = SC::pre(key.max()[i]);
        }
        out
    }

    fn post(&self, point: &PhPoint<N, SC::Internal>) -> Self::Key {
        let () = Self::DIMS_OK;
        PhBox::new(
            array::from_fn(|i| SC::post(point[i])),
            array::from_fn(|i| SC::post(point[i + DIM])),
        )
    }

    fn pre_query(&self, query: &Self::QueryBox, query_type: QueryType) -> PhBox<N, SC::Internal> {
        let () = Self::DIMS_OK;
        let query_min: [SC::Internal; DIM] = array::from_fn(|i| SC::pre(query.min()[i]));
        let query_max: [SC::Internal; DIM] = array::from_fn(|i| SC::pre(query.max()[i]));
        let mut min = [SC::Internal::ZERO; N];
        let mut max = [SC::Internal::ZERO; N];
        match query_type {
            QueryType::Point => {
                // Exact-key lookup window for the box itself.
                let point = self.pre(query);
                return PhBox::new(point, point);
            }
            QueryType::Intersect => {
                for i in 0..DIM {
                    min[i] = SC::Internal::MIN;
                    min[i + DIM] = query_min[i];
                    max[i] = query_max[i];
                    max[i + DIM] = SC::Internal::MAX;
                }
            }
            QueryType::Include => {
                for i in 0..DIM {
                    min[i] = query_min[i];
                    min[i + DIM] = query_min[i];
                    max[i] = query_max[i];
                    max[i + DIM] = query_max[i];
                }
            }
        }
        PhBox::new(min, max)
    }
}

/// `f64` point keys on a 64 bit tree.
pub type IeeeConverter<const N: usize> = SimplePointConverter<N, ScalarIeee64>;
/// `f32` point keys on a 32 bit tree.
pub type IeeeConverterF<const N: usize> = SimplePointConverter<N, ScalarIeee32>;
/// Fixed-point scaled `f64` point keys.
pub type MultiplyConverter<const N: usize, const NUM: i64, const DEN: i64> =
    SimplePointConverter<N, ScalarMultiply<NUM, DEN>>;
/// `f64` box keys (`N = 2 * DIM`).
pub type IeeeBoxConverter<const DIM: usize, const N: usize> =
    SimpleBoxConverter<DIM, N, ScalarIeee64>;
/// Fixed-point scaled `f64` box keys.
pub type MultiplyBoxConverter<const DIM: usize, const N: usize, const NUM: i64, const DEN: i64> =
    SimpleBoxConverter<DIM, N, ScalarMultiply<NUM, DEN>>;
