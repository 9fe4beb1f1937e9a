use anyhow::{Context, Result};
use std::marker::PhantomData;
use std::sync::Arc;

/// Defines the core `Transform` trait for composable preprocessing steps.
///
/// A `Transform<I, O>` is a stateless operation converting an input of type
/// `I` into an output of type `O`. Steps can be chained with `.then(...)`
/// into a single, statically dispatched pipeline.
///
/// Note: `then()` works only when:
/// 1. **Types align**: `self: Transform<I, O>`, `next: Transform<O, M>`
/// 2. **Owned**: `Self::Sized` (no trait objects, must be concrete)
/// 3. **Thread-safe**: intermediate and output types must be `Send`
///
/// Randomized transforms must draw from the thread-local worker RNG
/// (`dataloader::worker_gen_bool`) so that passes are reproducible.
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain {
            first: self,
            second: next,
            _marker: PhantomData,
        }
    }
}

/// Shared transforms are transforms too, so one pipeline can back several
/// loaders without cloning its configuration.
impl<I, O, T> Transform<I, O> for Arc<T>
where
    T: Transform<I, O> + ?Sized,
{
    fn apply(&self, input: I) -> Result<O> {
        (**self).apply(input)
    }
}

/// An optional step: `None` passes its input through unchanged.
impl<I, T> Transform<I, I> for Option<T>
where
    T: Transform<I, I>,
{
    fn apply(&self, input: I) -> Result<I> {
        match self {
            Some(step) => step.apply(input),
            None => Ok(input),
        }
    }
}

/// A chain of two transforms (`A` -> `B`)
/// - `PhantomData<M>` enforces intermediate type alignment.
#[derive(Debug, Clone)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    /// Creates a new transform chain.
    /// Use [`Transform::then`] for better ergonomics.
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        self.first
            .apply(input)
            .and_then(|mid| self.second.apply(mid))
            .with_context(|| {
                format!(
                    "Transform chain failed: {} → {} → {}",
                    std::any::type_name::<A>(),
                    std::any::type_name::<B>(),
                    std::any::type_name::<O>()
                )
            })
    }
}
