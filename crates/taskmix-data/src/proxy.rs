// Proxy: generic dataset decorator
//
// A `Proxy<D, I>` owns a wrapped dataset `D` and an interceptor `I`. Every
// `Dataset` method goes through the interceptor, whose default
// implementations forward to the wrapped dataset unchanged. A decorator is
// therefore just an `Intercept` impl overriding the calls it cares about.
//
// Wrapping is O(1): nothing is iterated or copied. Proxies nest, and an
// interceptor only ever sees its immediate inner dataset through the
// `Dataset` trait, never the terminal one.

use crate::dataset::{Dataset, Metadata, Sample};
use taskmix_core::Result;

/// Hooks a [`Proxy`] routes every dataset call through.
pub trait Intercept<D: Dataset + ?Sized>: Send + Sync {
    fn get(&self, inner: &D, index: usize) -> Result<Sample> {
        inner.get(index)
    }

    fn size(&self, inner: &D) -> Option<usize> {
        inner.size()
    }

    fn metadata(&self, inner: &D) -> Option<Metadata> {
        inner.metadata()
    }

    fn name<'a>(&'a self, inner: &'a D) -> &'a str {
        inner.name()
    }
}

/// Interceptor that overrides nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<D: Dataset + ?Sized> Intercept<D> for Passthrough {}

/// A dataset decorated by an interceptor.
pub struct Proxy<D, I> {
    inner: D,
    intercept: I,
}

impl<D: Dataset, I: Intercept<D>> Proxy<D, I> {
    pub fn new(inner: D, intercept: I) -> Self {
        Self { inner, intercept }
    }

    /// The wrapped dataset.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// The interceptor and its state.
    pub fn intercept(&self) -> &I {
        &self.intercept
    }

    /// Unwrap, discarding the interceptor.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Dataset, I: Intercept<D>> Dataset for Proxy<D, I> {
    fn get(&self, index: usize) -> Result<Sample> {
        self.intercept.get(&self.inner, index)
    }

    fn size(&self) -> Option<usize> {
        self.intercept.size(&self.inner)
    }

    fn metadata(&self) -> Option<Metadata> {
        self.intercept.metadata(&self.inner)
    }

    fn name(&self) -> &str {
        self.intercept.name(&self.inner)
    }
}
