//! The user function contract.

use std::fmt::Display;
use std::future::Future;

use crate::context::Context;

/// A function from a decoded input to an encodable output.
///
/// Implemented for every `Fn(Context, I) -> impl Future<Output = Result<O, E>>`.
/// The error's static type selects its `Runtime.*` tag; its `Display` output
/// becomes the reported message.
pub trait Handler<I, O> {
    type Error: Display;
    type Future: Future<Output = Result<O, Self::Error>>;

    fn call(&self, ctx: Context, input: I) -> Self::Future;
}

impl<F, Fut, I, O, E> Handler<I, O> for F
where
    F: Fn(Context, I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: Display,
{
    type Error = E;
    type Future = Fut;

    fn call(&self, ctx: Context, input: I) -> Fut {
        self(ctx, input)
    }
}
