//! Panic containment for handler execution.
//!
//! [`contain`] runs a future under `catch_unwind`. While such a future is
//! being polled, a process-wide panic hook records a forced backtrace and the
//! panic location for the current thread, so the failure report can carry
//! stack frames. Panics outside a containment scope go to the previously
//! installed hook unchanged.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context as TaskContext, Poll};

use ferrule_types::{ErrorRecord, Taxonomy, frames_from_backtrace, location_frame, panic_message};
use futures_util::FutureExt;

/// Symbols of this crate mark where the handler's own frames end.
const HARNESS_BOUNDARY: &[&str] = &["ferrule_engine::"];

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

#[derive(Debug)]
struct PanicSite {
    backtrace: String,
    file: String,
    line: u32,
}

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let (file, line) = info
                .location()
                .map_or((String::new(), 0), |l| (l.file().to_string(), l.line()));
            let site = PanicSite {
                backtrace: Backtrace::force_capture().to_string(),
                file,
                line,
            };
            CAPTURED.with(|slot| *slot.borrow_mut() = Some(site));
        }));
    });
}

/// Marks the current thread as inside a containment scope for one poll.
struct ScopeGuard;

impl ScopeGuard {
    fn enter() -> Self {
        let outer = DEPTH.with(|d| {
            let depth = d.get();
            d.set(depth + 1);
            depth
        });
        if outer == 0 {
            CAPTURED.with(|slot| slot.borrow_mut().take());
        }
        Self
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

struct Scoped<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let _scope = ScopeGuard::enter();
        self.inner.as_mut().poll(cx)
    }
}

/// A panic caught by [`contain`].
#[derive(Debug)]
pub struct CapturedPanic {
    payload: Box<dyn Any + Send>,
    site: Option<PanicSite>,
}

impl CapturedPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        Self {
            payload,
            site: CAPTURED.with(|slot| slot.borrow_mut().take()),
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        panic_message(self.payload.as_ref())
    }

    /// Build the failure record for this panic.
    ///
    /// The stack is never empty: when no symbolized frame survives filtering,
    /// a single frame for the panic location stands in.
    #[must_use]
    pub fn into_record(self, taxonomy: &Taxonomy) -> ErrorRecord {
        let error_type = taxonomy.classify_panic(self.payload.as_ref());
        let message = self.message();

        let mut frames = self
            .site
            .as_ref()
            .map(|site| frames_from_backtrace(&site.backtrace, HARNESS_BOUNDARY))
            .unwrap_or_default();
        if frames.is_empty() {
            let (file, line) = self
                .site
                .as_ref()
                .map_or(("", 0), |site| (site.file.as_str(), site.line));
            frames.push(location_frame(file, line));
        }

        ErrorRecord::panic(error_type, message, frames)
    }
}

/// Run `future`, turning a panic during any of its polls into an `Err`.
pub fn contain<F: Future>(future: F) -> impl Future<Output = Result<F::Output, CapturedPanic>> {
    install_hook();
    AssertUnwindSafe(Scoped {
        inner: Box::pin(future),
    })
    .catch_unwind()
    .map(|result| result.map_err(CapturedPanic::from_payload))
}
