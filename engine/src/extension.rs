//! In-process extensions and their lifecycle.
//!
//! Each extension is registered once at startup and then runs its own event
//! loop on a separate task. On shutdown every loop is released, termination
//! hooks run in registration order under one shared deadline, and the manager
//! waits for all loops to exit.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ferrule_client::{ExtensionsClient, TransportError};
use ferrule_types::{EventType, ExtensionEvent, ExtensionId};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::context::Deadline;
use crate::error::{BoxError, RuntimeError};

/// Time budget shared by all termination hooks.
pub const SHUTDOWN_BUDGET: Duration = Duration::from_millis(500);

/// Boxed future returned by extension hooks.
pub type HookFut = Pin<Box<dyn Future<Output = ()> + Send>>;

type InitHook = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;
type InvokeHook = Arc<dyn Fn(Option<Deadline>, ExtensionEvent) -> HookFut + Send + Sync>;
type SigtermHook = Box<dyn FnOnce(Deadline) -> HookFut + Send>;

/// An extension that lives inside the runtime process.
pub struct InternalExtension {
    name: String,
    init: Option<InitHook>,
    invoke: Option<InvokeHook>,
    sigterm: Option<SigtermHook>,
}

impl InternalExtension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init: None,
            invoke: None,
            sigterm: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs once before registration. An error aborts startup.
    pub fn on_init<F, E>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.init = Some(Box::new(move || hook().map_err(Into::into)));
        self
    }

    /// Runs for every invoke event. Supplying this subscribes to invoke events.
    pub fn on_invoke<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Option<Deadline>, ExtensionEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.invoke = Some(Arc::new(
            move |deadline: Option<Deadline>, event: ExtensionEvent| -> HookFut {
                Box::pin(hook(deadline, event))
            },
        ));
        self
    }

    /// Runs once on termination, with a deadline at most [`SHUTDOWN_BUDGET`] away.
    pub fn on_sigterm<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(Deadline) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.sigterm = Some(Box::new(move |deadline: Deadline| -> HookFut {
            Box::pin(hook(deadline))
        }));
        self
    }

    fn events(&self) -> Vec<EventType> {
        if self.invoke.is_some() {
            vec![EventType::Invoke]
        } else {
            Vec::new()
        }
    }
}

impl fmt::Debug for InternalExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalExtension")
            .field("name", &self.name)
            .field("init", &self.init.is_some())
            .field("invoke", &self.invoke.is_some())
            .field("sigterm", &self.sigterm.is_some())
            .finish()
    }
}

struct EventLoop {
    client: ExtensionsClient,
    name: String,
    id: ExtensionId,
    invoke: Option<InvokeHook>,
    done: watch::Receiver<bool>,
}

async fn wait_done(done: &mut watch::Receiver<bool>) {
    // A dropped sender also means done.
    let _ = done.wait_for(|done| *done).await;
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            // The fetch has no cancellation of its own: run it on its own
            // task and race its completion against the done signal.
            let (tx, rx) = oneshot::channel::<Result<ExtensionEvent, TransportError>>();
            let fetch = {
                let client = self.client.clone();
                let id = self.id.clone();
                tokio::spawn(async move {
                    let _ = tx.send(client.next_event(&id).await);
                })
            };

            let received = tokio::select! {
                biased;
                () = wait_done(&mut self.done) => {
                    fetch.abort();
                    break;
                }
                received = rx => received,
            };

            let event = match received {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => {
                    tracing::error!(
                        extension = %self.name,
                        error = %e,
                        "failed to fetch next extension event"
                    );
                    break;
                }
                Err(_) => {
                    tracing::error!(
                        extension = %self.name,
                        "extension event fetch ended without a result"
                    );
                    break;
                }
            };

            self.dispatch(event).await;
        }
        tracing::debug!(extension = %self.name, "extension event loop stopped");
    }

    async fn dispatch(&self, event: ExtensionEvent) {
        match event.event_type {
            EventType::Invoke => {
                if let Some(hook) = &self.invoke {
                    let deadline = event.deadline().map(Deadline::at);
                    hook(deadline, event).await;
                }
            }
            EventType::Shutdown => {
                tracing::debug!(
                    extension = %self.name,
                    reason = event.shutdown_reason.as_deref(),
                    "shutdown event received"
                );
            }
            EventType::Other(ref kind) => {
                tracing::warn!(
                    extension = %self.name,
                    event_type = %kind,
                    "ignoring unknown extension event"
                );
            }
        }
    }
}

/// Owns the event loops of all registered extensions.
pub struct ExtensionManager {
    done: watch::Sender<bool>,
    sigterm_hooks: Vec<(String, SigtermHook)>,
    loops: Vec<JoinHandle<()>>,
}

impl ExtensionManager {
    /// Initialize and register every extension in order, then start their loops.
    ///
    /// Any init or registration failure aborts startup before a loop runs.
    pub async fn start(
        client: ExtensionsClient,
        extensions: Vec<InternalExtension>,
    ) -> Result<Self, RuntimeError> {
        let mut registered = Vec::with_capacity(extensions.len());
        for mut extension in extensions {
            if let Some(init) = extension.init.take() {
                init().map_err(|source| RuntimeError::ExtensionInit {
                    name: extension.name.clone(),
                    source,
                })?;
            }

            let events = extension.events();
            let id = client
                .register(&extension.name, &events)
                .await
                .map_err(|source| RuntimeError::ExtensionRegister {
                    name: extension.name.clone(),
                    source,
                })?;
            tracing::info!(extension = %extension.name, "extension registered");
            registered.push((id, extension));
        }

        let (done, _) = watch::channel(false);
        let mut sigterm_hooks = Vec::new();
        let mut loops = Vec::with_capacity(registered.len());
        for (id, extension) in registered {
            let InternalExtension {
                name,
                invoke,
                sigterm,
                ..
            } = extension;
            if let Some(hook) = sigterm {
                sigterm_hooks.push((name.clone(), hook));
            }
            let event_loop = EventLoop {
                client: client.clone(),
                name,
                id,
                invoke,
                done: done.subscribe(),
            };
            loops.push(tokio::spawn(event_loop.run()));
        }

        Ok(Self {
            done,
            sigterm_hooks,
            loops,
        })
    }

    /// Stop every event loop and run termination hooks.
    ///
    /// Returns only after all hooks have finished and all loops have exited.
    pub async fn shutdown(self) {
        let Self {
            done,
            sigterm_hooks,
            loops,
        } = self;

        done.send_replace(true);
        let deadline = Deadline::after(SHUTDOWN_BUDGET);
        for (name, hook) in sigterm_hooks {
            tracing::debug!(extension = %name, "running termination hook");
            hook(deadline).await;
        }

        for handle in loops {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "extension event loop failed");
            }
        }
        tracing::info!("extensions stopped");
    }
}

impl fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("sigterm_hooks", &self.sigterm_hooks.len())
            .field("loops", &self.loops.len())
            .finish_non_exhaustive()
    }
}
