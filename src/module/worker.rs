use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tokio::sync::oneshot;

use crate::engine::Engine;
use crate::error::BackendError;
use crate::types::ModuleVariant;

use super::{LoadedModule, ReadySignal, Readiness};

type Job = Box<dyn FnOnce(&mut Engine) + Send>;

enum Command {
    Run(Job),
    Shutdown,
}

/// Engine module owned by a dedicated worker thread.
///
/// Every call is shipped to the worker and answered over a oneshot channel, so
/// engine work never blocks the async runtime.
pub struct AsyncModule {
    sender: Sender<Command>,
}

impl AsyncModule {
    /// Spawn the worker; readiness resolves once the worker finished its startup check.
    #[must_use]
    pub fn load() -> LoadedModule {
        let (signal, ready) = Readiness::pending();
        let module = Self::spawn(signal);
        LoadedModule {
            module: Arc::new(module),
            ready,
        }
    }

    fn spawn(signal: ReadySignal) -> Self {
        let (sender, receiver) = mpsc::channel::<Command>();
        // On spawn failure the closure and its signal are dropped, which resolves
        // the readiness with an error.
        if let Err(err) = thread::Builder::new()
            .name("sqlite-module-async".into())
            .spawn(move || run_module_worker(&receiver, signal))
        {
            tracing::error!(error = %err, "failed to spawn SQLite module worker thread");
        }
        Self { sender }
    }

    fn send_command(&self, command: Command) -> Result<(), BackendError> {
        self.sender
            .send(command)
            .map_err(|_| BackendError::misuse("SQLite module worker closed"))
    }

    pub(crate) async fn with_engine<F, R>(&self, func: F) -> Result<R, BackendError>
    where
        F: FnOnce(&mut Engine) -> Result<R, BackendError> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send_command(Command::Run(Box::new(move |engine| {
            let _ = tx.send(func(engine));
        })))?;
        rx.await
            .map_err(|_| BackendError::misuse("SQLite module worker dropped the request"))?
    }
}

impl Drop for AsyncModule {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

impl fmt::Debug for AsyncModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncModule").finish_non_exhaustive()
    }
}

fn run_module_worker(receiver: &Receiver<Command>, signal: ReadySignal) {
    let mut engine = Engine::new();
    let outcome = Engine::startup().map(|version| {
        tracing::debug!(%version, "async sqlite module ready");
    });
    signal.fire(outcome);
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Run(job) => job(&mut engine),
            Command::Shutdown => break,
        }
    }
    tracing::debug!(
        open_statements = engine.open_statements(),
        "async sqlite module worker stopped"
    );
}

engine_backed_module!(AsyncModule, ModuleVariant::Async);
