use crate::{
    models::Processor,
    request::{ProcessingRequest, ProcessingResult},
    AppError, AppResult,
};
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
};
use tracing::{debug, error};

pub type Outcome = AppResult<ProcessingResult>;
type Waker = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Running,
}

/// Moves one request at a time onto a worker thread.
///
/// The worker sends exactly one [`Outcome`] back and then calls the waker so the UI
/// thread schedules a frame; [`Dispatcher::poll`] picks the outcome up on that frame.
pub struct Dispatcher<P> {
    processor: Arc<P>,
    waker: Waker,
    pending: Option<Receiver<Outcome>>,
}

impl<P: Processor> Dispatcher<P> {
    pub fn new(processor: Arc<P>) -> Self {
        Self {
            processor,
            waker: Arc::new(|| {}),
            pending: None,
        }
    }

    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.waker = Arc::new(waker);
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn state(&self) -> DispatchState {
        match self.pending {
            Some(_) => DispatchState::Running,
            None => DispatchState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == DispatchState::Running
    }

    pub fn start(&mut self, request: ProcessingRequest) -> AppResult<()> {
        if self.is_running() {
            return Err(AppError::Busy);
        }

        let (tx, rx) = mpsc::channel();
        let processor = self.processor.clone();
        let waker = self.waker.clone();
        let mode = request.mode();

        thread::Builder::new()
            .name("model-worker".to_string())
            .spawn(move || {
                debug!("worker started for {}", mode);
                let outcome = catch_unwind(AssertUnwindSafe(|| processor.process(request)))
                    .unwrap_or_else(|panic| Err(AppError::Worker(panic_message(panic))));
                // the receiver only goes away with the window
                let _ = tx.send(outcome);
                waker();
            })
            .map_err(|e| AppError::Worker(e.to_string()))?;

        self.pending = Some(rx);
        Ok(())
    }

    /// The finished request's outcome, if it arrived since the last call.
    pub fn poll(&mut self) -> Option<Outcome> {
        let rx = self.pending.as_ref()?;

        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                error!("worker exited without sending a result");
                Err(AppError::Worker("no result was produced".to_string()))
            }
        };

        self.pending = None;
        Some(outcome)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
