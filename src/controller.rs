//! Background fit controller.
//!
//! [`FitController`] runs at most one fit at a time on a worker thread. The
//! worker sends plain-data events through a channel; the controller dispatches
//! them to the registered callbacks on the caller's thread, in the order they
//! were produced, whenever [`FitController::poll_events`] or
//! [`FitController::wait`] is called.
//!
//! Lifecycle of a run:
//! 1. [`FitController::start_fit`] validates the request synchronously,
//!    cancels and joins any previous run, then spawns the worker.
//! 2. Iteration events arrive in increasing iteration order.
//! 3. The completion event is the last event of the run. Before it is
//!    dispatched the worker is joined and the fitted values are written back
//!    into the controller's parameter set.
//!
//! Once a run is cancelled, its iteration events still in the channel are
//! dropped; its completion event is always delivered.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::error::{Result, WellTestError};
use crate::fitting::{self, FitRequest, FitResult, IterationEvent};
use crate::lm::CancelToken;
use crate::models::ModelRegistry;
use crate::parameters::ParameterSet;

/// Identifier of one fit run, unique per controller.
pub type RunId = u64;

type IterationCallback = Box<dyn FnMut(RunId, &IterationEvent) + Send>;
type CompletionCallback = Box<dyn FnMut(RunId, &Result<FitResult>) + Send>;

/// Event produced by a fit worker.
#[derive(Debug)]
pub enum FitEvent {
    /// An accepted optimizer iteration.
    Iteration {
        run_id: RunId,
        event: IterationEvent,
    },
    /// The run terminated; always the last event of a run.
    Completed {
        run_id: RunId,
        result: Result<FitResult>,
    },
}

/// Handle to a started fit run.
#[derive(Debug, Clone)]
pub struct FitHandle {
    run_id: RunId,
    cancel: CancelToken,
}

impl FitHandle {
    /// The run this handle refers to.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Request cooperative cancellation of the run.
    ///
    /// Usable from any thread, including inside a callback.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct ActiveRun {
    handle: FitHandle,
    worker: Option<JoinHandle<()>>,
    receiver: Receiver<FitEvent>,
    parameters: ParameterSet,
}

/// Runs fits off the interactive thread, one at a time.
pub struct FitController {
    registry: ModelRegistry,
    parameters: ParameterSet,
    next_run_id: RunId,
    active: Option<ActiveRun>,
    last_result: Option<FitResult>,
    iteration_callbacks: Vec<IterationCallback>,
    completion_callbacks: Vec<CompletionCallback>,
}

impl Default for FitController {
    fn default() -> Self {
        Self::new(ModelRegistry::default())
    }
}

impl FitController {
    /// Create a controller evaluating models with `registry`.
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            parameters: ParameterSet::new(),
            next_run_id: 1,
            active: None,
            last_result: None,
            iteration_callbacks: Vec::new(),
            completion_callbacks: Vec::new(),
        }
    }

    /// The model registry used for every run.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Current parameter set, including values written back by the last
    /// completed fit.
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Replace the parameter set (explicit user edit).
    ///
    /// # Errors
    ///
    /// * `ControllerError` while a fit is running
    pub fn set_parameters(&mut self, parameters: ParameterSet) -> Result<()> {
        if self.is_running() {
            return Err(WellTestError::ControllerError(
                "Cannot edit parameters while a fit is running".to_string(),
            ));
        }
        self.parameters = parameters;
        Ok(())
    }

    /// Result of the last run that completed without error.
    pub fn last_result(&self) -> Option<&FitResult> {
        self.last_result.as_ref()
    }

    /// Whether a run has been started and its completion not yet dispatched.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Handle of the active run, if any.
    pub fn active_handle(&self) -> Option<&FitHandle> {
        self.active.as_ref().map(|run| &run.handle)
    }

    /// Register a callback for iteration events.
    pub fn on_iteration<F>(&mut self, callback: F)
    where
        F: FnMut(RunId, &IterationEvent) + Send + 'static,
    {
        self.iteration_callbacks.push(Box::new(callback));
    }

    /// Register a callback for completion events.
    pub fn on_completed<F>(&mut self, callback: F)
    where
        F: FnMut(RunId, &Result<FitResult>) + Send + 'static,
    {
        self.completion_callbacks.push(Box::new(callback));
    }

    /// Start a fit on a worker thread.
    ///
    /// The request's parameter set becomes the controller's parameter set
    /// once the run completes. A run that is still active is cancelled and
    /// joined first, and its remaining events are dispatched.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` if the request is invalid (checked before anything
    ///   else happens)
    /// * `ControllerError` if the worker thread cannot be spawned
    pub fn start_fit(&mut self, request: FitRequest) -> Result<FitHandle> {
        let problem = request.build_problem(&self.registry)?;

        if let Some(previous) = self.active.as_ref().map(|run| run.handle.clone()) {
            info!("Cancelling fit run {} before starting a new one", previous.run_id);
            previous.cancel();
            self.drain(true);
        }

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let handle = FitHandle {
            run_id,
            cancel: CancelToken::new(),
        };

        let (sender, receiver) = mpsc::channel();
        let cancel = handle.cancel.clone();
        let config = request.lm_config.clone();
        let worker = thread::Builder::new()
            .name(format!("welltest-fit-{}", run_id))
            .spawn(move || {
                let result = fitting::run_fit(&problem, &config, &cancel, |event| {
                    // a closed channel means the controller is gone
                    let _ = sender.send(FitEvent::Iteration { run_id, event });
                });
                let _ = sender.send(FitEvent::Completed { run_id, result });
            })
            .map_err(|e| {
                WellTestError::ControllerError(format!("Failed to spawn fit worker: {}", e))
            })?;

        debug!("Started fit run {} ({})", run_id, request.model);
        self.active = Some(ActiveRun {
            handle: handle.clone(),
            worker: Some(worker),
            receiver,
            parameters: request.parameters,
        });
        Ok(handle)
    }

    /// Request cancellation of a run. Has no effect on finished runs.
    pub fn cancel_fit(&self, handle: &FitHandle) {
        debug!("Cancellation requested for fit run {}", handle.run_id);
        handle.cancel();
    }

    /// Dispatch every event already produced, without blocking.
    ///
    /// Returns the number of events received.
    pub fn poll_events(&mut self) -> usize {
        self.drain(false)
    }

    /// Block until the run of `handle` has completed and its completion
    /// event has been dispatched. Returns immediately for finished runs.
    ///
    /// Returns the number of events received.
    pub fn wait(&mut self, handle: &FitHandle) -> usize {
        match &self.active {
            Some(run) if run.handle.run_id == handle.run_id => self.drain(true),
            _ => 0,
        }
    }

    fn drain(&mut self, block: bool) -> usize {
        let mut received = 0;
        loop {
            let next = match &self.active {
                None => break,
                Some(run) if block => run
                    .receiver
                    .recv()
                    .map_err(|_| TryRecvError::Disconnected),
                Some(run) => run.receiver.try_recv(),
            };
            match next {
                Ok(event) => {
                    received += 1;
                    self.dispatch(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let run_id = self.active.as_ref().map_or(0, |run| run.handle.run_id);
                    self.finish(
                        run_id,
                        Err(WellTestError::ControllerError(
                            "Fit worker terminated without a result".to_string(),
                        )),
                    );
                }
            }
        }
        received
    }

    fn dispatch(&mut self, event: FitEvent) {
        match event {
            FitEvent::Iteration { run_id, event } => {
                let cancelled = self
                    .active
                    .as_ref()
                    .map_or(true, |run| run.handle.is_cancelled());
                if cancelled {
                    return;
                }
                for callback in &mut self.iteration_callbacks {
                    callback(run_id, &event);
                }
            }
            FitEvent::Completed { run_id, result } => self.finish(run_id, result),
        }
    }

    fn finish(&mut self, run_id: RunId, result: Result<FitResult>) {
        if let Some(mut run) = self.active.take() {
            if let Some(worker) = run.worker.take() {
                if worker.join().is_err() {
                    warn!("Fit worker {} panicked", run_id);
                }
            }
            match &result {
                Ok(fit) => {
                    fit.apply_to(&mut run.parameters);
                    self.parameters = run.parameters;
                    self.last_result = Some(fit.clone());
                }
                Err(e) => warn!("Fit run {} failed: {}", run_id, e),
            }
        }
        for callback in &mut self.completion_callbacks {
            callback(run_id, &result);
        }
    }
}

impl Drop for FitController {
    fn drop(&mut self) {
        if let Some(mut run) = self.active.take() {
            run.handle.cancel();
            if let Some(worker) = run.worker.take() {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ObservedDataset;
    use crate::lm::StopReason;
    use crate::models::{evaluate, ModelId};
    use std::sync::{Arc, Mutex};

    fn request() -> FitRequest {
        let truth = ParameterSet::from_model(ModelId::BilinearFlow);
        let time: Vec<f64> = (0..25).map(|i| 0.01 * 1.4_f64.powi(i)).collect();
        let curve = evaluate(ModelId::BilinearFlow, &truth.values(), &time).unwrap();
        let dataset = ObservedDataset::new(time, curve.pressure)
            .unwrap()
            .with_derivative(curve.derivative)
            .unwrap();
        let mut start = truth;
        start.set_value("kfw", 100.0).unwrap();
        FitRequest::new(ModelId::BilinearFlow, dataset, start)
    }

    #[test]
    fn test_write_back_after_completion() {
        let mut controller = FitController::default();
        let completions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completions);
        controller.on_completed(move |run_id, result| {
            sink.lock().unwrap().push((run_id, result.is_ok()));
        });

        let handle = controller.start_fit(request()).unwrap();
        assert!(controller.is_running());
        assert!(controller.set_parameters(ParameterSet::new()).is_err());

        controller.wait(&handle);
        assert!(!controller.is_running());
        assert_eq!(*completions.lock().unwrap(), vec![(handle.run_id(), true)]);

        let result = controller.last_result().unwrap();
        assert!(result.converged);
        let kfw = controller.parameters().get("kfw").unwrap();
        assert!((kfw.value() - 500.0).abs() < 0.5);
        assert_eq!(kfw.value(), result.parameters["kfw"]);
    }

    #[test]
    fn test_invalid_request_is_rejected_synchronously() {
        let mut controller = FitController::default();
        let request = request().with_weight(-1.0);
        assert!(matches!(
            controller.start_fit(request),
            Err(WellTestError::InvalidInput(_))
        ));
        assert!(!controller.is_running());
    }

    #[test]
    fn test_cancel_before_first_iteration() {
        // thousands of Laplace inversions per evaluation keep the worker busy
        let model = ModelId::DualPorosity;
        let truth = ParameterSet::from_model(model);
        let time: Vec<f64> = (0..4000).map(|i| 1e-3 * 10f64.powf(i as f64 / 600.0)).collect();
        let curve = evaluate(model, &truth.values(), &time).unwrap();
        let dataset = ObservedDataset::new(time, curve.pressure).unwrap();
        let mut start = truth;
        start.set_value("k", 3.0).unwrap();
        start.set_value("omega", 0.5).unwrap();

        let mut controller = FitController::default();
        let handle = controller
            .start_fit(FitRequest::new(model, dataset, start))
            .unwrap();
        controller.cancel_fit(&handle);
        controller.wait(&handle);

        let result = controller.last_result().unwrap();
        assert!(!controller.is_running());
        assert_eq!(result.stopped_reason, StopReason::Cancelled);
        assert!(!result.converged);
        // waiting on a finished run returns immediately
        assert_eq!(controller.wait(&handle), 0);
    }
}
