// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the real-time driver which calls a controller at a fixed period.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info};

use crate::config::RealtimeConfig;
use crate::controller::cartesian_velocity_controller::CartesianVelocityController;
use crate::controller::command_channels::CommandChannels;
use crate::controller::control_tools::{
    has_realtime_kernel, set_current_thread_to_highest_scheduler_priority,
};
use crate::controller::logger::Record;
use crate::controller::status::{ControllerStatus, StatusPublisher};
use crate::exception::{ControllerException, ControllerResult};

/// Runs a [`CartesianVelocityController`] in its own thread.
///
/// The thread activates the controller, calls [`update`](`CartesianVelocityController::update`)
/// once per period using absolute deadlines and deactivates the controller when it is told to
/// stop. The controller and its hardware handles are exclusively owned by that thread.
pub struct ControlLoop {
    controller: CartesianVelocityController,
    publisher: Option<Box<dyn StatusPublisher>>,
    status: Arc<Mutex<ControllerStatus>>,
    run: Arc<AtomicBool>,
}

impl ControlLoop {
    /// Starts the control loop thread and waits until the controller is running.
    ///
    /// # Arguments
    /// * `controller` - An initialized controller.
    /// * `publisher` - Receives the status every `status_decimation` ticks.
    /// # Errors
    /// * RealTimeException if realtime is enforced and the thread cannot be made realtime.
    /// * ControlLoopException if the thread cannot be started.
    pub fn spawn(
        controller: CartesianVelocityController,
        publisher: Option<Box<dyn StatusPublisher>>,
    ) -> ControllerResult<ControlLoopHandle> {
        let channels = controller.channels();
        let status = Arc::new(Mutex::new(controller.status()));
        let run = Arc::new(AtomicBool::new(true));
        let control_loop = ControlLoop {
            controller,
            publisher,
            status: status.clone(),
            run: run.clone(),
        };
        let (ready_sender, ready_receiver) = channel();
        let thread = thread::Builder::new()
            .name("cartesian_velocity_controller".to_string())
            .spawn(move || control_loop.run(ready_sender))
            .map_err(|error| ControllerException::ControlLoopException {
                message: format!("Cannot start the control loop thread: {}", error),
            })?;
        let mut handle = ControlLoopHandle {
            channels,
            status,
            run,
            thread: Some(thread),
        };
        match ready_receiver.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(error)) => {
                handle.join()?;
                Err(error)
            }
            Err(_) => Err(handle.join().err().unwrap_or_else(|| {
                ControllerException::ControlLoopException {
                    message: "Control loop thread terminated before it was ready".to_string(),
                }
            })),
        }
    }

    fn run(mut self, ready: Sender<ControllerResult<()>>) -> Vec<Record> {
        if let Err(error) = setup_realtime(self.controller.config().realtime_config) {
            error!("ControlLoop: {}", error);
            let _ = ready.send(Err(error));
            return Vec::new();
        }
        let epoch = Instant::now();
        self.controller.starting(Duration::from_secs(0));
        let _ = ready.send(Ok(()));

        let period = self.controller.config().period_duration();
        let decimation = self.controller.config().status_decimation;
        let mut last_tick = Instant::now();
        let mut deadline = last_tick + period;
        while self.run.load(Ordering::SeqCst) {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
            let tick = Instant::now();
            self.controller.update(tick - last_tick);
            last_tick = tick;

            let status = self.controller.status();
            if status.ticks % decimation == 0 {
                self.publish(&status);
            }

            deadline += period;
            let now = Instant::now();
            if deadline < now {
                // fell behind by more than a period, the next tick reports the overrun
                deadline = now + period;
            }
        }
        let records = self.controller.stopping(epoch.elapsed());
        let status = self.controller.status();
        self.publish(&status);
        records
    }

    fn publish(&mut self, status: &ControllerStatus) {
        if let Ok(mut shared) = self.status.try_lock() {
            *shared = *status;
        }
        if let Some(publisher) = self.publisher.as_mut() {
            publisher.publish(status);
        }
    }
}

fn setup_realtime(realtime_config: RealtimeConfig) -> ControllerResult<()> {
    match realtime_config {
        RealtimeConfig::Enforce => {
            if has_realtime_kernel() {
                set_current_thread_to_highest_scheduler_priority()
            } else {
                Err(ControllerException::RealTimeException {
                    message: "franka-controllers: Running kernel does not have realtime capabilities."
                        .to_string(),
                })
            }
        }
        RealtimeConfig::Ignore => Ok(()),
    }
}

/// Handle to a running [`ControlLoop`]. Dropping it stops the loop.
pub struct ControlLoopHandle {
    channels: CommandChannels,
    status: Arc<Mutex<ControllerStatus>>,
    run: Arc<AtomicBool>,
    thread: Option<JoinHandle<Vec<Record>>>,
}

impl ControlLoopHandle {
    /// Handle to write commands to the running controller.
    pub fn channels(&self) -> CommandChannels {
        self.channels.clone()
    }

    /// Latest published status of the controller.
    pub fn status(&self) -> ControllerStatus {
        match self.status.lock() {
            Ok(status) => *status,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Stops the control loop after its current tick and deactivates the controller.
    ///
    /// # Return
    /// The log of the last ticks.
    /// # Errors
    /// * ControlLoopException if the control loop thread panicked.
    pub fn stop(mut self) -> ControllerResult<Vec<Record>> {
        self.join()
    }

    fn join(&mut self) -> ControllerResult<Vec<Record>> {
        self.run.store(false, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => {
                let records =
                    thread
                        .join()
                        .map_err(|_| ControllerException::ControlLoopException {
                            message: "Control loop thread panicked".to_string(),
                        })?;
                info!("ControlLoop: stopped");
                Ok(records)
            }
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for ControlLoopHandle {
    fn drop(&mut self) {
        if let Err(error) = self.join() {
            error!("ControlLoop: {}", error);
        }
    }
}
