use super::{
    fsm::{SubmissionEvent, SubmissionState, SubmissionStateMachine},
    payload::build_payload,
    types::{PollPolicy, StatusLine, SubmissionOutcome, SubmissionRequest},
};
use crate::{
    Error, Result,
    output::{ImageProbe, Presentation},
    relay::{CreatePredictionRequest, JobStatus, PredictionApi, PredictionJob},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Runs submissions one at a time: validate, create, poll, present.
pub struct SubmissionController {
    api: Arc<dyn PredictionApi>,
    policy: PollPolicy,
    probe: Option<Arc<dyn ImageProbe>>,
    in_flight: AtomicBool,
}

/// Releases the in-flight flag however the cycle ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Cycle {
    id: Uuid,
    fsm: SubmissionStateMachine,
    polls: u32,
    transient_failures: u32,
}

impl Cycle {
    fn finish(
        self,
        status: StatusLine,
        job: Option<PredictionJob>,
        presentation: Option<Presentation>,
    ) -> SubmissionOutcome {
        if status.is_error() {
            error!("Submission {} ended: {}", self.id, status.text);
        } else {
            info!("Submission {} ended: {}", self.id, status.text);
        }
        SubmissionOutcome {
            submission_id: self.id,
            state: self.fsm.current_state(),
            status,
            job,
            presentation,
            polls: self.polls,
            transient_failures: self.transient_failures,
        }
    }
}

impl SubmissionController {
    pub fn new(api: Arc<dyn PredictionApi>, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            probe: None,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ImageProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one full cycle. Only a second concurrent call is an `Err`; every
    /// other failure ends up in the outcome's status line.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Submission refused: another prediction is in flight");
            return Err(Error::SubmissionInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let id = Uuid::new_v4();
        self.run(id, request)
            .instrument(info_span!("submission", id = %id))
            .await
    }

    async fn run(&self, id: Uuid, request: SubmissionRequest) -> Result<SubmissionOutcome> {
        let mut cycle = Cycle {
            id,
            fsm: SubmissionStateMachine::new(),
            polls: 0,
            transient_failures: 0,
        };
        cycle.fsm.transition(SubmissionEvent::Submit)?;

        let payload = {
            let mut rng = rand::thread_rng();
            build_payload(&request.fields, &request.form, &mut rng)
        };
        let input = match payload {
            Ok(input) => input,
            Err(e) => {
                cycle.fsm.transition(SubmissionEvent::InputRejected)?;
                return Ok(cycle.finish(StatusLine::error(format!("Input Error: {}", e)), None, None));
            }
        };
        cycle.fsm.transition(SubmissionEvent::InputAccepted)?;
        info!("Starting prediction for version {}", request.version_id);

        let create = CreatePredictionRequest {
            version: request.version_id.clone(),
            input,
        };
        let created = match self
            .with_timeout(
                self.policy.create_timeout,
                self.api.create_prediction(&request.key, &create),
            )
            .await
        {
            Ok(job) => job,
            Err(e) => {
                cycle.fsm.transition(SubmissionEvent::CreationFailed)?;
                return Ok(cycle.finish(
                    StatusLine::error(format!("Error: Failed to create prediction: {}", e)),
                    None,
                    None,
                ));
            }
        };
        cycle.fsm.transition(SubmissionEvent::JobCreated)?;
        info!("Prediction {} created ({})", created.id, created.status);

        let job = match self.poll(&mut cycle, &request, &created.id).await? {
            Ok(job) => job,
            Err(e) => {
                return Ok(cycle.finish(StatusLine::error(format!("Error: {}", e)), Some(created), None));
            }
        };

        Ok(self.conclude(cycle, job).await?)
    }

    /// Sequential status polling. The outer `Result` is for state machine
    /// bugs, the inner one for a cycle abandoned after the retry budget.
    async fn poll(
        &self,
        cycle: &mut Cycle,
        request: &SubmissionRequest,
        prediction_id: &str,
    ) -> Result<std::result::Result<PredictionJob, Error>> {
        let mut retries_left = self.policy.max_retries;

        loop {
            cycle.polls += 1;
            match self
                .with_timeout(
                    self.policy.request_timeout,
                    self.api.get_prediction(&request.key, prediction_id),
                )
                .await
            {
                Ok(job) if job.status.is_terminal() => return Ok(Ok(job)),
                Ok(job) => {
                    debug!("Prediction {} is {}", prediction_id, job.status);
                    cycle.fsm.transition(SubmissionEvent::StatusPending)?;
                    sleep(self.policy.interval).await;
                }
                Err(e) if e.is_transient() && retries_left > 0 => {
                    retries_left -= 1;
                    cycle.transient_failures += 1;
                    warn!(
                        "Status check for {} failed ({}), {} retries left",
                        prediction_id, e, retries_left
                    );
                    sleep(self.policy.retry_backoff).await;
                }
                Err(e) => {
                    if e.is_transient() {
                        cycle.transient_failures += 1;
                    }
                    error!("Giving up on prediction {}: {}", prediction_id, e);
                    cycle.fsm.transition(SubmissionEvent::RetriesExhausted)?;
                    return Ok(Err(e));
                }
            }
        }
    }

    async fn conclude(&self, mut cycle: Cycle, job: PredictionJob) -> Result<SubmissionOutcome> {
        match job.status {
            JobStatus::Succeeded => {
                cycle.fsm.transition(SubmissionEvent::JobSucceeded)?;
                let mut presentation = Presentation::from_output(job.output.as_ref());
                if let Some(probe) = &self.probe {
                    presentation.verify(probe.as_ref()).await;
                }
                // the job did succeed; nothing to show is only a warning
                let status = if presentation.is_empty() {
                    StatusLine::warning("Prediction succeeded but no images could be displayed")
                } else {
                    StatusLine::info("Prediction succeeded!")
                };
                Ok(cycle.finish(status, Some(job), Some(presentation)))
            }
            JobStatus::Failed | JobStatus::Canceled => {
                cycle.fsm.transition(SubmissionEvent::JobFailed)?;
                let status = match (job.status, job.error_text()) {
                    (JobStatus::Canceled, _) => StatusLine::error("Prediction was canceled"),
                    (_, Some(message)) => StatusLine::error(format!("Prediction Failed: {}", message)),
                    (_, None) => StatusLine::error("Prediction result is unexpected"),
                };
                Ok(cycle.finish(status, Some(job), None))
            }
            other => Err(Error::internal(format!(
                "conclude called with non-terminal status {}",
                other
            ))),
        }
    }

    /// Cooperative per-request timeout: the inner future is dropped, nothing
    /// else is interrupted.
    async fn with_timeout<T>(
        &self,
        limit: Duration,
        request: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match timeout(limit, request).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                millis: limit.as_millis() as u64,
            }),
        }
    }
}

impl SubmissionOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == SubmissionState::Succeeded
    }
}
