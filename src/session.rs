//! Navigation state and the scan workflow.
//!
//! [`View`] describes which screen is current; every transition goes
//! through [`View::update`]. [`ScanWorkflow`] drives one scan from
//! student selection to a recorded result, allowing at most one
//! analysis in flight.

use crate::gateway::{AnalysisService, GatewayError, ImagePayload};
use crate::models::ScanResult;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The current screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum View {
    /// Roster overview.
    #[default]
    Dashboard,
    /// Adding one or more students.
    NewStudent,
    /// Statistics and history for one student.
    StudentDetail { student_id: String },
    /// Scan workflow, optionally started from a student's page.
    Scanner { preselected: Option<String> },
}

/// User actions that move between views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    OpenStudent(String),
    AddStudents,
    StudentsAdded,
    /// Start a scan from the dashboard, with no student chosen yet.
    NewScan,
    /// Start a scan for the student currently shown.
    ScanStudent,
    ScanCompleted { student_id: String },
    Back,
}

impl View {
    /// Apply an action. Actions that make no sense for the current view leave it unchanged.
    pub fn update(self, action: Action) -> View {
        match (self, action) {
            (_, Action::ScanCompleted { student_id }) => View::StudentDetail { student_id },
            (View::Dashboard, Action::OpenStudent(student_id)) => {
                View::StudentDetail { student_id }
            }
            (View::Dashboard, Action::AddStudents) => View::NewStudent,
            (View::Dashboard, Action::NewScan) => View::Scanner { preselected: None },
            (View::NewStudent, Action::StudentsAdded | Action::Back) => View::Dashboard,
            (View::StudentDetail { student_id }, Action::ScanStudent) => View::Scanner {
                preselected: Some(student_id),
            },
            (View::StudentDetail { .. }, Action::Back) => View::Dashboard,
            (View::Scanner { preselected }, Action::Back) => match preselected {
                Some(student_id) => View::StudentDetail { student_id },
                None => View::Dashboard,
            },
            (view, action) => {
                debug!("Ignoring {:?} in {:?}", action, view);
                view
            }
        }
    }
}

/// Steps of the scan workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    SelectStudent,
    Capture,
    Preview,
    Analyzing,
    Completed,
}

/// Misuse of the scan workflow, or a failed analysis.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("cannot {action} while in the {step:?} step")]
    InvalidStep { action: &'static str, step: ScanStep },

    #[error("an analysis is already in progress")]
    InFlight,

    #[error("a student and an image are required before analysis")]
    NotReady,

    #[error("analysis failed: {0}")]
    Analysis(#[from] GatewayError),
}

/// One scan, from choosing a student to a recorded result.
#[derive(Debug)]
pub struct ScanWorkflow {
    step: ScanStep,
    student_id: Option<String>,
    image: Option<ImagePayload>,
}

impl ScanWorkflow {
    /// Start a workflow. A preselected student skips the selection step.
    pub fn new(preselected: Option<String>) -> Self {
        let step = if preselected.is_some() {
            ScanStep::Capture
        } else {
            ScanStep::SelectStudent
        };

        Self {
            step,
            student_id: preselected,
            image: None,
        }
    }

    pub fn step(&self) -> ScanStep {
        self.step
    }

    pub fn student_id(&self) -> Option<&str> {
        self.student_id.as_deref()
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    fn expect_step(&self, expected: ScanStep, action: &'static str) -> Result<(), WorkflowError> {
        match self.step {
            ScanStep::Analyzing if expected != ScanStep::Analyzing => Err(WorkflowError::InFlight),
            step if step == expected => Ok(()),
            step => Err(WorkflowError::InvalidStep { action, step }),
        }
    }

    pub fn select_student(&mut self, student_id: impl Into<String>) -> Result<(), WorkflowError> {
        self.expect_step(ScanStep::SelectStudent, "select a student")?;
        self.student_id = Some(student_id.into());
        self.step = ScanStep::Capture;
        Ok(())
    }

    pub fn capture(&mut self, image: ImagePayload) -> Result<(), WorkflowError> {
        self.expect_step(ScanStep::Capture, "capture an image")?;
        self.image = Some(image);
        self.step = ScanStep::Preview;
        Ok(())
    }

    /// Discard the captured image and go back to capturing.
    pub fn retake(&mut self) -> Result<(), WorkflowError> {
        self.expect_step(ScanStep::Preview, "retake")?;
        self.image = None;
        self.step = ScanStep::Capture;
        Ok(())
    }

    /// Whether the workflow has everything needed to submit.
    pub fn can_submit(&self) -> bool {
        self.step == ScanStep::Preview && self.student_id.is_some() && self.image.is_some()
    }

    /// Enter the analyzing step. Only one analysis may be pending at a time.
    pub fn submit(&mut self) -> Result<(), WorkflowError> {
        self.expect_step(ScanStep::Preview, "submit")?;
        if !self.can_submit() {
            return Err(WorkflowError::NotReady);
        }
        self.step = ScanStep::Analyzing;
        Ok(())
    }

    /// Run the pending analysis.
    ///
    /// On success the image is dropped and a [`ScanResult`] is returned.
    /// On failure the workflow returns to the preview step with the image
    /// kept, so the user can try again.
    pub async fn run<S: AnalysisService>(
        &mut self,
        service: &S,
    ) -> Result<ScanResult, WorkflowError> {
        if self.step != ScanStep::Analyzing {
            return Err(WorkflowError::InvalidStep {
                action: "run an analysis",
                step: self.step,
            });
        }

        let (Some(student_id), Some(image)) = (self.student_id.clone(), self.image.take()) else {
            self.step = ScanStep::Preview;
            return Err(WorkflowError::NotReady);
        };

        let outcome = service.analyze(&image).await;
        match outcome {
            Ok(analysis) => {
                info!("Scan for student {} complete", student_id);
                self.step = ScanStep::Completed;
                Ok(ScanResult::from_analysis(student_id, analysis))
            }
            Err(e) => {
                warn!("Scan for student {} failed: {}", student_id, e);
                self.image = Some(image);
                self.step = ScanStep::Preview;
                Err(WorkflowError::Analysis(e))
            }
        }
    }
}
