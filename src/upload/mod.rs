mod orchestrator;
mod store;
mod types;
mod validator;
mod wizard;

pub use orchestrator::{SubmitOutcome, UploadOrchestrator};
pub use store::UploadStore;
pub use types::{
    FileSource, SelectedFile, SlotKey, SlotStatuses, SubmissionBatch, UploadReceipt, UploadStatus,
};
pub use validator::MAX_FILE_SIZE;
pub use wizard::{StepWizard, WizardEvent};

#[cfg(test)]
pub use wizard::WizardState;
