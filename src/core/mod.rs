mod clock;
mod errors;
mod events;
mod messages;
mod progress;
mod queue;
mod traits;
mod types;
mod uploader;
mod validator;


pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{HandlerError, Result, UploaderError};
pub use events::{EventBus, EventHandler, HandlerResult, Outcome};
pub use messages::{render_message, FileInfo};
pub use progress::{ProgressTracker, Sample};
pub use queue::JobQueue;
pub use traits::{
    FailureReason,
    TransferRequest,
    TransportCapabilities,
    TransportEvent,
    TransportEventKind,
    TransportHandle,
    TransportSink,
    TransportStrategy,
};
pub use types::{
    file_extension,
    EventKind,
    FileSource,
    Job,
    JobId,
    JobSnapshot,
    JobStatus,
    TransportResponse,
    UploadEvent,
};
pub use uploader::Uploader;
pub use validator::{FileValidator, ValidationCode, ValidationError};
