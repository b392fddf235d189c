// Progress orchestration for the tailoring flow.
// A decorative step timeline runs alongside the real tailoring call; results are revealed
// only once both have finished. Nothing here knows what the tailoring call returns.

pub mod chime;
pub mod driver;
pub mod events;
pub mod gate;
pub mod registry;
pub mod session;
pub mod stage;
pub mod steps;
pub mod timeline;

pub use events::SessionEvent;
pub use registry::SessionRegistry;
pub use session::{ProgressSettings, Session, SessionSnapshot};
pub use stage::{Stage, TransitionError};
pub use steps::{StepConfigError, StepPlan};
