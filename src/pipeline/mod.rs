// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测流水线 (Detection Pipeline)
///
/// 单线程协作调度:
/// - DetectionSession: state machine and per-tick cycle
/// - Ticker/Debouncer: time driven by the caller
/// - Presenter:        render collaborator
/// - Control:          user controls, applied 1:1 to session operations
pub mod command;
pub mod presenter;
pub mod session;
pub mod timer;

pub use command::{Control, ParseControlError};
pub use presenter::{NullPresenter, Presenter};
pub use session::{
    DetectionSession, Phase, SessionError, SessionOptions, SessionState, ThresholdChange,
    ThresholdKind, TickOutcome,
};
pub use timer::{Debouncer, Ticker};
