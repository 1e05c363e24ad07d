//! Pipeline stages of the monitor.
//!
//! - `detect`: novelty decision against the history store
//! - `dispatch`: notification delivery with at-least-once marking
//! - `cycle`: one bounded fetch → extract → detect → dispatch run
//! - `schedule`: serial periodic execution of cycles

pub mod cycle;
pub mod detect;
pub mod diagnostics;
pub mod dispatch;
pub mod schedule;

pub use cycle::{CycleReport, CycleSettings, CycleStage, CycleStatus, PollCycle};
pub use detect::ChangeDetector;
pub use diagnostics::dump_markup;
pub use dispatch::{DispatchReport, Dispatcher};
pub use schedule::Scheduler;
