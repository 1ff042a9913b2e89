mod centering;
mod dance;
mod terminal;

pub(crate) use centering::{CenteringConfig, CenteringEvent, CenteringMinigame, CenteringPhase};
pub(crate) use dance::{DanceConfig, DanceEvent, DanceMinigame};
