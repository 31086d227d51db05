// Room aggregate: state machine, participants, answers, scoring

pub mod entity;
pub mod phase;
pub mod player;
pub mod scoring;

pub use entity::{Advance, RecordedAnswer, Room, RoundSummary};
pub use phase::RoomPhase;
pub use player::{Player, Spectator};
