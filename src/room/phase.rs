use serde::{Deserialize, Serialize};
use std::fmt;

/// Room lifecycle phase.
///
/// ```text
/// WaitingPlayers -> QuestionIntro           (start)
/// QuestionIntro  -> AnsweringPhase          (begin_answering)
/// AnsweringPhase -> ShowResults             (end_answering: host, timer expiry,
///                                            or all-answered + host trigger)
/// ShowResults    -> Leaderboard             (show_leaderboard)
/// Leaderboard    -> QuestionIntro           (next_question, index+1 < total)
/// Leaderboard    -> Podium                  (next_question, index+1 == total)
/// ShowResults | Leaderboard -> Paused       (pause; pre-paused phase saved)
/// Paused         -> pre-paused phase        (resume)
/// any            -> closed                  (close_room)
/// ```
///
/// Any transition outside this table is rejected. Pause is deliberately
/// disallowed during `AnsweringPhase` to avoid timer-freeze ambiguity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    #[default]
    WaitingPlayers,
    QuestionIntro,
    AnsweringPhase,
    ShowResults,
    Leaderboard,
    Podium,
    Paused,
}

impl RoomPhase {
    /// Podium is terminal; no further transitions are legal.
    pub fn is_terminal(self) -> bool {
        self == Self::Podium
    }

    /// Pause is only legal in the interstitial phases between rounds.
    pub fn can_pause(self) -> bool {
        matches!(self, Self::ShowResults | Self::Leaderboard)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitingPlayers => "waiting_players",
            Self::QuestionIntro => "question_intro",
            Self::AnsweringPhase => "answering_phase",
            Self::ShowResults => "show_results",
            Self::Leaderboard => "leaderboard",
            Self::Podium => "podium",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_is_interstitial_only() {
        assert!(RoomPhase::ShowResults.can_pause());
        assert!(RoomPhase::Leaderboard.can_pause());
        assert!(!RoomPhase::WaitingPlayers.can_pause());
        assert!(!RoomPhase::QuestionIntro.can_pause());
        assert!(!RoomPhase::AnsweringPhase.can_pause());
        assert!(!RoomPhase::Podium.can_pause());
        assert!(!RoomPhase::Paused.can_pause());
    }

    #[test]
    fn only_podium_is_terminal() {
        assert!(RoomPhase::Podium.is_terminal());
        assert!(!RoomPhase::Leaderboard.is_terminal());
        assert!(!RoomPhase::Paused.is_terminal());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RoomPhase::WaitingPlayers).unwrap(),
            "\"waiting_players\""
        );
        assert_eq!(
            serde_json::to_string(&RoomPhase::AnsweringPhase).unwrap(),
            "\"answering_phase\""
        );
    }
}
