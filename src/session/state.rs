use serde::{Deserialize, Serialize};

/// Lifecycle of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session
    #[default]
    Idle,
    /// Screen acquired, waiting for the countdown to elapse
    Countdown,
    /// Encoder running
    Recording,
    /// Encoder suspended in place
    Paused,
    /// Encoder flushed, resources being released
    Stopped,
}

/// Inputs that drive the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    CountdownElapsed,
    Pause,
    Resume,
    Stop,
    /// Teardown after stop has completed
    Finish,
}

impl SessionStatus {
    /// Next status for `command`, or `None` if the transition is not allowed
    pub fn apply(self, command: SessionCommand) -> Option<SessionStatus> {
        use SessionCommand as C;
        use SessionStatus as S;

        match (self, command) {
            (S::Idle, C::Start) => Some(S::Countdown),
            (S::Countdown, C::CountdownElapsed) => Some(S::Recording),
            (S::Countdown, C::Stop) => Some(S::Idle),
            (S::Recording, C::Pause) => Some(S::Paused),
            (S::Paused, C::Resume) => Some(S::Recording),
            (S::Recording | S::Paused, C::Stop) => Some(S::Stopped),
            (S::Stopped, C::Finish) => Some(S::Idle),
            _ => None,
        }
    }

    /// A session exists and holds device streams
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Countdown | SessionStatus::Recording | SessionStatus::Paused)
    }

    /// The encoder exists
    pub fn is_capturing(self) -> bool {
        matches!(self, SessionStatus::Recording | SessionStatus::Paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut status = SessionStatus::Idle;
        for command in [
            SessionCommand::Start,
            SessionCommand::CountdownElapsed,
            SessionCommand::Pause,
            SessionCommand::Resume,
            SessionCommand::Stop,
            SessionCommand::Finish,
        ] {
            status = status.apply(command).unwrap();
        }
        assert_eq!(status, SessionStatus::Idle);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        assert_eq!(SessionStatus::Idle.apply(SessionCommand::Pause), None);
        assert_eq!(SessionStatus::Idle.apply(SessionCommand::Resume), None);
        assert_eq!(SessionStatus::Idle.apply(SessionCommand::Stop), None);
        assert_eq!(SessionStatus::Countdown.apply(SessionCommand::Pause), None);
        assert_eq!(SessionStatus::Countdown.apply(SessionCommand::Start), None);
        assert_eq!(SessionStatus::Recording.apply(SessionCommand::Resume), None);
        assert_eq!(SessionStatus::Recording.apply(SessionCommand::Start), None);
        assert_eq!(SessionStatus::Paused.apply(SessionCommand::Pause), None);
    }

    #[test]
    fn test_stop_during_countdown_returns_to_idle() {
        assert_eq!(
            SessionStatus::Countdown.apply(SessionCommand::Stop),
            Some(SessionStatus::Idle)
        );
    }

    #[test]
    fn test_activity_flags() {
        assert!(!SessionStatus::Idle.is_active());
        assert!(SessionStatus::Countdown.is_active());
        assert!(!SessionStatus::Countdown.is_capturing());
        assert!(SessionStatus::Paused.is_capturing());
        assert!(!SessionStatus::Stopped.is_active());
    }
}
