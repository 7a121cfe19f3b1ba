//! Core types for Backdrop

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// DOM id of the element the backend player is mounted into
    pub fn holder_id(&self) -> String {
        format!("ContainerPlayer-ID-{}", self.0.simple())
    }

    /// Key of this instance's window resize subscription
    pub fn resize_key(&self) -> String {
        format!("resize.ContainerPlayer{}", self.0.simple())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The playback technology behind a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    Html5,
    YouTube,
    Vimeo,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Html5 => write!(f, "html5"),
            BackendKind::YouTube => write!(f, "youTube"),
            BackendKind::Vimeo => write!(f, "vimeo"),
        }
    }
}

/// Lifecycle state of a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Configuration validated, no adapter yet
    Constructed,
    /// Adapter bound, backend still loading
    AdapterBound,
    /// Backend reported the video as loaded
    Ready,
    /// Video is playing
    Playing,
    /// Playback paused
    Paused,
    /// Playback reached the end
    Ended,
    /// Backend SDK never became ready
    Failed,
    /// Torn down, not reusable
    Destroyed,
}

impl PlayerState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        if target == Destroyed {
            return *self != Destroyed;
        }
        matches!(
            (self, target),
            (Constructed, AdapterBound) |
            (AdapterBound, Ready) | (AdapterBound, Failed) |
            (Ready, Playing) | (Ready, Paused) | (Ready, Ended) |
            (Playing, Paused) | (Playing, Ended) |
            (Paused, Playing) | (Paused, Ended) |
            (Ended, Playing) | (Ended, Paused)
        )
    }

    /// True once the backend has reported the video as loaded
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            PlayerState::Ready | PlayerState::Playing | PlayerState::Paused | PlayerState::Ended
        )
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Constructed => write!(f, "constructed"),
            PlayerState::AdapterBound => write!(f, "adapter_bound"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Ended => write!(f, "ended"),
            PlayerState::Failed => write!(f, "failed"),
            PlayerState::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(PlayerState::Constructed.can_transition_to(PlayerState::AdapterBound));
        assert!(PlayerState::AdapterBound.can_transition_to(PlayerState::Ready));
        assert!(PlayerState::Ready.can_transition_to(PlayerState::Playing));
        assert!(PlayerState::Playing.can_transition_to(PlayerState::Paused));
        assert!(PlayerState::Ended.can_transition_to(PlayerState::Playing));

        assert!(!PlayerState::AdapterBound.can_transition_to(PlayerState::Playing));
        assert!(!PlayerState::Playing.can_transition_to(PlayerState::Ready));
        assert!(!PlayerState::Failed.can_transition_to(PlayerState::Ready));
    }

    #[test]
    fn test_destroyed_reachable_once() {
        for state in [
            PlayerState::Constructed,
            PlayerState::AdapterBound,
            PlayerState::Playing,
            PlayerState::Failed,
        ] {
            assert!(state.can_transition_to(PlayerState::Destroyed));
        }
        assert!(!PlayerState::Destroyed.can_transition_to(PlayerState::Destroyed));
        assert!(!PlayerState::Destroyed.can_transition_to(PlayerState::Playing));
    }

    #[test]
    fn test_holder_and_resize_keys_share_id() {
        let id = PlayerId::new();
        let simple = id.0.simple().to_string();
        assert_eq!(id.holder_id(), format!("ContainerPlayer-ID-{}", simple));
        assert_eq!(id.resize_key(), format!("resize.ContainerPlayer{}", simple));
    }
}
