//! Playback capability
//!
//! The embedded player itself is opaque: it is driven through the
//! [`Playback`] trait and reports back with [`PlayerEvent`]s. `NowPlaying`
//! holds the transport state the player bar renders and keeps it consistent
//! with the commands it sends.

use tracing::debug;

use crate::model::MediaItem;

/// Full volume
pub const MAX_VOLUME: u8 = 100;

/// Embedded player controls
pub trait Playback {
    /// Load and cue a media item by id
    fn load(&mut self, id: &str);
    fn play(&mut self);
    fn pause(&mut self);
    /// Seek to a position in seconds
    fn seek(&mut self, seconds: f64);
    /// Volume in 0..=100
    fn set_volume(&mut self, volume: u8);
    fn mute(&mut self);
    fn unmute(&mut self);
}

/// Player state as reported by the embedded player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    /// Map the embedded player's numeric state code
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }
}

/// Events pushed by the embedded player
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// Media is loaded and its length is known
    Ready { duration: f64 },
    StateChange(PlayerState),
    /// Periodic position report in seconds
    TimeUpdate(f64),
}

/// Transport state of the player bar
#[derive(Debug, Clone)]
pub struct NowPlaying {
    current: Option<MediaItem>,
    is_ready: bool,
    is_playing: bool,
    is_muted: bool,
    volume: u8,
    current_time: f64,
    duration: f64,
}

impl Default for NowPlaying {
    fn default() -> Self {
        Self {
            current: None,
            is_ready: false,
            is_playing: false,
            is_muted: false,
            volume: MAX_VOLUME,
            current_time: 0.0,
            duration: 0.0,
        }
    }
}

impl NowPlaying {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.current.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Played fraction in 0.0..=1.0
    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.current_time / self.duration).clamp(0.0, 1.0)
    }

    /// Start a new item; state resets until the player reports ready
    pub fn open(&mut self, item: MediaItem, player: &mut impl Playback) {
        debug!("Opening {}", item.id);
        player.load(&item.id);
        self.current = Some(item);
        self.is_ready = false;
        self.is_playing = false;
        self.current_time = 0.0;
        self.duration = 0.0;
    }

    /// Fold a player event into the transport state
    pub fn handle_event(&mut self, event: PlayerEvent, player: &mut impl Playback) {
        match event {
            PlayerEvent::Ready { duration } => {
                self.is_ready = true;
                self.duration = duration.max(0.0);
                // Auto-play once the media is ready
                player.play();
            }
            PlayerEvent::StateChange(state) => {
                self.is_playing = state == PlayerState::Playing;
                if state == PlayerState::Ended {
                    self.current_time = 0.0;
                }
            }
            PlayerEvent::TimeUpdate(seconds) => {
                self.current_time = seconds.max(0.0);
            }
        }
    }

    pub fn toggle_play(&mut self, player: &mut impl Playback) {
        if !self.is_ready {
            return;
        }
        if self.is_playing {
            player.pause();
        } else {
            player.play();
        }
        self.is_playing = !self.is_playing;
    }

    /// Unmuting restores the stored volume
    pub fn toggle_mute(&mut self, player: &mut impl Playback) {
        if !self.is_ready {
            return;
        }
        if self.is_muted {
            player.unmute();
            player.set_volume(self.volume);
        } else {
            player.mute();
        }
        self.is_muted = !self.is_muted;
    }

    /// Volume 0 mutes; any other volume unmutes
    pub fn set_volume(&mut self, volume: u8, player: &mut impl Playback) {
        if !self.is_ready {
            return;
        }
        let volume = volume.min(MAX_VOLUME);
        self.volume = volume;
        player.set_volume(volume);

        if volume == 0 {
            self.is_muted = true;
            player.mute();
        } else if self.is_muted {
            self.is_muted = false;
            player.unmute();
        }
    }

    pub fn seek(&mut self, seconds: f64, player: &mut impl Playback) {
        if !self.is_ready {
            return;
        }
        let seconds = if self.duration > 0.0 {
            seconds.clamp(0.0, self.duration)
        } else {
            seconds.max(0.0)
        };
        self.current_time = seconds;
        player.seek(seconds);
    }

    /// Stop and forget the current item; volume and mute survive
    pub fn close(&mut self, player: &mut impl Playback) {
        if self.is_ready {
            player.pause();
        }
        self.current = None;
        self.is_ready = false;
        self.is_playing = false;
        self.current_time = 0.0;
        self.duration = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingPlayer {
        calls: Vec<String>,
    }

    impl Playback for RecordingPlayer {
        fn load(&mut self, id: &str) {
            self.calls.push(format!("load:{}", id));
        }
        fn play(&mut self) {
            self.calls.push("play".into());
        }
        fn pause(&mut self) {
            self.calls.push("pause".into());
        }
        fn seek(&mut self, seconds: f64) {
            self.calls.push(format!("seek:{}", seconds));
        }
        fn set_volume(&mut self, volume: u8) {
            self.calls.push(format!("volume:{}", volume));
        }
        fn mute(&mut self) {
            self.calls.push("mute".into());
        }
        fn unmute(&mut self) {
            self.calls.push("unmute".into());
        }
    }

    fn ready(duration: f64) -> (NowPlaying, RecordingPlayer) {
        let mut now = NowPlaying::new();
        let mut player = RecordingPlayer::default();
        now.open(MediaItem::new("a", "A"), &mut player);
        now.handle_event(PlayerEvent::Ready { duration }, &mut player);
        now.handle_event(PlayerEvent::StateChange(PlayerState::Playing), &mut player);
        player.calls.clear();
        (now, player)
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(PlayerState::from_code(-1), Some(PlayerState::Unstarted));
        assert_eq!(PlayerState::from_code(0), Some(PlayerState::Ended));
        assert_eq!(PlayerState::from_code(1), Some(PlayerState::Playing));
        assert_eq!(PlayerState::from_code(5), Some(PlayerState::Cued));
        assert_eq!(PlayerState::from_code(4), None);
    }

    #[test]
    fn test_open_then_ready_autoplays() {
        let mut now = NowPlaying::new();
        let mut player = RecordingPlayer::default();
        now.open(MediaItem::new("a", "A"), &mut player);
        assert!(!now.is_ready());

        now.handle_event(PlayerEvent::Ready { duration: 200.0 }, &mut player);
        assert!(now.is_ready());
        assert_eq!(now.duration(), 200.0);
        assert_eq!(player.calls, vec!["load:a", "play"]);
    }

    #[test]
    fn test_controls_ignored_before_ready() {
        let mut now = NowPlaying::new();
        let mut player = RecordingPlayer::default();
        now.toggle_play(&mut player);
        now.set_volume(10, &mut player);
        now.seek(5.0, &mut player);
        assert!(player.calls.is_empty());
        assert_eq!(now.volume(), MAX_VOLUME);
    }

    #[test]
    fn test_ended_resets_time() {
        let (mut now, mut player) = ready(100.0);
        now.handle_event(PlayerEvent::TimeUpdate(99.0), &mut player);
        assert_eq!(now.current_time(), 99.0);

        now.handle_event(PlayerEvent::StateChange(PlayerState::Ended), &mut player);
        assert!(!now.is_playing());
        assert_eq!(now.current_time(), 0.0);
    }

    #[test]
    fn test_toggle_play() {
        let (mut now, mut player) = ready(100.0);
        assert!(now.is_playing());
        now.toggle_play(&mut player);
        assert!(!now.is_playing());
        now.toggle_play(&mut player);
        assert!(now.is_playing());
        assert_eq!(player.calls, vec!["pause", "play"]);
    }

    #[test]
    fn test_volume_zero_mutes_and_raise_unmutes() {
        let (mut now, mut player) = ready(100.0);
        now.set_volume(0, &mut player);
        assert!(now.is_muted());

        now.set_volume(40, &mut player);
        assert!(!now.is_muted());
        assert_eq!(now.volume(), 40);
        assert_eq!(
            player.calls,
            vec!["volume:0", "mute", "volume:40", "unmute"]
        );
    }

    #[test]
    fn test_toggle_mute_restores_volume() {
        let (mut now, mut player) = ready(100.0);
        now.set_volume(30, &mut player);
        player.calls.clear();

        now.toggle_mute(&mut player);
        assert!(now.is_muted());
        now.toggle_mute(&mut player);
        assert!(!now.is_muted());
        assert_eq!(player.calls, vec!["mute", "unmute", "volume:30"]);
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let (mut now, mut player) = ready(120.0);
        now.seek(500.0, &mut player);
        assert_eq!(now.current_time(), 120.0);
        now.seek(-3.0, &mut player);
        assert_eq!(now.current_time(), 0.0);
        now.seek(60.0, &mut player);
        assert!((now.progress() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_close_resets_everything_but_volume() {
        let (mut now, mut player) = ready(120.0);
        now.set_volume(55, &mut player);
        now.handle_event(PlayerEvent::TimeUpdate(30.0), &mut player);

        now.close(&mut player);
        assert!(now.current().is_none());
        assert!(!now.is_ready());
        assert!(!now.is_playing());
        assert_eq!(now.current_time(), 0.0);
        assert_eq!(now.duration(), 0.0);
        assert_eq!(now.volume(), 55);
        assert_eq!(player.calls.last().map(String::as_str), Some("pause"));
    }
}
