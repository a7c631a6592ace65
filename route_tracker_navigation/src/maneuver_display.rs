/// Which maneuver the UI shows: the tracker's current one, or the next one
/// while its voice guidance is already playing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManeuverDisplayState {
    preview_active: bool,
    last_seen_maneuver_index: usize,
}

impl ManeuverDisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preview_active(&self) -> bool {
        self.preview_active
    }

    pub fn last_seen_maneuver_index(&self) -> usize {
        self.last_seen_maneuver_index
    }

    /// Guidance for the upcoming maneuver started, show it ahead of time.
    pub fn on_approaching_maneuver_guidance(&mut self) {
        self.preview_active = true;
    }

    /// Display index for the tracker's `current` maneuver out of `maneuver_count`.
    ///
    /// A preview ends once `current` advances past the last index shown.
    /// The result never exceeds the last maneuver.
    pub fn compute_display_index(&mut self, current: usize, maneuver_count: usize) -> usize {
        if current > self.last_seen_maneuver_index {
            self.preview_active = false;
        }

        let mut index = current + usize::from(self.preview_active);
        if maneuver_count > 0 {
            index = index.min(maneuver_count - 1);
        }

        self.last_seen_maneuver_index = index;
        index
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[test]
fn shows_current_without_preview() {
    let mut state = ManeuverDisplayState::new();
    assert_eq!(state.compute_display_index(0, 5), 0);
    assert_eq!(state.compute_display_index(1, 5), 1);
    assert_eq!(state.last_seen_maneuver_index(), 1);
}

#[test]
fn preview_holds_until_current_passes_shown_index() {
    let mut state = ManeuverDisplayState::new();
    assert_eq!(state.compute_display_index(2, 8), 2);

    state.on_approaching_maneuver_guidance();
    assert_eq!(state.compute_display_index(2, 8), 3);
    assert_eq!(state.compute_display_index(2, 8), 3);

    // 3 was already shown, so the preview carries on
    assert_eq!(state.compute_display_index(3, 8), 4);
    assert!(state.preview_active());
    assert_eq!(state.last_seen_maneuver_index(), 4);

    assert_eq!(state.compute_display_index(5, 8), 5);
    assert!(!state.preview_active());
    assert_eq!(state.compute_display_index(5, 8), 5);
}

#[test]
fn preview_cleared_by_jump_past_previewed_maneuver() {
    let mut state = ManeuverDisplayState::new();
    state.compute_display_index(1, 6);
    state.on_approaching_maneuver_guidance();
    assert_eq!(state.compute_display_index(1, 6), 2);

    assert_eq!(state.compute_display_index(4, 6), 4);
    assert!(!state.preview_active());
}

#[test]
fn preview_clamped_to_last_maneuver() {
    let mut state = ManeuverDisplayState::new();
    state.compute_display_index(3, 4);
    state.on_approaching_maneuver_guidance();
    assert_eq!(state.compute_display_index(3, 4), 3);
}

#[test]
fn reset_clears_preview_and_index() {
    let mut state = ManeuverDisplayState::new();
    state.compute_display_index(4, 6);
    state.on_approaching_maneuver_guidance();
    state.reset();

    assert!(!state.preview_active());
    assert_eq!(state.last_seen_maneuver_index(), 0);
    assert_eq!(state.compute_display_index(0, 6), 0);
}
