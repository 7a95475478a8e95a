#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Skip,
    Confirm,
    Quit,
}

const ACTION_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Skip => 4,
            InputAction::Confirm => 5,
            InputAction::Quit => 6,
        }
    }
}

/// Input state for one simulation tick. Held actions persist across ticks;
/// `pressed` edges are only reported on the tick they happened.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    held: ActionStates,
    pressed: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.held.is_down(action)
    }

    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    pub fn quit_requested(&self) -> bool {
        self.was_pressed(InputAction::Quit)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.held.set(action, is_down);
        self
    }

    pub fn with_pressed(mut self, action: InputAction) -> Self {
        self.pressed.set(action, true);
        self.held.set(action, true);
        self
    }

    /// Unit direction from the held movement actions, or zero.
    pub fn move_axis(&self) -> (f32, f32) {
        let mut x: f32 = 0.0;
        let mut y: f32 = 0.0;
        if self.is_down(InputAction::MoveRight) {
            x += 1.0;
        }
        if self.is_down(InputAction::MoveLeft) {
            x -= 1.0;
        }
        if self.is_down(InputAction::MoveUp) {
            y += 1.0;
        }
        if self.is_down(InputAction::MoveDown) {
            y -= 1.0;
        }
        let length = (x * x + y * y).sqrt();
        if length > 0.0 {
            (x / length, y / length)
        } else {
            (0.0, 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressed_edge_implies_held() {
        let snapshot = InputSnapshot::empty().with_pressed(InputAction::Skip);
        assert!(snapshot.was_pressed(InputAction::Skip));
        assert!(snapshot.is_down(InputAction::Skip));
        assert!(!snapshot.was_pressed(InputAction::Confirm));
    }

    #[test]
    fn move_axis_is_normalized_on_diagonals() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveUp, true)
            .with_action_down(InputAction::MoveRight, true);
        let (x, y) = snapshot.move_axis();
        assert!((x - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((y - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn opposing_directions_cancel() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveLeft, true)
            .with_action_down(InputAction::MoveRight, true);
        assert_eq!(snapshot.move_axis(), (0.0, 0.0));
    }
}
