#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Confirm,
    Cancel,
}

const ACTION_COUNT: usize = 6;

/// Discrete input delivered to the active scene through `Scene::on_input_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Pressed(InputAction),
    Released(InputAction),
}

impl InputEvent {
    pub fn action(self) -> InputAction {
        match self {
            InputEvent::Pressed(action) | InputEvent::Released(action) => action,
        }
    }

    pub fn is_press_of(self, action: InputAction) -> bool {
        self == InputEvent::Pressed(action)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
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
            InputAction::Confirm => 4,
            InputAction::Cancel => 5,
        }
    }
}
