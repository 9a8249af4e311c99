use std::time::{Duration, Instant};

use rpg_engine::{
    Event, InputAction, InputEvent, Rgb, Scene, SceneContext, Surface, Vec2,
};
use tracing::info;

const BACKGROUND: Rgb = Rgb::new(18, 20, 30);
const TITLE_POSITION: Vec2 = Vec2::new(32.0, 48.0);
const MENU_ORIGIN: Vec2 = Vec2::new(48.0, 112.0);
const MENU_LINE_HEIGHT_PX: f32 = 20.0;
const CURSOR_OFFSET_PX: f32 = 16.0;
const CURSOR_BLINK: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MenuAction {
    NewGame { level: String, spawn: Vec2 },
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MenuEntry {
    label: String,
    action: MenuAction,
}

impl MenuEntry {
    pub(crate) fn new_game(label: impl Into<String>, level: String, spawn: Vec2) -> Self {
        Self {
            label: label.into(),
            action: MenuAction::NewGame { level, spawn },
        }
    }

    pub(crate) fn quit(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: MenuAction::Quit,
        }
    }
}

/// First screen: a vertical menu moved with up/down and activated with confirm.
pub(crate) struct TitleScreen {
    title: String,
    entries: Vec<MenuEntry>,
    selected: usize,
    activated: bool,
    opened_at: Option<Instant>,
    cursor_visible: bool,
}

impl TitleScreen {
    pub(crate) fn new(title: String, entries: Vec<MenuEntry>) -> Self {
        Self {
            title,
            entries,
            selected: 0,
            activated: false,
            opened_at: None,
            cursor_visible: true,
        }
    }

    pub(crate) fn selected(&self) -> usize {
        self.selected
    }

    fn move_selection(&mut self, forward: bool) {
        let count = self.entries.len();
        if count == 0 {
            return;
        }
        self.selected = if forward {
            (self.selected + 1) % count
        } else {
            (self.selected + count - 1) % count
        };
    }

    fn activate(&mut self, ctx: &mut SceneContext<'_>) {
        let Some(entry) = self.entries.get(self.selected) else {
            return;
        };
        // Ignore repeats while the level fades in.
        if self.activated {
            return;
        }
        match &entry.action {
            MenuAction::NewGame { level, spawn } => {
                info!(level = %level, "new_game_selected");
                self.activated = true;
                ctx.fire_event(Event::change_level(level.clone(), *spawn));
            }
            MenuAction::Quit => {
                info!(reason = "title_menu", "quit_requested");
                self.activated = true;
                ctx.fire_event(Event::quit());
            }
        }
    }
}

impl Scene for TitleScreen {
    fn on_input_event(&mut self, event: InputEvent, ctx: &mut SceneContext<'_>) -> bool {
        let InputEvent::Pressed(action) = event else {
            return false;
        };
        match action {
            InputAction::MoveUp => self.move_selection(false),
            InputAction::MoveDown => self.move_selection(true),
            InputAction::Confirm => self.activate(ctx),
            _ => return false,
        }
        true
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>) {
        let opened_at = *self.opened_at.get_or_insert(ctx.now);
        let blinks = ctx.now.saturating_duration_since(opened_at).as_millis()
            / CURSOR_BLINK.as_millis();
        self.cursor_visible = blinks % 2 == 0;
    }

    fn draw(&mut self, surface: &mut dyn Surface) {
        surface.clear(BACKGROUND);
        surface.draw_label(&self.title, TITLE_POSITION);
        for (index, entry) in self.entries.iter().enumerate() {
            let at = Vec2::new(
                MENU_ORIGIN.x,
                MENU_ORIGIN.y + index as f32 * MENU_LINE_HEIGHT_PX,
            );
            surface.draw_label(&entry.label, at);
            if index == self.selected && self.cursor_visible {
                surface.draw_label(">", Vec2::new(at.x - CURSOR_OFFSET_PX, at.y));
            }
        }
    }

    fn debug_title(&self) -> Option<String> {
        let selected = self
            .entries
            .get(self.selected())
            .map(|entry| entry.label.as_str())
            .unwrap_or("-");
        Some(format!("title | selected {selected}"))
    }
}

#[cfg(test)]
mod tests {
    use rpg_engine::{EventKind, EventQueue, InputSnapshot};

    use super::*;

    fn screen() -> TitleScreen {
        TitleScreen::new(
            "Meadow".to_string(),
            vec![
                MenuEntry::new_game("New game", "level_1".to_string(), Vec2::new(2.0, 3.0)),
                MenuEntry::quit("Quit"),
            ],
        )
    }

    fn press(screen: &mut TitleScreen, action: InputAction, events: &mut EventQueue) -> bool {
        let input = InputSnapshot::empty();
        let mut ctx = SceneContext::new(Instant::now(), &input, events);
        screen.on_input_event(InputEvent::Pressed(action), &mut ctx)
    }

    #[test]
    fn selection_wraps_in_both_directions() {
        let mut screen = screen();
        let mut events = EventQueue::default();
        press(&mut screen, InputAction::MoveUp, &mut events);
        assert_eq!(screen.selected(), 1);
        press(&mut screen, InputAction::MoveDown, &mut events);
        assert_eq!(screen.selected(), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn confirming_new_game_fires_a_single_level_change() {
        let mut screen = screen();
        let mut events = EventQueue::default();
        assert!(press(&mut screen, InputAction::Confirm, &mut events));
        press(&mut screen, InputAction::Confirm, &mut events);
        assert_eq!(events.len(), 1);

        match events.poll(Instant::now()) {
            Some(EventKind::ChangeLevel { level_name, spawn }) => {
                assert_eq!(level_name, "level_1");
                assert_eq!(spawn, Vec2::new(2.0, 3.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn quit_entry_fires_quit() {
        let mut screen = screen();
        let mut events = EventQueue::default();
        press(&mut screen, InputAction::MoveDown, &mut events);
        press(&mut screen, InputAction::Confirm, &mut events);
        assert!(matches!(events.poll(Instant::now()), Some(EventKind::Quit)));
    }

    #[test]
    fn unrelated_keys_are_not_handled() {
        let mut screen = screen();
        let mut events = EventQueue::default();
        assert!(!press(&mut screen, InputAction::Cancel, &mut events));
        assert!(!press(&mut screen, InputAction::MoveLeft, &mut events));
    }

    #[test]
    fn cursor_blinks_after_opening() {
        let mut screen = screen();
        let mut events = EventQueue::default();
        let input = InputSnapshot::empty();
        let start = Instant::now();
        screen.update(&mut SceneContext::new(start, &input, &mut events));
        assert!(screen.cursor_visible);
        screen.update(&mut SceneContext::new(start + CURSOR_BLINK, &input, &mut events));
        assert!(!screen.cursor_visible);
    }
}
