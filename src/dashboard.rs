use crate::input::Action;
use crate::model::{Instance, InstanceAction, InstanceState, WorklogEntry};
use crate::transport::SocketState;

pub trait DashboardView {
    fn render_instances(&mut self, instances: &[Instance]);
    fn update_instance_status(&mut self, id: &str, state: InstanceState);
    fn remove_instance(&mut self, id: &str);
    fn append_worklog(&mut self, entry: WorklogEntry);
    fn set_status(&mut self, status: String);
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FocusPane {
    Instances,
    Worklog,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CardControls {
    pub start: bool,
    pub stop: bool,
    pub delete: bool,
}

impl CardControls {
    fn for_state(state: InstanceState) -> Self {
        Self {
            start: !state.is_running(),
            stop: state.is_running(),
            delete: true,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InstanceCard {
    pub id: String,
    pub state: InstanceState,
    pub status_text: String,
    pub created: String,
    pub controls: CardControls,
}

impl InstanceCard {
    fn from_instance(instance: &Instance) -> Self {
        let mut card = Self {
            id: instance.id.clone(),
            state: instance.state,
            status_text: String::new(),
            created: instance.timestamp.clone(),
            controls: CardControls::for_state(instance.state),
        };
        card.apply_state(instance.state);
        card
    }

    fn apply_state(&mut self, state: InstanceState) {
        self.state = state;
        self.status_text = format!("Status: {state}");
        self.controls = CardControls::for_state(state);
    }
}

type CreateHandler = Box<dyn FnMut() + Send>;
type ActionHandler = Box<dyn FnMut(&str, InstanceAction) + Send>;
type ReloadHandler = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone)]
struct PendingConfirmation {
    prompt: String,
    id: String,
}

pub struct Dashboard {
    running: bool,
    backend: String,
    cards: Vec<InstanceCard>,
    worklog: Vec<WorklogEntry>,
    focus: FocusPane,
    selected: usize,
    worklog_selected: usize,
    follow_worklog: bool,
    status: String,
    show_help: bool,
    pending_g: bool,
    pending_confirmation: Option<PendingConfirmation>,
    socket_state: SocketState,
    full_renders: usize,
    page_size: usize,
    on_create: Option<CreateHandler>,
    on_instance_action: Option<ActionHandler>,
    on_reload: Option<ReloadHandler>,
}

impl Dashboard {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            running: true,
            backend: backend.into(),
            cards: Vec::new(),
            worklog: Vec::new(),
            focus: FocusPane::Instances,
            selected: 0,
            worklog_selected: 0,
            follow_worklog: true,
            status: "Connecting…".to_string(),
            show_help: false,
            pending_g: false,
            pending_confirmation: None,
            socket_state: SocketState::Closed,
            full_renders: 0,
            page_size: 10,
            on_create: None,
            on_instance_action: None,
            on_reload: None,
        }
    }

    pub fn set_on_create(&mut self, handler: impl FnMut() + Send + 'static) {
        self.on_create = Some(Box::new(handler));
    }

    pub fn set_on_instance_action(
        &mut self,
        handler: impl FnMut(&str, InstanceAction) + Send + 'static,
    ) {
        self.on_instance_action = Some(Box::new(handler));
    }

    pub fn set_on_reload(&mut self, handler: impl FnMut() + Send + 'static) {
        self.on_reload = Some(Box::new(handler));
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn cards(&self) -> &[InstanceCard] {
        &self.cards
    }

    pub fn worklog(&self) -> &[WorklogEntry] {
        &self.worklog
    }

    pub fn focus(&self) -> FocusPane {
        self.focus
    }

    pub fn selected_index(&self) -> Option<usize> {
        (!self.cards.is_empty()).then_some(self.selected)
    }

    pub fn selected_card(&self) -> Option<&InstanceCard> {
        self.cards.get(self.selected)
    }

    pub fn worklog_selected_index(&self) -> Option<usize> {
        (!self.worklog.is_empty()).then_some(self.worklog_selected)
    }

    pub fn follows_worklog(&self) -> bool {
        self.follow_worklog
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn pending_confirmation_prompt(&self) -> Option<&str> {
        self.pending_confirmation
            .as_ref()
            .map(|pending| pending.prompt.as_str())
    }

    pub fn socket_state(&self) -> SocketState {
        self.socket_state
    }

    pub fn set_socket_state(&mut self, state: SocketState) {
        self.socket_state = state;
    }

    #[cfg(test)]
    pub fn full_renders(&self) -> usize {
        self.full_renders
    }

    pub fn running_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|card| card.state.is_running())
            .count()
    }

    pub fn set_page_size(&mut self, rows: usize) {
        self.page_size = rows.max(1);
    }

    pub fn apply_action(&mut self, action: Action) {
        if let Some(pending) = self.pending_confirmation.take() {
            match action {
                Action::ConfirmYes => {
                    self.status = format!("Confirmed: {}", pending.prompt);
                    self.forward_action(&pending.id, InstanceAction::Delete);
                }
                Action::ConfirmNo | Action::Cancel => {
                    self.status = "Action cancelled".to_string();
                }
                Action::Quit => {
                    self.running = false;
                }
                _ => {
                    self.pending_confirmation = Some(pending);
                    self.status =
                        "Pending confirmation: press y to confirm or n to cancel".to_string();
                }
            }
            return;
        }

        if !matches!(action, Action::GPrefix) {
            self.pending_g = false;
        }

        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
        }

        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
            }
            Action::Down => self.move_focused(1),
            Action::Up => self.move_focused(-1),
            Action::PageDown => self.move_focused(self.page_size as isize),
            Action::PageUp => self.move_focused(-(self.page_size as isize)),
            Action::Top => self.select_focused_first(),
            Action::Bottom => self.select_focused_last(),
            Action::GPrefix => {
                if self.pending_g {
                    self.pending_g = false;
                    self.select_focused_first();
                } else {
                    self.pending_g = true;
                }
            }
            Action::ToggleFocus => {
                self.focus = match self.focus {
                    FocusPane::Instances => FocusPane::Worklog,
                    FocusPane::Worklog => FocusPane::Instances,
                };
            }
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::Create => {
                self.status = "Creating instance…".to_string();
                if let Some(handler) = self.on_create.as_mut() {
                    handler();
                }
            }
            Action::Reload => {
                self.status = "Reloading instances…".to_string();
                if let Some(handler) = self.on_reload.as_mut() {
                    handler();
                }
            }
            Action::Start => self.trigger_control(InstanceAction::Start),
            Action::Stop => self.trigger_control(InstanceAction::Stop),
            Action::Delete => self.prepare_delete_confirmation(),
            Action::ConfirmYes | Action::ConfirmNo | Action::Cancel => {}
        }
    }

    fn trigger_control(&mut self, action: InstanceAction) {
        let Some(card) = self.selected_card() else {
            self.status = "No selected instance".to_string();
            return;
        };

        let visible = match action {
            InstanceAction::Start => card.controls.start,
            InstanceAction::Stop => card.controls.stop,
            InstanceAction::Delete => card.controls.delete,
        };
        let id = card.id.clone();
        if !visible {
            self.status = format!("Instance {id} is already {}", card.state);
            return;
        }

        self.forward_action(&id, action);
    }

    fn prepare_delete_confirmation(&mut self) {
        let Some(card) = self.selected_card() else {
            self.status = "No selected instance to delete".to_string();
            return;
        };

        let id = card.id.clone();
        let prompt = format!("Delete instance {id}");
        self.pending_confirmation = Some(PendingConfirmation {
            prompt: prompt.clone(),
            id,
        });
        self.status = format!("{prompt}? [y/n]");
    }

    fn forward_action(&mut self, id: &str, action: InstanceAction) {
        if let Some(handler) = self.on_instance_action.as_mut() {
            handler(id, action);
        }
    }

    fn move_focused(&mut self, delta: isize) {
        match self.focus {
            FocusPane::Instances => {
                self.selected = step_index(self.selected, delta, self.cards.len());
            }
            FocusPane::Worklog => {
                self.worklog_selected =
                    step_index(self.worklog_selected, delta, self.worklog.len());
                self.follow_worklog =
                    self.worklog_selected + 1 >= self.worklog.len();
            }
        }
    }

    fn select_focused_first(&mut self) {
        match self.focus {
            FocusPane::Instances => self.selected = 0,
            FocusPane::Worklog => {
                self.worklog_selected = 0;
                self.follow_worklog = self.worklog.len() <= 1;
            }
        }
    }

    fn select_focused_last(&mut self) {
        match self.focus {
            FocusPane::Instances => self.selected = self.cards.len().saturating_sub(1),
            FocusPane::Worklog => {
                self.worklog_selected = self.worklog.len().saturating_sub(1);
                self.follow_worklog = true;
            }
        }
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.cards.len().saturating_sub(1));
    }
}

impl DashboardView for Dashboard {
    /// Rebuilds every card from scratch, O(n) per call.
    fn render_instances(&mut self, instances: &[Instance]) {
        let selected_id = self.selected_card().map(|card| card.id.clone());
        self.cards = instances.iter().map(InstanceCard::from_instance).collect();
        self.full_renders += 1;

        if let Some(id) = selected_id
            && let Some(index) = self.cards.iter().position(|card| card.id == id)
        {
            self.selected = index;
        }
        self.clamp_selection();
    }

    fn update_instance_status(&mut self, id: &str, state: InstanceState) {
        if let Some(card) = self.cards.iter_mut().find(|card| card.id == id) {
            card.apply_state(state);
        }
    }

    fn remove_instance(&mut self, id: &str) {
        let Some(index) = self.cards.iter().position(|card| card.id == id) else {
            return;
        };
        self.cards.remove(index);
        if index < self.selected {
            self.selected -= 1;
        }
        self.clamp_selection();
        if self
            .pending_confirmation
            .as_ref()
            .is_some_and(|pending| pending.id == id)
        {
            self.pending_confirmation = None;
        }
    }

    fn append_worklog(&mut self, entry: WorklogEntry) {
        self.worklog.push(entry);
        if self.follow_worklog {
            self.worklog_selected = self.worklog.len() - 1;
        }
    }

    fn set_status(&mut self, status: String) {
        self.status = status;
    }
}

fn step_index(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let max_index = len.saturating_sub(1) as isize;
    let current = current.min(max_index as usize) as isize;
    (current + delta).clamp(0, max_index) as usize
}

#[cfg(test)]
mod tests {
    use super::{Dashboard, DashboardView, FocusPane, InstanceCard};
    use crate::input::Action;
    use crate::model::{Instance, InstanceAction, InstanceState, WorklogEntry};
    use std::sync::{Arc, Mutex};

    fn card<'a>(dashboard: &'a Dashboard, id: &str) -> &'a InstanceCard {
        dashboard.cards().iter().find(|card| card.id == id).unwrap()
    }

    fn instance(id: &str, state: InstanceState) -> Instance {
        Instance {
            id: id.to_string(),
            state,
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    fn entry(info: &str) -> WorklogEntry {
        WorklogEntry {
            id: Some("a".to_string()),
            info: info.to_string(),
            timestamp: "t".to_string(),
            kind: None,
        }
    }

    fn recording_dashboard() -> (Dashboard, Arc<Mutex<Vec<(String, InstanceAction)>>>) {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        let forwarded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&forwarded);
        dashboard.set_on_instance_action(move |id, action| {
            sink.lock().unwrap().push((id.to_string(), action));
        });
        (dashboard, forwarded)
    }

    #[test]
    fn running_card_shows_stop_and_hides_start() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        dashboard.render_instances(&[instance("x", InstanceState::Running)]);

        let card = card(&dashboard, "x");
        assert_eq!(card.status_text, "Status: running");
        assert!(card.controls.stop);
        assert!(!card.controls.start);
        assert_eq!(dashboard.cards().len(), 1);
    }

    #[test]
    fn status_update_touches_only_the_matching_card() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        dashboard.render_instances(&[
            instance("a", InstanceState::Stopped),
            instance("b", InstanceState::Stopped),
        ]);

        dashboard.update_instance_status("a", InstanceState::Running);
        dashboard.update_instance_status("missing", InstanceState::Running);

        assert_eq!(dashboard.full_renders(), 1);
        assert!(card(&dashboard, "a").controls.stop);
        assert!(card(&dashboard, "b").controls.start);
        assert_eq!(dashboard.running_count(), 1);
    }

    #[test]
    fn full_render_keeps_selection_on_the_same_instance() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        dashboard.render_instances(&[
            instance("a", InstanceState::Stopped),
            instance("b", InstanceState::Stopped),
        ]);
        dashboard.apply_action(Action::Down);
        assert_eq!(dashboard.selected_card().unwrap().id, "b");

        dashboard.render_instances(&[
            instance("z", InstanceState::Stopped),
            instance("a", InstanceState::Stopped),
            instance("b", InstanceState::Stopped),
        ]);
        assert_eq!(dashboard.selected_card().unwrap().id, "b");
    }

    #[test]
    fn removing_last_card_clamps_selection() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        dashboard.render_instances(&[
            instance("a", InstanceState::Stopped),
            instance("b", InstanceState::Stopped),
        ]);
        dashboard.apply_action(Action::Bottom);
        dashboard.remove_instance("b");

        assert_eq!(dashboard.selected_index(), Some(0));
        dashboard.remove_instance("a");
        assert_eq!(dashboard.selected_index(), None);
    }

    #[test]
    fn start_is_ignored_when_its_control_is_hidden() {
        let (mut dashboard, forwarded) = recording_dashboard();
        dashboard.render_instances(&[instance("a", InstanceState::Running)]);

        dashboard.apply_action(Action::Start);
        assert!(forwarded.lock().unwrap().is_empty());

        dashboard.apply_action(Action::Stop);
        assert_eq!(
            forwarded.lock().unwrap().as_slice(),
            &[("a".to_string(), InstanceAction::Stop)]
        );
    }

    #[test]
    fn delete_waits_for_confirmation() {
        let (mut dashboard, forwarded) = recording_dashboard();
        dashboard.render_instances(&[instance("a", InstanceState::Stopped)]);

        dashboard.apply_action(Action::Delete);
        assert_eq!(
            dashboard.pending_confirmation_prompt(),
            Some("Delete instance a")
        );
        assert!(forwarded.lock().unwrap().is_empty());

        dashboard.apply_action(Action::Down);
        assert!(dashboard.pending_confirmation_prompt().is_some());

        dashboard.apply_action(Action::ConfirmYes);
        assert_eq!(
            forwarded.lock().unwrap().as_slice(),
            &[("a".to_string(), InstanceAction::Delete)]
        );
        assert!(dashboard.pending_confirmation_prompt().is_none());
    }

    #[test]
    fn delete_can_be_cancelled() {
        let (mut dashboard, forwarded) = recording_dashboard();
        dashboard.render_instances(&[instance("a", InstanceState::Stopped)]);

        dashboard.apply_action(Action::Delete);
        dashboard.apply_action(Action::ConfirmNo);

        assert!(forwarded.lock().unwrap().is_empty());
        assert_eq!(dashboard.status(), "Action cancelled");
    }

    #[test]
    fn create_fires_the_registered_handler() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        dashboard.set_on_create(move || *counter.lock().unwrap() += 1);

        dashboard.apply_action(Action::Create);
        dashboard.apply_action(Action::Create);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn intents_without_handlers_are_dropped() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        dashboard.render_instances(&[instance("a", InstanceState::Stopped)]);
        dashboard.apply_action(Action::Create);
        dashboard.apply_action(Action::Start);
        assert!(dashboard.running());
    }

    #[test]
    fn worklog_follows_tail_until_user_scrolls_up() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        for info in ["one", "two", "three"] {
            dashboard.append_worklog(entry(info));
        }
        assert_eq!(dashboard.worklog_selected_index(), Some(2));

        dashboard.apply_action(Action::ToggleFocus);
        assert_eq!(dashboard.focus(), FocusPane::Worklog);
        dashboard.apply_action(Action::Up);
        assert!(!dashboard.follows_worklog());

        dashboard.append_worklog(entry("four"));
        assert_eq!(dashboard.worklog_selected_index(), Some(1));
        assert_eq!(dashboard.worklog().len(), 4);

        dashboard.apply_action(Action::Bottom);
        dashboard.append_worklog(entry("five"));
        assert_eq!(dashboard.worklog_selected_index(), Some(4));
    }

    #[test]
    fn double_g_jumps_to_top() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        dashboard.render_instances(&[
            instance("a", InstanceState::Stopped),
            instance("b", InstanceState::Stopped),
            instance("c", InstanceState::Stopped),
        ]);
        dashboard.apply_action(Action::Bottom);
        dashboard.apply_action(Action::GPrefix);
        assert_eq!(dashboard.selected_index(), Some(2));
        dashboard.apply_action(Action::GPrefix);
        assert_eq!(dashboard.selected_index(), Some(0));
    }

    #[test]
    fn quit_stops_the_dashboard() {
        let mut dashboard = Dashboard::new("http://localhost:3000");
        dashboard.apply_action(Action::Quit);
        assert!(!dashboard.running());
    }
}
