use crate::clock::TickSource;
use crate::config::Config;
use crate::engine::{StageEvent, StageTimerEngine};
use crate::notifier::NotifierSet;
use crate::persistence::SavedState;
use crate::presets::{custom_preset, to_sequence, PresetStore};
use crate::push::PushClient;
use anyhow::{bail, Result};
use leaven_ipc::{Command, Preset, Response, TimerStatus};
use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tachyonfx::{fx, EffectManager, Interpolation};
use tracing::{info, warn};

#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub enum AppMode {
    #[default]
    Normal,
    /// Preset picker open, cursor on the given row.
    SelectingPreset(usize),
    ShowHelp,
}

#[derive(Debug, Clone)]
pub struct Banner {
    pub text: String,
    pub is_final: bool,
    pub shown_at: Instant,
}

pub struct App {
    pub engine: StageTimerEngine,
    pub presets: PresetStore,
    pub selected_preset: String,
    pub mode: AppMode,
    pub banner: Option<Banner>,
    pub config: Config,
    pub effect_manager: EffectManager<u32>,
    pub should_quit: bool,
    /// Set when an event wants the countdown to flash; cleared by the UI.
    pub flash_pending: bool,
    /// Set when presets or the selection changed and should be saved.
    pub dirty: bool,
    notifiers: NotifierSet,
    push: PushClient,
    permission_requested: bool,
    /// The engine just entered `Running`; the clock must count from now.
    rearm_pending: bool,
}

impl App {
    pub fn new(
        config: Config,
        saved: Option<SavedState>,
        notifiers: NotifierSet,
        push: PushClient,
    ) -> Self {
        let saved = saved.unwrap_or_default();
        let presets = PresetStore::new(saved.custom_presets);
        let selected = saved
            .selected_preset
            .filter(|id| presets.get(id).is_some())
            .or_else(|| presets.first().map(|p| p.id.clone()))
            .unwrap_or_default();
        let engine = StageTimerEngine::new(
            presets
                .get(&selected)
                .map(to_sequence)
                .unwrap_or_default(),
        );
        Self {
            engine,
            presets,
            selected_preset: selected,
            mode: AppMode::Normal,
            banner: None,
            config,
            effect_manager: EffectManager::default(),
            should_quit: false,
            flash_pending: false,
            dirty: false,
            notifiers,
            push,
            permission_requested: false,
            rearm_pending: false,
        }
    }

    pub fn saved_state(&self) -> SavedState {
        SavedState {
            selected_preset: Some(self.selected_preset.clone()),
            custom_presets: self.presets.custom().to_vec(),
        }
    }

    pub fn selected(&self) -> Option<&Preset> {
        self.presets.get(&self.selected_preset)
    }

    /// Apply a control operation and keep the push schedule in step with it.
    fn control(&mut self, op: impl FnOnce(&mut StageTimerEngine) -> bool) -> bool {
        let before = self.engine.status();
        let changed = op(&mut self.engine);
        if changed {
            if before != TimerStatus::Running && self.engine.is_running() {
                self.rearm_pending = true;
            }
            self.sync_push(before);
        }
        changed
    }

    fn sync_push(&mut self, before: TimerStatus) {
        let now = self.engine.status();
        if now == TimerStatus::Running {
            self.push.cancel_pending();
            self.push
                .schedule_in(self.engine.remaining_secs(), self.push_message());
        } else if matches!(now, TimerStatus::Paused | TimerStatus::Idle)
            && before != TimerStatus::Idle
        {
            self.push.cancel_pending();
        }
    }

    fn push_message(&self) -> String {
        let snap = self.engine.snapshot();
        let stage = snap.stage_name.unwrap_or_default();
        match snap.current_index {
            Some(i) if i + 1 == snap.stage_count => format!("{} is ready", snap.sequence_name),
            _ => format!("{} complete", stage),
        }
    }

    pub fn start(&mut self) -> bool {
        let started = self.control(StageTimerEngine::start);
        if started && !self.permission_requested {
            self.notifiers.request_permission();
            self.permission_requested = true;
        }
        started
    }

    pub fn pause(&mut self) -> bool {
        self.control(StageTimerEngine::pause)
    }

    pub fn resume(&mut self) -> bool {
        self.control(StageTimerEngine::resume)
    }

    pub fn reset_stage(&mut self) -> bool {
        self.banner = None;
        self.control(StageTimerEngine::reset_stage)
    }

    pub fn reset_all(&mut self) -> bool {
        self.banner = None;
        self.control(StageTimerEngine::reset_all)
    }

    pub fn next_stage(&mut self) -> bool {
        let advanced = self.control(StageTimerEngine::next_stage);
        if advanced {
            self.banner = None;
        }
        advanced
    }

    /// The single big button: whatever the obvious next step is.
    pub fn primary_action(&mut self) -> bool {
        match self.engine.status() {
            TimerStatus::Idle => self.start(),
            TimerStatus::Running => self.pause(),
            TimerStatus::Paused => self.resume(),
            TimerStatus::StageComplete => self.next_stage(),
            TimerStatus::AllComplete => self.reset_all(),
        }
    }

    /// Feed due ticks to the engine, or re-arm the clock while not running.
    /// A partial second in progress at pause is dropped.
    pub fn pump_clock(&mut self, clock: &mut impl TickSource) {
        if !self.engine.is_running() {
            clock.rearm();
            return;
        }
        if std::mem::take(&mut self.rearm_pending) {
            clock.rearm();
        }
        for _ in 0..clock.due_ticks() {
            if let Some(event) = self.engine.tick() {
                self.on_stage_event(event);
            }
            if !self.engine.is_running() {
                clock.rearm();
                break;
            }
        }
    }

    fn on_stage_event(&mut self, event: StageEvent) {
        let delivered = self.notifiers.dispatch(&event);
        info!(
            stage = %event.stage_name,
            is_final = event.is_final,
            delivered,
            "stage event dispatched"
        );
        self.banner = Some(Banner {
            text: event.title(),
            is_final: event.is_final,
            shown_at: Instant::now(),
        });
        self.flash_pending = true;
    }

    pub fn visible_banner(&self) -> Option<&Banner> {
        let ttl = Duration::from_secs(self.config.notifications.banner_secs);
        self.banner
            .as_ref()
            .filter(|b| b.is_final || b.shown_at.elapsed() < ttl)
    }

    pub fn select_preset(&mut self, id: &str) -> Result<()> {
        if self.engine.status().is_active() {
            bail!("Timer is running; pause and reset before switching presets");
        }
        let Some(preset) = self.presets.get(id) else {
            bail!("No preset with id {:?}", id);
        };
        let sequence = to_sequence(preset);
        let before = self.engine.status();
        self.engine.set_sequence(sequence);
        self.selected_preset = id.to_string();
        self.banner = None;
        self.dirty = true;
        self.sync_push(before);
        Ok(())
    }

    /// Presets arriving without an id are new and get a generated one.
    pub fn save_preset(&mut self, preset: Preset) -> Result<()> {
        let id = if preset.id.trim().is_empty() {
            let mut fresh = custom_preset(&preset.name, preset.stages);
            if !preset.description.is_empty() {
                fresh.description = preset.description;
            }
            if !preset.emoji.is_empty() {
                fresh.emoji = preset.emoji;
            }
            let preset = fresh;
            let id = preset.id.clone();
            self.presets.add(preset)?;
            id
        } else {
            let id = preset.id.clone();
            self.presets.save(preset)?;
            id
        };
        self.dirty = true;
        // Edits to the loaded preset take effect once the timer is at rest.
        if id == self.selected_preset && !self.engine.status().is_active() {
            self.select_preset(&id)?;
        }
        Ok(())
    }

    pub fn delete_preset(&mut self, id: &str) -> Result<()> {
        if id == self.selected_preset && self.engine.status().is_active() {
            bail!("Preset {:?} is in use by the running timer", id);
        }
        self.presets.delete(id)?;
        self.dirty = true;
        if id == self.selected_preset {
            let fallback = self
                .presets
                .first()
                .map(|p| p.id.clone())
                .unwrap_or_default();
            self.select_preset(&fallback)?;
        }
        Ok(())
    }

    pub fn handle_command(&mut self, command: Command) -> Response {
        let result = match command {
            Command::Start => {
                self.start();
                Ok(())
            }
            Command::Pause => {
                self.pause();
                Ok(())
            }
            Command::Resume => {
                self.resume();
                Ok(())
            }
            Command::ResetStage => {
                self.reset_stage();
                Ok(())
            }
            Command::ResetAll => {
                self.reset_all();
                Ok(())
            }
            Command::NextStage => {
                self.next_stage();
                Ok(())
            }
            Command::Status => return Response::Status(self.engine.snapshot()),
            Command::ListPresets => {
                return Response::Presets(self.presets.summaries(&self.selected_preset))
            }
            Command::SelectPreset { id } => self.select_preset(&id),
            Command::SavePreset { preset } => self.save_preset(preset),
            Command::DeletePreset { id } => self.delete_preset(&id),
        };
        match result {
            Ok(()) => Response::Ok,
            Err(e) => {
                warn!("Command rejected: {}", e);
                Response::Error(e.to_string())
            }
        }
    }

    pub fn open_preset_picker(&mut self) {
        let row = self
            .presets
            .all()
            .position(|p| p.id == self.selected_preset)
            .unwrap_or(0);
        self.mode = AppMode::SelectingPreset(row);
    }

    pub fn move_picker(&mut self, delta: isize) {
        if let AppMode::SelectingPreset(row) = self.mode {
            let last = self.presets.len().saturating_sub(1);
            let row = row.saturating_add_signed(delta).min(last);
            self.mode = AppMode::SelectingPreset(row);
        }
    }

    pub fn confirm_picker(&mut self) {
        if let AppMode::SelectingPreset(row) = self.mode {
            let id = self.presets.all().nth(row).map(|p| p.id.clone());
            if let Some(id) = id {
                if let Err(e) = self.select_preset(&id) {
                    warn!("{}", e);
                }
            }
            self.mode = AppMode::Normal;
        }
    }

    pub fn trigger_complete_effect(&mut self, area: Rect, is_final: bool) {
        let color = if is_final {
            self.config.theme.green
        } else {
            self.config.theme.yellow
        };
        let effect = fx::fade_from_fg(color, (800, Interpolation::QuadOut)).with_area(area);
        self.effect_manager.add_effect(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notifier::tests::Recorder;
    use crate::notifier::{Notifier, NotifyError, Permission};
    use crate::push::PushRequest;
    use leaven_ipc::Stage;
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio::sync::mpsc;

    /// Counts permission prompts and otherwise stays quiet.
    struct PermissionCounter(Rc<Cell<u32>>);

    impl Notifier for PermissionCounter {
        fn name(&self) -> &'static str {
            "permission-counter"
        }

        fn request_permission(&mut self) -> Permission {
            self.0.set(self.0.get() + 1);
            Permission::Granted
        }

        fn notify(&mut self, _event: &StageEvent) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    fn seconds_preset(id: &str, secs: &[u64]) -> Preset {
        let stages = secs
            .iter()
            .enumerate()
            .map(|(i, &s)| Stage {
                id: format!("s{i}"),
                name: format!("Stage {i}"),
                description: String::new(),
                duration_secs: s,
                emoji: String::new(),
            })
            .collect();
        Preset {
            id: id.to_string(),
            ..custom_preset("Quick", stages)
        }
    }

    fn app_with(secs: &[u64]) -> (App, Recorder, mpsc::UnboundedReceiver<PushRequest>) {
        let recorder = Recorder::default();
        let mut notifiers = NotifierSet::default();
        notifiers.push(recorder.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let saved = SavedState {
            selected_preset: Some("quick".into()),
            custom_presets: vec![seconds_preset("quick", secs)],
        };
        let app = App::new(Config::default(), Some(saved), notifiers, PushClient::new(tx));
        (app, recorder, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PushRequest>) -> Vec<PushRequest> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn restores_selection_or_falls_back() {
        let (app, _, _) = app_with(&[5]);
        assert_eq!(app.selected_preset, "quick");
        assert_eq!(app.engine.sequence().name(), "Quick");

        let saved = SavedState {
            selected_preset: Some("gone".into()),
            custom_presets: Vec::new(),
        };
        let app = App::new(
            Config::default(),
            Some(saved),
            NotifierSet::default(),
            PushClient::disabled(),
        );
        assert_eq!(app.selected_preset, "white-bread");
    }

    #[test]
    fn clock_drives_stage_events_to_notifiers() {
        let (mut app, recorder, _rx) = app_with(&[2, 1]);
        let mut clock = ManualClock::default();
        app.start();
        app.pump_clock(&mut clock);
        clock.advance(5);
        app.pump_clock(&mut clock);
        // surplus ticks after completion are dropped, not carried over
        assert_eq!(app.engine.status(), TimerStatus::StageComplete);
        assert_eq!(recorder.0.borrow().len(), 1);
        assert!(app.flash_pending);
        assert_eq!(app.visible_banner().unwrap().text, "Stage 0 complete");

        app.primary_action();
        assert_eq!(app.engine.status(), TimerStatus::Running);
        assert!(app.banner.is_none());
        app.pump_clock(&mut clock);
        clock.advance(1);
        app.pump_clock(&mut clock);
        assert_eq!(app.engine.status(), TimerStatus::AllComplete);
        assert!(recorder.0.borrow()[1].is_final);
    }

    #[test]
    fn clock_is_rearmed_while_paused() {
        let (mut app, _, _rx) = app_with(&[10]);
        let mut clock = ManualClock::default();
        app.start();
        app.pause();
        clock.advance(3);
        app.pump_clock(&mut clock);
        app.resume();
        app.pump_clock(&mut clock);
        assert_eq!(app.engine.remaining_secs(), 10);
    }

    #[test]
    fn ticks_due_before_start_are_not_counted() {
        let (mut app, _, _rx) = app_with(&[10]);
        let mut clock = ManualClock::default();
        app.pump_clock(&mut clock);
        // a start arriving between passes, with time already banked
        clock.advance(1);
        app.start();
        app.pump_clock(&mut clock);
        assert_eq!(app.engine.remaining_secs(), 10);

        clock.advance(2);
        app.pump_clock(&mut clock);
        assert_eq!(app.engine.remaining_secs(), 8);

        app.pause();
        clock.advance(1);
        app.resume();
        app.pump_clock(&mut clock);
        assert_eq!(app.engine.remaining_secs(), 8);
    }

    #[test]
    fn permission_is_requested_once_across_runs() {
        let asked = Rc::new(Cell::new(0));
        let mut notifiers = NotifierSet::default();
        notifiers.push(PermissionCounter(asked.clone()));
        let saved = SavedState {
            selected_preset: Some("quick".into()),
            custom_presets: vec![seconds_preset("quick", &[10])],
        };
        let mut app = App::new(
            Config::default(),
            Some(saved),
            notifiers,
            PushClient::disabled(),
        );
        assert_eq!(asked.get(), 0);
        app.start();
        assert_eq!(asked.get(), 1);
        app.reset_all();
        app.start();
        assert_eq!(asked.get(), 1);
    }

    #[test]
    fn oversized_stage_is_refused_before_it_can_run() {
        let (mut app, _, _rx) = app_with(&[10]);
        let mut huge = seconds_preset("huge", &[10]);
        huge.stages[0].duration_secs = 1_000_000_000_000 * 60;
        assert!(app.save_preset(huge).is_err());
        assert!(app.select_preset("huge").is_err());

        let wire = r#"{"SavePreset":{"preset":{"name":"Huge","stages":[
            {"id":"rest","name":"Rest","duration_minutes":1e12}]}}}"#;
        assert!(serde_json::from_str::<Command>(wire).is_err());

        let week = seconds_preset("week", &[leaven_ipc::MAX_STAGE_MINUTES * 60]);
        app.save_preset(week).unwrap();
        app.select_preset("week").unwrap();
        assert!(app.start());
        assert_eq!(app.engine.status(), TimerStatus::Running);
    }

    #[test]
    fn push_follows_running_state() {
        let (mut app, _, mut rx) = app_with(&[60, 30]);
        app.start();
        let reqs = drain(&mut rx);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0], PushRequest::CancelPending);
        assert!(matches!(&reqs[1], PushRequest::Schedule { message, .. } if message == "Stage 0 complete"));

        app.pause();
        assert_eq!(drain(&mut rx), vec![PushRequest::CancelPending]);
        app.pause();
        assert!(drain(&mut rx).is_empty());

        app.reset_all();
        assert_eq!(drain(&mut rx), vec![PushRequest::CancelPending]);
        app.reset_all();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn last_stage_push_names_the_loaf() {
        let (mut app, _, mut rx) = app_with(&[1, 5]);
        let mut clock = ManualClock::default();
        app.start();
        app.pump_clock(&mut clock);
        clock.advance(1);
        app.pump_clock(&mut clock);
        drain(&mut rx);
        app.next_stage();
        let reqs = drain(&mut rx);
        assert!(matches!(&reqs[1], PushRequest::Schedule { message, .. } if message == "Quick is ready"));
    }

    #[test]
    fn selection_is_refused_mid_run() {
        let (mut app, _, _rx) = app_with(&[10]);
        app.start();
        assert!(app.select_preset("bagel").is_err());
        app.pause();
        assert!(app.select_preset("bagel").is_err());
        app.reset_all();
        app.select_preset("bagel").unwrap();
        assert_eq!(app.engine.sequence().name(), "Bagel");
        assert!(app.dirty);
    }

    #[test]
    fn commands_map_to_responses() {
        let (mut app, _, _rx) = app_with(&[10]);
        assert!(matches!(app.handle_command(Command::Start), Response::Ok));
        match app.handle_command(Command::Status) {
            Response::Status(snap) => {
                assert_eq!(snap.status, TimerStatus::Running);
                assert_eq!(snap.remaining_secs, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
        // invalid transitions are not errors
        assert!(matches!(app.handle_command(Command::NextStage), Response::Ok));
        assert!(matches!(
            app.handle_command(Command::SelectPreset { id: "nope".into() }),
            Response::Error(_)
        ));
        match app.handle_command(Command::ListPresets) {
            Response::Presets(list) => assert_eq!(list.len(), 16),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn deleting_selected_preset_falls_back() {
        let (mut app, _, _rx) = app_with(&[10]);
        app.delete_preset("quick").unwrap();
        assert_eq!(app.selected_preset, "white-bread");
        assert!(app.presets.custom().is_empty());
        assert!(app.delete_preset("baguette").is_err());
    }

    #[test]
    fn saving_selected_preset_reloads_it_when_idle() {
        let (mut app, _, _rx) = app_with(&[10]);
        let mut edited = seconds_preset("quick", &[20, 20]);
        edited.stages.push(edited.stages[0].clone());
        app.save_preset(edited).unwrap();
        assert_eq!(app.engine.sequence().len(), 3);
        assert_eq!(app.engine.remaining_secs(), 20);
    }

    #[test]
    fn preset_without_id_gets_one() {
        let (mut app, _, _rx) = app_with(&[10]);
        let mut fresh = seconds_preset("", &[30]);
        fresh.name = "Overnight rye".into();
        fresh.emoji = "🌾".into();
        app.save_preset(fresh).unwrap();
        let saved = app.presets.custom().last().unwrap();
        assert!(saved.id.starts_with("custom-"));
        assert_eq!(saved.emoji, "🌾");
        assert_eq!(app.selected_preset, "quick");
    }

    #[test]
    fn picker_moves_within_bounds() {
        let (mut app, _, _rx) = app_with(&[10]);
        app.open_preset_picker();
        assert_eq!(app.mode, AppMode::SelectingPreset(15));
        app.move_picker(5);
        assert_eq!(app.mode, AppMode::SelectingPreset(15));
        app.move_picker(-20);
        assert_eq!(app.mode, AppMode::SelectingPreset(0));
        app.confirm_picker();
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.selected_preset, "white-bread");
    }
}
