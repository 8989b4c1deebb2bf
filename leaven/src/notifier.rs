//! Local delivery of stage events: terminal bell and desktop notifications.
//!
//! Delivery is best effort. A failing notifier is logged and skipped; the
//! countdown never depends on it.

use crate::config::NotificationConfig;
use crate::engine::StageEvent;
use std::io::Write;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("terminal write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("desktop notification failed: {0}")]
    Desktop(String),

    #[error("notification permission denied")]
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Undetermined,
    Granted,
    Denied,
}

pub trait Notifier {
    fn name(&self) -> &'static str;

    /// Asked once, the first time a run starts. Denial is final.
    fn request_permission(&mut self) -> Permission {
        Permission::Granted
    }

    fn notify(&mut self, event: &StageEvent) -> Result<(), NotifyError>;
}

/// Audible cue: three bells for the final stage, one otherwise.
pub struct BellNotifier<W: Write> {
    out: W,
}

impl<W: Write> BellNotifier<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Notifier for BellNotifier<W> {
    fn name(&self) -> &'static str {
        "bell"
    }

    fn notify(&mut self, event: &StageEvent) -> Result<(), NotifyError> {
        let rings = if event.is_final { 3 } else { 1 };
        self.out.write_all(&b"\x07".repeat(rings))?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct DesktopNotifier {
    permission: Permission,
    enabled: bool,
}

impl DesktopNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            permission: Permission::Undetermined,
            enabled,
        }
    }
}

impl Notifier for DesktopNotifier {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn request_permission(&mut self) -> Permission {
        if self.permission == Permission::Undetermined {
            self.permission = if self.enabled {
                Permission::Granted
            } else {
                Permission::Denied
            };
        }
        self.permission
    }

    fn notify(&mut self, event: &StageEvent) -> Result<(), NotifyError> {
        if self.permission != Permission::Granted {
            return Err(NotifyError::Denied);
        }
        notify_rust::Notification::new()
            .summary(&format!("🍞 {}", event.title()))
            .body(&event.body())
            .appname("leaven")
            .show()
            .map_err(|e| NotifyError::Desktop(e.to_string()))?;
        Ok(())
    }
}

/// Fans one event out to every configured notifier.
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn from_config(config: &NotificationConfig) -> Self {
        let mut set = Self::default();
        if config.bell {
            set.push(BellNotifier::new(std::io::stdout()));
        }
        set.push(DesktopNotifier::new(config.desktop));
        set
    }

    pub fn push(&mut self, notifier: impl Notifier + 'static) {
        self.notifiers.push(Box::new(notifier));
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn request_permission(&mut self) {
        for n in &mut self.notifiers {
            let permission = n.request_permission();
            debug!(notifier = n.name(), ?permission, "notification permission");
        }
    }

    /// Returns how many notifiers delivered successfully.
    pub fn dispatch(&mut self, event: &StageEvent) -> usize {
        let mut delivered = 0;
        for n in &mut self.notifiers {
            match n.notify(event) {
                Ok(()) => delivered += 1,
                Err(NotifyError::Denied) => {
                    debug!(notifier = n.name(), "skipped, permission denied")
                }
                Err(e) => warn!(notifier = n.name(), "Failed to send notification: {}", e),
            }
        }
        delivered
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every event it sees; shared so tests can inspect it after
    /// handing ownership to a `NotifierSet`.
    #[derive(Clone, Default)]
    pub(crate) struct Recorder(pub Rc<RefCell<Vec<StageEvent>>>);

    impl Notifier for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn notify(&mut self, event: &StageEvent) -> Result<(), NotifyError> {
            self.0.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn notify(&mut self, _event: &StageEvent) -> Result<(), NotifyError> {
            Err(NotifyError::Desktop("no notification daemon".into()))
        }
    }

    fn event(is_final: bool) -> StageEvent {
        StageEvent {
            stage_index: 0,
            stage_name: "First rise".into(),
            sequence_name: "Bagel".into(),
            is_final,
        }
    }

    #[test]
    fn bell_rings_three_times_for_the_final_stage() {
        let mut bell = BellNotifier::new(Vec::new());
        bell.notify(&event(false)).unwrap();
        assert_eq!(bell.out, b"\x07");
        bell.notify(&event(true)).unwrap();
        assert_eq!(bell.out, b"\x07\x07\x07\x07");
    }

    #[test]
    fn failures_do_not_stop_other_notifiers() {
        let recorder = Recorder::default();
        let mut set = NotifierSet::default();
        set.push(Broken);
        set.push(recorder.clone());
        assert_eq!(set.dispatch(&event(true)), 1);
        assert_eq!(recorder.0.borrow().len(), 1);
    }

    #[test]
    fn desktop_permission_is_decided_once() {
        let mut desktop = DesktopNotifier::new(false);
        assert_eq!(desktop.request_permission(), Permission::Denied);
        desktop.enabled = true;
        assert_eq!(desktop.request_permission(), Permission::Denied);
        assert!(matches!(
            desktop.notify(&event(false)),
            Err(NotifyError::Denied)
        ));
    }

    #[test]
    fn desktop_is_silent_before_permission() {
        let mut desktop = DesktopNotifier::new(true);
        assert!(matches!(
            desktop.notify(&event(false)),
            Err(NotifyError::Denied)
        ));
    }
}
