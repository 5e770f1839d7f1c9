use std::collections::HashMap;
use super::errors::HandlerError;
use super::types::{EventKind, UploadEvent};

/// What a handler concluded about the event it saw.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Normal,
    /// The published data stands for a failed operation, e.g. a server
    /// response that reports an error. The message may hold `{{placeholders}}`.
    Failure(String),
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

pub type HandlerResult = Result<Outcome, HandlerError>;

/// 事件处理器
pub type EventHandler = Box<dyn FnMut(&mut UploadEvent) -> HandlerResult + Send>;

/// Synchronous multi-subscriber dispatch.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, handler: EventHandler) -> &mut Self {
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    /// Drops the handlers of one event, or of every event.
    pub fn off(&mut self, kind: Option<EventKind>) {
        match kind {
            Some(kind) => {
                self.handlers.remove(&kind);
            }
            None => self.handlers.clear(),
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Runs the handlers of `event.kind()` in registration order.
    ///
    /// A failure outcome does not stop the loop; the last one seen is returned.
    /// A handler error stops the loop and is returned at once.
    pub fn publish(&mut self, event: &mut UploadEvent) -> HandlerResult {
        let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
            return Ok(Outcome::Normal);
        };

        let mut last_failure = None;
        for handler in handlers.iter_mut() {
            if let Outcome::Failure(message) = handler(&mut *event)? {
                last_failure = Some(message);
            }
        }

        Ok(last_failure.map(Outcome::Failure).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use super::*;
    use crate::core::types::{JobId, TransportResponse};

    fn completed() -> UploadEvent {
        UploadEvent::UploadCompleted {
            id: JobId::from("upload_file_1"),
            name: "a.txt".to_string(),
            response: TransportResponse::new(Some(200), "ok"),
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str, outcome: Outcome) -> EventHandler {
        let log = log.clone();
        Box::new(move |_event| {
            log.lock().unwrap().push(tag);
            Ok(outcome.clone())
        })
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(EventKind::UploadCompleted, recorder(&log, "first", Outcome::Normal))
            .on(EventKind::UploadCompleted, recorder(&log, "second", Outcome::Normal))
            .on(EventKind::UploadFailed, recorder(&log, "other", Outcome::Normal));

        assert_eq!(bus.publish(&mut completed()).unwrap(), Outcome::Normal);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_failures_keep_running_and_last_one_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(EventKind::UploadCompleted, recorder(&log, "a", Outcome::failure("first")))
            .on(EventKind::UploadCompleted, recorder(&log, "b", Outcome::Normal))
            .on(EventKind::UploadCompleted, recorder(&log, "c", Outcome::failure("last")));

        assert_eq!(bus.publish(&mut completed()).unwrap(), Outcome::failure("last"));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_defect_stops_the_loop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(EventKind::UploadCompleted, recorder(&log, "a", Outcome::failure("swallowed")));
        bus.on(EventKind::UploadCompleted, Box::new(|_| Err(HandlerError::new("boom"))));
        bus.on(EventKind::UploadCompleted, recorder(&log, "never", Outcome::Normal));

        let err = bus.publish(&mut completed()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_handlers_can_mutate_the_event() {
        let mut bus = EventBus::new();
        bus.on(EventKind::BeforeUpload, Box::new(|event| {
            if let UploadEvent::BeforeUpload { form_fields, .. } = event {
                form_fields.insert("token".to_string(), "abc".to_string());
            }
            Ok(Outcome::Normal)
        }));

        let mut event = UploadEvent::BeforeUpload {
            id: JobId::from("upload_file_1"),
            name: "a.txt".to_string(),
            form_fields: Default::default(),
            headers: Default::default(),
        };
        let _ = bus.publish(&mut event).unwrap();

        match event {
            UploadEvent::BeforeUpload { form_fields, .. } => assert_eq!(form_fields["token"], "abc"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_off() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(EventKind::UploadCompleted, recorder(&log, "a", Outcome::Normal));
        bus.on(EventKind::UploadFailed, recorder(&log, "b", Outcome::Normal));

        bus.off(Some(EventKind::UploadCompleted));
        assert_eq!(bus.handler_count(EventKind::UploadCompleted), 0);
        assert_eq!(bus.handler_count(EventKind::UploadFailed), 1);

        bus.off(None);
        assert_eq!(bus.handler_count(EventKind::UploadFailed), 0);
        assert_eq!(bus.publish(&mut completed()).unwrap(), Outcome::Normal);
        assert!(log.lock().unwrap().is_empty());
    }
}
