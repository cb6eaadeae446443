use std::{
    any::Any,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::widgets::Popup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId(u64);

impl WidgetId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An event addressed to one widget, carrying an arbitrary payload.
pub struct AppEvent {
    target: WidgetId,
    payload: Box<dyn Any + Send>,
}

impl AppEvent {
    pub fn target(&self) -> WidgetId {
        self.target
    }

    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub duration: Duration,
}

impl Toast {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Info,
            duration: Duration::from_secs(2),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Error,
            duration: Duration::from_secs(4),
        }
    }
}

pub enum Message {
    // Invalidate the current frame and request a redraw
    Invalidate,
    SetPopup(Box<dyn Popup>),
    DismissPopup,
    ShowToast(Toast),
    Event(AppEvent),
}

/// Sending half of the app channel. The app loop owns the receiver.
pub struct Env {
    tx: UnboundedSender<Message>,
}

impl Env {
    pub fn new() -> (Self, UnboundedReceiver<Message>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Message>();
        (Env { tx }, rx)
    }

    pub fn ctx(&self, id: WidgetId) -> WidgetCtx {
        WidgetCtx {
            tx: self.tx.clone(),
            id,
        }
    }
}

/// Handle a widget uses to talk back to the app loop. Cheap to clone and
/// safe to move into spawned tasks.
#[derive(Clone)]
pub struct WidgetCtx {
    tx: UnboundedSender<Message>,
    id: WidgetId,
}

impl WidgetCtx {
    fn send(&self, msg: Message) {
        // the receiver only goes away while the app is shutting down
        let _ = self.tx.send(msg);
    }

    pub fn invalidate(&self) {
        self.send(Message::Invalidate);
    }

    pub fn set_popup(&self, popup: Box<dyn Popup>) {
        self.send(Message::SetPopup(popup));
    }

    pub fn dismiss_popup(&self) {
        self.send(Message::DismissPopup);
    }

    pub fn show_toast(&self, toast: Toast) {
        self.send(Message::ShowToast(toast));
    }

    pub fn emit_self<T: Any + Send>(&self, payload: T) {
        self.send(Message::Event(AppEvent {
            target: self.id,
            payload: Box::new(payload),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping(u32);

    #[tokio::test]
    async fn emitted_payload_reaches_target() {
        let (env, mut rx) = Env::new();
        let id = WidgetId::next();
        let ctx = env.ctx(id);
        ctx.emit_self(Ping(7));
        let Some(Message::Event(event)) = rx.recv().await else {
            panic!("expected an event");
        };
        assert_eq!(event.target(), id);
        assert_eq!(event.payload::<Ping>().map(|ping| ping.0), Some(7));
        assert!(event.payload::<String>().is_none());
    }

    #[test]
    fn widget_ids_are_unique() {
        assert_ne!(WidgetId::next(), WidgetId::next());
    }
}
