use std::sync::Arc;

use async_trait::async_trait;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use homing_common::{Alert, Alerter, IdentityState};
use homing_sync::{ChatClient, Draft, FeedState, PublishOutcome, SignOutOutcome, SkipReason};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Stylize,
    text::Line,
    widgets::{Block, Clear, Paragraph, Wrap},
    Frame,
};
use tokio::sync::{mpsc, oneshot};

mod message_list;

pub use message_list::MessageListView;

/// An alert waiting to be shown, and the way to tell the relay it was dismissed.
#[derive(Debug)]
pub struct AlertRequest {
    alert: Alert,
    dismissed: oneshot::Sender<()>,
}

/// Hands alerts to the terminal UI and waits until the user dismisses them.
#[derive(Clone, Debug)]
pub struct TuiAlerter {
    requests: mpsc::UnboundedSender<AlertRequest>,
}

pub fn alerter() -> (TuiAlerter, mpsc::UnboundedReceiver<AlertRequest>) {
    let (requests, rx) = mpsc::unbounded_channel();
    (TuiAlerter { requests }, rx)
}

#[async_trait]
impl Alerter for TuiAlerter {
    async fn alert(&self, alert: Alert) {
        let (dismissed, rx) = oneshot::channel();
        if self.requests.send(AlertRequest { alert, dismissed }).is_err() {
            tracing::debug!("terminal is gone, dropping alert");
            return;
        }
        let _ = rx.await;
    }
}

enum Action {
    Quit,
    Publish,
    SignOut,
    Dismiss,
    None,
}

struct Screen {
    messages: MessageListView,
    identity: IdentityState,
    draft: Draft,
    alert: Option<AlertRequest>,
    feed_note: Option<String>,
    status: String,
}

impl Screen {
    fn apply_feed(&mut self, state: FeedState) {
        self.feed_note = match state {
            FeedState::Connecting => Some("connecting…".to_owned()),
            FeedState::Live(view) => {
                self.messages.replace(view);
                None
            }
            FeedState::Failed(reason) => Some(format!("feed stopped: {reason}")),
        };
    }

    fn apply_identity(&mut self, identity: IdentityState) {
        self.messages.set_identity(identity.clone());
        self.identity = identity;
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if self.alert.is_some() {
            return match key.code {
                KeyCode::Enter | KeyCode::Esc => Action::Dismiss,
                KeyCode::Char('c') if ctrl => Action::Quit,
                _ => Action::None,
            };
        }
        match key.code {
            KeyCode::Char('c') if ctrl => Action::Quit,
            KeyCode::Char('o') if ctrl => Action::SignOut,
            KeyCode::Char(c) if !ctrl => {
                self.draft.push(c);
                Action::None
            }
            KeyCode::Backspace => {
                self.draft.pop();
                Action::None
            }
            KeyCode::Enter => Action::Publish,
            KeyCode::Up => {
                self.messages.select_prev();
                Action::None
            }
            KeyCode::Down => {
                self.messages.select_next();
                Action::None
            }
            KeyCode::End => {
                self.messages.select_last();
                Action::None
            }
            _ => Action::None,
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [title_area, list_area, input_area, status_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let who = match &self.identity {
            IdentityState::NoIdentity => "not signed in".to_owned(),
            IdentityState::HasIdentity(identity) => identity
                .display_name
                .as_deref()
                .unwrap_or(&*identity.id)
                .to_owned(),
        };
        frame.render_widget(
            Line::from(format!(" homing · {who}")).bold().reversed(),
            title_area,
        );
        frame.render_widget(&mut self.messages, list_area);
        frame.render_widget(
            Paragraph::new(self.draft.text()).block(Block::bordered().title("Message")),
            input_area,
        );
        frame.render_widget(
            Line::from(format!(
                "{}  (Enter send · Ctrl-O sign out · Ctrl-C quit)",
                self.feed_note.as_deref().unwrap_or(&self.status)
            ))
            .dim(),
            status_area,
        );

        if let Some(request) = &self.alert {
            let area = popup_area(frame.area(), 60, 5);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(request.alert.to_string())
                    .wrap(Wrap { trim: true })
                    .block(
                        Block::bordered()
                            .title("Notification")
                            .title_bottom("Enter to dismiss"),
                    ),
                area,
            );
        }
    }

    fn dismiss(&mut self) {
        if let Some(request) = self.alert.take() {
            let _ = request.dismissed.send(());
        }
    }
}

fn popup_area(area: Rect, max_width: u16, max_height: u16) -> Rect {
    let width = area.width.min(max_width);
    let height = area.height.min(max_height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

pub async fn run(
    client: &ChatClient,
    alerts: mpsc::UnboundedReceiver<AlertRequest>,
    fallback_display_name: Arc<str>,
) -> std::io::Result<()> {
    let terminal = ratatui::init();
    let res = run_inner(terminal, client, alerts, fallback_display_name).await;
    ratatui::restore();
    res
}

async fn run_inner(
    mut term: ratatui::DefaultTerminal,
    client: &ChatClient,
    mut alerts: mpsc::UnboundedReceiver<AlertRequest>,
    fallback_display_name: Arc<str>,
) -> std::io::Result<()> {
    use futures::stream::StreamExt;

    let mut feed = client.watch_feed();
    let mut identity = client.watch_identity();
    let mut screen = Screen {
        messages: MessageListView::new(fallback_display_name),
        identity: IdentityState::NoIdentity,
        draft: Draft::new(),
        alert: None,
        feed_note: None,
        status: String::new(),
    };
    screen.apply_identity(identity.borrow_and_update().clone());
    screen.apply_feed(feed.borrow_and_update().clone());

    let mut term_events = crossterm::event::EventStream::new();
    loop {
        term.draw(|frame| screen.draw(frame))?;
        tokio::select! {
            event = term_events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    match screen.handle_key(key) {
                        Action::Quit => break,
                        Action::Dismiss => screen.dismiss(),
                        Action::Publish => {
                            screen.status = match client.publish(&mut screen.draft).await {
                                PublishOutcome::Sent(_) => String::new(),
                                PublishOutcome::Skipped(SkipReason::EmptyText) => String::new(),
                                PublishOutcome::Skipped(SkipReason::NoIdentity) => {
                                    "sign in to send messages".to_owned()
                                }
                                PublishOutcome::Failed => "message not sent".to_owned(),
                            };
                        }
                        Action::SignOut => {
                            if client.sign_out().await == SignOutOutcome::Failed {
                                screen.status = "sign out failed".to_owned();
                            }
                        }
                        Action::None => {}
                    }
                }
                Some(Ok(event)) => tracing::debug!("{event:?}"),
                Some(Err(err)) => tracing::warn!("{err}"),
                None => {
                    tracing::info!("term events stream stopped, shutting down");
                    break;
                }
            },
            Ok(()) = feed.changed() => {
                let state = feed.borrow_and_update().clone();
                screen.apply_feed(state);
            }
            Ok(()) = identity.changed() => {
                let state = identity.borrow_and_update().clone();
                screen.apply_identity(state);
            }
            Some(request) = alerts.recv(), if screen.alert.is_none() => {
                screen.alert = Some(request);
            }
        }
    }
    screen.dismiss();
    Ok(())
}
