use std::sync::Arc;

use homing_common::{ChatMessage, FeedView, IdentityState, MessageKey};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{List, ListItem, ListState, StatefulWidget, Widget},
};

#[derive(Debug)]
pub struct MessageListView {
    messages: FeedView,
    identity: IdentityState,
    fallback_display_name: Arc<str>,
    cursor: Option<MessageKey>,
    /// Keep the cursor on the newest message as snapshots arrive.
    following: bool,
    list_state: ListState,
    list_items: List<'static>,
}

impl MessageListView {
    pub fn new(fallback_display_name: Arc<str>) -> Self {
        Self {
            messages: Default::default(),
            identity: Default::default(),
            fallback_display_name,
            cursor: None,
            following: true,
            list_state: Default::default(),
            list_items: List::default().highlight_symbol("->"),
        }
    }

    pub fn cursor(&self) -> Option<&MessageKey> {
        self.cursor.as_ref()
    }

    pub fn select_next(&mut self) {
        use std::ops::Bound;
        self.cursor = match &self.cursor {
            Some(cursor) => self
                .messages
                .range((Bound::Excluded(cursor), Bound::Unbounded))
                .next(),
            None => self.messages.iter().next(),
        }
        .map(ChatMessage::key)
        .or_else(|| self.cursor.clone());
        self.following = self.cursor.as_ref() == self.messages.last().map(|m| &m.key);
        self.redraw_list();
    }

    pub fn select_prev(&mut self) {
        self.cursor = match &self.cursor {
            Some(cursor) => self.messages.range(..cursor).next_back(),
            None => self.messages.iter().next_back(),
        }
        .map(ChatMessage::key)
        .or_else(|| self.cursor.clone());
        self.following = self.cursor.as_ref() == self.messages.last().map(|m| &m.key);
        self.redraw_list();
    }

    pub fn select_last(&mut self) {
        self.cursor = self.messages.last().map(ChatMessage::key);
        self.following = true;
        self.redraw_list();
    }

    /// Swaps in a new snapshot of the feed.
    pub fn replace(&mut self, messages: FeedView) {
        self.messages = messages;
        let cursor_gone = self
            .cursor
            .as_ref()
            .is_some_and(|cursor| !self.messages.contains(cursor));
        if self.following || cursor_gone {
            self.cursor = self.messages.last().map(ChatMessage::key);
            self.following = true;
        }
        self.redraw_list();
    }

    pub fn set_identity(&mut self, identity: IdentityState) {
        self.identity = identity;
        self.redraw_list();
    }

    fn redraw_list(&mut self) {
        let selected_idx = self
            .cursor
            .as_ref()
            .and_then(|cursor| self.messages.position(cursor));
        let items = self
            .messages
            .iter()
            .map(|msg| self.list_item(msg))
            .collect::<Vec<_>>();
        self.list_state = std::mem::take(&mut self.list_state).with_selected(selected_idx);
        self.list_items = std::mem::take(&mut self.list_items).items(items);
    }

    fn list_item(&self, msg: &ChatMessage) -> ListItem<'static> {
        let own = msg.is_from(&self.identity);
        let author = Line::from(Span::styled(
            msg.author_label(&self.fallback_display_name).to_owned(),
            Style::new().fg(Color::DarkGray).italic(),
        ));
        let body = Line::from(msg.text.to_string());
        let (alignment, color) = if own {
            (Alignment::Right, Color::Green)
        } else {
            (Alignment::Left, Color::Reset)
        };
        ListItem::new(Text::from(vec![
            body.alignment(alignment).fg(color),
            author.alignment(alignment),
        ]))
    }
}

impl Widget for &mut MessageListView {
    fn render(self, area: Rect, buffer: &mut Buffer) {
        StatefulWidget::render(&self.list_items, area, buffer, &mut self.list_state);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use homing_common::{fields, Document, FieldValue, Identity, Record};

    use super::*;

    fn feed(ids: &[(&str, i64)]) -> FeedView {
        ids.iter()
            .map(|(id, secs)| {
                let document = Document {
                    id: (*id).into(),
                    fields: Record::from([
                        (fields::TEXT.into(), FieldValue::text(*id)),
                        (fields::AUTHOR_ID.into(), FieldValue::text("u1")),
                        (
                            fields::CREATED_AT.into(),
                            FieldValue::Timestamp(Utc.timestamp_opt(*secs, 0).unwrap()),
                        ),
                    ]),
                };
                ChatMessage::from_document(&document).unwrap()
            })
            .collect()
    }

    fn cursor_id(view: &MessageListView) -> Option<&str> {
        view.cursor().map(|key| &*key.id.0)
    }

    #[test]
    fn follows_newest_message() {
        let mut view = MessageListView::new("Anonymous".into());
        view.set_identity(Identity::new("u1").into());
        view.replace(feed(&[("a", 1), ("b", 2)]));
        assert_eq!(cursor_id(&view), Some("b"));
        view.replace(feed(&[("a", 1), ("b", 2), ("c", 3)]));
        assert_eq!(cursor_id(&view), Some("c"));
    }

    #[test]
    fn scrolled_back_cursor_stays_put() {
        let mut view = MessageListView::new("Anonymous".into());
        view.replace(feed(&[("a", 1), ("b", 2)]));
        view.select_prev();
        assert_eq!(cursor_id(&view), Some("a"));
        view.replace(feed(&[("a", 1), ("b", 2), ("c", 3)]));
        assert_eq!(cursor_id(&view), Some("a"));

        view.select_next();
        view.select_next();
        assert_eq!(cursor_id(&view), Some("c"));
        view.replace(feed(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]));
        assert_eq!(cursor_id(&view), Some("d"));
    }

    #[test]
    fn cursor_on_vanished_message_jumps_to_newest() {
        let mut view = MessageListView::new("Anonymous".into());
        view.replace(feed(&[("a", 1), ("b", 2)]));
        view.select_prev();
        view.replace(feed(&[("c", 3)]));
        assert_eq!(cursor_id(&view), Some("c"));
    }
}
