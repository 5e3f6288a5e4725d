use std::sync::Arc;

use homing_common::{fields, DocumentStore, FieldValue, PushPayload, Record};
use rand::Rng;

use crate::FakePush;

const USER_NAMES: &[&str] = &["alice", "bob", "charlie", "dana"];

/// Posts lorem ipsum messages from a handful of fake users until the store refuses a write.
///
/// Every few messages a foreground notification is delivered as well.
pub async fn message_sender(store: Arc<dyn DocumentStore>, push: FakePush, collection: Arc<str>) {
    loop {
        let (record, notify, millis) = generate_message();
        if let Err(error) = store.add(&collection, record).await {
            tracing::info!(%error, "fake chatter stopped");
            return;
        }
        if let Some(payload) = notify {
            push.deliver(payload);
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(millis)).await;
    }
}

fn generate_message() -> (Record, Option<PushPayload>, u64) {
    const MIN_MESSAGE_WORDS: usize = 1;
    const MAX_MESSAGE_WORDS: usize = 15;
    const NOTIFY_ONE_IN: u32 = 5;
    let mut rng = rand::thread_rng();
    let index = rng.gen_range(0..USER_NAMES.len());
    let name = USER_NAMES[index];
    let message_len = rng.gen_range(MIN_MESSAGE_WORDS..=MAX_MESSAGE_WORDS);
    let text = lipsum::lipsum_words_with_rng(&mut rng, message_len);
    let mut record = Record::from([
        (fields::TEXT.into(), FieldValue::text(text.as_str())),
        (fields::CREATED_AT.into(), FieldValue::ServerTimestamp),
        (
            fields::AUTHOR_ID.into(),
            FieldValue::text(format!("@{name}:example.com")),
        ),
    ]);
    // some of the fake users never set a display name
    if rng.gen_bool(0.5) {
        record.insert(fields::AUTHOR_DISPLAY_NAME.into(), FieldValue::text(name));
    }
    let notify = (rng.gen_range(0..NOTIFY_ONE_IN) == 0)
        .then(|| PushPayload::new(format!("New message from {name}"), text));
    let millis = rng.gen_range(0..5000);
    (record, notify, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_messages_are_well_formed() {
        for _ in 0..20 {
            let (record, _, millis) = generate_message();
            assert!(millis < 5000);
            assert!(!record[fields::TEXT].as_text().unwrap().trim().is_empty());
            assert_eq!(record[fields::CREATED_AT], FieldValue::ServerTimestamp);
            assert!(record[fields::AUTHOR_ID]
                .as_text()
                .unwrap()
                .ends_with(":example.com"));
        }
    }
}
