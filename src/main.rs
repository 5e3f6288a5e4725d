use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::Parser;
use homing_common::{
    Alert, Alerter, ChatMessage, DocumentId, FeedView, Identity, SubscriptionBackend,
};
use homing_fake_backend::{FakeIdentityProvider, FakePush, MemoryStore, RecordingBackend};
use homing_sync::{ChatClient, ClientConfig, Collaborators, FeedState, HttpSubscriptionBackend};
use tracing_subscriber::prelude::*;
use url::Url;

#[derive(Debug, Parser)]
#[command(about = "Chat against an in-memory backend")]
struct Args {
    /// User id to sign in as.
    #[arg(long, default_value = "@me:example.com")]
    user: String,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long, env = "HOMING_VAPID_KEY", default_value = "")]
    vapid_key: String,
    /// Where delivery tokens get registered. Without it they are only recorded locally.
    #[arg(long, env = "HOMING_BACKEND_URL")]
    backend_url: Option<Url>,
    /// Give up on a single registration or publish step after this many milliseconds.
    #[arg(long)]
    step_timeout_ms: Option<u64>,
    #[arg(long, default_value = "homing.log")]
    log_file: String,
    /// Refuse the notification permission prompt.
    #[arg(long)]
    deny_notifications: bool,
    /// Print incoming messages instead of starting the terminal UI.
    #[arg(long)]
    headless: bool,
    /// Don't generate messages from fake users.
    #[arg(long)]
    no_chatter: bool,
}

/// Writes alerts to stdout when there is no terminal UI.
struct PrintAlerter;

#[async_trait]
impl Alerter for PrintAlerter {
    async fn alert(&self, alert: Alert) {
        println!("[notification] {alert}");
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let log_file = std::sync::Mutex::new(std::fs::File::create(&args.log_file)?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(log_file))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ClientConfig {
        vapid_key: args.vapid_key.as_str().into(),
        step_timeout: args.step_timeout_ms.map(Duration::from_millis),
        ..Default::default()
    };

    let identity = FakeIdentityProvider::new();
    let store = MemoryStore::new();
    let push = FakePush::new();
    if args.deny_notifications {
        push.set_permission(Ok(homing_common::Permission::Denied));
    }
    let backend: Arc<dyn SubscriptionBackend> = match &args.backend_url {
        Some(url) => Arc::new(HttpSubscriptionBackend::new(url)?),
        None => Arc::new(RecordingBackend::new()),
    };
    let (alerter, alerts): (Arc<dyn Alerter>, _) = if args.headless {
        (Arc::new(PrintAlerter), None)
    } else {
        let (alerter, alerts) = homing_tui::alerter();
        (Arc::new(alerter), Some(alerts))
    };

    let client = ChatClient::start(
        &config,
        Collaborators {
            identity: Arc::new(identity.clone()),
            store: Arc::new(store.clone()),
            push: Arc::new(push.clone()),
            backend,
            alerter,
        },
    );

    let mut me = Identity::new(args.user.as_str());
    if let Some(name) = &args.display_name {
        me = me.with_display_name(name.as_str());
    }
    identity.sign_in(me);

    let chatter = (!args.no_chatter).then(|| {
        tokio::spawn(homing_fake_backend::message_sender(
            Arc::new(store.clone()),
            push.clone(),
            config.messages_collection.clone(),
        ))
    });

    let res = match alerts {
        Some(alerts) => homing_tui::run(&client, alerts, config.fallback_display_name.clone())
            .await
            .map_err(Into::into),
        None => print_feed(&client, &config.fallback_display_name).await,
    };

    if let Some(chatter) = chatter {
        chatter.abort();
    }
    client.shutdown().await;
    res
}

async fn print_feed(client: &ChatClient, fallback_display_name: &str) -> color_eyre::Result<()> {
    let mut feed = client.watch_feed();
    let mut printed = HashSet::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        {
            let state = feed.borrow_and_update();
            match &*state {
                FeedState::Connecting => {}
                FeedState::Live(view) => {
                    for message in unseen(view, &mut printed) {
                        println!(
                            "{}: {}",
                            message.author_label(fallback_display_name),
                            message.text
                        );
                    }
                }
                FeedState::Failed(reason) => {
                    color_eyre::eyre::bail!("message feed stopped: {reason}");
                }
            }
        }
        tokio::select! {
            res = &mut ctrl_c => return Ok(res?),
            changed = feed.changed() => if changed.is_err() {
                return Ok(());
            },
        }
    }
}

/// Messages in `view` that have not been printed yet, in feed order. Snapshots are not
/// guaranteed to only grow at the end, so this goes by id rather than by position.
fn unseen<'a>(view: &'a FeedView, printed: &mut HashSet<DocumentId>) -> Vec<&'a ChatMessage> {
    view.iter()
        .filter(|message| printed.insert(message.id().clone()))
        .collect()
}
