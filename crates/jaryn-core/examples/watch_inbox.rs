//! Example: sign in and follow the inbox live.
//!
//! Logs in, loads the first inbox page and reloads it whenever the push
//! stream announces new mail for the user. Stops on Ctrl-C or logout.
//!
//! ## Running
//!
//! ```bash
//! export JARYN_USER="alice"
//! export JARYN_PASSWORD="Secret123"
//! cargo run --package jaryn-core --example watch_inbox -- http://localhost:8080
//! ```

use std::env;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use jaryn_core::{
    ApiClient, ClientConfig, EventRouter, MailboxView, MemorySessionStore, MutationCoordinator,
    NoopNavigator, SessionGate, Signals, SortBy, system,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jaryn_core=debug,jaryn_push=debug")),
        )
        .init();

    let server = env::args().nth(1).unwrap_or_else(|| "http://localhost:8080".to_string());
    let username = env::var("JARYN_USER").context("JARYN_USER is not set")?;
    let password = env::var("JARYN_PASSWORD").context("JARYN_PASSWORD is not set")?;

    let config = Arc::new(ClientConfig::new().with_server(server));
    let signals = Signals::new();
    let session = Arc::new(SessionGate::new(
        Arc::new(MemorySessionStore::new()),
        signals.logout.clone(),
        config.mail_domain.clone(),
    ));
    let api = Arc::new(ApiClient::new(Arc::clone(&config), Arc::clone(&session))?);
    api.login(&username, &password)
        .await
        .context("login failed")?;

    let view = Arc::new(Mutex::new(MailboxView::new(system::INBOX)));
    let mail = MutationCoordinator::new(
        Arc::clone(&api),
        view,
        signals.clone(),
        Arc::new(NoopNavigator),
    );
    mail.open_folder(system::INBOX, SortBy::Date).await?;
    print_inbox(&mail, api.unread_count().await?);

    let mut refresh = signals.list_refresh.subscribe();
    let mut logout = signals.logout.subscribe();
    let mut router = EventRouter::http(config.push_config(), Arc::clone(&session), signals.clone());
    router.connect().await;

    loop {
        tokio::select! {
            Some(reason) = refresh.recv() => {
                tracing::info!("Refreshing inbox ({:?})", reason);
                mail.refresh(SortBy::Date).await?;
                print_inbox(&mail, api.unread_count().await?);
            }
            Some(reason) = logout.recv() => {
                println!("Signed out: {reason:?}");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    router.stop().await;
    Ok(())
}

fn print_inbox(mail: &MutationCoordinator<ApiClient>, unread: u64) {
    mail.with_view(|view| {
        println!("Inbox: {} message(s), {} unread", view.total_emails(), unread);
        for email in view.items() {
            let marker = if email.is_read { ' ' } else { '*' };
            println!("{marker} {:<30} {}", email.from, email.subject);
        }
    });
}
