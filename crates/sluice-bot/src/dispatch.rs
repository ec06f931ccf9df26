//! Per-chat event serialisation.
//!
//! The dispatcher owns one worker task per active chat. Events for the same
//! chat are handled strictly in arrival order by that worker; different
//! chats never wait on each other. A worker that sees no events for the
//! configured idle period exits and drops its [`Session`].

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use sluice_gateway::Inbound;
use sluice_shared::ChatId;

use crate::handlers::Bot;
use crate::session::Session;

struct Worker {
    tx: mpsc::UnboundedSender<Inbound>,
    handle: JoinHandle<()>,
}

pub struct Dispatcher {
    bot: Bot,
    idle: Duration,
    workers: HashMap<ChatId, Worker>,
}

impl Dispatcher {
    pub fn new(bot: Bot) -> Self {
        let idle = bot.config().worker_idle;
        Self {
            bot,
            idle,
            workers: HashMap::new(),
        }
    }

    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Route events from `rx` until it closes or `shutdown` flips, then wait
    /// for every worker to finish the events it already holds.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Inbound>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(idle_secs = self.idle.as_secs(), "dispatcher started");
        loop {
            let inbound = tokio::select! {
                _ = shutdown.changed() => break,
                next = rx.recv() => match next {
                    Some(inbound) => inbound,
                    None => break,
                },
            };
            self.route(inbound);
        }

        let handles: Vec<_> = self.workers.drain().map(|(_, w)| w.handle).collect();
        tracing::info!(workers = handles.len(), "dispatcher stopping, draining chat workers");
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "chat worker panicked");
            }
        }
    }

    fn route(&mut self, inbound: Inbound) {
        let chat = inbound.chat_id;
        let inbound = match self.workers.get(&chat) {
            Some(worker) => match worker.tx.send(inbound) {
                Ok(()) => return,
                // The worker went idle and closed its queue.
                Err(mpsc::error::SendError(back)) => back,
            },
            None => inbound,
        };

        let previous = self.workers.remove(&chat).map(|w| w.handle);
        self.workers.retain(|_, w| !w.handle.is_finished());

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(inbound).is_err() {
            tracing::error!(chat = %chat, "fresh worker queue rejected an event");
        }
        let handle = tokio::spawn(chat_worker(self.bot.clone(), chat, previous, rx, self.idle));
        tracing::debug!(chat = %chat, active = self.workers.len() + 1, "chat worker spawned");
        self.workers.insert(chat, Worker { tx, handle });
    }
}

async fn chat_worker(
    bot: Bot,
    chat: ChatId,
    previous: Option<JoinHandle<()>>,
    mut rx: mpsc::UnboundedReceiver<Inbound>,
    idle: Duration,
) {
    // An exiting predecessor may still be draining events that arrived
    // before this one.
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            tracing::error!(chat = %chat, error = %e, "previous chat worker panicked");
        }
    }

    let mut session = Session::new();
    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(inbound)) => process(&bot, &mut session, inbound).await,
            Ok(None) => break,
            Err(_) => {
                rx.close();
                while let Ok(inbound) = rx.try_recv() {
                    process(&bot, &mut session, inbound).await;
                }
                tracing::debug!(chat = %chat, "chat worker idle, exiting");
                break;
            }
        }
    }
}

async fn process(bot: &Bot, session: &mut Session, inbound: Inbound) {
    let chat = inbound.chat_id;
    let update_id = inbound.update_id;
    if let Err(e) = bot.handle(session, inbound).await {
        tracing::error!(chat = %chat, update_id, error = %e, "handler failed");
        session.reset();
        bot.apologize(chat).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sluice_gateway::{Call, InboundKind, RecordingGateway, Sender};
    use sluice_shared::{ChatKind, UserId};
    use sluice_store::Store;

    use super::*;
    use crate::config::BotConfig;
    use crate::menus;
    use crate::roster::Roster;

    fn bot(gw: &Arc<RecordingGateway>) -> Bot {
        let config = BotConfig {
            required_channel: None,
            ..BotConfig::default()
        };
        Bot::new(
            Arc::new(config),
            Store::open_in_memory().unwrap(),
            gw.clone(),
            Roster::new(),
        )
        .with_pacing(Duration::ZERO)
    }

    fn command(update_id: i64, chat: i64, name: &str) -> Inbound {
        Inbound {
            update_id,
            chat_id: ChatId(chat),
            chat_kind: ChatKind::Private,
            from: Some(Sender {
                id: UserId(chat),
                first_name: Some("Ada".into()),
                last_name: None,
                username: None,
            }),
            forwarded_from: None,
            kind: InboundKind::Command {
                name: name.into(),
                args: String::new(),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn same_chat_events_keep_arrival_order() {
        let gw = Arc::new(RecordingGateway::new());
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = tokio::spawn(Dispatcher::new(bot(&gw)).run(rx, shutdown_rx));

        tx.send(command(1, 7, "help")).await.unwrap();
        tx.send(command(2, 7, "start")).await.unwrap();
        tx.send(command(3, 7, "help")).await.unwrap();
        tx.send(command(4, 8, "help")).await.unwrap();
        drop(tx);
        run.await.unwrap();
        drop(shutdown_tx);

        let help = menus::help_text(&BotConfig::default().support_handle);
        let (main, _) = menus::main_menu(BotConfig::default().batch_size);
        assert_eq!(gw.sent_texts(ChatId(7)), vec![help.clone(), main, help.clone()]);
        assert_eq!(gw.sent_texts(ChatId(8)), vec![help]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_worker_exits_and_is_replaced() {
        let gw = Arc::new(RecordingGateway::new());
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(bot(&gw)).with_idle(Duration::from_secs(1));
        let run = tokio::spawn(dispatcher.run(rx, shutdown_rx));

        tx.send(command(1, 7, "start")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(command(2, 7, "start")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        shutdown_tx.send(true).unwrap();
        run.await.unwrap();

        let sends = gw
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SendText { .. }))
            .count();
        assert_eq!(sends, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_failure_resets_session_and_keeps_worker() {
        let gw = Arc::new(RecordingGateway::new());
        gw.mark_failing(ChatId(9));
        let (tx, rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = tokio::spawn(Dispatcher::new(bot(&gw)).run(rx, shutdown_rx));

        // Every send to chat 9 fails, including the apology.
        tx.send(command(1, 9, "help")).await.unwrap();
        tx.send(command(2, 10, "help")).await.unwrap();
        drop(tx);
        run.await.unwrap();

        assert!(gw.sent_texts(ChatId(9)).is_empty());
        assert_eq!(gw.sent_texts(ChatId(10)).len(), 1);
    }
}
