use std::io::{self, Write};
use std::sync::Arc;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tether::adapters::{FsFileResolver, JsonFileStore, ReqwestHttpClient};
use tether::cli::{
    handle_version_command, parse_args, parse_command, CliCommand, Command, Transcript, HELP,
};
use tether::config::SessionConfig;
use tether::error::OperationError;
use tether::outbound::{spawn_prepare, AttachmentRequest, PreparedMessage};
use tether::session::Session;
use tether::traits::{
    AutoApproveToggle, ConversationStore, FileResolver, HttpClient, SendOutcome, StoreError,
};
use tether::websocket::{WsClient, WsHandle};

/// Log to stderr so the transcript on stdout stays readable.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .ok();
}

fn open_store(config: &SessionConfig) -> Option<JsonFileStore> {
    match &config.data_dir {
        Some(dir) => Some(JsonFileStore::new(dir)),
        None => JsonFileStore::default_location(),
    }
}

/// Everything the input loop needs besides the session
struct Driver {
    handle: WsHandle,
    toggle: AutoApproveToggle,
    resolver: Arc<dyn FileResolver>,
    prepared_tx: mpsc::Sender<PreparedMessage>,
}

enum Flow {
    Continue,
    Quit,
}

impl Driver {
    fn run_command(&self, session: &mut Session, command: Command) -> Flow {
        let result: Result<Option<SendOutcome>, OperationError> = match command {
            Command::Message(text) => Ok(Some(session.send_user_message(text, Vec::new()).1)),
            Command::Attach { file_id, text } => {
                spawn_prepare(
                    self.resolver.clone(),
                    text,
                    vec![AttachmentRequest::new(file_id)],
                    self.prepared_tx.clone(),
                );
                Ok(None)
            }
            Command::Retry(id) => session.retry_user_message(&id).map(Some),
            Command::Approve(id) => session.approve(&id).map(Some),
            Command::Reject { id, reason } => session.reject(&id, &reason).map(Some),
            Command::Edit { id, arguments } => session.edit_arguments(&id, arguments).map(|_| None),
            Command::Accept(pairs) => pairs
                .iter()
                .try_for_each(|(name, value)| session.set_elicitation_field(name, value))
                .and_then(|_| session.accept_elicitation())
                .map(Some),
            Command::Decline => session.decline_elicitation().map(Some),
            Command::Cancel => session.cancel_elicitation().map(Some),
            Command::Answer(text) => session.answer(&text).map(Some),
            Command::Stop => session.stop().map(|signal| Some(signal.outcome)),
            Command::Agent(enabled) => Ok(Some(session.set_agent_enabled(enabled))),
            Command::AutoApprove(enabled) => {
                self.toggle.set(enabled);
                println!("[auto-approve] {}", if enabled { "on" } else { "off" });
                Ok(None)
            }
            Command::Reconnect => {
                if let Err(e) = self.handle.reconnect() {
                    println!("[error] {}", e.user_message());
                }
                Ok(None)
            }
            Command::Status => {
                print_status(session);
                Ok(None)
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(None)
            }
            Command::Quit => return Flow::Quit,
        };

        match result {
            Ok(Some(SendOutcome::NotConnected)) => {
                println!("[not sent] not connected; retry once the connection is back")
            }
            Ok(_) => {}
            Err(e) => println!("[error] {}", e),
        }
        Flow::Continue
    }
}

fn print_status(session: &Session) {
    let state = session.connection();
    println!(
        "[status] {} (failures: {}), entries: {}, agent mode: {}",
        state.status,
        state.consecutive_failures,
        session.conversation().len(),
        if session.agent().is_enabled() { "on" } else { "off" }
    );
    for approval in session.pending_approvals() {
        println!("  pending approval {} ({})", approval.tool_call_id, approval.tool_name);
    }
    for id in session.in_flight_tools() {
        println!("  running tool {}", id);
    }
    if let Some(request) = session.elicitation().active() {
        println!("  elicitation {}: {}", request.elicitation_id, request.message);
    }
    if let Some(question) = session.agent().pending_question() {
        println!("  question: {}", question);
    }
}

/// Print whatever the session reported as changed.
fn drain_changes(
    session: &Session,
    changes: &mut broadcast::Receiver<tether::session::SessionChange>,
    transcript: &mut Transcript,
) {
    loop {
        match changes.try_recv() {
            Ok(change) => {
                let out = transcript.render(session, change);
                if !out.is_empty() {
                    print!("{}", out);
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!("Renderer skipped {} change notifications", skipped);
            }
            Err(_) => break,
        }
    }
    io::stdout().flush().ok();
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = match parse_args(std::env::args()).map_err(|e| eyre!(e))? {
        CliCommand::Version => handle_version_command(),
        CliCommand::Run(options) => options,
    };

    color_eyre::install()?;
    init_logging();

    let config = options.apply(SessionConfig::from_env()?);
    info!("Connecting to {}", config.url);

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let (handle, mut events) = WsClient::spawn(config.transport.clone(), Some(http));
    let toggle = AutoApproveToggle::new(config.auto_approve);
    let mut session = Session::new(&config, Arc::new(handle.clone()), Arc::new(toggle.clone()));

    let store = open_store(&config);
    let mut transcript = Transcript::new();
    if let (Some(store), Some(id)) = (&store, &config.conversation_id) {
        match store.load_conversation(id).await {
            Ok(entries) => {
                session.resume(entries);
                transcript.mark_printed(&session);
                println!("[resumed] {} ({} entries)", id, session.conversation().len());
            }
            Err(StoreError::NotFound(_)) => info!("Starting new conversation {}", id),
            Err(e) => warn!("Could not load conversation {}: {}", id, e),
        }
    }

    let (prepared_tx, mut prepared_rx) = mpsc::channel::<PreparedMessage>(16);
    let driver = Driver {
        handle: handle.clone(),
        toggle,
        resolver: Arc::new(FsFileResolver::new(&config.files_root)),
        prepared_tx,
    };

    let mut changes = session.subscribe();
    let mut state_rx = handle.state_receiver();
    handle.connect(&config.url)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type a message, or /help for commands.");

    loop {
        let deadline = session.next_deadline();
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            Some(event) = events.recv() => session.handle_event(event),
            Ok(()) = state_rx.changed() => {
                let state = state_rx.borrow_and_update().clone();
                session.set_connection_state(state);
            }
            Some(prepared) = prepared_rx.recv() => {
                let (_, outcome) = session.send_user_message(prepared.text, prepared.attachments);
                if !outcome.is_sent() {
                    println!("[not sent] not connected; retry once the connection is back");
                }
            }
            _ = timer => {
                session.fire_due(Instant::now());
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(command)) => {
                        if let Flow::Quit = driver.run_command(&mut session, command) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("[error] {}", message),
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
        }

        drain_changes(&session, &mut changes, &mut transcript);
    }

    handle.shutdown();
    if let (Some(store), Some(id)) = (&store, &config.conversation_id) {
        match store.save_conversation(id, &session.snapshot()).await {
            Ok(()) => info!("Saved conversation {}", id),
            Err(e) => error!("Could not save conversation {}: {}", id, e),
        }
    }
    Ok(())
}
