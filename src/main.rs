mod cli;
mod config;
mod coordinator;
mod dashboard;
mod input;
mod model;
mod transport;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use coordinator::Coordinator;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use dashboard::{Dashboard, DashboardView};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use model::Intent;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use transport::{InstanceApi, StreamClient, StreamEvent};

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
type DashboardCoordinator = Coordinator<InstanceApi, StreamClient, Dashboard>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = Settings::resolve(&args)?;
    init_tracing(&settings)?;
    match &settings.source {
        Some(source) => info!("using config {source}"),
        None => info!("no config file found, using defaults"),
    }
    info!("backend {}", settings.base_url);

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let (intent_tx, intent_rx) = mpsc::unbounded_channel::<Intent>();

    let mut dashboard = Dashboard::new(settings.base_url.as_str());
    wire_intents(&mut dashboard, intent_tx);

    let mut coordinator = Coordinator::new(
        InstanceApi::new(client.clone(), settings.base_url.clone()),
        StreamClient::new(client, settings.base_url.clone()),
        dashboard,
    );

    run(&mut coordinator, intent_rx).await
}

fn init_tracing(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_new(&settings.log_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    match &settings.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(io::sink).try_init();
        }
    }

    Ok(())
}

fn wire_intents(dashboard: &mut Dashboard, tx: mpsc::UnboundedSender<Intent>) {
    let create_tx = tx.clone();
    dashboard.set_on_create(move || {
        let _ = create_tx.send(Intent::Create);
    });

    let reload_tx = tx.clone();
    dashboard.set_on_reload(move || {
        let _ = reload_tx.send(Intent::Reload);
    });

    dashboard.set_on_instance_action(move |id, action| {
        let _ = tx.send(Intent::Action {
            id: id.to_string(),
            action,
        });
    });
}

async fn run(
    coordinator: &mut DashboardCoordinator,
    intents: mpsc::UnboundedReceiver<Intent>,
) -> Result<()> {
    let mut terminal = init_terminal()?;
    let run_result = run_loop(&mut terminal, coordinator, intents).await;

    coordinator.channel_mut().disconnect_socket().await;
    coordinator.channel_mut().disconnect_push();
    let restore_result = restore_terminal(&mut terminal);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    coordinator: &mut DashboardCoordinator,
    mut intents: mpsc::UnboundedReceiver<Intent>,
) -> Result<()> {
    let (stream_tx, mut stream_rx) = mpsc::unbounded_channel::<StreamEvent>();
    coordinator.channel_mut().connect_push(stream_tx.clone());
    coordinator.channel_mut().connect_socket(stream_tx);

    let mut calls = FuturesUnordered::new();
    calls.push(coordinator.initialize());
    let mut reader = EventStream::new();

    loop {
        terminal
            .draw(|frame| ui::render(frame, coordinator.view_mut()))
            .context("failed to render terminal frame")?;

        if !coordinator.view().running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(key) {
                            debug!("action={action:?}");
                            coordinator.view_mut().apply_action(action);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        coordinator
                            .view_mut()
                            .set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        coordinator
                            .view_mut()
                            .set_status("terminal event stream closed".to_string());
                        break;
                    }
                }
            }
            Some(reply) = calls.next(), if !calls.is_empty() => {
                coordinator.complete(reply);
            }
            Some(intent) = intents.recv() => {
                debug!("intent={intent:?}");
                if let Some(call) = coordinator.handle_intent(intent) {
                    calls.push(call);
                }
            }
            Some(event) = stream_rx.recv() => {
                match event {
                    StreamEvent::Push(value) => coordinator.on_push_message(value),
                    StreamEvent::Broadcast(value) => coordinator.on_channel_broadcast(value),
                    StreamEvent::Socket(state) => coordinator.view_mut().set_socket_state(state),
                }
            }
        }
    }

    if !calls.is_empty() {
        info!("abandoning {} outstanding requests", calls.len());
    }
    info!("dashboard closed");
    Ok(())
}
