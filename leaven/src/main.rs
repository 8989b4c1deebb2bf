use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod app;
mod clock;
mod config;
mod engine;
mod ipc;
mod logging;
mod notifier;
mod persistence;
mod presets;
mod push;
mod ui;

use app::{App, AppMode};
use clock::IntervalClock;
use ipc::server::{Request, SocketGuard};
use notifier::NotifierSet;
use persistence::Persistence;
use push::PushClient;

const MAX_POLL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let config = config::load_config()?;

    match Persistence::data_dir() {
        Ok(dir) => {
            if let Err(e) = logging::init(&dir) {
                eprintln!("Logging disabled: {:#}", e);
            }
        }
        Err(e) => eprintln!("Logging disabled: {:#}", e),
    }

    let saved = Persistence::load().unwrap_or_else(|e| {
        warn!("Ignoring saved state: {:#}", e);
        None
    });

    let runtime = tokio::runtime::Runtime::new()?;

    let (request_tx, request_rx) = mpsc::unbounded_channel::<Request>();
    let socket = SocketGuard(leaven_ipc::socket_path());
    let socket_path = socket.path().to_path_buf();
    runtime.spawn(async move {
        if let Err(e) = ipc::server::start(socket_path, request_tx).await {
            error!("IPC server stopped: {:#}", e);
        }
    });

    let push = match config.push.clone() {
        Some(push_config) => {
            let (tx, rx) = mpsc::unbounded_channel();
            runtime.spawn(push::run(push_config, rx));
            PushClient::new(tx)
        }
        None => PushClient::disabled(),
    };

    let notifiers = NotifierSet::from_config(&config.notifications);
    let clock = IntervalClock::new(config.timer.tick_policy);
    info!(
        policy = ?clock.policy(),
        notifiers = notifiers.len(),
        push = push.is_enabled(),
        "starting leaven"
    );
    let app = App::new(config, saved, notifiers, push);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, clock, request_rx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    drop(socket);
    runtime.shutdown_timeout(Duration::from_millis(500));

    if let Err(err) = res {
        error!("Exited with error: {:#}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

fn save(app: &mut App) {
    match Persistence::save(&app.saved_state()) {
        Ok(()) => app.dirty = false,
        Err(e) => warn!("Failed to save state: {:#}", e),
    }
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    mut clock: IntervalClock,
    mut requests: mpsc::UnboundedReceiver<Request>,
) -> Result<()> {
    let mut last_frame = Instant::now();
    let mut layout = ui::UiLayout::default();

    loop {
        // Remote commands first, then time, so both see a consistent engine.
        while let Ok((command, reply)) = requests.try_recv() {
            let response = app.handle_command(command);
            let _ = reply.send(response);
        }
        app.pump_clock(&mut clock);

        if app.flash_pending {
            let is_final = app.engine.status() == leaven_ipc::TimerStatus::AllComplete;
            app.trigger_complete_effect(layout.countdown, is_final);
            app.flash_pending = false;
        }

        let delta = last_frame.elapsed();
        last_frame = Instant::now();
        terminal.draw(|f| layout = ui::draw(f, &mut app, delta))?;

        if app.dirty {
            save(&mut app);
        }

        let timeout = if app.engine.is_running() {
            clock.until_next(Instant::now()).min(MAX_POLL)
        } else {
            MAX_POLL
        };
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.mode {
                        AppMode::Normal => match key.code {
                            KeyCode::Char('q') => app.should_quit = true,
                            KeyCode::Char(' ') | KeyCode::Enter => {
                                app.primary_action();
                            }
                            KeyCode::Char('n') => {
                                app.next_stage();
                            }
                            KeyCode::Char('r') => {
                                app.reset_stage();
                            }
                            KeyCode::Char('R') => {
                                app.reset_all();
                            }
                            KeyCode::Char('p') => {
                                if !app.engine.status().is_active() {
                                    app.open_preset_picker();
                                }
                            }
                            KeyCode::Char('?') => app.mode = AppMode::ShowHelp,
                            _ => {}
                        },
                        AppMode::SelectingPreset(_) => match key.code {
                            KeyCode::Esc => app.mode = AppMode::Normal,
                            KeyCode::Up | KeyCode::Char('k') => app.move_picker(-1),
                            KeyCode::Down | KeyCode::Char('j') => app.move_picker(1),
                            KeyCode::Enter | KeyCode::Char(' ') => app.confirm_picker(),
                            _ => {}
                        },
                        AppMode::ShowHelp => match key.code {
                            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
                                app.mode = AppMode::Normal
                            }
                            _ => {}
                        },
                    }
                }
            }
        }

        if app.should_quit {
            save(&mut app);
            return Ok(());
        }
    }
}
