use anyhow::{Context, Result};
use branchdoc_core::{
    models::{BranchRecord, Level},
    storage::{BranchStore, Database, SqliteBranchStore},
};
use branchdoc_tui::{
    config::{load_config, Config, LogConfig},
    App, Event, EventHandler,
};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "branchdoc")]
#[command(author, version, about = "Edit a five-level documentation tree in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file; created with defaults if missing
    #[arg(long, global = true, default_value = "branchdoc.toml")]
    config: PathBuf,

    /// SQLite database, overrides the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Owner of the branches, overrides the config
    #[arg(short, long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the editor (default)
    Edit,
    /// Print every level's branches as JSON
    Export {
        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(db) = cli.db {
        config.storage.database = db;
    }
    if let Some(user) = cli.user {
        config.storage.user = user;
    }
    init_logging(&config.log)?;

    match cli.command.unwrap_or(Command::Edit) {
        Command::Edit => run_editor(config),
        Command::Export { pretty } => export(&config, pretty),
    }
}

/// Log to the configured file; the terminal is owned by the UI
fn init_logging(log: &LogConfig) -> Result<()> {
    let Some(path) = &log.file else {
        return Ok(());
    };
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .with(filter)
        .try_init()
        .context("installing the log subscriber")?;
    Ok(())
}

fn export(config: &Config, pretty: bool) -> Result<()> {
    let db = Database::new(&config.storage.database);
    let store = SqliteBranchStore::open(&db, &config.storage.user)?;

    let mut levels: BTreeMap<u8, Vec<BranchRecord>> = BTreeMap::new();
    for level in Level::ALL {
        levels.insert(level.get(), store.list(level)?);
    }
    info!(owner = store.owner(), "exporting branches");

    let json = if pretty {
        serde_json::to_string_pretty(&levels)?
    } else {
        serde_json::to_string(&levels)?
    };
    println!("{}", json);
    Ok(())
}

fn run_editor(config: Config) -> Result<()> {
    // Create app before touching the terminal so config errors print normally
    let mut app = App::new(config)?;

    // Initialize with sample data if needed
    app.initialize_sample_data()?;
    app.load();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let event_handler = EventHandler::new(250); // 250ms tick rate

    let result = run_app(&mut terminal, &mut app, &event_handler);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_handler: &EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|f| branchdoc_tui::ui::render(f, app))?;

        match event_handler.next()? {
            Event::Key(key) => branchdoc_tui::event::handle_key_event(key, app),
            Event::Mouse(mouse) => branchdoc_tui::event::handle_mouse_event(mouse, app),
            Event::Tick => app.tick(),
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
