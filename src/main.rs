use std::io;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};

use anyhow::Result;
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use instalock_core::chat::{self, ChatDetector};
use instalock_core::config::EngineConfig;
use instalock_core::dispatch::Dispatcher;
use instalock_core::engine::LockEngine;
use instalock_core::platform::{create_platform, Platform};
use instalock_core::roster::Roster;
use instalock_core::sampler::RegionSampler;
use instalock_core::settings::Settings;
use instalock_core::shared::{EngineContext, SharedStatus};
use instalock_core::sleep::ThreadPause;
use instalock_core::stats::StatsStore;
use instalock_core::supervisor::Supervisor;
use instalock_core::tools::{ToolsLoop, ToolsState};
use instalock_core::types::EngineCommand;
use instalock_core::logger;
use instalock_tui::LoopHandles;

struct Loops {
    engine: Supervisor<LockEngine>,
    tools: Supervisor<ToolsLoop>,
}

/// Build both loops and the chat detector, and start them.
fn start_loops(
    config: EngineConfig,
    settings: &Settings,
    platform: &dyn Platform,
    roster: Arc<Mutex<Roster>>,
    stats: StatsStore,
    status: Arc<SharedStatus>,
) -> (Loops, LoopHandles) {
    let ctx = EngineContext { config: Arc::new(config), roster, stats, status };

    let (engine_tx, engine_rx) = mpsc::channel();
    let (tools_tx, tools_rx) = mpsc::channel();
    let (movement_tx, movement_rx) = mpsc::channel();

    let engine = LockEngine::new(
        ctx.clone(),
        RegionSampler::new(platform.screen(), "lock"),
        Dispatcher::new(platform.input(), Box::new(ThreadPause)),
        engine_rx,
        settings.options,
    );
    let tools = ToolsLoop::new(
        ctx.clone(),
        RegionSampler::new(platform.screen(), "tools"),
        Dispatcher::new(platform.input(), Box::new(ThreadPause)),
        tools_rx,
        movement_rx,
        ToolsState {
            idle: settings.tools.idle_enabled,
            drop: settings.tools.drop_enabled,
            idle_mode: settings.tools.idle_mode,
        },
    );

    // The detector thread lives for the rest of the process
    let detector = ChatDetector::new(ctx.config.keybinds.clone(), ctx.status.clone(), movement_tx);
    let _ = chat::start(platform, detector);

    if settings.locking_enabled {
        engine_tx.send(EngineCommand::Enable).ok();
    }

    let mut engine = Supervisor::new(engine);
    let mut tools = Supervisor::new(tools);
    engine.start();
    tools.start();

    (Loops { engine, tools }, LoopHandles { engine_tx, tools_tx })
}

#[cfg(feature = "debug-capture")]
fn dump_regions(settings: &Settings, platform: &dyn Platform, dir: &Path) -> Result<()> {
    use instalock_core::sampler::{matches, save_png};

    let config = EngineConfig::from_settings(settings)?;
    std::fs::create_dir_all(dir)?;
    let mut sampler = RegionSampler::new(platform.screen(), "platform");
    for (name, region) in config.regions.named() {
        match sampler.sample(&region) {
            Ok(cap) => {
                let path = dir.join(format!("{}.png", name));
                save_png(&cap, &path)?;
                println!("{:<16} {} matches {}: {}", name, path.display(), region.color, matches(&cap, region.color));
            }
            Err(e) => eprintln!("{:<16} capture failed: {}", name, e),
        }
    }
    Ok(())
}

#[cfg(not(feature = "debug-capture"))]
fn dump_regions(_settings: &Settings, _platform: &dyn Platform, _dir: &Path) -> Result<()> {
    anyhow::bail!("--dump-regions needs a build with the debug-capture feature")
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let force_stub = args.iter().any(|a| a == "--stub");
    let dump = args.iter().any(|a| a == "--dump-regions");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    logger::init(&cwd.join("logs"));

    let settings_path = cwd.join("settings.json");
    let settings = Settings::load(&settings_path);
    logger::set_debug(settings.debug);

    let platform = create_platform(force_stub);

    if dump {
        return dump_regions(&settings, platform.as_ref(), &cwd.join("captures"));
    }

    let status = Arc::new(SharedStatus::new());
    let roster = Arc::new(Mutex::new(settings.roster.clone()));
    let stats = StatsStore::open(cwd.join("stats.json"));

    let (log_tx, log_rx) = mpsc::channel::<String>();
    logger::set_tui_sender(log_tx);
    logger::info(&format!("instalock started on {}", platform.name()));

    let (mut loops, handles, config_error) = match EngineConfig::from_settings(&settings) {
        Ok(config) => {
            let (l, h) = start_loops(config, &settings, platform.as_ref(), roster.clone(), stats.clone(), status.clone());
            (Some(l), Some(h), None)
        }
        Err(e) => {
            logger::error(&format!("settings.json: {}", e));
            (None, None, Some(e.to_string()))
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = instalock_tui::App::new(
        status,
        roster,
        stats,
        settings,
        settings_path,
        handles,
        config_error,
        log_rx,
    );

    let result = instalock_tui::event::run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Some(l) = loops.as_mut() {
        l.engine.stop();
        l.tools.stop();
    }
    app.persist();
    logger::info("instalock stopped");

    result
}
