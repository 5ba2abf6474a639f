// ============================================================================
// CoinPulse - Tableau de bord crypto temps réel
// ============================================================================
// Programme TUI : vue d'ensemble d'un coin, tendances, recherche et panneau
// "live" alimenté par le SyncCore (polling prix / chandelle / trades).
//
// CONCEPTS RUST CLÉS :
// 1. Terminal raw mode : contrôle total du terminal
// 2. Event loop synchrone + runtime tokio en arrière-plan
// 3. Command pattern : la boucle envoie des commandes, un worker async répond
// 4. watch channel : l'état live est recopié à chaque frame, sans verrou
// ============================================================================

use std::io;
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use coinpulse::api::coingecko;
use coinpulse::api::Fetcher;
use coinpulse::app::App;
use coinpulse::config::Config;
use coinpulse::models::{Candle, CoinDetails, PoolData, SearchCoin, TrendingCoin, WatchTarget};
use coinpulse::sync::{SessionHandle, SyncCore};
use coinpulse::ui::{events::EventHandler, render, Event};

// ============================================================================
// AppCommand / AppResult : échanges avec le worker
// ============================================================================
// - L'event loop envoie des AppCommand (channel tokio, consommé en async)
// - Le worker renvoie des AppResult (channel std, lu avec try_recv)
// - L'event loop n'attend jamais le réseau
// ============================================================================

/// Commandes envoyées au worker
#[derive(Debug, Clone)]
enum AppCommand {
    /// Vue d'ensemble du coin par défaut + tendances
    LoadHome { coin: String },

    /// Recherche de coins
    Search { query: String },

    /// Pool principal d'un coin, avant de l'observer
    ResolvePool { coin_id: String },
}

/// Résultats renvoyés par le worker
#[derive(Debug)]
enum AppResult {
    HomeLoaded {
        overview: Result<(CoinDetails, Vec<Candle>), String>,
        trending: Vec<TrendingCoin>,
    },

    SearchDone {
        query: String,
        results: Vec<SearchCoin>,
    },

    PoolResolved {
        coin_id: String,
        pool: PoolData,
    },
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Les println! ne fonctionnent pas une fois le TUI lancé : on log vers un
// fichier, avec rotation quotidienne.
// ============================================================================

/// Initialise le système de logging vers fichier
///
/// Les logs sont écrits dans :
/// - Linux : ~/.local/share/coinpulse/logs/coinpulse.log
/// - macOS : ~/Library/Application Support/coinpulse/logs/coinpulse.log
/// - Windows : C:\Users\<user>\AppData\Local\coinpulse\logs\coinpulse.log
/// - ./logs si aucun répertoire de données n'est trouvé
///
/// ```bash
/// tail -f ~/.local/share/coinpulse/logs/coinpulse.log
/// RUST_LOG=coinpulse=trace cargo run
/// ```
fn init_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = dirs::data_local_dir()
        .map(|dir| dir.join("coinpulse").join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("./logs"));

    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "coinpulse.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            // Par défaut : debug pour coinpulse, info pour les dépendances
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coinpulse=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée du programme
// ============================================================================

fn main() -> Result<()> {
    // .env facultatif : les variables peuvent venir de l'environnement
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("⚠️  Warning: .env illisible : {}", e);
        }
    }

    init_logging().unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    // Configuration absente = erreur fatale, avant de toucher au terminal
    let config = Config::from_env().context("Configuration invalide")?;
    info!(base_url = %config.base_url, coin = %config.overview_coin, "CoinPulse starting up");

    // CONCEPT RUST : Runtime tokio dans un main synchrone
    // - enter() : les tokio::spawn du SyncCore trouvent le runtime
    // - la boucle d'événements reste synchrone (crossterm bloquant)
    let runtime = tokio::runtime::Runtime::new().context("Échec de la création du runtime tokio")?;
    let _guard = runtime.enter();

    let fetcher = Arc::new(Fetcher::from_config(&config)?);
    let mut core = SyncCore::new(Arc::clone(&fetcher), config.poll.clone());

    let (command_tx, command_rx) = unbounded_channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::channel::<AppResult>();

    info!("Spawning background worker");
    runtime.spawn(run_worker(Arc::clone(&fetcher), command_rx, result_tx));

    let mut app = App::new();
    app.start_loading(Some(format!("Chargement de {}...", config.overview_coin)));
    command_tx
        .send(AppCommand::LoadHome {
            coin: config.overview_coin.clone(),
        })
        .context("Le worker n'a pas démarré")?;

    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    let events = EventHandler::new();
    info!("Starting event loop");
    let result = run(&mut terminal, &mut app, &mut core, &events, &command_tx, &result_rx);

    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    // Coupe les timers avant l'arrêt du runtime
    core.stop();

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

// ============================================================================
// Worker : exécute les commandes en async
// ============================================================================

/// Boucle du worker ; chaque commande tourne dans sa propre tâche pour qu'une
/// recherche lente ne retarde pas la résolution d'un pool
async fn run_worker(
    fetcher: Arc<Fetcher>,
    mut command_rx: UnboundedReceiver<AppCommand>,
    result_tx: mpsc::Sender<AppResult>,
) {
    while let Some(command) = command_rx.recv().await {
        info!(?command, "Worker received command");
        let fetcher = Arc::clone(&fetcher);
        let result_tx = result_tx.clone();

        tokio::spawn(async move {
            let result = execute_command(&fetcher, command).await;
            if result_tx.send(result).is_err() {
                debug!("Event loop gone, dropping worker result");
            }
        });
    }

    info!("Worker exiting (channel closed)");
}

async fn execute_command(fetcher: &Fetcher, command: AppCommand) -> AppResult {
    match command {
        AppCommand::LoadHome { coin } => {
            let (details, ohlc, trending) = tokio::join!(
                coingecko::get_coin_details(fetcher, &coin),
                coingecko::get_coin_ohlc(fetcher, &coin, 1),
                coingecko::get_trending_coins(fetcher),
            );

            let ohlc = ohlc.unwrap_or_else(|e| {
                warn!(coin = %coin, error = %e, "Failed to load today's OHLC");
                Vec::new()
            });
            let overview = details
                .map(|details| (details, ohlc))
                .map_err(|e| {
                    error!(coin = %coin, error = ?e, "Failed to load coin overview");
                    format!("{:#}", e)
                });

            AppResult::HomeLoaded { overview, trending }
        }

        AppCommand::Search { query } => {
            let results = coingecko::search_coins(fetcher, &query).await;
            info!(query = %query, results = results.len(), "Search finished");
            AppResult::SearchDone { query, results }
        }

        AppCommand::ResolvePool { coin_id } => {
            let pool = coingecko::get_pools(fetcher, &coin_id, None, None).await;
            AppResult::PoolResolved { coin_id, pool }
        }
    }
}

// ============================================================================
// Event Loop Principal
// ============================================================================
// À chaque itération :
//   0. Résultats du worker
//   1. Copie de l'état live si changé
//   2. Render
//   3. Input
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    core: &mut SyncCore<Fetcher>,
    events: &EventHandler,
    command_tx: &UnboundedSender<AppCommand>,
    result_rx: &mpsc::Receiver<AppResult>,
) -> Result<()> {
    // Handle unique : il suit toutes les sessions successives du core
    let mut live: SessionHandle = core.handle();

    while app.is_running() {
        // 0. RÉSULTATS
        loop {
            match result_rx.try_recv() {
                Ok(result) => apply_result(app, core, result),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    error!("Worker disconnected!");
                    break;
                }
            }
        }

        // 1. LIVE
        if live.has_changed() {
            app.update_live(live.latest());
        }

        // 2. RENDER
        let view: &App = app;
        terminal.draw(|frame| render(frame, view))?;

        // 3. INPUT
        match events.next() {
            Ok(event) => handle_event(app, event, command_tx),
            Err(e) => warn!(error = %e, "Failed to read terminal event"),
        }
    }

    Ok(())
}

/// Applique un résultat du worker à l'état de l'application
fn apply_result(app: &mut App, core: &mut SyncCore<Fetcher>, result: AppResult) {
    match result {
        AppResult::HomeLoaded { overview, trending } => {
            app.stop_loading();
            info!(trending = trending.len(), "Home data loaded");
            app.set_trending(trending);
            match overview {
                Ok((details, candles)) => app.set_overview(details, &candles),
                Err(message) => app.set_status(message),
            }
        }

        AppResult::SearchDone { query, results } => {
            app.stop_loading();
            app.set_search_results(query, results);
        }

        AppResult::PoolResolved { coin_id, pool } => {
            if !app.finish_watch(&coin_id) {
                debug!(coin = %coin_id, "Ignoring pool for a coin no longer selected");
                return;
            }

            let target = if pool.is_empty() {
                info!(coin = %coin_id, "No pool found, watching price only");
                WatchTarget::coin(coin_id)
            } else {
                info!(coin = %coin_id, pool = %pool.id, name = %pool.name, "Pool resolved");
                WatchTarget::with_pool(coin_id, pool.id)
            };
            core.observe(target);
        }
    }
}

// ============================================================================
// Gestion des événements
// ============================================================================
// L'ordre des bras compte : en mode input, toutes les touches vont au buffer
// (un 'q' tapé dans une recherche ne quitte pas).
// ============================================================================

fn handle_event(app: &mut App, event: Event, command_tx: &UnboundedSender<AppCommand>) {
    use coinpulse::ui::events::{
        get_char_from_event, is_backspace_event, is_down_event, is_enter_event,
        is_escape_event, is_quit_event, is_search_event, is_text_char_event,
        is_trending_event, is_up_event,
    };

    let send = |command: AppCommand| {
        if command_tx.send(command).is_err() {
            error!("Worker is gone, command dropped");
        }
    };

    match event {
        Event::Tick => {}

        // ========================================
        // Input Mode : saisie de la recherche
        // ========================================
        Event::Key(_) if app.is_in_input_mode() => {
            if is_escape_event(&event) {
                debug!("User cancelled search");
                app.cancel_input();
            } else if is_enter_event(&event) {
                let query = app.submit_input().trim().to_string();
                if query.is_empty() {
                    debug!("Empty search query, ignoring");
                } else {
                    info!(query = %query, "User submitted search");
                    app.start_loading(Some(format!("Recherche de \"{}\"...", query)));
                    send(AppCommand::Search { query });
                }
            } else if is_backspace_event(&event) {
                app.backspace();
            } else if is_text_char_event(&event) {
                if let Some(c) = get_char_from_event(&event) {
                    app.append_char(c);
                }
            }
        }

        // 'q' : quit confirmation two-step
        Event::Key(_) if is_quit_event(&event) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        Event::Key(_) => {
            app.cancel_quit();

            if is_up_event(&event) {
                app.navigate_up();
            } else if is_down_event(&event) {
                app.navigate_down();
            } else if is_search_event(&event) {
                app.start_input("Search: ".to_string());
            } else if is_trending_event(&event) {
                debug!("User returned to trending");
                app.show_trending();
            } else if is_enter_event(&event) {
                match app.selected_coin_id() {
                    Some(coin_id) => {
                        info!(coin = %coin_id, "User selected coin to watch");
                        app.begin_watch(coin_id.clone());
                        send(AppCommand::ResolvePool { coin_id });
                    }
                    None => debug!("Nothing selected"),
                }
            }
        }
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Impossible d'activer le raw mode")?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Impossible d'initialiser le terminal")
}

/// Restaure le terminal à son état normal (appelé même en cas d'erreur)
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}
