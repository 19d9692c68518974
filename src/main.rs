//! RUGS-RISK — risk-decision engine for crash-style rounds.
//!
//! Entry point. Loads configuration, initialises structured logging and
//! dispatches one offline or live command: regime detection, threshold
//! tuning, strategy comparison, a single decision, or bankroll upkeep.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};

use rugs_risk::backtest::runner::{StrategySimulator, DEFAULT_SEED};
use rugs_risk::backtest::tuner::ThresholdTuner;
use rugs_risk::backtest::{prepare_rounds, ReplayRound};
use rugs_risk::config::AppConfig;
use rugs_risk::data::forecast::{HeuristicForecaster, RugForecaster, TickForecast};
use rugs_risk::data::{load_rounds, summarize_rounds};
use rugs_risk::storage::thresholds::ThresholdStore;
use rugs_risk::storage::JsonFileStore;
use rugs_risk::strategy::bankroll::BankrollManager;
use rugs_risk::strategy::ev::EvEngine;
use rugs_risk::strategy::regime::RegimeDetector;
use rugs_risk::strategy::DecisionEngine;
use rugs_risk::types::{ForecastTick, Regime, TickPhase};

#[derive(Debug, Parser)]
#[command(name = "rugs-risk", version, about = "EV scoring, bankroll limits, regime detection and threshold tuning")]
struct Cli {
    /// Config file (defaults to $RUGS_CONFIG, then config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect the current regime from round history
    Regime {
        /// Also list every regime segment in the history
        #[arg(long)]
        changes: bool,
        /// Point the active thresholds at the detected regime
        #[arg(long)]
        activate: bool,
    },
    /// Sweep thresholds and publish the best pair for a regime
    Tune {
        /// Regime to publish for (detected from history if omitted)
        #[arg(long)]
        regime: Option<Regime>,
        #[arg(long, value_enum, default_value = "tick")]
        forecaster: ForecasterKind,
        /// Make the published record active
        #[arg(long)]
        activate: bool,
    },
    /// Compare naive and model-guided strategies on history
    Simulate {
        #[arg(long, value_enum, default_value = "tick")]
        forecaster: ForecasterKind,
        /// Write the reports as JSON
        #[arg(long)]
        output: Option<PathBuf>,
        /// Seed for the random baselines
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Decide for one live tick under the active thresholds
    Decide {
        /// Current multiplier
        #[arg(long)]
        x: f64,
        /// Seconds since round start
        #[arg(long, default_value_t = 0.0)]
        t: f64,
        #[arg(long)]
        p5: Option<f64>,
        #[arg(long)]
        p10: Option<f64>,
        #[arg(long, default_value_t = 0)]
        players: u32,
        #[arg(long, default_value_t = 0.0)]
        wager: f64,
    },
    /// Apply a settled bet to the bankroll
    Settle {
        /// Amount staked
        #[arg(long)]
        stake: f64,
        /// Signed profit or loss
        #[arg(long, allow_hyphen_values = true)]
        result: f64,
    },
    /// Print the bankroll snapshot
    Status,
    /// Operator reset of the bankroll
    Reset {
        /// New balance (defaults to the configured initial balance)
        #[arg(long)]
        balance: Option<f64>,
        /// Only clear today's loss counter
        #[arg(long)]
        daily_only: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ForecasterKind {
    /// Probabilities recorded on the ticks, heuristic where missing
    Tick,
    /// Volatility/slope heuristic only
    Heuristic,
}

impl ForecasterKind {
    fn build(self) -> Box<dyn RugForecaster> {
        match self {
            ForecasterKind::Tick => Box::new(TickForecast),
            ForecasterKind::Heuristic => Box::new(HeuristicForecaster),
        }
    }
}

fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let cfg = AppConfig::load_or_default(AppConfig::resolve_path(cli.config.as_deref()));
    info!(command = ?cli.command, "rugs-risk starting");

    match cli.command {
        Command::Regime { changes, activate } => run_regime(&cfg, changes, activate),
        Command::Tune {
            regime,
            forecaster,
            activate,
        } => run_tune(&cfg, regime, forecaster, activate),
        Command::Simulate {
            forecaster,
            output,
            seed,
        } => run_simulate(&cfg, forecaster, output, seed),
        Command::Decide {
            x,
            t,
            p5,
            p10,
            players,
            wager,
        } => {
            let tick = ForecastTick {
                x,
                t,
                players,
                wager,
                phase: TickPhase::Live,
                p_rug_5s: p5,
                p_rug_10s: p10,
            };
            run_decide(&cfg, &tick)
        }
        Command::Settle { stake, result } => {
            let mut bm = open_bankroll(&cfg);
            let update = bm.update_balance(stake, result);
            info!(
                old = format!("${:.2}", update.old_balance),
                new = format!("${:.2}", update.new_balance),
                roi = format!("{:.2}%", update.roi),
                total_roi = format!("{:.2}%", update.total_roi),
                win_rate = format!("{:.1}%", update.win_rate),
                "Bet settled"
            );
            println!("{}", bm.get_status());
            Ok(())
        }
        Command::Status => {
            let bm = open_bankroll(&cfg);
            println!("{}", bm.get_status());
            Ok(())
        }
        Command::Reset {
            balance,
            daily_only,
        } => {
            let mut bm = open_bankroll(&cfg);
            if daily_only {
                bm.reset_daily_tracking();
            } else {
                bm.reset_bankroll(balance);
            }
            println!("{}", bm.get_status());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn open_bankroll(cfg: &AppConfig) -> BankrollManager {
    BankrollManager::open(cfg.bankroll, Box::new(JsonFileStore::new(&cfg.paths.bankroll)))
}

/// Current regime from history; NORMAL when history is missing.
fn detect_current(cfg: &AppConfig, detector: &RegimeDetector) -> Regime {
    match load_rounds(&cfg.paths.history) {
        Ok(rounds) => detector.get_current_regime(&summarize_rounds(&rounds)).regime,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "No round history, assuming NORMAL regime");
            Regime::Normal
        }
    }
}

fn run_regime(cfg: &AppConfig, changes: bool, activate: bool) -> Result<()> {
    let rounds = load_rounds(&cfg.paths.history)?;
    let summaries = summarize_rounds(&rounds);
    let detector = RegimeDetector::new(cfg.regime);

    let current = detector.get_current_regime(&summaries);
    println!("{}", serde_json::to_string_pretty(&current)?);

    if changes {
        let segments = detector.detect_regime_changes(&summaries);
        println!("{}", serde_json::to_string_pretty(&segments)?);
    }

    let store = ThresholdStore::new(&cfg.paths.thresholds_dir);
    store.seed_defaults()?;
    if activate {
        store.activate(current.regime)?;
    }
    Ok(())
}

fn load_replay(cfg: &AppConfig, forecaster: ForecasterKind) -> Result<(Vec<ReplayRound>, Regime)> {
    let rounds = load_rounds(&cfg.paths.history)?;
    let detector = RegimeDetector::new(cfg.regime);
    let regime = detector.get_current_regime(&summarize_rounds(&rounds)).regime;
    let replay = prepare_rounds(&rounds, forecaster.build().as_ref());
    Ok((replay, regime))
}

fn run_tune(cfg: &AppConfig, regime: Option<Regime>, forecaster: ForecasterKind, activate: bool) -> Result<()> {
    let (replay, detected) = load_replay(cfg, forecaster)?;
    let regime = regime.unwrap_or(detected);

    let tuner = ThresholdTuner::new(cfg.tuner.clone(), cfg.ev, cfg.bankroll);
    let report = tuner.run_sweep(&replay, regime)?;

    let store = ThresholdStore::new(&cfg.paths.thresholds_dir);
    let record = tuner
        .publish(&store, &report)
        .with_context(|| format!("Thresholds for {regime} not published"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    if activate {
        store.activate(regime)?;
    }
    Ok(())
}

fn run_simulate(cfg: &AppConfig, forecaster: ForecasterKind, output: Option<PathBuf>, seed: u64) -> Result<()> {
    let (replay, _) = load_replay(cfg, forecaster)?;
    let simulator = StrategySimulator::new(cfg.bankroll, cfg.ev).with_seed(seed);
    let reports = simulator.run_all(&replay);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&reports)?;
        rugs_risk::storage::write_atomic(&path, json.as_bytes())?;
        info!(path = %path.display(), "Simulation results saved");
    }

    println!(
        "{:<20} {:>10} {:>12} {:>9} {:>7} {:>9} {:>7}",
        "Strategy", "Return %", "Final", "Win %", "Trades", "MaxDD %", "Sharpe"
    );
    for r in &reports {
        println!(
            "{:<20} {:>10.1} {:>12.0} {:>9.1} {:>7} {:>9.1} {:>7.2}",
            r.strategy_name,
            r.total_return_pct,
            r.final_balance,
            r.win_rate_pct,
            r.total_trades,
            r.max_drawdown_pct,
            r.sharpe_ratio
        );
    }
    Ok(())
}

fn run_decide(cfg: &AppConfig, tick: &ForecastTick) -> Result<()> {
    let store = ThresholdStore::new(&cfg.paths.thresholds_dir);
    let detector = RegimeDetector::new(cfg.regime);
    let thresholds = match store.load_active() {
        Ok(Some(record)) => record,
        _ => store.active_or_default(detect_current(cfg, &detector)),
    };

    let bm = open_bankroll(cfg);
    let engine = DecisionEngine::new(EvEngine::new(cfg.ev));
    let decision = engine.decide(tick, &thresholds, &bm);
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rugs_risk=info"));

    let json_logging = std::env::var("RUGS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
