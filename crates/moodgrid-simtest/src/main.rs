//! MoodGrid Headless Level Harness
//!
//! Plays the bundled level catalog through the simulation core.
//! Runs entirely in-process, with no rendering or audio.
//!
//! Usage:
//!   cargo run -p moodgrid-simtest
//!   cargo run -p moodgrid-simtest -- --verbose

use env_logger::{Builder, Env};
use log::LevelFilter;
use moodgrid_core::prelude::*;

// ── Level catalog (same JSON the game ships) ────────────────────────────
const LEVELS_JSON: &str = include_str!("../../../data/levels.json");

/// Fixed 60 Hz step, as the game loop runs.
const TICK: f32 = 1.0 / 60.0;
/// Longest any run is allowed before the harness gives up on it.
const RUN_LIMIT_MS: f64 = 60_000.0;
const SEED: u64 = 0x5EED;

/// (kind, x, y, quarter turns)
type Move = (PieceKind, i32, i32, u8);

/// A scripted player solution for one catalog level.
struct Script {
    level: &'static str,
    moves: &'static [Move],
    /// `None` for levels whose outcome rests on dice rolls.
    expect: Option<RunResult>,
}

const SCRIPTS: &[Script] = &[
    Script {
        level: "First Smile",
        moves: &[(PieceKind::Pipe, 2, 3, 1), (PieceKind::Pipe, 4, 3, 1)],
        expect: Some(RunResult::Won),
    },
    Script {
        level: "Bridge Over Troubled Blocks",
        moves: &[],
        expect: Some(RunResult::Won),
    },
    Script {
        level: "Power Through",
        moves: &[(PieceKind::Pipe, 1, 1, 1), (PieceKind::Pipe, 3, 1, 1)],
        expect: None,
    },
    Script {
        level: "Upward Journey",
        moves: &[(PieceKind::Pipe, 3, 3, 0), (PieceKind::Pipe, 3, 4, 0)],
        expect: Some(RunResult::Won),
    },
    Script {
        level: "Bridge Builder",
        moves: &[],
        expect: Some(RunResult::Won),
    },
];

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let env = Env::default().default_filter_or(level.to_string());
    let _ = Builder::from_env(env).try_init();
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    init_logging(verbose);
    println!("=== MoodGrid Level Harness ===\n");

    let mut results = Vec::new();

    let levels: Vec<Level> = match serde_json::from_str(LEVELS_JSON) {
        Ok(levels) => levels,
        Err(e) => {
            println!("  ✗ catalog_parse: JSON parse error: {}", e);
            std::process::exit(1);
        }
    };

    // 1. Catalog validation
    results.extend(validate_catalog(&levels, verbose));

    // 2. Scripted solutions
    results.extend(validate_solutions(&levels, verbose));

    // 3. Every level terminates on an empty board
    results.extend(validate_termination(&levels, verbose));

    // 4. Seeded runs replay identically
    results.extend(validate_determinism(&levels, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

fn new_engine() -> Result<SimulationEngine, String> {
    SimulationEngine::new(SimConfig::default().with_seed(SEED)).map_err(|e| e.to_string())
}

/// Load `level`, apply `moves`, and run until the outcome is decided.
fn play(level: &Level, moves: &[Move]) -> Result<(SimulationEngine, RunOutcome), String> {
    let mut engine = new_engine()?;
    engine
        .load_level(level.clone())
        .map_err(|e| format!("load failed: {}", e))?;
    for &(kind, x, y, turns) in moves {
        engine
            .place(kind, x, y)
            .map_err(|e| format!("place {:?} at ({}, {}): {}", kind, x, y, e))?;
        for _ in 0..turns {
            engine
                .rotate_at(x, y)
                .map_err(|e| format!("rotate ({}, {}): {}", x, y, e))?;
        }
    }

    if !engine.start() {
        return Err("run did not start".into());
    }
    while engine.is_running() && engine.clock_ms() < RUN_LIMIT_MS {
        engine.update(TICK);
    }
    match engine.outcome() {
        Some(outcome) => Ok((engine, outcome)),
        None => Err(format!("still running after {:.0}s", RUN_LIMIT_MS / 1000.0)),
    }
}

fn describe(outcome: &RunOutcome, engine: &SimulationEngine) -> String {
    format!(
        "{:?} at {:.1}s, goal {}% powered",
        outcome.result,
        engine.clock_ms() / 1000.0,
        outcome.fill_percent()
    )
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog(levels: &[Level], verbose: bool) -> Vec<TestResult> {
    println!("--- Level Catalog ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "catalog_not_empty".into(),
        passed: !levels.is_empty(),
        detail: format!("{} levels loaded", levels.len()),
    });

    let config = SimConfig::default();
    for level in levels {
        let check = level.validate(config.grid_width, config.grid_height);
        results.push(TestResult {
            name: format!("layout_{}", slug(&level.name)),
            passed: check.is_ok(),
            detail: match check {
                Ok(()) => format!(
                    "{} obstacles, {} pre-placed",
                    level.obstacles.len(),
                    level.pre_placed.len()
                ),
                Err(e) => e.to_string(),
            },
        });
    }

    let mut names: Vec<&str> = levels.iter().map(|l| l.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    results.push(TestResult {
        name: "catalog_unique_names".into(),
        passed: names.len() == levels.len(),
        detail: format!("{} distinct names", names.len()),
    });

    if verbose {
        if let Some(level) = levels.first() {
            if let Ok(mut engine) = new_engine() {
                if engine.load_level(level.clone()).is_ok() {
                    println!("  {}:\n{}", level.name, engine.render_ascii());
                }
            }
        }
    }

    results
}

// ── 2. Scripted solutions ───────────────────────────────────────────────

fn validate_solutions(levels: &[Level], verbose: bool) -> Vec<TestResult> {
    println!("--- Scripted Solutions ---");
    let mut results = Vec::new();

    for script in SCRIPTS {
        let name = format!("solve_{}", slug(script.level));
        let Some(level) = levels.iter().find(|l| l.name == script.level) else {
            results.push(TestResult {
                name,
                passed: false,
                detail: "level missing from catalog".into(),
            });
            continue;
        };

        match play(level, script.moves) {
            Ok((engine, outcome)) => {
                if verbose {
                    println!("  {}:\n{}", level.name, engine.render_ascii());
                }
                let passed = script.expect.map_or(true, |want| want == outcome.result);
                let detail = match script.expect {
                    Some(want) if !passed => {
                        format!("expected {:?}, got {}", want, describe(&outcome, &engine))
                    }
                    _ => describe(&outcome, &engine),
                };
                results.push(TestResult {
                    name,
                    passed,
                    detail,
                });
            }
            Err(detail) => results.push(TestResult {
                name,
                passed: false,
                detail,
            }),
        }
    }

    results
}

// ── 3. Termination ──────────────────────────────────────────────────────

fn validate_termination(levels: &[Level], _verbose: bool) -> Vec<TestResult> {
    println!("--- Termination ---");
    let mut results = Vec::new();

    for level in levels {
        let name = format!("terminates_{}", slug(&level.name));
        match play(level, &[]) {
            Ok((engine, outcome)) => results.push(TestResult {
                name,
                passed: true,
                detail: describe(&outcome, &engine),
            }),
            Err(detail) => results.push(TestResult {
                name,
                passed: false,
                detail,
            }),
        }
    }

    results
}

// ── 4. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(levels: &[Level], _verbose: bool) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    // Power Through rolls dice on every obstacle and every overloaded pipe.
    let Some(script) = SCRIPTS.iter().find(|s| s.expect.is_none()) else {
        return results;
    };
    let Some(level) = levels.iter().find(|l| l.name == script.level) else {
        return results;
    };

    let first = play(level, script.moves);
    let second = play(level, script.moves);
    let (passed, detail) = match (first, second) {
        (Ok((mut a, oa)), Ok((mut b, ob))) => {
            let ea = a.drain_events();
            let eb = b.drain_events();
            (
                oa == ob && ea == eb,
                format!("{} events, {:?} both times", ea.len(), oa.result),
            )
        }
        (Err(e), _) | (_, Err(e)) => (false, e),
    };
    results.push(TestResult {
        name: format!("replay_{}", slug(&level.name)),
        passed,
        detail,
    });

    results
}
