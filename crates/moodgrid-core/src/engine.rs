//! Simulation engine - main entry point for running a level

use hecs::{Entity, World};
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::components::*;
use crate::config::{ConfigError, SimConfig};
use crate::energy::EnergyKind;
use crate::grid::{Cell, Grid, GridError};
use crate::level::{Level, LevelError};
use crate::systems::*;

/// Where a run stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Won,
    TimedOut,
}

/// Why a player edit was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },
    #[error("({x}, {y}) is already occupied")]
    Occupied { x: i32, y: i32 },
    #[error("there is no piece at ({x}, {y})")]
    Empty { x: i32, y: i32 },
    #[error("the piece at ({x}, {y}) belongs to the level")]
    Fixed { x: i32, y: i32 },
    #[error("{0:?} pieces cannot be placed, removed or rotated")]
    Anchor(PieceKind),
    #[error("the obstacle at ({x}, {y}) cannot be edited")]
    Obstacle { x: i32, y: i32 },
    #[error("the board cannot be edited while a run is in progress")]
    RunInProgress,
}

impl From<GridError> for PlacementError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::OutOfBounds { x, y } => PlacementError::OutOfBounds { x, y },
        }
    }
}

/// Main simulation engine
///
/// Owns the whole simulation state: the ECS world of pieces and particles,
/// the board, bridges, timers and the run state machine
/// (`Idle -> Running -> Won | TimedOut`, back to `Idle` on reset).
pub struct SimulationEngine {
    /// ECS world containing pieces and particles
    pub world: World,
    grid: Grid,
    bridges: BridgeRegistry,
    timers: TimerQueue,
    /// Events not yet handed to a sink
    events: Vec<SimEvent>,
    goal_state: GoalState,
    watchdog: RunWatchdog,
    rng: StdRng,
    /// Simulation time in milliseconds since creation
    clock_ms: f64,
    phase: RunPhase,
    outcome: Option<RunOutcome>,
    energy_type: EnergyKind,
    level: Option<Level>,
    source: Option<Entity>,
    goal: Option<Entity>,
    config: SimConfig,
}

impl SimulationEngine {
    /// Create an empty board sized by `config`, after validating it.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            world: World::new(),
            grid: Grid::new(config.grid_width, config.grid_height),
            bridges: BridgeRegistry::new(),
            timers: TimerQueue::new(),
            events: Vec::new(),
            goal_state: GoalState::default(),
            watchdog: RunWatchdog::new(config.initial_timeout_ms, config.progress_timeout_ms),
            rng,
            clock_ms: 0.0,
            phase: RunPhase::Idle,
            outcome: None,
            energy_type: EnergyKind::Happy,
            level: None,
            source: None,
            goal: None,
            config,
        }
    }

    /// Replace the board with `level`. The level is kept for [`reset`](Self::reset).
    pub fn load_level(&mut self, level: Level) -> Result<(), LevelError> {
        level.validate(self.grid.width(), self.grid.height())?;

        self.timers.clear();
        self.world.clear();
        self.grid.clear();
        self.bridges.clear();
        self.goal_state.reset();

        let source = piece_with(PieceKind::Source, level.source.connections);
        self.source = Some(self.spawn_piece(source, level.source.pos(), false)?);
        let goal = piece_with(PieceKind::Goal, level.goal.connections);
        self.goal = Some(self.spawn_piece(goal, level.goal.pos(), false)?);
        self.populate(&level)?;

        if let Some(forced) = level.forced_energy_type {
            self.energy_type = forced;
        }
        self.phase = RunPhase::Idle;
        self.outcome = None;
        info!(
            "Loaded level '{}' ({} obstacles, {} pre-placed)",
            level.name,
            level.obstacles.len(),
            level.pre_placed.len()
        );
        self.level = Some(level);
        Ok(())
    }

    /// Obstacles and pre-placed pieces of `level`.
    fn populate(&mut self, level: &Level) -> Result<(), GridError> {
        for pos in level.obstacle_positions() {
            self.grid.set(pos, Cell::Obstacle)?;
        }
        for placed in &level.pre_placed {
            let piece = piece_with(placed.kind, placed.connections);
            self.spawn_piece(piece, placed.pos(), true)?;
        }
        Ok(())
    }

    fn spawn_piece(&mut self, piece: Piece, pos: GridPos, fixed: bool) -> Result<Entity, GridError> {
        self.grid.get(pos)?;
        let entity = if piece.kind == PieceKind::Goal {
            self.world.spawn((pos, piece, GoalMeter::default()))
        } else if fixed {
            self.world.spawn((pos, piece, Fixed))
        } else {
            self.world.spawn((pos, piece))
        };
        self.grid.set(pos, Cell::Piece(entity))?;
        Ok(entity)
    }

    /// Begin a run with the current energy type.
    ///
    /// Returns `false` without touching anything when a run is already in
    /// progress, or when there is no source to emit from.
    pub fn start(&mut self) -> bool {
        if self.phase == RunPhase::Running {
            debug!("start ignored: run already in progress");
            return false;
        }
        let Some(source) = self.source else {
            warn!("start ignored: no source on the board");
            return false;
        };

        self.timers.clear();
        self.despawn_particles();
        for (_entity, (piece, meter)) in self
            .world
            .query_mut::<(&mut Piece, Option<&mut GoalMeter>)>()
        {
            piece.reset_state();
            if let Some(meter) = meter {
                meter.last_fill = 0.0;
            }
        }
        self.goal_state.reset();

        let now = self.clock_ms;
        let energy = self.energy_type;
        {
            let (world, mut ctx) = self.tick_context(now);
            update_mood(world, &mut ctx, source, energy.into(), Some(energy));
        }

        let deadline = self.watchdog.arm(now);
        self.timers
            .schedule_repeating(now, self.config.emission_interval_ms, TimerKind::Emission);
        self.timers
            .schedule_repeating(now, self.config.goal_check_interval_ms, TimerKind::GoalCheck);
        self.timers
            .schedule_once(now, deadline - now, TimerKind::FailureDeadline);

        self.phase = RunPhase::Running;
        self.outcome = None;
        self.events.push(SimEvent::RunStarted { energy });
        info!("Run started with {} energy", energy);
        true
    }

    /// Advance the simulation by `delta_seconds`.
    pub fn update(&mut self, delta_seconds: f32) {
        self.clock_ms += f64::from(delta_seconds) * 1000.0;
        let now = self.clock_ms;

        self.fire_due_timers();

        {
            let (world, mut ctx) = self.tick_context(now);
            let step = particle_system(world, &mut ctx, delta_seconds);
            if step.spawned > 0 || step.removed > 0 {
                trace!(
                    "t={:.0}ms particles: {} moved, {} spawned, {} removed",
                    now,
                    step.moved,
                    step.spawned,
                    step.removed
                );
            }
        }

        for pos in self.bridges.expire(now) {
            debug!("bridge at {} expired", pos);
            self.events.push(SimEvent::BridgeExpired { pos });
        }

        if self.phase != RunPhase::Running {
            mood_decay_system(&mut self.world, delta_seconds, &self.config);
        }
    }

    fn fire_due_timers(&mut self) {
        while let Some(fired) = self.timers.pop_due(self.clock_ms) {
            let at = fired.due_ms;
            match fired.kind {
                TimerKind::Emission => self.emit_from_source(),
                TimerKind::GoalCheck => self.check_goal(at),
                TimerKind::FailureDeadline => self.on_deadline(at),
                TimerKind::JoyContagion { target } => {
                    let (world, mut ctx) = self.tick_context(at);
                    fire_joy_contagion(world, &mut ctx, target);
                }
            }
        }
    }

    fn emit_from_source(&mut self) {
        let Some(source) = self.source else {
            return;
        };
        let Ok((pos, piece)) = self.world.query_one_mut::<(&GridPos, &Piece)>(source) else {
            return;
        };
        let pos = *pos;
        let directions: Vec<Direction> = piece.connections().open_directions().collect();

        let energy = self.energy_type;
        self.events.push(SimEvent::Emitted { pos, energy });
        for direction in directions {
            self.world.spawn((pos, Particle::new(direction, energy)));
            self.events.push(SimEvent::ParticleSpawned {
                pos,
                direction,
                energy,
            });
        }
    }

    /// Poll the goal; progress moves the failure deadline.
    fn observe_goal(&mut self, at: f64) -> bool {
        let energy = self.goal_energy();
        if !self.watchdog.observe(at, energy) {
            return false;
        }
        let deadline = self.watchdog.deadline_ms();
        self.timers
            .cancel_where(|kind| *kind == TimerKind::FailureDeadline);
        self.timers
            .schedule_once(at, deadline - at, TimerKind::FailureDeadline);
        debug!(
            "goal progress #{} at {:.0}ms, deadline now {:.0}ms",
            self.watchdog.progress_count(),
            at,
            deadline
        );
        true
    }

    fn check_goal(&mut self, at: f64) {
        self.observe_goal(at);
        if self.goal_state.is_reached() {
            self.finish(RunResult::Won, at);
        }
    }

    fn on_deadline(&mut self, at: f64) {
        if self.goal_state.is_reached() {
            self.finish(RunResult::Won, at);
            return;
        }
        // progress that lands on the deadline tick still counts
        if self.observe_goal(at) {
            return;
        }
        let reason = if self.goal_energy() > 0.0 {
            FailureReason::Stalled
        } else {
            FailureReason::NoEnergyReached
        };
        self.finish(RunResult::TimedOut(reason), at);
    }

    /// Halt the run. Particles in flight keep moving but the outcome is fixed.
    fn finish(&mut self, result: RunResult, at: f64) {
        self.timers.cancel_where(TimerKind::is_run_schedule);
        let goal_fill = self.goal_fill();
        self.outcome = Some(RunOutcome { result, goal_fill });

        match result {
            RunResult::Won => {
                self.phase = RunPhase::Won;
                info!("Run won at {:.0}ms", at);
                self.events.push(SimEvent::RunWon { fill: goal_fill });
            }
            RunResult::TimedOut(reason) => {
                self.phase = RunPhase::TimedOut;
                info!(
                    "Run failed at {:.0}ms: {:?}, goal {:.0}% powered",
                    at,
                    reason,
                    goal_fill * 100.0
                );
                self.events.push(SimEvent::RunFailed {
                    reason,
                    fill: goal_fill,
                });
            }
        }
    }

    /// Stop any run and restore the loaded level: particles, bridges and
    /// player pieces are removed, pre-placed pieces and obstacles come back,
    /// and the source and goal return to their idle state.
    pub fn reset(&mut self) {
        self.timers.clear();
        self.bridges.clear();
        self.despawn_particles();

        let removable: Vec<(Entity, GridPos)> = self
            .world
            .query::<(&GridPos, &Piece)>()
            .iter()
            .filter(|(_, (_, piece))| !piece.kind.is_anchor())
            .map(|(entity, (pos, _))| (entity, *pos))
            .collect();
        for (entity, pos) in removable {
            let _ = self.world.despawn(entity);
            let _ = self.grid.set(pos, Cell::Empty);
        }

        let obstacles: Vec<GridPos> = self
            .grid
            .iter()
            .filter(|(_, cell)| *cell == Cell::Obstacle)
            .map(|(pos, _)| pos)
            .collect();
        for pos in obstacles {
            let _ = self.grid.set(pos, Cell::Empty);
        }

        for (_entity, (piece, meter)) in self
            .world
            .query_mut::<(&mut Piece, Option<&mut GoalMeter>)>()
        {
            piece.reset_state();
            if let Some(meter) = meter {
                meter.last_fill = 0.0;
            }
        }

        match self.level.take() {
            Some(level) => {
                if let Err(err) = self.populate(&level) {
                    warn!("could not restore level '{}': {}", level.name, err);
                }
                self.level = Some(level);
            }
            None => warn!("reset with no level loaded"),
        }

        self.goal_state.reset();
        self.phase = RunPhase::Idle;
        self.outcome = None;
        self.events.push(SimEvent::LevelReset);
        info!("Level reset");
    }

    // ── Player edits ──

    fn ensure_editable(&self) -> Result<(), PlacementError> {
        if self.phase == RunPhase::Running {
            Err(PlacementError::RunInProgress)
        } else {
            Ok(())
        }
    }

    /// The player-owned piece at (x, y).
    fn editable_piece(&self, x: i32, y: i32) -> Result<(GridPos, Entity, PieceKind), PlacementError> {
        let pos = GridPos::new(x, y);
        let entity = match self.grid.get(pos)? {
            Cell::Empty => return Err(PlacementError::Empty { x, y }),
            Cell::Obstacle => return Err(PlacementError::Obstacle { x, y }),
            Cell::Piece(entity) => entity,
        };
        let kind = self
            .world
            .get::<&Piece>(entity)
            .map(|piece| piece.kind)
            .map_err(|_| PlacementError::Empty { x, y })?;
        if kind.is_anchor() {
            return Err(PlacementError::Anchor(kind));
        }
        if self.world.get::<&Fixed>(entity).is_ok() {
            return Err(PlacementError::Fixed { x, y });
        }
        Ok((pos, entity, kind))
    }

    /// Put a new piece from the toolbox on an empty cell.
    pub fn place(&mut self, kind: PieceKind, x: i32, y: i32) -> Result<Entity, PlacementError> {
        self.ensure_editable()?;
        if kind.is_anchor() {
            return Err(PlacementError::Anchor(kind));
        }
        let pos = GridPos::new(x, y);
        if self.grid.get(pos)? != Cell::Empty {
            return Err(PlacementError::Occupied { x, y });
        }
        let entity = self.spawn_piece(Piece::new(kind), pos, false)?;
        debug!("placed {:?} at {}", kind, pos);
        self.events.push(SimEvent::Placed { pos, kind });
        Ok(entity)
    }

    pub fn remove(&mut self, x: i32, y: i32) -> Result<PieceKind, PlacementError> {
        self.ensure_editable()?;
        let (pos, entity, kind) = self.editable_piece(x, y)?;
        let _ = self.world.despawn(entity);
        self.grid.set(pos, Cell::Empty)?;
        debug!("removed {:?} at {}", kind, pos);
        self.events.push(SimEvent::Removed { pos, kind });
        Ok(kind)
    }

    /// Turn the piece at (x, y) a quarter clockwise.
    pub fn rotate_at(&mut self, x: i32, y: i32) -> Result<Orientation, PlacementError> {
        self.ensure_editable()?;
        let (pos, entity, kind) = self.editable_piece(x, y)?;
        let orientation = {
            let mut piece = self
                .world
                .get::<&mut Piece>(entity)
                .map_err(|_| PlacementError::Empty { x, y })?;
            piece.rotate();
            piece.orientation
        };
        self.events.push(SimEvent::Rotated {
            pos,
            kind,
            degrees: orientation.degrees(),
        });
        Ok(orientation)
    }

    // ── Energy selection ──

    fn forced_energy(&self) -> Option<EnergyKind> {
        self.level.as_ref().and_then(|level| level.forced_energy_type)
    }

    pub fn set_energy_type(&mut self, kind: EnergyKind) -> Result<(), LevelError> {
        match self.forced_energy() {
            Some(forced) if forced != kind => Err(LevelError::ForcedEnergy(forced)),
            _ => {
                self.energy_type = kind;
                Ok(())
            }
        }
    }

    /// Happy, calm, excited, happy...
    pub fn cycle_energy_type(&mut self) -> Result<EnergyKind, LevelError> {
        if let Some(forced) = self.forced_energy() {
            return Err(LevelError::ForcedEnergy(forced));
        }
        self.energy_type = self.energy_type.next();
        Ok(self.energy_type)
    }

    // ── Events ──

    /// Take every event produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Hand pending events to `sink`, oldest first.
    pub fn flush_events(&mut self, sink: &mut dyn EventSink) {
        for event in self.events.drain(..) {
            sink.emit(event);
        }
    }

    // ── Queries ──

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    /// Report of the last finished run, cleared by `start` and `reset`.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn energy_type(&self) -> EnergyKind {
        self.energy_type
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bridges(&self) -> &BridgeRegistry {
        &self.bridges
    }

    pub fn source_entity(&self) -> Option<Entity> {
        self.source
    }

    pub fn goal_entity(&self) -> Option<Entity> {
        self.goal
    }

    pub fn goal_reached(&self) -> bool {
        self.goal_state.is_reached()
    }

    pub fn goal_energy(&self) -> f32 {
        self.goal
            .and_then(|goal| self.world.get::<&Piece>(goal).ok().map(|piece| piece.energy))
            .unwrap_or(0.0)
    }

    pub fn goal_fill(&self) -> f32 {
        self.goal
            .and_then(|goal| {
                self.world
                    .get::<&Piece>(goal)
                    .ok()
                    .map(|piece| piece.fill_fraction())
            })
            .unwrap_or(0.0)
    }

    pub fn piece_at(&self, x: i32, y: i32) -> Option<Entity> {
        match self.grid.get(GridPos::new(x, y)) {
            Ok(Cell::Piece(entity)) => Some(entity),
            _ => None,
        }
    }

    /// Snapshot of the piece at (x, y).
    pub fn piece(&self, x: i32, y: i32) -> Option<Piece> {
        let entity = self.piece_at(x, y)?;
        self.world.get::<&Piece>(entity).ok().map(|piece| (*piece).clone())
    }

    pub fn particle_count(&self) -> usize {
        self.world.query::<&Particle>().iter().count()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// The board as text, top row first.
    pub fn render_ascii(&self) -> String {
        self.grid.render_ascii(|entity| {
            self.world
                .get::<&Piece>(entity)
                .map(|piece| glyph(&piece))
                .unwrap_or('?')
        })
    }

    fn despawn_particles(&mut self) {
        let particles: Vec<Entity> = self
            .world
            .query::<&Particle>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        for entity in particles {
            let _ = self.world.despawn(entity);
        }
    }

    fn tick_context(&mut self, now_ms: f64) -> (&mut World, TickContext<'_>) {
        (
            &mut self.world,
            TickContext {
                grid: &self.grid,
                bridges: &mut self.bridges,
                timers: &mut self.timers,
                events: &mut self.events,
                goal: &mut self.goal_state,
                rng: &mut self.rng,
                now_ms,
                joy_spread_delay_ms: self.config.joy_spread_delay_ms,
            },
        )
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::build(SimConfig::default())
    }
}

fn piece_with(kind: PieceKind, connections: Option<Connections>) -> Piece {
    match connections {
        Some(connections) => Piece::with_connections(kind, connections),
        None => Piece::new(kind),
    }
}

fn glyph(piece: &Piece) -> char {
    if piece.burned_out {
        return '*';
    }
    match piece.kind {
        PieceKind::Source => 'S',
        PieceKind::Goal => 'G',
        PieceKind::Pipe => {
            if piece.connections().top {
                '|'
            } else {
                '-'
            }
        }
        PieceKind::Corner => 'L',
        PieceKind::TJunction => 'T',
        PieceKind::Cross => '+',
        PieceKind::Nervous => 'n',
        PieceKind::Sleepy => 'z',
        PieceKind::Grumpy => 'g',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: f32 = 1.0 / 60.0;

    fn engine_with(json: &str) -> SimulationEngine {
        let mut engine = SimulationEngine::new(SimConfig::default().with_seed(7)).unwrap();
        let level: Level = serde_json::from_str(json).unwrap();
        engine.load_level(level).unwrap();
        engine
    }

    /// Source in the bottom-left corner firing right into nothing; goal far away.
    const ISOLATED: &str = r#"{
        "name": "isolated",
        "source": { "x": 0, "y": 0, "connections": { "right": true } },
        "goal": { "x": 7, "y": 7 }
    }"#;

    const WALLED: &str = r#"{
        "name": "walled",
        "source": { "x": 1, "y": 1 },
        "goal": { "x": 1, "y": 6 },
        "obstacles": [[4, 4], [5, 4]],
        "prePlaced": [{ "type": "grumpy", "x": 3, "y": 3 }],
        "forcedEnergyType": "calm"
    }"#;

    fn run_until(engine: &mut SimulationEngine, t_ms: f64) {
        while engine.clock_ms() < t_ms {
            engine.update(TICK);
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = SimulationEngine::default();
        assert_eq!(engine.phase(), RunPhase::Idle);
        assert!(engine.outcome().is_none());
        assert_eq!(engine.clock_ms(), 0.0);
        assert_eq!(engine.energy_type(), EnergyKind::Happy);
        assert_eq!(engine.grid().width(), 8);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SimConfig {
            goal_check_interval_ms: 0.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            SimulationEngine::new(config),
            Err(ConfigError::Invalid(_))
        ));

        let config = SimConfig {
            emission_interval_ms: -5.0,
            ..SimConfig::default()
        };
        assert!(SimulationEngine::new(config).is_err());
    }

    #[test]
    fn test_load_level_builds_board() {
        let engine = engine_with(WALLED);
        let board = engine.render_ascii();
        let rows: Vec<&str> = board.lines().collect();
        // top row first, so y=6 is the second line
        assert_eq!(rows[1], ".G......");
        assert_eq!(rows[3], "....XX..");
        assert_eq!(rows[4], "...g....");
        assert_eq!(rows[6], ".S......");
        assert_eq!(engine.energy_type(), EnergyKind::Calm);
    }

    #[test]
    fn test_load_level_rejects_bad_layout() {
        let mut engine = SimulationEngine::default();
        let level: Level = serde_json::from_str(
            r#"{ "name": "bad", "source": { "x": 9, "y": 0 }, "goal": { "x": 1, "y": 0 } }"#,
        )
        .unwrap();
        assert!(matches!(
            engine.load_level(level),
            Err(LevelError::OutOfBounds { x: 9, .. })
        ));
        assert!(engine.source_entity().is_none());
    }

    #[test]
    fn test_place_rotate_remove() {
        let mut engine = engine_with(WALLED);
        engine.place(PieceKind::Pipe, 2, 2).unwrap();
        assert_eq!(engine.rotate_at(2, 2).unwrap().degrees(), 90);
        assert_eq!(
            engine.piece(2, 2).unwrap().connections(),
            Connections::new(false, true, false, true)
        );
        assert_eq!(engine.remove(2, 2).unwrap(), PieceKind::Pipe);
        assert!(engine.piece_at(2, 2).is_none());

        let events = engine.drain_events();
        assert!(matches!(events[0], SimEvent::Placed { kind: PieceKind::Pipe, .. }));
        assert!(matches!(events[1], SimEvent::Rotated { degrees: 90, .. }));
        assert!(matches!(events[2], SimEvent::Removed { .. }));
    }

    #[test]
    fn test_edit_errors() {
        let mut engine = engine_with(WALLED);
        assert_eq!(
            engine.place(PieceKind::Pipe, 8, 0),
            Err(PlacementError::OutOfBounds { x: 8, y: 0 })
        );
        assert_eq!(
            engine.place(PieceKind::Pipe, 4, 4),
            Err(PlacementError::Occupied { x: 4, y: 4 })
        );
        assert_eq!(
            engine.place(PieceKind::Goal, 0, 5),
            Err(PlacementError::Anchor(PieceKind::Goal))
        );
        assert_eq!(engine.remove(3, 3), Err(PlacementError::Fixed { x: 3, y: 3 }));
        assert_eq!(engine.rotate_at(3, 3), Err(PlacementError::Fixed { x: 3, y: 3 }));
        assert_eq!(
            engine.rotate_at(1, 1),
            Err(PlacementError::Anchor(PieceKind::Source))
        );
        assert_eq!(engine.remove(4, 4), Err(PlacementError::Obstacle { x: 4, y: 4 }));
        assert_eq!(engine.remove(0, 0), Err(PlacementError::Empty { x: 0, y: 0 }));
    }

    #[test]
    fn test_edits_refused_while_running() {
        let mut engine = engine_with(ISOLATED);
        assert!(engine.start());
        assert_eq!(
            engine.place(PieceKind::Pipe, 3, 3),
            Err(PlacementError::RunInProgress)
        );
    }

    #[test]
    fn test_start_without_source() {
        let mut engine = SimulationEngine::default();
        assert!(!engine.start());
        assert_eq!(engine.phase(), RunPhase::Idle);
    }

    #[test]
    fn test_double_start_is_noop() {
        let mut engine = engine_with(ISOLATED);
        assert!(engine.start());
        let timers = engine.pending_timers();
        engine.update(TICK);
        assert!(!engine.start());
        assert_eq!(engine.pending_timers(), timers);
        assert!(engine.is_running());
    }

    #[test]
    fn test_emission_per_open_side() {
        let mut engine = engine_with(
            r#"{
                "name": "fan",
                "source": { "x": 3, "y": 3, "connections": { "top": true, "right": true } },
                "goal": { "x": 7, "y": 7 }
            }"#,
        );
        engine.start();
        run_until(&mut engine, 990.0);
        assert_eq!(engine.particle_count(), 0);
        run_until(&mut engine, 1050.0);
        assert_eq!(engine.particle_count(), 2);
    }

    #[test]
    fn test_no_energy_times_out_at_initial_deadline() {
        let mut engine = engine_with(ISOLATED);
        engine.start();
        run_until(&mut engine, 4950.0);
        assert!(engine.is_running());
        run_until(&mut engine, 5050.0);

        let outcome = engine.outcome().unwrap();
        assert_eq!(
            outcome.result,
            RunResult::TimedOut(FailureReason::NoEnergyReached)
        );
        assert_eq!(outcome.goal_fill, 0.0);
        assert!(!engine.timers.has_pending(TimerKind::is_run_schedule));
    }

    #[test]
    fn test_progress_extends_deadline() {
        let mut engine = engine_with(ISOLATED);
        let goal = engine.goal_entity().unwrap();
        engine.start();

        // goal energy rises at t=1s and t=3s, then stalls
        while engine.clock_ms() < 5250.0 {
            engine.update(0.01);
            let t = engine.clock_ms();
            let energy = if t >= 3000.0 {
                0.6
            } else if t >= 1000.0 {
                0.3
            } else {
                0.0
            };
            if engine.is_running() {
                engine.world.get::<&mut Piece>(goal).unwrap().energy = energy;
            }
            if t < 4950.0 {
                assert_eq!(engine.phase(), RunPhase::Running, "t={}", t);
            }
        }

        assert_eq!(engine.phase(), RunPhase::TimedOut);
        let outcome = engine.outcome().unwrap();
        assert_eq!(outcome.result, RunResult::TimedOut(FailureReason::Stalled));
        assert!((outcome.goal_fill - 0.3).abs() < 1e-6);
        assert_eq!(outcome.fill_percent(), 30);
    }

    #[test]
    fn test_joy_reaches_neighbour_after_delay() {
        let mut engine = engine_with(ISOLATED);
        engine.place(PieceKind::Grumpy, 0, 1).unwrap();
        engine.start();

        run_until(&mut engine, 250.0);
        assert_eq!(engine.piece(0, 1).unwrap().mood, Mood::Neutral);
        assert_eq!(engine.pending_timers(), 4);

        run_until(&mut engine, 350.0);
        let grumpy = engine.piece(0, 1).unwrap();
        assert_eq!(grumpy.mood, Mood::Happy);
        assert!(!grumpy.is_blocking);
        assert_eq!(engine.pending_timers(), 3);

        let events = engine.drain_events();
        assert!(events.iter().any(|e| *e
            == SimEvent::JoySpread {
                from: GridPos::new(0, 0),
                to: GridPos::new(0, 1)
            }));
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::PieceEntered {
                kind: PieceKind::Grumpy,
                outcome: MoodResponse::Accepted,
                ..
            }
        )));
    }

    #[test]
    fn test_forced_energy() {
        let mut engine = engine_with(WALLED);
        assert_eq!(
            engine.set_energy_type(EnergyKind::Happy),
            Err(LevelError::ForcedEnergy(EnergyKind::Calm))
        );
        assert!(engine.set_energy_type(EnergyKind::Calm).is_ok());
        assert!(engine.cycle_energy_type().is_err());
        assert_eq!(engine.energy_type(), EnergyKind::Calm);
    }

    #[test]
    fn test_cycle_energy_type() {
        let mut engine = engine_with(ISOLATED);
        assert_eq!(engine.cycle_energy_type(), Ok(EnergyKind::Calm));
        assert_eq!(engine.cycle_energy_type(), Ok(EnergyKind::Excited));
        assert_eq!(engine.cycle_energy_type(), Ok(EnergyKind::Happy));
    }

    #[test]
    fn test_reset_restores_level() {
        let mut engine = engine_with(WALLED);
        let source = engine.source_entity();
        engine.place(PieceKind::Pipe, 1, 2).unwrap();
        engine.start();
        run_until(&mut engine, 1500.0);
        engine.reset();

        assert_eq!(engine.phase(), RunPhase::Idle);
        assert_eq!(engine.particle_count(), 0);
        assert!(engine.bridges().is_empty());
        assert_eq!(engine.pending_timers(), 0);
        assert!(engine.piece_at(1, 2).is_none());
        assert_eq!(engine.piece(3, 3).unwrap().kind, PieceKind::Grumpy);
        assert_eq!(engine.grid().get(GridPos::new(4, 4)), Ok(Cell::Obstacle));
        assert_eq!(engine.source_entity(), source);
        assert_eq!(engine.piece(1, 1).unwrap().energy, 0.0);
        assert!(engine
            .drain_events()
            .iter()
            .any(|e| *e == SimEvent::LevelReset));
    }

    #[test]
    fn test_idle_decay_only_between_runs() {
        let mut engine = engine_with(ISOLATED);
        engine.place(PieceKind::Pipe, 3, 3).unwrap();
        let pipe = engine.piece_at(3, 3).unwrap();
        engine.world.get::<&mut Piece>(pipe).unwrap().energy = 0.5;

        engine.update(TICK);
        let idle = engine.piece(3, 3).unwrap().energy;
        assert!(idle < 0.5);

        engine.start();
        engine.world.get::<&mut Piece>(pipe).unwrap().energy = 0.5;
        engine.update(TICK);
        assert_eq!(engine.piece(3, 3).unwrap().energy, 0.5);
    }

    #[test]
    fn test_flush_events_to_sink() {
        let mut engine = engine_with(ISOLATED);
        engine.start();
        let mut sink: Vec<SimEvent> = Vec::new();
        engine.flush_events(&mut sink);
        assert!(matches!(sink.last(), Some(SimEvent::RunStarted { .. })));
        assert!(engine.drain_events().is_empty());
    }
}
