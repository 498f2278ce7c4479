//! Mood system - gate reactions, joy contagion and idle decay.

use hecs::{Entity, World};
use log::trace;

use super::events::SimEvent;
use super::timers::TimerKind;
use super::TickContext;
use crate::components::{GridPos, Mood, MoodResponse, Piece};
use crate::config::SimConfig;
use crate::energy::EnergyKind;
use crate::grid::Cell;

/// Set a piece's mood and report the reaction.
///
/// When a happy particle drives the update, joy is queued for the piece's
/// neighbours. Returns `None` if `entity` is not a piece.
pub fn update_mood(
    world: &mut World,
    ctx: &mut TickContext,
    entity: Entity,
    mood: Mood,
    particle: Option<EnergyKind>,
) -> Option<MoodResponse> {
    let (pos, kind, response) = {
        let (pos, piece) = world.query_one_mut::<(&GridPos, &mut Piece)>(entity).ok()?;
        let response = piece.apply_mood(mood, particle);
        (*pos, piece.kind, response)
    };

    if response == MoodResponse::Cleared {
        return Some(response);
    }
    if let Some(energy) = particle {
        ctx.events.emit(SimEvent::PieceEntered {
            pos,
            kind,
            energy,
            outcome: response,
        });
        if energy.profile().can_spread_joy {
            spread_joy_to_neighbors(world, ctx, pos);
        }
    }
    Some(response)
}

/// Queue a delayed happy mood for every neighbouring piece that is not
/// already happy. Returns how many were queued.
pub fn spread_joy_to_neighbors(world: &World, ctx: &mut TickContext, from: GridPos) -> usize {
    let mut queued = 0;
    for to in from.neighbors() {
        let Ok(Cell::Piece(target)) = ctx.grid.get(to) else {
            continue;
        };
        let already_happy = world
            .get::<&Piece>(target)
            .map(|piece| piece.mood == Mood::Happy)
            .unwrap_or(true);
        if already_happy {
            continue;
        }
        ctx.timers
            .schedule_once(ctx.now_ms, ctx.joy_spread_delay_ms, TimerKind::JoyContagion { target });
        ctx.events.emit(SimEvent::JoySpread { from, to });
        queued += 1;
    }
    queued
}

/// Deliver queued joy. The target may have turned happy, or been removed,
/// since the contagion was queued.
pub fn fire_joy_contagion(world: &mut World, ctx: &mut TickContext, target: Entity) -> bool {
    let still_unhappy = world
        .get::<&Piece>(target)
        .map(|piece| piece.mood != Mood::Happy)
        .unwrap_or(false);
    if !still_unhappy {
        return false;
    }
    trace!("joy reaches {:?}", target);
    update_mood(world, ctx, target, Mood::Happy, Some(EnergyKind::Happy)).is_some()
}

/// Idle relaxation while no run is active: moods drift back to neutral and
/// stored energy bleeds away.
pub fn mood_decay_system(world: &mut World, dt: f32, config: &SimConfig) {
    let ticks = dt * 60.0;
    let energy_factor = config.idle_energy_decay.powf(ticks);

    for (_entity, piece) in world.query_mut::<&mut Piece>() {
        if piece.mood_stability > 0.0 {
            piece.mood_stability -= config.mood_stability_decay * ticks;
            if piece.mood_stability <= 0.0 {
                piece.apply_mood(Mood::Neutral, None);
                piece.mood_stability = 0.0;
            }
        }

        if piece.energy > 0.0 {
            piece.energy *= energy_factor;
            if piece.energy < config.idle_energy_floor {
                piece.energy = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PieceKind;
    use crate::grid::Grid;
    use crate::systems::{BridgeRegistry, GoalState, TimerQueue};
    use rand::rngs::mock::StepRng;

    struct Fixture {
        world: World,
        grid: Grid,
        bridges: BridgeRegistry,
        timers: TimerQueue,
        events: Vec<SimEvent>,
        goal: GoalState,
        rng: StepRng,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                world: World::new(),
                grid: Grid::new(5, 5),
                bridges: BridgeRegistry::new(),
                timers: TimerQueue::new(),
                events: Vec::new(),
                goal: GoalState::default(),
                rng: StepRng::new(0, 0),
            }
        }

        fn place(&mut self, kind: PieceKind, x: i32, y: i32) -> Entity {
            let pos = GridPos::new(x, y);
            let e = self.world.spawn((pos, Piece::new(kind)));
            self.grid.set(pos, Cell::Piece(e)).unwrap();
            e
        }

        fn split(&mut self) -> (&mut World, TickContext<'_>) {
            (
                &mut self.world,
                TickContext {
                    grid: &self.grid,
                    bridges: &mut self.bridges,
                    timers: &mut self.timers,
                    events: &mut self.events,
                    goal: &mut self.goal,
                    rng: &mut self.rng,
                    now_ms: 1000.0,
                    joy_spread_delay_ms: 300.0,
                },
            )
        }
    }

    #[test]
    fn test_happy_particle_queues_joy_for_neighbours() {
        let mut fx = Fixture::new();
        let center = fx.place(PieceKind::Pipe, 2, 2);
        fx.place(PieceKind::Pipe, 3, 2);
        fx.place(PieceKind::Grumpy, 2, 3);
        fx.grid.set(GridPos::new(1, 2), Cell::Obstacle).unwrap();

        let (world, mut ctx) = fx.split();
        let response = update_mood(world, &mut ctx, center, Mood::Happy, Some(EnergyKind::Happy));
        assert_eq!(response, Some(MoodResponse::Ambient));

        assert_eq!(fx.timers.len(), 2);
        assert_eq!(fx.timers.next_due(), Some(1300.0));
        let spreads = fx
            .events
            .iter()
            .filter(|e| matches!(e, SimEvent::JoySpread { .. }))
            .count();
        assert_eq!(spreads, 2);
    }

    #[test]
    fn test_calm_particle_does_not_spread() {
        let mut fx = Fixture::new();
        let center = fx.place(PieceKind::Pipe, 2, 2);
        fx.place(PieceKind::Pipe, 3, 2);

        let (world, mut ctx) = fx.split();
        update_mood(world, &mut ctx, center, Mood::Calm, Some(EnergyKind::Calm));
        assert!(fx.timers.is_empty());
    }

    #[test]
    fn test_neutral_update_spreads_nothing() {
        let mut fx = Fixture::new();
        let center = fx.place(PieceKind::Pipe, 2, 2);
        fx.place(PieceKind::Pipe, 3, 2);

        let (world, mut ctx) = fx.split();
        let response = update_mood(world, &mut ctx, center, Mood::Neutral, Some(EnergyKind::Happy));
        assert_eq!(response, Some(MoodResponse::Cleared));
        assert!(fx.timers.is_empty());
        assert!(fx.events.is_empty());
    }

    #[test]
    fn test_contagion_closes_nervous_gate() {
        let mut fx = Fixture::new();
        let nervous = fx.place(PieceKind::Nervous, 1, 1);

        let (world, mut ctx) = fx.split();
        assert!(fire_joy_contagion(world, &mut ctx, nervous));

        let piece = fx.world.get::<&Piece>(nervous).unwrap();
        assert_eq!(piece.mood, Mood::Happy);
        assert!(piece.is_blocking);
    }

    #[test]
    fn test_contagion_skips_happy_or_missing_target() {
        let mut fx = Fixture::new();
        let grumpy = fx.place(PieceKind::Grumpy, 1, 1);
        fx.world.get::<&mut Piece>(grumpy).unwrap().mood = Mood::Happy;
        let gone = fx.world.spawn((0u8,));
        fx.world.despawn(gone).unwrap();

        let (world, mut ctx) = fx.split();
        assert!(!fire_joy_contagion(world, &mut ctx, grumpy));
        assert!(!fire_joy_contagion(world, &mut ctx, gone));
        assert!(fx.events.is_empty());
    }

    #[test]
    fn test_contagion_cascades() {
        let mut fx = Fixture::new();
        let a = fx.place(PieceKind::Pipe, 0, 0);
        fx.place(PieceKind::Pipe, 1, 0);

        let (world, mut ctx) = fx.split();
        fire_joy_contagion(world, &mut ctx, a);
        // the neighbour is queued in turn
        assert_eq!(fx.timers.len(), 1);
    }

    #[test]
    fn test_idle_decay_returns_to_neutral() {
        let mut world = World::new();
        let mut piece = Piece::new(PieceKind::Sleepy);
        piece.apply_mood(Mood::Calm, Some(EnergyKind::Calm));
        piece.energy = 0.5;
        let e = world.spawn((GridPos::new(0, 0), piece));
        let config = SimConfig::default();

        // 0.005 per reference tick drains full stability in 200 ticks
        for _ in 0..199 {
            mood_decay_system(&mut world, 1.0 / 60.0, &config);
        }
        assert_eq!(world.get::<&Piece>(e).unwrap().mood, Mood::Calm);

        for _ in 0..2 {
            mood_decay_system(&mut world, 1.0 / 60.0, &config);
        }
        let piece = world.get::<&Piece>(e).unwrap();
        assert_eq!(piece.mood, Mood::Neutral);
        assert!(!piece.is_blocking);
        assert_eq!(piece.energy, 0.0);
    }

    #[test]
    fn test_idle_energy_snaps_to_zero() {
        let mut world = World::new();
        let mut piece = Piece::new(PieceKind::Pipe);
        piece.energy = 0.101;
        let e = world.spawn((GridPos::new(0, 0), piece));

        mood_decay_system(&mut world, 1.0 / 60.0, &SimConfig::default());
        assert_eq!(world.get::<&Piece>(e).unwrap().energy, 0.0);
    }
}
