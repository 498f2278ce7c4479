//! Particle system - movement, cell transitions and routing through pieces.
//!
//! Every particle advances along its direction. On reaching the next cell it
//! either dies at the board edge, crosses an obstacle (calm bridges it,
//! excited may smash through), crosses open ground on a bridge, or enters a
//! piece. Bridges over obstacles carry calm energy only.
//!
//! Entering a piece runs, in order: the connection gate, energy transfer, the
//! mood update, personality conversion, the burnout roll, goal absorption and
//! finally routing, which may split the particle over several exits.

use hecs::{Entity, World};
use log::{debug, trace};
use rand::Rng;

use super::events::SimEvent;
use super::mood::update_mood;
use super::TickContext;
use crate::components::{Connections, Direction, GoalMeter, GridPos, Particle, Piece, PieceKind, Side};
use crate::grid::Cell;

/// Life lost laying a bridge over an obstacle.
pub const OBSTACLE_BRIDGE_COST: f32 = 0.10;
/// Life lost laying a bridge over open ground.
pub const OPEN_BRIDGE_COST: f32 = 0.05;
/// Life kept after smashing through an obstacle.
pub const POWER_THROUGH_LIFE: f32 = 0.5;
/// A piece holding more than this can burn out under excited energy.
pub const BURNOUT_ENERGY_THRESHOLD: f32 = 0.9;

/// Counts from one particle pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleStep {
    pub moved: usize,
    pub spawned: usize,
    pub removed: usize,
}

/// Move every particle by `dt` seconds.
///
/// Particles split off during the pass join the world afterwards and are not
/// advanced until the next pass. Dead particles are despawned at the end.
pub fn particle_system(world: &mut World, ctx: &mut TickContext, dt: f32) -> ParticleStep {
    let mut step = ParticleStep::default();
    let movers: Vec<Entity> = world.query::<&Particle>().iter().map(|(e, _)| e).collect();
    let mut offshoots: Vec<(GridPos, Particle)> = Vec::new();

    for entity in movers {
        let (mut pos, mut particle) = match world.query_one_mut::<(&GridPos, &Particle)>(entity) {
            Ok((pos, particle)) => (*pos, *particle),
            Err(_) => continue,
        };

        if particle.advance(dt) {
            cross_into_next_cell(world, ctx, &mut pos, &mut particle, &mut offshoots);
            particle.progress = 0.0;
            step.moved += 1;
        }

        if let Ok((p, q)) = world.query_one_mut::<(&mut GridPos, &mut Particle)>(entity) {
            *p = pos;
            *q = particle;
        }
    }

    for (pos, particle) in offshoots {
        ctx.events.emit(SimEvent::ParticleSpawned {
            pos,
            direction: particle.direction,
            energy: particle.energy,
        });
        world.spawn((pos, particle));
        step.spawned += 1;
    }

    let dead: Vec<Entity> = world
        .query::<&Particle>()
        .iter()
        .filter(|(_, p)| !p.is_alive())
        .map(|(e, _)| e)
        .collect();
    for entity in dead {
        if world.despawn(entity).is_ok() {
            step.removed += 1;
        }
    }

    step
}

/// Resolve a particle reaching the edge of its cell. `pos` is updated when
/// the particle moves; a refused particle is killed in place.
pub fn cross_into_next_cell(
    world: &mut World,
    ctx: &mut TickContext,
    pos: &mut GridPos,
    particle: &mut Particle,
    offshoots: &mut Vec<(GridPos, Particle)>,
) {
    let next = pos.step(particle.direction);
    match ctx.grid.get(next) {
        Err(_) => {
            trace!("{} particle left the board at {}", particle.energy, next);
            particle.kill();
        }
        Ok(Cell::Obstacle) => cross_obstacle(ctx, pos, particle, next),
        Ok(Cell::Empty) => cross_open_ground(ctx, pos, particle, next),
        Ok(Cell::Piece(target)) => enter_piece(world, ctx, target, pos, particle, next, offshoots),
    }
}

fn lay_bridge(ctx: &mut TickContext, at: GridPos, duration_ms: f64) {
    if ctx.bridges.create(at, ctx.now_ms, duration_ms) {
        debug!("bridge laid at {}", at);
        ctx.events.emit(SimEvent::BridgeCreated { pos: at });
    }
}

fn cross_obstacle(ctx: &mut TickContext, pos: &mut GridPos, particle: &mut Particle, next: GridPos) {
    let profile = particle.energy.profile();

    if profile.can_bridge {
        lay_bridge(ctx, next, profile.bridge_duration_ms);
        *pos = next;
        particle.life *= 1.0 - OBSTACLE_BRIDGE_COST;
    } else if profile.can_power_through && ctx.rng.gen_bool(profile.power_through_chance) {
        debug!("{} particle powered through obstacle at {}", particle.energy, next);
        *pos = next;
        particle.life *= POWER_THROUGH_LIFE;
        ctx.events.emit(SimEvent::PoweredThrough { pos: next });
    } else {
        trace!("{} particle stopped by obstacle at {}", particle.energy, next);
        particle.kill();
    }
}

fn cross_open_ground(ctx: &mut TickContext, pos: &mut GridPos, particle: &mut Particle, next: GridPos) {
    let profile = particle.energy.profile();

    if profile.can_bridge {
        lay_bridge(ctx, next, profile.bridge_duration_ms);
        *pos = next;
        particle.life *= 1.0 - OPEN_BRIDGE_COST;
    } else if ctx.bridges.is_bridged(next, ctx.now_ms) {
        *pos = next;
    } else {
        trace!("{} particle fell into empty cell {}", particle.energy, next);
        particle.kill();
    }
}

fn enter_piece(
    world: &mut World,
    ctx: &mut TickContext,
    target: Entity,
    pos: &mut GridPos,
    particle: &mut Particle,
    next: GridPos,
    offshoots: &mut Vec<(GridPos, Particle)>,
) {
    let entry = particle.direction.opposite_side();
    let incoming = particle.energy;

    let (kind, connections) = {
        let Ok(mut piece) = world.get::<&mut Piece>(target) else {
            particle.kill();
            return;
        };
        if !piece.can_connect(entry, Some(incoming)) {
            trace!("{:?} at {} refused {} from {:?}", piece.kind, next, incoming, entry);
            particle.kill();
            return;
        }
        piece.absorb(incoming.profile().transfer);
        (piece.kind, piece.connections())
    };
    *pos = next;

    update_mood(world, ctx, target, incoming.into(), Some(incoming));

    if let Some(converted) = kind.personality().and_then(|p| p.convert(incoming)) {
        debug!("{:?} at {} converted {} to {}", kind, next, incoming, converted);
        particle.energy = converted;
        ctx.events.emit(SimEvent::Converted {
            pos: next,
            from: incoming,
            to: converted,
        });
    }

    roll_burnout(world, ctx, target, kind, next, particle);

    if kind == PieceKind::Goal {
        absorb_at_goal(world, ctx, target);
        particle.kill();
        return;
    }

    route_through(kind, connections, entry, next, particle, offshoots);
}

fn roll_burnout(
    world: &mut World,
    ctx: &mut TickContext,
    target: Entity,
    kind: PieceKind,
    at: GridPos,
    particle: &Particle,
) {
    let profile = particle.energy.profile();
    if !profile.can_overwhelm || kind.is_anchor() || kind == PieceKind::Sleepy {
        return;
    }
    let Ok(mut piece) = world.get::<&mut Piece>(target) else {
        return;
    };
    if piece.burned_out || piece.energy <= BURNOUT_ENERGY_THRESHOLD {
        return;
    }
    if ctx.rng.gen_bool(profile.burnout_chance) {
        piece.burned_out = true;
        debug!("{:?} at {} burned out", kind, at);
        ctx.events.emit(SimEvent::Burnout { pos: at, kind });
    }
}

fn absorb_at_goal(world: &mut World, ctx: &mut TickContext, goal: Entity) {
    let Ok((piece, meter)) = world.query_one_mut::<(&Piece, Option<&mut GoalMeter>)>(goal) else {
        return;
    };
    debug!("goal energy {:.2}/{:.2}", piece.energy, piece.max_energy);
    let mut scratch = GoalMeter::default();
    let meter = meter.unwrap_or(&mut scratch);
    ctx.goal.record(piece, meter, &mut *ctx.events);
}

/// Point the particle at the first open exit other than the one it came in
/// by. Crosses and T-junctions always fan out over every exit, and happy
/// energy fans out wherever there is more than one.
fn route_through(
    kind: PieceKind,
    connections: Connections,
    entry: Side,
    at: GridPos,
    particle: &mut Particle,
    offshoots: &mut Vec<(GridPos, Particle)>,
) {
    let exits: Vec<Direction> = connections
        .open_directions()
        .filter(|dir| dir.side() != entry)
        .collect();

    let Some((&first, rest)) = exits.split_first() else {
        trace!("{:?} at {} is a dead end", kind, at);
        particle.kill();
        return;
    };

    let splits =
        kind.always_splits() || (particle.energy.profile().can_spread_joy && exits.len() > 1);
    if splits {
        for &dir in rest {
            offshoots.push((at, particle.offshoot(dir)));
        }
        debug!("{:?} at {} split {} ways", kind, at, exits.len());
    }
    particle.direction = first;
}
