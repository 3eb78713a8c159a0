//! # Assignment arbiter
//!
//! Decides, from the local floor table and the [PeerRegistry], which hall calls this node may
//! claim, whether a claim has become final, and whether the car may stop where it is.
//!
//! Nothing here blocks or waits for agreement. If the fleet does not agree yet, the answer is
//! "not this tick" and the question is asked again on the next one.
//!
//! ## Tie-break
//! Two owners for one call are resolved the same way everywhere:
//! - a node that is itself disabled always gives its claim away,
//! - an owner that [concedes](crate::peer_registry::Standing::concedes) (stale, or disabled
//!   away from the floor) loses to one that does not,
//! - otherwise the lower node index wins.

use crate::config::NodeId;
use crate::peer_registry::{PeerRegistry, Standing};
use crate::world_view::{floor_table, Direction, ElevatorBehaviour};


/// What an idle car should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleChoice {
    /// Nothing to do, or nothing agreed on yet
    Stay,
    /// A hall call was just locked by us. The claim is checked again next tick before moving
    Claimed { floor: u8, direction: Direction },
    /// Go to `floor` (or open the door if already there), serving in `direction`
    Serve { floor: u8, direction: Direction },
}


/// `true` if the local node (owner `ours`) should hand the call at `floor` to `theirs`.
pub fn should_yield(
    standings: &[Standing],
    local_disabled: bool,
    floor: usize,
    ours: Option<NodeId>,
    theirs: Option<NodeId>,
) -> bool {
    if local_disabled {
        return true;
    }
    let concedes = |owner: NodeId| standings.get(owner as usize).map_or(true, |s| s.concedes(floor));

    match (ours, theirs) {
        (Some(o), Some(t)) => match (concedes(o), concedes(t)) {
            (true, false) => true,
            (false, true) => false,
            _ => t < o,
        },
        (None, Some(_)) => true,
        _ => false,
    }
}

/// Folds every live peer's stored snapshot into the local floor table.
pub fn merge_live_peers(registry: &mut PeerRegistry) {
    let standings = registry.standings();
    let local_disabled = registry.local().disabled;

    for peer in registry.live_peers() {
        if let Some((local, theirs)) = registry.local_and_peer_mut(peer) {
            floor_table::merge_peer(&mut local.floors, &mut theirs.floors, |floor, _, ours, other| {
                should_yield(&standings, local_disabled, floor, ours, other)
            });
        }
    }
}

/// `true` iff every live node, self included, shows the call requested and not locked.
pub fn order_is_available(registry: &PeerRegistry, direction: Direction, floor: u8) -> bool {
    registry.live_nodes().into_iter().all(|i| {
        registry
            .snapshot(i)
            .and_then(|s| s.floors.get(floor as usize))
            .map_or(false, |r| r.is_open(direction))
    })
}

/// Locks the call for ourselves in the local table
pub fn claim(registry: &mut PeerRegistry, direction: Direction, floor: u8) {
    let me = registry.self_index();
    if let Some(record) = registry.local_mut().floors.get_mut(floor as usize) {
        record.lock(direction, Some(me));
    }
}

/// Checks that every live peer records the same owner for `(target, direction)` as we do.
///
/// ## Behavior
/// - Peers that [concede](Standing::concedes) the floor are skipped, and if our table names
///   one of them as owner, ownership is taken over by us.
/// - The first peer that disagrees ends the check with `false`.
///
/// # Notes
/// The (possibly rewritten) owner is stored in the local table either way.
pub fn verify_locked_floors(registry: &mut PeerRegistry, direction: Direction, target: u8) -> bool {
    let me = registry.self_index();
    let f = target as usize;
    let standings = registry.standings();

    let mut claim = match registry.local().floors.get(f) {
        Some(record) => record.owner(direction),
        None => return false,
    };

    let mut agreed = true;
    for (i, standing) in standings.iter().enumerate() {
        let i = i as NodeId;
        if i == me {
            continue;
        }
        if standing.concedes(f) {
            if claim == Some(i) {
                claim = Some(me);
            }
            continue;
        }
        let theirs = registry
            .snapshot(i)
            .and_then(|s| s.floors.get(f))
            .and_then(|r| r.owner(direction));
        if theirs != claim {
            agreed = false;
            break;
        }
    }

    if let Some(record) = registry.local_mut().floors.get_mut(f) {
        record.set_owner(direction, claim);
    }
    agreed
}

/// `true` if `floor` has a cab call, or our table has its hall call in our service direction
/// locked with us as owner.
pub fn is_committed(registry: &PeerRegistry, floor: u8) -> bool {
    let me = registry.self_index();
    let local = registry.local();
    let dir = local.direction;
    local
        .floors
        .get(floor as usize)
        .map_or(false, |r| r.cab_requested || (r.locked(dir) && r.owner(dir) == Some(me)))
}

/// Pulls the target back if the call it was set for now belongs to someone else.
///
/// ## Behavior
/// - Nothing happens while idle, or while the target is still [committed](is_committed).
/// - Otherwise the new target is the committed floor between here and the old target that
///   lies farthest along the way, or the current floor if there is none.
///
/// ## Returns
/// - The new target, if it changed.
pub fn drop_lost_target(registry: &mut PeerRegistry) -> Option<u8> {
    let local = registry.local();
    let (current, target) = (local.current_floor, local.target_floor);
    if local.behaviour == ElevatorBehaviour::Idle || is_committed(registry, target) {
        return None;
    }

    let between: Vec<u8> = if target > current {
        (current + 1..target).rev().collect()
    } else {
        (target + 1..current).collect()
    };
    let new_target = between
        .into_iter()
        .find(|f| is_committed(registry, *f))
        .unwrap_or(current);

    registry.local_mut().target_floor = new_target;
    (new_target != target).then_some(new_target)
}

/// Stop gate for a moving car at its current floor.
///
/// Always `true` for a cab call here, and for the target floor when we hold its lock.
/// For a hall stop on the way, every live node must show the lock in our service direction
/// with us as owner.
pub fn floor_is_locked(registry: &PeerRegistry) -> bool {
    let local = registry.local();
    let here = match local.here() {
        Some(record) => record,
        None => return false,
    };
    if here.cab_requested {
        return true;
    }
    if local.current_floor == local.target_floor && is_committed(registry, local.current_floor) {
        return true;
    }

    let me = registry.self_index();
    let dir = local.direction;
    let f = local.current_floor as usize;
    registry.live_nodes().into_iter().all(|i| {
        registry
            .snapshot(i)
            .and_then(|s| s.floors.get(f))
            .map_or(false, |r| r.locked(dir) && r.owner(dir) == Some(me))
    })
}

/// Floors ordered by distance from `current`, the side ahead in `direction` first on ties.
pub fn scan_order(current: u8, direction: Direction, num_floors: u8) -> Vec<u8> {
    let mut order = Vec::with_capacity(num_floors as usize);
    if current < num_floors {
        order.push(current);
    }
    for dist in 1..num_floors {
        let up = current.checked_add(dist).filter(|f| *f < num_floors);
        let down = current.checked_sub(dist).filter(|f| *f < num_floors);
        let (first, second) = match direction {
            Direction::Up => (up, down),
            Direction::Down => (down, up),
        };
        order.extend(first);
        order.extend(second);
    }
    order
}

fn all_live_requested(registry: &PeerRegistry, direction: Direction, floor: u8) -> bool {
    registry.live_nodes().into_iter().all(|i| {
        registry
            .snapshot(i)
            .and_then(|s| s.floors.get(floor as usize))
            .map_or(false, |r| r.requested(direction))
    })
}

/// Picks the next job for an idle car.
///
/// ## Behavior
/// 1. Nearest cab call. Served without any hall lock.
/// 2. Otherwise hall calls, nearest floor first, our service direction before the other one.
///    A call must be requested on every live node to be considered.
///    - Not yet locked here: claim it if it is available, and wait a tick.
///    - Locked here: serve it if [verify_locked_floors] passes and we are the owner.
/// 3. Otherwise stay.
pub fn choose_idle_target(registry: &mut PeerRegistry) -> IdleChoice {
    let me = registry.self_index();
    let (current, direction) = (registry.local().current_floor, registry.local().direction);
    let order = scan_order(current, direction, registry.num_floors());

    let cab = order
        .iter()
        .copied()
        .find(|f| registry.local().floors[*f as usize].cab_requested);
    if let Some(floor) = cab {
        return IdleChoice::Serve {
            floor,
            direction: Direction::towards(current, floor).unwrap_or(direction),
        };
    }

    for floor in order {
        for dir in [direction, direction.opposite()] {
            if !all_live_requested(registry, dir, floor) {
                continue;
            }
            if !registry.local().floors[floor as usize].locked(dir) {
                if order_is_available(registry, dir, floor) {
                    claim(registry, dir, floor);
                    return IdleChoice::Claimed { floor, direction: dir };
                }
                continue;
            }
            if !verify_locked_floors(registry, dir, floor) {
                continue;
            }
            if registry.local().floors[floor as usize].owner(dir) != Some(me) {
                continue;
            }
            return IdleChoice::Serve { floor, direction: dir };
        }
    }
    IdleChoice::Stay
}

/// Claims calls along the way and pushes the target further out, while the car is busy.
///
/// Only runs while the car is travelling (or about to) in its service direction. Scans from
/// the current floor outward in that direction, claims every available call in the same
/// direction, and moves the target to the farthest claimed call or cab call. The current floor
/// is only scanned while the door is open.
pub fn extend_sweep(registry: &mut PeerRegistry) {
    let local = registry.local();
    let (current, target, dir) = (local.current_floor, local.target_floor, local.direction);
    let n = registry.num_floors();
    let include_current = local.behaviour == ElevatorBehaviour::DoorOpen;

    let aligned = match dir {
        Direction::Up => target >= current,
        Direction::Down => target <= current,
    };
    if !aligned || current >= n {
        return;
    }

    let floors: Vec<u8> = match dir {
        Direction::Up => (current..n).collect(),
        Direction::Down => (0..=current).rev().collect(),
    };

    let mut new_target = target;
    for floor in floors {
        if floor == current && !include_current {
            continue;
        }
        if order_is_available(registry, dir, floor) {
            claim(registry, dir, floor);
            if dir.is_beyond(floor, new_target) {
                new_target = floor;
            }
        }
        if registry.local().floors[floor as usize].cab_requested && dir.is_beyond(floor, new_target) {
            new_target = floor;
        }
    }
    registry.local_mut().target_floor = new_target;
}
