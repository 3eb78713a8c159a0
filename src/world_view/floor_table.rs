//! Per-floor call and lock bits, and the rules for folding a peer's table into ours.
//!
//! Hall bits travel between nodes; the cab bit is carried in the snapshot for display
//! but never read or written by [merge_peer].

use serde::{Serialize, Deserialize};

use crate::config::NodeId;
use crate::elevio::ButtonSignal;
use crate::world_view::Direction;


/// Call and lock state for a single floor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloorRecord {
    /// Hall button "up" is pressed (or some peer says it is)
    pub hall_up_requested: bool,
    /// Hall button "down" is pressed (or some peer says it is)
    pub hall_down_requested: bool,
    /// Cab button for this floor is pressed in *this* car. Never shared.
    pub cab_requested: bool,

    /// Some node has committed to the up call
    pub hall_up_locked: bool,
    /// Some node has committed to the down call
    pub hall_down_locked: bool,

    /// Node committed to the up call. `None` while unlocked
    pub lock_owner_up: Option<NodeId>,
    /// Node committed to the down call. `None` while unlocked
    pub lock_owner_down: Option<NodeId>,
}

/// One [FloorRecord] per floor, index = floor number
pub type FloorTable = Vec<FloorRecord>;

impl FloorRecord {
    pub fn requested(&self, dir: Direction) -> bool {
        match dir {
            Direction::Up => self.hall_up_requested,
            Direction::Down => self.hall_down_requested,
        }
    }

    pub fn locked(&self, dir: Direction) -> bool {
        match dir {
            Direction::Up => self.hall_up_locked,
            Direction::Down => self.hall_down_locked,
        }
    }

    pub fn owner(&self, dir: Direction) -> Option<NodeId> {
        match dir {
            Direction::Up => self.lock_owner_up,
            Direction::Down => self.lock_owner_down,
        }
    }

    /// `true` if the hall call in `dir` is requested and nobody has locked it yet
    pub fn is_open(&self, dir: Direction) -> bool {
        self.requested(dir) && !self.locked(dir)
    }

    pub fn set_requested(&mut self, dir: Direction, value: bool) {
        match dir {
            Direction::Up => self.hall_up_requested = value,
            Direction::Down => self.hall_down_requested = value,
        }
    }

    pub fn set_owner(&mut self, dir: Direction, owner: Option<NodeId>) {
        match dir {
            Direction::Up => self.lock_owner_up = owner,
            Direction::Down => self.lock_owner_down = owner,
        }
    }

    /// Marks the call in `dir` as locked by `owner`
    pub fn lock(&mut self, dir: Direction, owner: Option<NodeId>) {
        match dir {
            Direction::Up => self.hall_up_locked = true,
            Direction::Down => self.hall_down_locked = true,
        }
        self.set_owner(dir, owner);
    }

    /// Clears request, lock and owner for `dir`. The cab bit is left alone.
    pub fn release(&mut self, dir: Direction) {
        self.set_requested(dir, false);
        match dir {
            Direction::Up => self.hall_up_locked = false,
            Direction::Down => self.hall_down_locked = false,
        }
        self.set_owner(dir, None);
    }

    /// `true` if any of the three buttons (up, down, cab) differ between `self` and `other`
    pub fn buttons_differ(&self, other: &FloorRecord) -> bool {
        self.hall_up_requested != other.hall_up_requested
            || self.hall_down_requested != other.hall_down_requested
            || self.cab_requested != other.cab_requested
    }
}


/// ORs freshly polled button signals into the local table.
///
/// Buttons only ever set bits here. Clearing happens when a call is served.
/// Signals for floors outside the table are ignored.
pub fn register_buttons(table: &mut [FloorRecord], signals: &[ButtonSignal]) {
    for (record, signal) in table.iter_mut().zip(signals.iter()) {
        record.hall_up_requested |= signal.up;
        record.hall_down_requested |= signal.down;
        record.cab_requested |= signal.cab;
    }
}


/// Folds one live peer's table into the local one.
///
/// For every floor and direction:
/// 1. Local has the call requested and locked:
///    - the peer shows neither request nor lock: somebody finished it, so it is released locally.
///    - the peer also has it locked under another owner: `yield_to_peer(floor, dir, ours, theirs)`
///      decides. If it returns `true` the local owner is replaced by the peer's, otherwise the
///      peer's copy is overwritten with ours, so that the registry reflects the outcome until
///      the peer's next broadcast.
/// 2. Local has the call requested but not locked, and the peer has it locked: adopt the lock.
/// 3. Local does not have the call, and the peer has it requested but unlocked: adopt the request.
///
/// # Notes
/// Rows must have the same length. Extra floors on either side are skipped.
pub fn merge_peer<F>(local: &mut [FloorRecord], peer: &mut [FloorRecord], mut yield_to_peer: F)
where
    F: FnMut(usize, Direction, Option<NodeId>, Option<NodeId>) -> bool,
{
    for (floor, (ours, theirs)) in local.iter_mut().zip(peer.iter_mut()).enumerate() {
        for dir in Direction::ALL {
            if ours.requested(dir) {
                if ours.locked(dir) {
                    if !theirs.requested(dir) && !theirs.locked(dir) {
                        ours.release(dir);
                    } else if theirs.locked(dir) && ours.owner(dir) != theirs.owner(dir) {
                        if yield_to_peer(floor, dir, ours.owner(dir), theirs.owner(dir)) {
                            ours.set_owner(dir, theirs.owner(dir));
                        } else {
                            theirs.set_owner(dir, ours.owner(dir));
                        }
                    }
                } else if theirs.locked(dir) {
                    ours.lock(dir, theirs.owner(dir));
                }
            } else if theirs.is_open(dir) {
                ours.set_requested(dir, true);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: usize) -> FloorTable {
        vec![FloorRecord::default(); n]
    }

    fn never_yield(_: usize, _: Direction, _: Option<NodeId>, _: Option<NodeId>) -> bool {
        false
    }

    #[test]
    fn open_request_propagates() {
        let mut ours = table(4);
        let mut theirs = table(4);
        theirs[2].hall_up_requested = true;

        merge_peer(&mut ours, &mut theirs, never_yield);

        assert!(ours[2].hall_up_requested);
        assert!(!ours[2].hall_up_locked);
        assert!(!ours[2].hall_down_requested);
    }

    #[test]
    fn peer_lock_is_adopted_when_we_know_the_call() {
        let mut ours = table(4);
        let mut theirs = table(4);
        ours[1].hall_down_requested = true;
        theirs[1].hall_down_requested = true;
        theirs[1].lock(Direction::Down, Some(2));

        merge_peer(&mut ours, &mut theirs, never_yield);

        assert!(ours[1].hall_down_locked);
        assert_eq!(ours[1].lock_owner_down, Some(2));
    }

    #[test]
    fn locked_call_missing_at_peer_is_released() {
        let mut ours = table(4);
        let mut theirs = table(4);
        ours[3].hall_down_requested = true;
        ours[3].lock(Direction::Down, Some(0));

        merge_peer(&mut ours, &mut theirs, never_yield);

        assert_eq!(ours[3], FloorRecord::default());
    }

    #[test]
    fn peer_request_without_lock_keeps_our_lock() {
        let mut ours = table(4);
        let mut theirs = table(4);
        ours[0].hall_up_requested = true;
        ours[0].lock(Direction::Up, Some(0));
        theirs[0].hall_up_requested = true;

        merge_peer(&mut ours, &mut theirs, never_yield);

        assert!(ours[0].hall_up_locked);
        assert_eq!(ours[0].lock_owner_up, Some(0));
    }

    #[test]
    fn double_lock_goes_through_arbitration_both_ways() {
        let setup = || {
            let mut ours = table(3);
            let mut theirs = table(3);
            ours[1].hall_up_requested = true;
            ours[1].lock(Direction::Up, Some(1));
            theirs[1].hall_up_requested = true;
            theirs[1].lock(Direction::Up, Some(0));
            (ours, theirs)
        };

        let (mut ours, mut theirs) = setup();
        let mut asked = Vec::new();
        merge_peer(&mut ours, &mut theirs, |f, d, a, b| {
            asked.push((f, d, a, b));
            true
        });
        assert_eq!(asked, vec![(1, Direction::Up, Some(1), Some(0))]);
        assert_eq!(ours[1].lock_owner_up, Some(0));

        let (mut ours, mut theirs) = setup();
        merge_peer(&mut ours, &mut theirs, never_yield);
        assert_eq!(ours[1].lock_owner_up, Some(1));
        assert_eq!(theirs[1].lock_owner_up, Some(1));
    }

    #[test]
    fn cab_bits_never_cross() {
        let mut ours = table(2);
        let mut theirs = table(2);
        theirs[0].cab_requested = true;
        ours[1].cab_requested = true;

        merge_peer(&mut ours, &mut theirs, never_yield);

        assert!(!ours[0].cab_requested);
        assert!(ours[1].cab_requested);
        assert!(!theirs[1].cab_requested);
    }

    #[test]
    fn buttons_only_set_bits() {
        let mut t = table(3);
        t[2].hall_up_requested = true;
        let signals = vec![
            ButtonSignal { up: false, down: true, cab: false },
            ButtonSignal { up: false, down: false, cab: true },
            ButtonSignal::default(),
            ButtonSignal { up: true, down: true, cab: true },
        ];

        register_buttons(&mut t, &signals);

        assert!(t[0].hall_down_requested);
        assert!(t[1].cab_requested);
        assert!(t[2].hall_up_requested);
        assert!(!t[2].cab_requested);
    }
}
