mod common;

use common::Fleet;
use elevatorpeer::config;
use elevatorpeer::elevio::{CallType, Dirn};
use elevatorpeer::world_view::{Direction, ElevatorBehaviour};

/// Nodes currently on their way to, or stopped at, `floor` for a hall call
fn serving(fleet: &Fleet, floor: u8) -> usize {
    (0..fleet.nodes.len())
        .filter(|i| {
            let local = fleet.local(*i);
            local.behaviour != ElevatorBehaviour::Idle
                && local.target_floor == floor
                && !local.floors[floor as usize].cab_requested
                && !fleet.stalled.contains(i)
        })
        .count()
}

#[tokio::test]
async fn one_hall_call_is_served_by_exactly_one_node() {
    let mut fleet = Fleet::new(&[0, 3]).await;
    fleet.press(0, 2, CallType::UP);
    fleet.press(1, 2, CallType::UP);

    let mut most_serving = 0;
    let done = fleet
        .run_until(2000, |f| {
            most_serving = most_serving.max(serving(f, 2));
            f.hall_call_gone(Direction::Up, 2) && f.all_idle()
        })
        .await;

    assert!(done);
    assert_eq!(most_serving, 1);
    // Both nodes claim before hearing each other. The lower index keeps the lock
    assert!(fleet.door_opened.contains(&(0, 2)));
    assert!(!fleet.door_opened.contains(&(1, 2)));
    assert_eq!(fleet.local(0).current_floor, 2);
    assert_eq!(fleet.local(1).current_floor, 3);
}

#[tokio::test]
async fn tables_converge_after_a_call_is_heard() {
    let mut fleet = Fleet::new(&[0, 0, 0]).await;
    fleet.stalled.extend([0, 1, 2]);
    fleet.press(2, 1, CallType::DOWN);

    fleet.run(10).await;

    for i in 0..3 {
        let record = fleet.local(i).floors[1];
        assert!(record.hall_down_requested, "node {} never heard the call", i);
        assert!(record.hall_down_locked);
        assert_eq!(record.lock_owner_down, Some(0), "node {} disagrees on the owner", i);
        assert!(fleet.cars[i].button_lamp(1, CallType::DOWN));
    }
}

#[tokio::test]
async fn cab_calls_stay_on_their_own_node() {
    let mut fleet = Fleet::new(&[0, 0]).await;
    fleet.press(1, 3, CallType::INSIDE);

    let mut leaked = false;
    let done = fleet
        .run_until(1000, |f| {
            leaked |= f.local(0).floors[3].cab_requested || f.cars[0].button_lamp(3, CallType::INSIDE);
            f.door_opened.contains(&(1, 3)) && f.all_idle()
        })
        .await;

    assert!(done);
    assert!(!leaked);
    assert_eq!(fleet.local(0).current_floor, 0);
    assert_eq!(fleet.cars[0].motor(), Dirn::Stop);
    assert!(!fleet.local(1).floors[3].cab_requested);
}

#[tokio::test]
async fn silent_peer_is_left_out_after_the_disconnect_timeout() {
    let mut fleet = Fleet::new(&[0, 3]).await;
    fleet.cables[1].disconnect();
    fleet.press(0, 3, CallType::DOWN);

    // Node 1 still counts as live, and it has never seen the call
    let rounds_before_timeout = (config::DISCONNECT_TIMEOUT.as_millis() / config::POLL_PERIOD.as_millis()) as usize - 10;
    fleet.run(rounds_before_timeout).await;
    assert_eq!(fleet.local(0).behaviour, ElevatorBehaviour::Idle);
    assert!(!fleet.local(0).floors[3].hall_down_locked);

    let served = fleet.run_until(1000, |f| f.door_opened.contains(&(0, 3))).await;
    assert!(served);
    assert!(fleet.elapsed() > config::DISCONNECT_TIMEOUT);
    assert!(!fleet.nodes[0].registry().is_live(1));
    assert!(!fleet.nodes[1].registry().is_live(0));

    let cleared = fleet.run_until(500, |f| f.hall_call_gone(Direction::Down, 3) && f.all_idle()).await;
    assert!(cleared);

    fleet.cables[1].connect();
    fleet.run(3).await;
    assert!(fleet.nodes[0].registry().is_live(1));
    assert!(fleet.nodes[1].registry().is_live(0));
}

#[tokio::test]
async fn stuck_owner_hands_its_call_over() {
    let mut fleet = Fleet::new(&[0, 3]).await;
    fleet.stalled.insert(0);
    fleet.press(0, 2, CallType::UP);
    fleet.press(1, 2, CallType::UP);

    let stuck = fleet.run_until(1000, |f| f.local(0).disabled).await;
    assert!(stuck);
    assert!(fleet.elapsed() > config::STUCK_TIMEOUT);
    assert_eq!(fleet.local(1).floors[2].lock_owner_up, Some(0));

    // Node 1 hears about it on the next tick and takes the call
    fleet.round().await;
    assert_eq!(fleet.local(1).floors[2].lock_owner_up, Some(1));

    let done = fleet
        .run_until(1000, |f| f.door_opened.contains(&(1, 2)) && f.hall_call_gone(Direction::Up, 2))
        .await;

    assert!(done);
    assert!(!fleet.door_opened.contains(&(0, 2)));
    // Node 0 gave its only job away, so it stops trying. It stays disabled until it moves again
    assert!(fleet.local(0).disabled);
    assert_eq!(fleet.local(0).behaviour, ElevatorBehaviour::Idle);
    assert_eq!(fleet.cars[0].motor(), Dirn::Stop);
    assert!(!fleet.local(1).disabled);
}

#[tokio::test]
async fn car_that_loses_a_swept_call_does_not_serve_it() {
    let mut fleet = Fleet::new(&[3, 0]).await;
    fleet.press(1, 1, CallType::INSIDE);
    fleet.press(0, 2, CallType::UP);
    fleet.press(1, 2, CallType::UP);

    let mut most_serving = 0;
    let done = fleet
        .run_until(2000, |f| {
            most_serving = most_serving.max(serving(f, 2));
            f.door_opened.contains(&(1, 1)) && f.hall_call_gone(Direction::Up, 2) && f.all_idle()
        })
        .await;

    assert!(done);
    assert_eq!(most_serving, 1);
    assert!(fleet.door_opened.contains(&(0, 2)));
    assert!(!fleet.door_opened.contains(&(1, 2)));
    assert_eq!(fleet.local(1).current_floor, 1);
}

#[tokio::test]
async fn obstruction_keeps_the_door_open() {
    let mut fleet = Fleet::new(&[1]).await;
    fleet.press(0, 1, CallType::INSIDE);
    let opened = fleet.run_until(10, |f| f.local(0).behaviour == ElevatorBehaviour::DoorOpen).await;
    assert!(opened);

    fleet.cars[0].set_obstruction(true);
    let held_rounds = (config::STUCK_TIMEOUT.as_millis() / config::POLL_PERIOD.as_millis()) as usize + 50;
    let mut door_always_open = true;
    for _ in 0..held_rounds {
        fleet.round().await;
        door_always_open &= fleet.cars[0].door_lamp() && fleet.cars[0].motor() == Dirn::Stop;
    }
    assert!(door_always_open);
    assert!(fleet.local(0).disabled);

    fleet.cars[0].set_obstruction(false);
    let closed = fleet.run_until(500, |f| f.all_idle()).await;
    assert!(closed);
    assert!(fleet.elapsed() > config::STUCK_TIMEOUT + config::DOOR_OPEN_DURATION);
    assert!(!fleet.cars[0].door_lamp());
    assert!(!fleet.local(0).disabled);
}

#[tokio::test]
async fn garbage_datagrams_are_ignored() {
    let mut fleet = Fleet::new(&[0, 0]).await;
    fleet.nodes[1].transport().inject(1, 0, vec![0xde, 0xad, 0xbe, 0xef]);
    fleet.nodes[1].transport().inject(0, 0, vec![]);
    fleet.press(0, 2, CallType::INSIDE);

    let done = fleet.run_until(1000, |f| f.door_opened.contains(&(0, 2)) && f.all_idle()).await;
    assert!(done);
    assert!(fleet.nodes[0].registry().is_live(1));
}
