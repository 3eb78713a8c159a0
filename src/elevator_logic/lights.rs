use crate::elevio::{self, CallType, HardwareClient};
use crate::world_view::{FloorRecord, NodeSnapshot};


/// Sets the three button lamps on one floor to match `record`
///
/// Buttons that do not exist on the floor (down on floor 0, up on the top floor) are skipped.
async fn set_floor_lamps<H: HardwareClient>(hw: &mut H, floor: u8, num_floors: u8, record: &FloorRecord) {
    let lamps = [
        (CallType::UP, record.hall_up_requested),
        (CallType::DOWN, record.hall_down_requested),
        (CallType::INSIDE, record.cab_requested),
    ];
    for (call, on) in lamps {
        if call.exists_on(floor, num_floors) {
            elevio::report(hw.set_button_lamp(floor, call, on).await, "button lamp");
        }
    }
}

/// Sets the floor indicator and every button lamp from `snapshot`
///
/// ## Note
/// Used once at start-up. After that [update_lights] only touches what changed.
pub async fn set_all_lights<H: HardwareClient>(hw: &mut H, snapshot: &NodeSnapshot) {
    elevio::report(hw.set_floor_indicator(snapshot.current_floor).await, "floor indicator");
    for (i, record) in snapshot.floors.iter().enumerate() {
        set_floor_lamps(hw, i as u8, snapshot.num_floors(), record).await;
    }
}

/// Brings the lamps in line with `now`, given that they showed `before`
///
/// ## Behavior
/// - Floor indicator is set if the current floor changed.
/// - Button lamps are set for every floor whose up/down/cab bits changed.
/// Lamps mirror the `requested` bits of the local table, so a hall lamp is lit on every node
/// that knows about the call.
pub async fn update_lights<H: HardwareClient>(hw: &mut H, before: &NodeSnapshot, now: &NodeSnapshot) {
    if before.current_floor != now.current_floor {
        elevio::report(hw.set_floor_indicator(now.current_floor).await, "floor indicator");
    }

    for (i, (old, new)) in before.floors.iter().zip(now.floors.iter()).enumerate() {
        if old.buttons_differ(new) {
            set_floor_lamps(hw, i as u8, now.num_floors(), new).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevio::sim::SimElevator;

    #[tokio::test]
    async fn only_changed_floors_are_touched() {
        let (mut car, handle) = SimElevator::new(4, Some(0));
        let before = NodeSnapshot::new(4);
        let mut now = before.clone();
        now.current_floor = 1;
        now.floors[2].hall_up_requested = true;
        now.floors[3].cab_requested = true;

        update_lights(&mut car, &before, &now).await;

        assert_eq!(handle.floor_indicator(), Some(1));
        assert!(handle.button_lamp(2, CallType::UP));
        assert!(handle.button_lamp(3, CallType::INSIDE));
        assert!(!handle.button_lamp(0, CallType::UP));
    }

    #[tokio::test]
    async fn missing_buttons_are_skipped() {
        let (mut car, handle) = SimElevator::new(2, Some(0));
        let mut snap = NodeSnapshot::new(2);
        for record in snap.floors.iter_mut() {
            record.hall_up_requested = true;
            record.hall_down_requested = true;
        }

        set_all_lights(&mut car, &snap).await;

        assert!(handle.button_lamp(0, CallType::UP));
        assert!(!handle.button_lamp(0, CallType::DOWN));
        assert!(handle.button_lamp(1, CallType::DOWN));
        assert!(!handle.button_lamp(1, CallType::UP));
    }
}
