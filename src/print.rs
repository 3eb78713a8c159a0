//! ## Printing Module
//!
//! Colored terminal logging. Every category has its own switch in [config], so a node
//! can be started with e.g. only error messages (`debug`).
//! It also provides a table print of what this node believes about the whole fleet.
use std::sync::Mutex;

use ansi_term::Colour::{self, Blue, Cyan, Green, Purple, Red, Yellow};
use prettytable::{format, Cell, Row, Table};
use unicode_width::UnicodeWidthStr;

use crate::config;
use crate::peer_registry::PeerRegistry;
use crate::world_view::{Direction, ElevatorBehaviour, FloorRecord};


/// Reads a print switch. A poisoned switch still reports its last value.
pub fn enabled(switch: &Mutex<bool>) -> bool {
    *switch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Prints a message in a specified color to the terminal.
///
/// Used for protocol events that are neither errors nor normal progress, like losing a lock.
///
/// ## Parameters
/// - `msg`: The message to print.
/// - `color`: The color to use for the text output.
///
/// **Note:** Gated by `PRINT_ELSE_ON`.
pub fn color(msg: String, color: Colour) {
    if enabled(&config::PRINT_ELSE_ON) {
        println!("{}{}\n", color.paint("[CUSTOM]:  "), color.paint(msg));
    }
}

/// Prints an error message in red to the terminal.
///
/// ## Parameters
/// - `msg`: The error message to print.
///
/// ## Terminal output
/// - "\[ERROR\]:   {}", msg
///
/// ## Example
/// ```
/// use elevatorpeer::print;
///
/// print::err("Something went wrong!".to_string());
/// ```
///
/// **Note:** Gated by `PRINT_ERR_ON`.
pub fn err(msg: String) {
    if enabled(&config::PRINT_ERR_ON) {
        println!("{}{}\n", Red.paint("[ERROR]:   "), Red.paint(msg));
    }
}

/// Prints a warning message in yellow to the terminal.
///
/// ## Terminal output
/// - "\[WARNING\]: {}", msg
///
/// **Note:** Gated by `PRINT_WARN_ON`.
pub fn warn(msg: String) {
    if enabled(&config::PRINT_WARN_ON) {
        println!("{}{}\n", Yellow.paint("[WARNING]: "), Yellow.paint(msg));
    }
}

/// Prints a success message in green to the terminal.
///
/// ## Terminal output
/// - "\[OK\]:      {}", msg
pub fn ok(msg: String) {
    if enabled(&config::PRINT_OK_ON) {
        println!("{}{}\n", Green.paint("[OK]:      "), Green.paint(msg));
    }
}

/// Prints an informational message in light blue to the terminal.
///
/// ## Terminal output
/// - "\[INFO\]:    {}", msg
pub fn info(msg: String) {
    let light_blue = Colour::RGB(102, 178, 255);
    if enabled(&config::PRINT_INFO_ON) {
        println!("{}{}\n", light_blue.paint("[INFO]:    "), light_blue.paint(msg));
    }
}

/// Pads the input text to a fixed display width using spaces.
///
/// Accounts for characters that take more than one column (arrows, circles),
/// so the colored labels line up in the table.
fn pad_text(text: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(text);
    let padding = width.saturating_sub(visible_width);
    format!("{}{}", text, " ".repeat(padding))
}

/// Green `ja`/red `nei`, padded to `width`
fn colored_bool_label(value: bool, width: usize) -> String {
    let raw_text = if value { "ja" } else { "nei" };
    let padded = pad_text(raw_text, width);
    if value {
        Green.paint(padded).to_string()
    } else {
        Red.paint(padded).to_string()
    }
}

/// "I drift" column: green `ja` for a car in service, red `nei` for a disabled one
fn in_service_label(disabled: bool) -> String {
    colored_bool_label(!disabled, 4)
}

fn behaviour_label(behaviour: ElevatorBehaviour, direction: Direction) -> String {
    match behaviour {
        ElevatorBehaviour::Idle => Green.paint(pad_text("Idle", 10)).to_string(),
        ElevatorBehaviour::DoorOpen => Yellow.paint(pad_text("Dør open", 10)).to_string(),
        ElevatorBehaviour::Moving => {
            let arrow = match direction {
                Direction::Up => "↑",
                Direction::Down => "↓",
            };
            Cyan.paint(pad_text(&format!("Køyrer {}", arrow), 10)).to_string()
        }
    }
}

/// One hall direction on one floor: `·` nothing, `●` requested, `●N` requested and locked by N
fn hall_label(record: &FloorRecord, direction: Direction) -> String {
    if !record.requested(direction) {
        return pad_text("·", 4);
    }
    match record.owner(direction) {
        Some(owner) if record.locked(direction) => {
            Yellow.paint(pad_text(&format!("●{}", owner), 4)).to_string()
        }
        _ if record.locked(direction) => Yellow.paint(pad_text("●?", 4)).to_string(),
        _ => Red.paint(pad_text("●", 4)).to_string(),
    }
}

fn header_cell(text: &str) -> Cell {
    Cell::new(&Blue.bold().paint(text).to_string())
}

/// Logs what this node believes about the fleet in a table
///
/// ## Behavior
/// - One row per node: liveness, behaviour, floors, whether it is in service, cab calls.
/// - Per floor: the node's hall up/down state as seen in its last snapshot.
/// - A node not heard from yet shows the empty idle snapshot it was created with.
///
/// # Notes
/// - Gated by `config::PRINT_WV_ON`.
/// - Printing frequency should be limited (see [config::PRINT_FLEET_PERIOD]).
pub fn fleet(registry: &PeerRegistry) {
    if !enabled(&config::PRINT_WV_ON) {
        return;
    }

    println!("{}", Purple.bold().paint(format!("FLÅTESTATUS (node {})", registry.self_index())));

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);

    let mut header = vec![
        header_cell("ID"),
        header_cell("Live"),
        header_cell("Tilstand"),
        header_cell("Etg"),
        header_cell("Mål"),
        header_cell("I drift"),
        header_cell("Cab"),
    ];
    for floor in 0..registry.num_floors() {
        header.push(header_cell(&format!("{}↑", floor)));
        header.push(header_cell(&format!("{}↓", floor)));
    }
    table.add_row(Row::new(header));

    for (id, snap) in registry.snapshots() {
        let mut id_text = format!("{}", id);
        if id == registry.self_index() {
            id_text.push('*');
        }
        let cabs = snap
            .floors
            .iter()
            .enumerate()
            .filter(|(_, r)| r.cab_requested)
            .map(|(i, _)| i.to_string())
            .collect::<Vec<String>>()
            .join(",");

        let mut cells = vec![
            Cell::new(&Yellow.bold().paint(pad_text(&id_text, 3)).to_string()),
            Cell::new(&colored_bool_label(registry.is_live(id), 4)),
            Cell::new(&behaviour_label(snap.behaviour, snap.direction)),
            Cell::new(&snap.current_floor.to_string()),
            Cell::new(&snap.target_floor.to_string()),
            Cell::new(&in_service_label(snap.disabled)),
            Cell::new(&cabs),
        ];
        for record in snap.floors.iter() {
            cells.push(Cell::new(&hall_label(record, Direction::Up)));
            cells.push(Cell::new(&hall_label(record, Direction::Down)));
        }
        table.add_row(Row::new(cells));
    }

    table.printstd();
    println!();
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_text_counts_display_columns() {
        assert_eq!(pad_text("ab", 4), "ab  ");
        assert_eq!(pad_text("●1", 4), "●1  ");
        assert_eq!(pad_text("toolong", 3), "toolong");
    }

    #[test]
    fn disabled_car_is_shown_as_out_of_service() {
        assert_eq!(in_service_label(false), Green.paint("ja  ").to_string());
        assert_eq!(in_service_label(true), Red.paint("nei ").to_string());
    }

    #[test]
    fn hall_label_shows_owner_when_locked() {
        let mut record = FloorRecord::default();
        assert!(hall_label(&record, Direction::Up).starts_with('·'));

        record.hall_up_requested = true;
        record.lock(Direction::Up, Some(2));
        assert!(hall_label(&record, Direction::Up).contains("●2"));
    }
}
