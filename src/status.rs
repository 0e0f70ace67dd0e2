//! Two-column summary printed by the `status` command.

use crate::accumulator::Snapshot;
use crate::catalog::{Catalog, UNKNOWN, decimal_from_hex};
use crate::poller::{
    EPC_CHARGEABLE_CAPACITY, EPC_FAULT, EPC_OPERATION_MODE, EPC_POWER, EPC_REMAINING_CAPACITY,
    EPC_VEHICLE_CONFIRMATION, EPC_VEHICLE_ID, EPC_VEHICLE_STATUS,
};
use crate::protocol::V2H_EOJ;
use crossterm::style::{Color, Stylize};

const HEADER: (&str, &str) = ("Item", "Value");

/// Labelled values ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    rows: Vec<(&'static str, String)>,
}

impl StatusReport {
    pub fn from_snapshot(snapshot: &Snapshot, catalog: &Catalog, color: bool) -> Self {
        let paint = |text: &str, c: Color, bold: bool| -> String {
            match (color, bold) {
                (false, _) => text.to_string(),
                (true, false) => text.with(c).to_string(),
                (true, true) => text.with(c).bold().to_string(),
            }
        };
        let resolved = |epc: u8| -> String {
            snapshot.get(epc).map_or_else(
                || UNKNOWN.to_string(),
                |v| catalog.resolve(&V2H_EOJ, epc, v).display,
            )
        };
        let capacity = |epc: u8| -> String {
            snapshot
                .get(epc)
                .and_then(decimal_from_hex)
                .map_or_else(|| UNKNOWN.to_string(), |wh| format!("{} Wh", wh))
        };

        let power = match snapshot.get(EPC_POWER) {
            Some("30") => paint("ON", Color::Red, false),
            Some("31") => paint("OFF", Color::Cyan, false),
            _ => UNKNOWN.to_string(),
        };
        let fault = match snapshot.get(EPC_FAULT) {
            Some("41") => paint("YES", Color::Red, true),
            Some("42") => paint("normal", Color::Green, false),
            _ => UNKNOWN.to_string(),
        };
        let confirmed = match snapshot.get(EPC_VEHICLE_CONFIRMATION) {
            Some("10") => paint("yes", Color::Red, false),
            Some(_) => paint("no", Color::Cyan, false),
            None => UNKNOWN.to_string(),
        };
        let vehicle_id = snapshot
            .get(EPC_VEHICLE_ID)
            .map_or_else(|| UNKNOWN.to_string(), str::to_string);

        Self {
            rows: vec![
                ("System power", power),
                ("Fault status", fault),
                ("Vehicle connection / charge status", resolved(EPC_VEHICLE_STATUS)),
                ("Vehicle connected", confirmed),
                ("Chargeable capacity", capacity(EPC_CHARGEABLE_CAPACITY)),
                ("Remaining chargeable capacity", capacity(EPC_REMAINING_CAPACITY)),
                ("Operation mode", resolved(EPC_OPERATION_MODE)),
                ("Vehicle ID", vehicle_id),
            ],
        }
    }

    pub fn value(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Render as an aligned table with a header row.
    pub fn render(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|(label, _)| label.chars().count())
            .chain(std::iter::once(HEADER.0.len()))
            .max()
            .unwrap_or_default();

        let mut out = String::new();
        out.push_str(&format!("{:<width$}  {}\n", HEADER.0, HEADER.1));
        out.push_str(&format!("{}  {}\n", "-".repeat(width), "-".repeat(HEADER.1.len())));
        for (label, value) in &self.rows {
            out.push_str(&format!("{:<width$}  {}\n", label, value));
        }
        out
    }
}
