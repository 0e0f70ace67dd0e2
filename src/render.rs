//! Output for the `watch` command: a colorized human-readable log or a CSV log.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::protocol::DecodedMessage;
use chrono::{DateTime, SecondsFormat, Utc};
use crossterm::style::{Color, Stylize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str = "timestamp,SEOJ,DEOJ,ESV,OPC,property,value";

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T09:30:00.123Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Name of the CSV log for a watch session started at `launched_at`.
pub fn csv_file_name(launched_at: DateTime<Utc>) -> String {
    format!("{}.csv", iso_timestamp(launched_at))
}

/// Turns decoded messages into output lines, one line per property.
pub trait MessageRenderer {
    /// Called once before the first message.
    fn start(&mut self, _at: DateTime<Utc>) -> Result<()> {
        Ok(())
    }

    /// Render every property of `msg`; returns the number of lines written.
    fn render(&mut self, msg: &DecodedMessage, at: DateTime<Utc>) -> Result<usize>;
}

/// Human-readable, optionally colorized log lines.
pub struct InteractiveRenderer<W> {
    out: W,
    catalog: Catalog,
    color: bool,
}

impl<W: Write> InteractiveRenderer<W> {
    pub fn new(out: W, catalog: Catalog, color: bool) -> Self {
        Self {
            out,
            catalog,
            color,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.color {
            return text.to_string();
        }
        let styled = text.with(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    }
}

impl<W: Write> MessageRenderer for InteractiveRenderer<W> {
    fn start(&mut self, at: DateTime<Utc>) -> Result<()> {
        writeln!(
            self.out,
            "{} [v2h] waiting for messages... press Ctrl-C to exit",
            iso_timestamp(at)
        )?;
        Ok(())
    }

    fn render(&mut self, msg: &DecodedMessage, at: DateTime<Utc>) -> Result<usize> {
        let timestamp = iso_timestamp(at);
        let dest_name = self.paint(self.catalog.object_name(&msg.deoj), Color::Yellow, true);
        let esv = self.paint(&msg.esv_hex(), Color::Green, false);
        let opc = self.paint(&msg.opc_hex(), Color::Blue, false);

        for (epc, value) in &msg.details {
            let resolved = self.catalog.resolve(&msg.seoj, *epc, value);
            let line = format!(
                "{} [{}({})->{}({})] ESV:{} OPC:{} {}({:02x}): {}",
                timestamp,
                self.paint(resolved.object_name, Color::Yellow, true),
                msg.seoj,
                dest_name,
                msg.deoj,
                esv,
                opc,
                self.paint(resolved.value_name, Color::Yellow, false),
                epc,
                self.paint(&resolved.display, Color::Yellow, false),
            );
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()?;
        Ok(msg.details.len())
    }
}

/// Raw CSV lines, echoed to `out` and appended to a session log file.
pub struct CsvRenderer<W> {
    out: W,
    log: File,
    path: PathBuf,
}

impl<W: Write> CsvRenderer<W> {
    /// Create `<dir>/<launch timestamp>.csv` and write the header row.
    pub fn create(dir: &Path, launched_at: DateTime<Utc>, out: W) -> Result<Self> {
        let path = dir.join(csv_file_name(launched_at));
        let mut log = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        log.write_all(format!("{}\n", CSV_HEADER).as_bytes())?;
        Ok(Self { out, log, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MessageRenderer for CsvRenderer<W> {
    fn render(&mut self, msg: &DecodedMessage, at: DateTime<Utc>) -> Result<usize> {
        let timestamp = iso_timestamp(at);
        let esv = msg.esv_hex();
        let opc = msg.opc_hex();

        for (epc, value) in &msg.details {
            let line = format!(
                "{},{},{},{},{},{:02x},{}",
                timestamp,
                msg.seoj,
                msg.deoj,
                esv,
                opc,
                epc,
                value.to_ascii_lowercase()
            );
            writeln!(self.out, "{}", line)?;
            // One write per line so a killed process leaves whole lines behind
            self.log.write_all(format!("{}\n", line).as_bytes())?;
        }
        self.out.flush()?;
        Ok(msg.details.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CONTROLLER_EOJ, Eoj, V2H_EOJ};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn message(seoj: Eoj, details: &[(u8, &str)]) -> DecodedMessage {
        DecodedMessage {
            seoj,
            deoj: CONTROLLER_EOJ,
            esv: 0x72,
            opc: details.len() as u8,
            details: details.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    #[test]
    fn timestamps_match_iso_with_millis() {
        assert_eq!(iso_timestamp(at()), "2024-05-01T09:30:00.000Z");
        assert_eq!(csv_file_name(at()), "2024-05-01T09:30:00.000Z.csv");
    }

    #[test]
    fn interactive_line_per_property() {
        let mut renderer = InteractiveRenderer::new(Vec::new(), Catalog::builtin().unwrap(), false);
        let n = renderer
            .render(&message(V2H_EOJ, &[(0x80, "30"), (0xce, "1E")]), at())
            .unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(renderer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "2024-05-01T09:30:00.000Z [V2H(027e01)->node profile(0ef001)] ESV:72 OPC:02 operating status(80): ON (hex: 30)"
        );
        assert!(lines[1].ends_with("(ce): 30 (hex: 1e)"), "{}", lines[1]);
    }

    #[test]
    fn interactive_unknown_source() {
        let mut renderer = InteractiveRenderer::new(Vec::new(), Catalog::builtin().unwrap(), false);
        renderer
            .render(&message(Eoj::new(0x01, 0x30, 0x01), &[(0x80, "31")]), at())
            .unwrap();
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(text.contains("[unknown(013001)->node profile(0ef001)]"));
        assert!(text.contains("unknown(80): hex: 31"));
    }

    #[test]
    fn colors_only_when_enabled() {
        let mut renderer = InteractiveRenderer::new(Vec::new(), Catalog::builtin().unwrap(), true);
        renderer.render(&message(V2H_EOJ, &[(0x80, "30")]), at()).unwrap();
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(text.contains('\u{1b}'));
    }

    #[test]
    fn csv_fans_out_one_line_per_property() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = CsvRenderer::create(dir.path(), at(), Vec::new()).unwrap();
        let path = renderer.path().to_path_buf();
        renderer
            .render(&message(V2H_EOJ, &[(0x80, "30"), (0x88, "42")]), at())
            .unwrap();

        let logged = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = logged.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2024-05-01T09:30:00.000Z,027e01,0ef001,72,02,80,30");
        assert_eq!(lines[2], "2024-05-01T09:30:00.000Z,027e01,0ef001,72,02,88,42");

        let printed = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(printed.lines().count(), 2);
    }
}
