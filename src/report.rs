//! Console and CSV output of a finished plan.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use comfy_table::presets::UTF8_FULL;
use comfy_table::Table as Grid;
use itertools::Itertools;

use crate::error::ReportError;
use crate::model::entity::{Guest, Id, Index, Table};
use crate::plan::TablePlan;

/// The table each guest sat at, one entry per round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestSeating {
    pub guest: Id,
    pub tables: Vec<Id>,
}

pub fn seatings(plan: &TablePlan) -> Vec<GuestSeating> {
    plan.guests()
        .iter()
        .map(|guest| GuestSeating {
            guest: guest.id.clone(),
            tables: guest.tables().iter().map(|table| plan.tables()[*table].id.clone()).collect(),
        })
        .collect()
}

pub fn render(plan: &TablePlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Rating: {:.2} ({:.2} * {:.2} * {:.2} * {:.2})",
        plan.rating(),
        plan.follow_ups_score(),
        plan.diversity_score(),
        plan.average_guest_score(),
        plan.table_score()
    );

    let mut by_table = grid();
    by_table.set_header(
        std::iter::once("Round".to_string())
            .chain(plan.tables().iter().map(|table| format!("Table {}", table.id))),
    );
    for round in 1..=plan.sessions() {
        by_table.add_row(
            std::iter::once(round.to_string())
                .chain(plan.tables().iter().map(|table| names(plan.guests(), table.guests_in_round(round)))),
        );
    }
    let _ = writeln!(out, "By Table\n{by_table}");

    let mut by_guest = grid();
    by_guest.set_header(vec!["Guest", "Stats", "Tables", "Met"]);
    for guest in plan.guests() {
        by_guest.add_row(vec![
            guest.id.clone(),
            guest.stats(),
            table_names(plan.tables(), guest),
            guest.others_summary(plan.guests()),
        ]);
    }
    let _ = writeln!(out, "By Guest\n{by_guest}");

    let stats = plan.stats();
    let _ = writeln!(out, "{}\n{}\n{}", stats.guest_scores, stats.diversities, stats.follow_ups);
    out
}

fn grid() -> Grid {
    let mut grid = Grid::new();
    grid.load_preset(UTF8_FULL);
    grid
}

fn names(guests: &[Guest], indices: &[Index]) -> String {
    indices.iter().map(|index| guests[*index].id.as_str()).join(", ")
}

fn table_names(tables: &[Table], guest: &Guest) -> String {
    guest.tables().iter().map(|index| tables[*index].id.as_str()).join(", ")
}

/// Writes the `Guests,Round 1,..,Round N` export, one row per guest.
pub fn write_csv<W: Write>(plan: &TablePlan, mut writer: W) -> Result<(), ReportError> {
    write!(writer, "Guests")?;
    for round in 1..=plan.sessions() {
        write!(writer, ",Round {round}")?;
    }
    writeln!(writer)?;
    for seating in seatings(plan) {
        write!(writer, "{}", seating.guest)?;
        for table in &seating.tables {
            write!(writer, ",{table}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_csv(plan: &TablePlan, path: &Path) -> Result<(), ReportError> {
    write_csv(plan, BufWriter::new(File::create(path)?))
}

/// Reads an export back into per guest seatings.
pub fn read_csv<R: BufRead>(reader: R) -> Result<Vec<GuestSeating>, ReportError> {
    let mut lines = reader.lines();
    let header = lines.next().transpose()?.ok_or_else(|| malformed(1, "missing header"))?;
    let mut columns = header.split(',');
    if columns.next() != Some("Guests") {
        return Err(malformed(1, "header must start with Guests"));
    }
    let rounds = columns.count();

    let mut seatings = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',').map(str::to_string);
        let guest = fields.next().unwrap_or_default();
        let tables = fields.collect_vec();
        if tables.len() != rounds {
            return Err(malformed(i + 2, &format!("expected {rounds} rounds, found {}", tables.len())));
        }
        seatings.push(GuestSeating { guest, tables });
    }
    Ok(seatings)
}

fn malformed(line: usize, reason: &str) -> ReportError {
    ReportError::Malformed { line, reason: reason.to_string() }
}
