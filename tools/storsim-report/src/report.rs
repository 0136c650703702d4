//! Report data and its fixed-width text rendering.

use std::fmt::Write;

use serde::Serialize;

use storsim_core::units::{KB, MB, MEG, SECOND};
use storsim_core::Estimate;

const DATA_WIDTH: usize = 7;
const DATA_UNITS: usize = 4;
const COLUMN_SEP: usize = 3;
const LINE_WIDTH: usize = 5;

/// One measured column of a table row.
#[derive(Serialize)]
pub struct Cell {
    pub latency: f64,
    pub bandwidth: f64,
    pub iops: f64,
}

/// Results of all columns for one block size, or for metadata operations when `bsize` is absent.
#[derive(Serialize)]
pub struct Row {
    pub bsize: Option<u64>,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn data(bsize: u64, estimates: &[Estimate]) -> Self {
        let cells = estimates
            .iter()
            .map(|e| Cell {
                latency: e.latency,
                bandwidth: e.bandwidth,
                iops: e.iops(bsize),
            })
            .collect();
        Self {
            bsize: Some(bsize),
            cells,
        }
    }

    /// Row of single operations given their latencies (us).
    pub fn ops(latencies: &[f64]) -> Self {
        let cells = latencies
            .iter()
            .map(|&t| Cell {
                latency: t,
                bandwidth: SECOND / t,
                iops: SECOND / t,
            })
            .collect();
        Self { bsize: None, cells }
    }
}

#[derive(Serialize)]
pub struct Table {
    pub title: String,
    pub headings: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(title: String, headings: &[&str]) -> Self {
        Self {
            title,
            headings: headings.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }
}

/// Named group of descriptive parameters, e.g. computed disk geometry.
#[derive(Serialize)]
pub struct Params {
    pub title: String,
    pub values: Vec<(String, String)>,
}

/// Everything one run of the tool produces.
#[derive(Default, Serialize)]
pub struct Report {
    pub params: Vec<Params>,
    pub tables: Vec<Table>,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn add_warnings(&mut self, warnings: Vec<String>) {
        for warning in warnings {
            if !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for params in &self.params {
            let _ = writeln!(out, "{}:", params.title);
            for (name, value) in &params.values {
                let _ = writeln!(out, "    {:<20} {}", name, value);
            }
            out.push('\n');
        }
        for table in &self.tables {
            render_table(&mut out, table);
            out.push('\n');
        }
        if !self.warnings.is_empty() {
            out.push_str("WARNINGS:\n");
            for warning in &self.warnings {
                let _ = writeln!(out, "    {}", warning);
            }
        }
        out
    }
}

fn format_row(columns: &[String]) -> String {
    let width = DATA_WIDTH + DATA_UNITS + 1;
    let mut line = String::new();
    for column in columns {
        line.push_str(&" ".repeat(COLUMN_SEP));
        let _ = write!(line, "{:>width$}", column, width = width);
    }
    line
}

fn format_size(bsize: u64) -> String {
    if bsize >= MB {
        format!("{}M", bsize / MB)
    } else {
        format!("{}K", bsize / KB)
    }
}

pub fn format_bw(bw: f64) -> String {
    if bw >= 100. * MB as f64 {
        format!("{:7} MB/s", ((bw + 500000.) / MEG) as u64)
    } else if bw < 10. * MB as f64 {
        format!("{:7.2} MB/s", bw / MEG)
    } else {
        format!("{:7.1} MB/s", bw / MEG)
    }
}

fn render_table(out: &mut String, table: &Table) {
    let _ = writeln!(out, "{}", table.title);
    let mut headings = vec!["size".to_string()];
    headings.extend(table.headings.iter().cloned());
    let line_width = headings.iter().map(|h| h.len()).fold(LINE_WIDTH, usize::max);
    let lines = vec!["-".repeat(line_width); headings.len()];
    let _ = writeln!(out, "{}", format_row(&headings));
    let _ = writeln!(out, "{}", format_row(&lines));

    for row in &table.rows {
        if let Some(bsize) = row.bsize {
            let mut bw = vec![format_size(bsize)];
            bw.extend(row.cells.iter().map(|c| format_bw(c.bandwidth)));
            let _ = writeln!(out, "{}", format_row(&bw));
        }
        let mut iops = vec![String::new()];
        iops.extend(row.cells.iter().map(|c| format!("{:7} IOPS", c.iops as u64)));
        let _ = writeln!(out, "{}", format_row(&iops));
        let mut latency = vec![String::new()];
        latency.extend(row.cells.iter().map(|c| format!("{:7} us  ", c.latency as u64)));
        let _ = writeln!(out, "{}", format_row(&latency));
    }
}
