//! Table output using comfy-table.
//!
//! One table per workload and size:
//! Variant | Workers | Threads | Schedule | Time | Speedup | Correct

use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use forge_shard::BenchmarkResult;

use crate::harness::{format_duration_us, format_size};

/// Duration of the plain sequential run for the same workload and size.
fn baseline_us(data: &[&BenchmarkResult]) -> Option<u64> {
    data.iter()
        .find(|r| r.workers == 1 && r.variant == "sequential")
        .map(|r| r.duration_us)
}

/// Speedup of `r` over `baseline`, if both are measurable.
pub fn speedup(baseline: Option<u64>, r: &BenchmarkResult) -> Option<f64> {
    match baseline {
        Some(base) if r.duration_us > 0 => Some(base as f64 / r.duration_us as f64),
        _ => None,
    }
}

fn speedup_cell(speedup: Option<f64>) -> Cell {
    let Some(s) = speedup else {
        return Cell::new("-");
    };
    let text = format!("{:.2}x", s);
    if s >= 5.0 {
        Cell::new(&text).fg(Color::Green)
    } else if s >= 2.0 {
        Cell::new(&text).fg(Color::Cyan)
    } else if s >= 1.0 {
        Cell::new(&text).fg(Color::Yellow)
    } else {
        Cell::new(&text).fg(Color::Red)
    }
}

/// Render results for one workload and size.
pub fn render_table(data: &[&BenchmarkResult]) {
    let Some(first) = data.first() else {
        println!("No results to display.");
        return;
    };

    let baseline = baseline_us(data);

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Variant").add_attribute(Attribute::Bold),
            Cell::new("Workers").add_attribute(Attribute::Bold),
            Cell::new("Threads").add_attribute(Attribute::Bold),
            Cell::new("Schedule").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
            Cell::new("Speedup").add_attribute(Attribute::Bold),
            Cell::new("Correct").add_attribute(Attribute::Bold),
        ]);

    for r in data {
        let correct = if r.correct {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("NO").fg(Color::Red).add_attribute(Attribute::Bold)
        };
        table.add_row(vec![
            Cell::new(&r.variant),
            Cell::new(r.workers).set_alignment(CellAlignment::Right),
            Cell::new(r.threads).set_alignment(CellAlignment::Right),
            Cell::new(&r.schedule),
            Cell::new(format_duration_us(r.duration_us)).set_alignment(CellAlignment::Right),
            speedup_cell(speedup(baseline, r)).set_alignment(CellAlignment::Right),
            correct,
        ]);
    }

    println!("\n=== {} ({}) ===", first.workload, format_size(first.size));
    println!("{table}");
}

/// Render results grouped by workload and size, in first-seen order.
pub fn render_all_tables(data: &[BenchmarkResult]) {
    if data.is_empty() {
        println!("No results to display.");
        return;
    }

    let mut groups: Vec<Vec<&BenchmarkResult>> = Vec::new();
    for r in data {
        match groups
            .iter_mut()
            .find(|g| g[0].workload == r.workload && g[0].size == r.size)
        {
            Some(group) => group.push(r),
            None => groups.push(vec![r]),
        }
    }

    for group in &groups {
        render_table(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_shard::WorkloadKind;

    fn result(variant: &str, workers: usize, duration_us: u64) -> BenchmarkResult {
        BenchmarkResult {
            workload: WorkloadKind::Sort,
            variant: variant.to_string(),
            workers,
            threads: 1,
            schedule: "-".to_string(),
            size: 1_000,
            duration_us,
            correct: true,
        }
    }

    #[test]
    fn test_baseline_is_single_worker_sequential() {
        let seq = result("sequential", 1, 400);
        let dist = result("distributed+sequential", 2, 100);
        assert_eq!(baseline_us(&[&dist, &seq]), Some(400));
        assert_eq!(baseline_us(&[&dist]), None);
    }

    #[test]
    fn test_speedup() {
        let r = result("thread-pool", 1, 100);
        assert_eq!(speedup(Some(400), &r), Some(4.0));
        assert_eq!(speedup(None, &r), None);
        assert_eq!(speedup(Some(400), &result("thread-pool", 1, 0)), None);
    }
}
