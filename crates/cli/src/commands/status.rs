use anyhow::{Context, Result};
use tidemark_migrate::MigrationStatus;

use super::migrator;
use crate::config::Environment;

const HEADER: [&str; 2] = ["Migration", "Applied"];

/// Print a table of catalog migrations and when they were applied
pub async fn run(env: &Environment) -> Result<Vec<MigrationStatus>> {
    let migrator = migrator(env).await?;
    let rows = migrator
        .status(&env.source())
        .await
        .context("Could not read migration status")?;

    print_table(&rows);
    Ok(rows)
}

fn applied_column(row: &MigrationStatus) -> String {
    let applied = match row.applied_at {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "no".to_string(),
    };
    if row.in_catalog {
        applied
    } else {
        format!("{} (unknown)", applied)
    }
}

fn print_table(rows: &[MigrationStatus]) {
    let cells: Vec<[String; 2]> = rows.iter().map(|row| [row.name.clone(), applied_column(row)]).collect();

    let mut widths = HEADER.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let border = format!("+-{}-+-{}-+", "-".repeat(widths[0]), "-".repeat(widths[1]));
    println!("{}", border);
    println!("| {:<w0$} | {:<w1$} |", HEADER[0], HEADER[1], w0 = widths[0], w1 = widths[1]);
    println!("{}", border);
    for [name, applied] in &cells {
        println!("| {:<w0$} | {:<w1$} |", name, applied, w0 = widths[0], w1 = widths[1]);
    }
    println!("{}", border);
}
