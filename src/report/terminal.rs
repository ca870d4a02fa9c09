use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use pkgrecon::{Handler, Package, RecognizeError};

use super::{FileOutcome, Summary};

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

/// Render a colored terminal report.
pub fn render(outcomes: &[FileOutcome], verbose: bool, quiet: bool) -> Result<()> {
    let summary = Summary::from_outcomes(outcomes);

    if quiet {
        println!(
            "Files: {}  Packages: {}  Not implemented: {}  Failed: {}",
            summary.files,
            summary.packages.to_string().green(),
            summary.not_implemented.to_string().yellow(),
            summary.failed.to_string().red(),
        );
        return Ok(());
    }

    println!(
        "\n {} v{}\n",
        "pkgrecon".bold(),
        env!("CARGO_PKG_VERSION")
    );

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Files              : {:>4}", summary.files));
    println!(
        " │  {:<48} │",
        format!("{}  Packages        : {:>4}", "✓".green(), summary.packages)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Unrecognized    : {:>4}", "·".dimmed(), summary.unrecognized)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Not implemented : {:>4}", "⚠".yellow(), summary.not_implemented)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Failed          : {:>4}", "✗".red(), summary.failed)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    let failures: Vec<(&FileOutcome, &RecognizeError)> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
        .collect();
    if !failures.is_empty() {
        println!(" {} Files that could not be parsed:\n", "[ERROR]".red().bold());
        for (outcome, error) in failures {
            let tag = if error.is_not_implemented() {
                "warn".yellow()
            } else {
                "error".red()
            };
            println!("   {} {}: {}", tag, outcome.path.display(), error);
        }
        println!();
    }

    let with_packages: Vec<&FileOutcome> = outcomes
        .iter()
        .filter(|o| !o.packages().is_empty())
        .collect();
    if !with_packages.is_empty() {
        println!(" {} Recognized packages:\n", "[OK]".green().bold());
        render_packages(&with_packages);
        println!();
    }

    if verbose {
        for outcome in &with_packages {
            for package in outcome.packages() {
                if !package.dependencies.is_empty() {
                    render_dependencies(package);
                    println!();
                }
            }
        }
        for outcome in outcomes.iter().filter(|o| matches!(&o.result, Ok(p) if p.is_empty())) {
            println!("   {} {}", "no package data".dimmed(), outcome.path.display());
        }
    }

    Ok(())
}

fn render_packages(outcomes: &[&FileOutcome]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("File"),
            header_cell("Type"),
            header_cell("Name"),
            header_cell("Version"),
            header_cell("License"),
            header_cell("Deps"),
        ]);

    for outcome in outcomes {
        for package in outcome.packages() {
            let name = match (&package.namespace, &package.name) {
                (Some(ns), Some(name)) => format!("{ns}/{name}"),
                (None, Some(name)) => name.clone(),
                _ => "-".to_string(),
            };
            let license = package.license_expression.as_deref().unwrap_or("-");
            let license_color = if license == "-" || license.contains("unknown") {
                Color::DarkGrey
            } else {
                Color::Green
            };
            table.add_row(vec![
                Cell::new(outcome.path.display()),
                Cell::new(package.package_type.to_string()).fg(Color::Cyan),
                Cell::new(name),
                Cell::new(package.version.as_deref().unwrap_or("-")),
                Cell::new(license).fg(license_color),
                Cell::new(package.dependencies.len()).set_alignment(CellAlignment::Right),
            ]);
        }
    }

    println!("{}", table);
}

fn render_dependencies(package: &Package) {
    println!(
        " {} {}",
        "Dependencies of".bold(),
        package.purl().unwrap_or_default()
    );
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("Name"),
            header_cell("Requirement"),
            header_cell("Scope"),
            header_cell("Runtime"),
            header_cell("Pinned"),
        ]);
    for dep in &package.dependencies {
        let flag = |on: bool| if on { Cell::new("✓").fg(Color::Green) } else { Cell::new("") };
        table.add_row(vec![
            Cell::new(&dep.name),
            Cell::new(dep.extracted_requirement.as_deref().unwrap_or("")),
            Cell::new(dep.scope.as_deref().unwrap_or("")),
            flag(dep.is_runtime).set_alignment(CellAlignment::Center),
            flag(dep.is_resolved).set_alignment(CellAlignment::Center),
        ]);
    }
    println!("{}", table);
}

/// `--list-handlers`: the dispatch order with each handler's type and datasource.
pub fn render_handlers() {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("#"),
            header_cell("Handler"),
            header_cell("Type"),
            header_cell("Datasource"),
        ]);
    for (i, handler) in Handler::ALL.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(handler.name()),
            Cell::new(handler.package_type().to_string()).fg(Color::Cyan),
            Cell::new(handler.datasource_id()),
        ]);
    }
    println!("{}", table);
}
