//! `--version` table.

use std::sync::Arc;

use anyhow::{Context, Result};
use cursor_installer_core::{version_info, InstallerConfig, LocalOps, MetadataStore, VersionInfo};

pub(super) fn print_versions(config: &InstallerConfig) -> Result<()> {
    let install = &config.install;
    // Read-only: the metadata file is world-readable.
    let store = MetadataStore::new(install.metadata_path(), Arc::new(LocalOps));
    let info = version_info(&store, &install.artifact_path())
        .context("failed to read version information")?;
    println!("{}", render_versions(&install.app_name, &info));
    Ok(())
}

fn render_versions(app_name: &str, info: &VersionInfo) -> String {
    let app_version = info.installed_version.as_deref().unwrap_or("unknown");
    let app_status = if info.is_installed {
        "installed"
    } else {
        "not installed"
    };
    let rows = [
        [app_name, app_version, app_status],
        ["Installer", info.installer_version, "installed"],
    ];
    format!(
        "{app_name} Versions\n\n{}",
        render_table(["Component", "Version", "Status"], &rows)
    )
}

fn render_table<const N: usize>(header: [&str; N], rows: &[[&str; N]]) -> String {
    let mut widths = header.map(|cell| cell.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = |left: &str, mid: &str, right: &str| {
        let segments = widths
            .iter()
            .map(|width| "─".repeat(width + 2))
            .collect::<Vec<_>>();
        format!("{left}{}{right}", segments.join(mid))
    };
    let row_line = |cells: &[&str; N]| {
        let padded = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!(" {cell:<width$} "))
            .collect::<Vec<_>>();
        format!("│{}│", padded.join("│"))
    };

    let mut lines = vec![
        border("┌", "┬", "┐"),
        row_line(&header),
        border("├", "┼", "┤"),
    ];
    lines.extend(rows.iter().map(row_line));
    lines.push(border("└", "┴", "┘"));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_columns_fit_the_widest_cell() {
        let table = render_table(["A", "Version"], &[["Cursor", "1"]]);
        let lines = table.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "┌────────┬─────────┐");
        assert_eq!(lines[1], "│ A      │ Version │");
        assert_eq!(lines[3], "│ Cursor │ 1       │");
        assert_eq!(lines[4], "└────────┴─────────┘");
    }

    #[test]
    fn missing_metadata_reports_unknown_version() {
        let info = VersionInfo {
            installed_version: None,
            installer_version: "0.3.0",
            is_installed: true,
        };
        let rendered = render_versions("Cursor", &info);
        assert!(rendered.starts_with("Cursor Versions"));
        assert!(rendered.contains("│ Cursor    │ unknown │ installed │"));
        assert!(rendered.contains("│ Installer │ 0.3.0   │ installed │"));
    }
}
