// Entry point and high-level CLI flow.
//
// - Option [1] loads a marketplace export (CSV or spreadsheet), detects its
//   columns and normalizes the rows, printing diagnostics.
// - Option [2] builds the report and prints the dashboard.
// - Option [3] exports the report to CSV/JSON files.
// After a dashboard or an export the user can go back to the menu or exit.
// With `--batch` the program loads, prints and exports once, then exits.
mod config;
mod loader;
mod mapper;
mod output;
mod reports;
mod types;
mod util;

#[cfg(test)]
mod tests;

use anyhow::Result;
use config::AppConfig;
use loader::Detection;
use once_cell::sync::Lazy;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{error, info};

// The last loaded export, kept in memory so the dashboard and the export can
// be produced several times in one run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        detection: None,
        source: None,
    })
});

struct AppState {
    detection: Option<Detection>,
    source: Option<PathBuf>,
}

/// Print `prompt` and read one trimmed line. `None` once input is closed
/// or unreadable, so callers can stop instead of re-prompting forever.
fn read_line<R: BufRead>(input: &mut R, prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask the user whether to go back to the menu.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N` or the
/// input ended.
fn prompt_back_to_menu<R: BufRead>(input: &mut R) -> bool {
    loop {
        let Some(resp) = read_line(input, "Back to menu (Y/N): ") else {
            return false;
        };
        match resp.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn export_stem(source: Option<&Path>) -> String {
    source
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("marketplace_report")
        .to_string()
}

/// Handle option [1]: read the file and run detection + normalization.
///
/// A read failure is reported and leaves any previously loaded data intact.
fn handle_load(path: &Path) {
    let table = match loader::load_table(path) {
        Ok(t) => t,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Failed to load file: {e:#}\n");
            return;
        }
    };
    let detection = loader::detect_and_normalize(&table);
    output::print_detection(&detection);

    let mut state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    state.detection = Some(detection);
    state.source = Some(path.to_path_buf());
}

fn loaded_detection() -> Option<(Detection, Option<PathBuf>)> {
    let state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    let detection = state.detection.clone()?;
    Some((detection, state.source.clone()))
}

/// Handle option [2]: build the report and print the dashboard.
fn handle_dashboard(cfg: &AppConfig) {
    let Some((detection, _)) = loaded_detection() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    let report = reports::build_report(&detection.rows);
    output::print_dashboard(&report, cfg.top_n, cfg.preview_rows);
}

/// Handle option [3]: build the report and write the export files.
fn handle_export(cfg: &AppConfig) {
    let Some((detection, source)) = loaded_detection() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    let report = reports::build_report(&detection.rows);
    let stem = export_stem(source.as_deref());
    match output::export_report(&report, &cfg.out_dir, &stem) {
        Ok(paths) => {
            info!(rows = %paths.rows.display(), "report exported");
            println!("Normalized rows exported to {}", paths.rows.display());
            println!("Aggregates exported to {}", paths.aggregates.display());
            println!("Full report exported to {}\n", paths.json.display());
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("Write error: {e:#}\n");
        }
    }
}

fn run_batch(cfg: &AppConfig, input: &Path) -> Result<()> {
    let table = loader::load_table(input)?;
    let detection = loader::detect_and_normalize(&table);
    output::print_detection(&detection);
    let report = reports::build_report(&detection.rows);
    output::print_dashboard(&report, cfg.top_n, cfg.preview_rows);
    let paths = output::export_report(&report, &cfg.out_dir, &export_stem(Some(input)))?;
    println!("Report exported to {}", paths.json.display());
    Ok(())
}

fn run_menu<R: BufRead>(cfg: &AppConfig, input: &mut R) {
    loop {
        println!("Marketplace report");
        println!("[1] Load marketplace export");
        println!("[2] Show dashboard");
        println!("[3] Export report\n");
        let Some(choice) = read_line(input, "Enter choice: ") else {
            println!("\nExiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => {
                let path = match &cfg.input {
                    Some(p) => p.clone(),
                    None => match read_line(input, "File path (.xlsx or .csv): ") {
                        Some(p) => PathBuf::from(p),
                        None => {
                            println!("\nExiting the program.");
                            break;
                        }
                    },
                };
                println!();
                handle_load(&path);
            }
            choice @ ("2" | "3") => {
                println!();
                if choice == "2" {
                    handle_dashboard(cfg);
                } else {
                    handle_export(cfg);
                }
                if !prompt_back_to_menu(input) {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1, 2 or 3.\n");
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Invalid arguments: {e:#}");
            std::process::exit(2);
        }
    };

    if cfg.batch {
        let Some(input) = cfg.input.clone() else {
            eprintln!("--batch requires an input file");
            std::process::exit(2);
        };
        if let Err(e) = run_batch(&cfg, &input) {
            error!("{e:#}");
            eprintln!("Failed: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    run_menu(&cfg, &mut io::stdin().lock());
}
