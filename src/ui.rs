// UI layer: credential prompt, the interactive menu and terminal output.
// The functions stay small and synchronous; all server work is delegated
// to `ApiClient`.

use anyhow::{Context, Result};
use dialoguer::{Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::api::ApiClient;
use crate::export::ExportSink;
use crate::model::{DateKey, ServerStatus};
use crate::retrieval::{Pacer, ProgressSink};
use crate::transport::Transport;

/// Ask for the username and password used to register on the server.
pub fn prompt_credentials() -> Result<(String, String)> {
    println!("Registration on the server is required.");
    let name: String = Input::new()
        .with_prompt("Username")
        .interact_text()
        .context("Failed to read username")?;
    // `Password` hides input in terminal for passwords.
    let password = Password::new()
        .with_prompt("Password")
        .interact()
        .context("Failed to read password")?;
    Ok((name, password))
}

/// Main interactive menu. Runs until the user chooses "Exit".
///
/// A failed action prints its error chain and returns to the menu.
pub fn main_menu<T: Transport>(
    api: &ApiClient<T>,
    exporter: &dyn ExportSink,
    pacer: &dyn Pacer,
) -> Result<()> {
    let items = ["Server status", "Export archive data", "Exit"];
    loop {
        println!("---------------------------");
        let selection = Select::new()
            .with_prompt("Choose an action")
            .items(&items)
            .default(0)
            .interact()?;
        let outcome = match selection {
            0 => handle_status(api),
            1 => handle_export(api, exporter, pacer),
            _ => break,
        };
        if let Err(e) = outcome {
            println!("Error: {e:#}");
        }
    }
    Ok(())
}

fn handle_status<T: Transport>(api: &ApiClient<T>) -> Result<()> {
    let waiting = spinner("Requesting server status...");
    let status = api.server_status();
    waiting.finish_and_clear();
    show_status(&status.context("Server status request failed")?);
    Ok(())
}

fn handle_export<T: Transport>(
    api: &ApiClient<T>,
    exporter: &dyn ExportSink,
    pacer: &dyn Pacer,
) -> Result<()> {
    let date: String = Input::new()
        .with_prompt("Export date (YYYY-MM-DD)")
        .validate_with(|input: &String| -> Result<(), String> {
            DateKey::parse_for("date prompt", input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;

    let counting = spinner("Requesting row count...");
    let rows = api.row_count(&date);
    counting.finish_and_clear();
    let rows = rows.context("Row count request failed")?;
    println!("{date} holds {rows} rows");

    let mut progress = BarProgress::default();
    let dataset = api
        .download(&date, rows, pacer, &mut progress)
        .context("Archive download failed")?;

    let writing = spinner("Writing spreadsheet...");
    let written = exporter.export(&dataset);
    writing.finish_and_clear();
    let path = written.context("Spreadsheet export failed")?;
    println!("Exported {} rows to {}", dataset.len(), path.display());
    Ok(())
}

/// Print the server status snapshot.
pub fn show_status(status: &ServerStatus) {
    println!();
    println!("Server started:         {}", status.started_at);
    println!("Modbus-RTU interfaces:  {}", status.serial_interfaces.len());
    println!("Modbus-TCP interfaces:  {}", status.network_interfaces.len());
    println!();

    for (i, rtu) in status.serial_interfaces.iter().enumerate() {
        println!("Modbus-RTU interface {}", i + 1);
        println!("  name:   {}", rtu.name);
        println!("  port:   {}", rtu.device);
        println!("  params: {}", rtu.line);
    }
    for (i, tcp) in status.network_interfaces.iter().enumerate() {
        println!("Modbus-TCP interface {}", i + 1);
        println!("  name:    {}", tcp.name);
        println!("  address: {}", tcp.address);
    }
    println!();

    let sizes = &status.log_sizes;
    println!(
        "Log file sizes (MB): info {}, warning {}, error {}",
        sizes.info, sizes.warning, sizes.error
    );
    println!();
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Page progress shown as an indicatif bar. The bar is created lazily on the
/// first update because the page total is only known then.
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl ProgressSink for BarProgress {
    fn page_done(&mut self, done: u64, total: u64) {
        let bar = self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::with_template("Loading data {bar:40} {percent:>3}% ({pos}/{len} pages)")
            {
                bar.set_style(style);
            }
            bar
        });
        bar.set_position(done);
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}
