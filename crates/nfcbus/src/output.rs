use std::io::{IsTerminal, Write};
use std::path::Path;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nfcbus_i2c::{DeviceAddress, PortInfo};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    path: String,
    prefix: &'a str,
    meaning: &'a str,
}

#[derive(Serialize)]
struct PortListOutput<'a> {
    device_dir: String,
    ports: Vec<PortOutput<'a>>,
}

pub fn print_ports(device_dir: &Path, ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PortListOutput {
                device_dir: device_dir.display().to_string(),
                ports: ports
                    .iter()
                    .map(|p| PortOutput {
                        path: p.path.display().to_string(),
                        prefix: &p.prefix,
                        meaning: &p.meaning,
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PATH", "PREFIX", "KIND"]);
            for p in ports {
                table.add_row(vec![
                    p.path.display().to_string(),
                    p.prefix.clone(),
                    p.meaning.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("no bus devices found in {}", device_dir.display());
            }
            for p in ports {
                println!("{} ({})", p.path.display(), p.meaning);
            }
        }
        OutputFormat::Raw => {
            for p in ports {
                println!("{}", p.path.display());
            }
        }
    }
}

#[derive(Serialize)]
struct TransferOutput<'a> {
    bus: String,
    address: String,
    operation: &'a str,
    length: usize,
    data: String,
}

/// Print the outcome of a single frame transfer.
pub fn print_transfer(
    bus: &Path,
    address: DeviceAddress,
    operation: &str,
    data: &[u8],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = TransferOutput {
                bus: bus.display().to_string(),
                address: address.to_string(),
                operation,
                length: data.len(),
                data: to_hex(data),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["BUS", "ADDRESS", "OP", "SIZE", "DATA"])
                .add_row(vec![
                    bus.display().to_string(),
                    address.to_string(),
                    operation.to_string(),
                    data.len().to_string(),
                    to_hex(data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{operation} bus={} address={address} size={} data={}",
                bus.display(),
                data.len(),
                to_hex(data)
            );
        }
        OutputFormat::Raw => print_raw(data),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}
