use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use improvlink_frame::NetworkEntry;
use improvlink_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct NetworkOutput<'a> {
    ssid: &'a str,
    rssi: i16,
    secured: bool,
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    networks: Vec<NetworkOutput<'a>>,
}

pub fn print_networks(networks: &[NetworkEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ScanOutput {
                networks: networks
                    .iter()
                    .map(|n| NetworkOutput {
                        ssid: &n.ssid,
                        rssi: n.rssi,
                        secured: n.requires_auth,
                    })
                    .collect(),
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SSID", "RSSI", "SECURITY"]);
            for network in networks {
                table.add_row(vec![
                    network.ssid.clone(),
                    format!("{} dBm", network.rssi),
                    security_label(network.requires_auth).to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for network in networks {
                println!(
                    "{} ({} dBm, {})",
                    network.ssid,
                    network.rssi,
                    security_label(network.requires_auth)
                );
            }
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput> = ports
                .iter()
                .map(|p| PortOutput {
                    name: &p.name,
                    kind: &p.kind,
                })
                .collect();
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE"]);
            for port in ports {
                table.add_row(vec![port.name.clone(), port.kind.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!("{} ({})", port.name, port.kind);
            }
        }
    }
}

#[derive(Serialize)]
struct DeviceOutput<'a> {
    device: &'a str,
}

pub fn print_device(device: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(&DeviceOutput { device })),
        OutputFormat::Table | OutputFormat::Pretty => println!("{device}"),
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    status: &'a str,
    ssid: &'a str,
}

/// Terminal result of a credential submission ("saved" or "provisioned").
pub fn print_status(status: &str, ssid: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(&StatusOutput { status, ssid })),
        OutputFormat::Table | OutputFormat::Pretty => println!("{status}: {ssid}"),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
