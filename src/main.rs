//! # Warraq CLI
//!
//! Command-line interface for Arabic receipt printing over Bluetooth LE.
//!
//! ## Usage
//!
//! ```bash
//! # Find printers
//! warraq scan
//!
//! # Connect (and bond) to one
//! warraq connect 00:11:22:33:44:55
//!
//! # Print a sample receipt to the bonded printer
//! warraq print --sample arabic
//!
//! # Print your own lines
//! warraq print --header "RECEIPT" --line "Item A  \$5.00" --footer "THANK YOU"
//!
//! # Find the code page that renders Arabic on this printer
//! warraq diagnostics
//!
//! # See the bytes without a printer
//! warraq encode "مرحبا"
//!
//! # Try everything against a simulated printer
//! warraq --simulate print --sample sale
//! ```
//!
//! Logging follows `RUST_LOG` (default: `info,warraq=debug`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use warraq::{
    WarraqError,
    printer::{FileBondStore, Printer, PrinterProfile, Settings, bond},
    protocol::{codepage::CodePage, normalize::normalize},
    receipt::{self, ReceiptContent},
    transport::{self, Backend, mock::SimulatedBackend},
};

/// Warraq - Arabic receipt printing over Bluetooth LE
#[derive(Parser, Debug)]
#[command(name = "warraq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Printer profile: built-in key ('issc', '18f0') or a profile JSON file
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Directory holding the bonded printer record
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Use a simulated printer instead of the Bluetooth adapter
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan for nearby printers
    Scan,

    /// Connect to a printer and remember it
    Connect {
        /// Printer address as shown by `scan`
        address: String,
    },

    /// Show adapter, connection and bonded printer
    Status,

    /// Print a receipt on the bonded printer
    Print {
        /// Sample receipt (omit all lines to see available samples)
        #[arg(long)]
        sample: Option<String>,

        /// Header line (centered), repeatable
        #[arg(long = "header")]
        header: Vec<String>,

        /// Body line, repeatable
        #[arg(long = "line")]
        body: Vec<String>,

        /// Footer line (centered), repeatable
        #[arg(long = "footer")]
        footer: Vec<String>,

        /// Receipt content as JSON ({"header": [...], "body": [...], "footer": [...]})
        #[arg(long, value_name = "FILE", conflicts_with = "sample")]
        json: Option<PathBuf>,
    },

    /// Print the self-test page
    Test,

    /// Print the code page diagnostics sheet
    Diagnostics {
        /// Code page to include (repeatable, decimal or 0x-hex); default 0x10-0x29
        #[arg(long = "page", value_parser = parse_byte)]
        pages: Vec<u8>,
    },

    /// Show the bytes a line of text encodes to
    Encode {
        text: String,

        /// Encoding table ('windows-1256', 'iso-8859-6')
        #[arg(long)]
        code_page: Option<String>,
    },

    /// Forget the bonded printer
    Forget,

    /// List built-in printer profiles
    Profiles,
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("'{}' is not a byte value", s))
}

/// Initialize tracing with `RUST_LOG` support.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,warraq=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, WarraqError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if let Some(profile) = &cli.profile {
        let path = PathBuf::from(profile);
        settings.profile = if path.is_file() {
            PrinterProfile::from_file(&path)?
        } else {
            PrinterProfile::parse(profile).map_err(WarraqError::Profile)?
        };
    }

    settings.validate()?;
    Ok(settings)
}

async fn open_printer(cli: &Cli, restore: bool) -> Result<Printer, WarraqError> {
    let settings = load_settings(cli)?;
    let state_dir = cli.state_dir.clone().unwrap_or_else(bond::default_state_dir);
    let store = Box::new(FileBondStore::in_dir(&state_dir));

    let backend: Backend = if cli.simulate {
        Arc::new(SimulatedBackend::new())
    } else {
        transport::init_backend().await
    };

    if restore {
        Printer::start(backend, store, settings).await
    } else {
        Printer::new(backend, store, settings)
    }
}

/// Restore the bonded printer and fail if that did not produce a link.
async fn connected_printer(cli: &Cli) -> Result<Printer, WarraqError> {
    let printer = open_printer(cli, true).await?;
    if !printer.is_connected().await {
        return Err(match printer.bonded_device() {
            Some(_) => WarraqError::Connection("bonded printer did not respond".into()),
            None => WarraqError::NotConnected,
        });
    }
    Ok(printer)
}

fn print_samples() {
    println!("Available samples:");
    for name in receipt::list_receipts() {
        println!("  {}", name);
    }
}

async fn run() -> Result<(), WarraqError> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Scan => {
            let printer = open_printer(&cli, false).await?;
            let devices = printer.scan().await?;
            if devices.is_empty() {
                println!("No printers found.");
            }
            for device in devices {
                println!("{}  {}", device.address, device.name.as_deref().unwrap_or("(unnamed)"));
            }
        }

        Commands::Connect { address } => {
            let printer = open_printer(&cli, false).await?;
            let handle = printer.connect_address(address).await?;
            println!("Connected to {}.", handle.device().label());
        }

        Commands::Status => {
            let printer = open_printer(&cli, true).await?;
            let adapter = match printer.manager().backend().adapter_state().await {
                Ok(state) => state.to_string(),
                Err(e) => e.to_string(),
            };
            println!("Backend:    {}", printer.manager().backend().name());
            println!("Adapter:    {}", adapter);
            println!("Profile:    {}", printer.profile().name);
            println!("Connection: {}", printer.state());
            match printer.bonded_device() {
                Some(record) => println!(
                    "Bonded:     {} {}",
                    record.address,
                    record.name.as_deref().unwrap_or("")
                ),
                None => println!("Bonded:     none"),
            }
        }

        Commands::Print {
            sample,
            header,
            body,
            footer,
            json,
        } => {
            let content = if let Some(path) = json {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str::<ReceiptContent>(&text)?
            } else if let Some(name) = sample {
                let columns = load_settings(&cli)?.profile.columns;
                match receipt::by_name_with_width(name, columns) {
                    Some(content) => content,
                    None => {
                        print_samples();
                        return Err(WarraqError::Profile(format!("unknown sample '{}'", name)));
                    }
                }
            } else if header.is_empty() && body.is_empty() && footer.is_empty() {
                print_samples();
                return Ok(());
            } else {
                ReceiptContent {
                    header: header.clone(),
                    body: body.clone(),
                    footer: footer.clone(),
                }
            };

            let printer = connected_printer(&cli).await?;
            printer.print_content(&content).await?;
            println!("Printed successfully!");
        }

        Commands::Test => {
            let printer = connected_printer(&cli).await?;
            printer.print_test_page().await?;
            println!("Printed successfully!");
        }

        Commands::Diagnostics { pages } => {
            let pages = if pages.is_empty() {
                receipt::default_diagnostic_pages()
            } else {
                pages.clone()
            };
            let printer = connected_printer(&cli).await?;
            printer.print_code_page_diagnostics(&pages).await?;
            println!("Printed {} code pages.", pages.len());
        }

        Commands::Encode { text, code_page } => {
            let encoding = match code_page {
                Some(name) => CodePage::parse(name).map_err(WarraqError::Profile)?,
                None => load_settings(&cli)?.profile.encoding,
            };
            let normalized = normalize(text);
            let bytes = encoding.encode(&normalized);
            let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            println!("{} ({})", normalized, encoding.name());
            println!("{}", hex.join(" "));
        }

        Commands::Forget => {
            let printer = open_printer(&cli, false).await?;
            printer.forget_bonded_device()?;
            println!("Bonded printer forgotten.");
        }

        Commands::Profiles => {
            for profile in PrinterProfile::built_in() {
                println!(
                    "{}  service {}  code page 0x{:02X}",
                    profile.name, profile.service_uuid, profile.code_page
                );
            }
        }
    }

    Ok(())
}
