//! DoorPass command-line client
//!
//! Manages access passes on the lock controller from a terminal.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use doorpass_core::morse::{self, MorseInput, MorseUnit};
use doorpass_core::state::{dispatch, lock};
use doorpass_core::timestamp::{format_timestamp, parse_timestamp};
use doorpass_core::{
    ActiveSortField, Credential, Dashboard, DashboardConfig, DashboardEvent, HttpRemote,
    InvalidSortField, Method, MorseCredential, Pass, PassDraft, PassType, SortDirection,
    SyncCoordinator,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "doorpass", about = "Manage door-lock access passes")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "doorpass.toml", global = true)]
    config: PathBuf,

    /// Lock controller host override
    #[arg(long, global = true)]
    host: Option<String>,

    /// Data port override
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active and invalid passes
    List {
        method: Method,

        /// Sort the active table by id, name, type or expiry
        #[arg(long)]
        sort: Option<ActiveSortField>,

        /// Sort the invalid table by id, name, type, status or status_time
        #[arg(long)]
        invalid_sort: Option<InvalidSortField>,

        /// Sort the active table descending
        #[arg(long)]
        desc: bool,

        /// Sort the invalid table descending
        #[arg(long)]
        invalid_desc: bool,
    },

    /// Create a pass
    Create {
        method: Method,

        #[arg(long)]
        name: String,

        /// one-time or multiple-pass
        #[arg(long = "type", default_value = "one-time")]
        pass_type: PassType,

        /// Expiry (e.g. 2025-05-20T18:30); defaults to one week from now
        #[arg(long)]
        expires: Option<String>,

        /// Knock sequence for Morse passes, e.g. ". ._ . ._ . . ."
        #[arg(long, conflicts_with = "generate")]
        morse: Option<String>,

        /// Generate a random knock sequence
        #[arg(long)]
        generate: bool,
    },

    /// Edit an active pass
    Edit {
        method: Method,
        id: u64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "type")]
        pass_type: Option<PassType>,

        #[arg(long)]
        expires: Option<String>,

        #[arg(long)]
        morse: Option<String>,
    },

    /// Delete an active pass
    Delete { method: Method, id: u64 },

    /// Show the binary password of a knock sequence
    Encode { sequence: String },

    /// Generate a random knock sequence
    Generate,

    /// Check knock timings against the active Morse passes
    Knock {
        /// Silences between consecutive knocks in milliseconds, e.g. 300,900,300
        #[arg(required = true, value_delimiter = ',')]
        gaps_ms: Vec<u64>,

        /// Silence above which a gap reads as a long knock
        #[arg(long, default_value_t = morse::DEFAULT_BIT_THRESHOLD.as_millis() as u64)]
        threshold_ms: u64,
    },

    /// Save the QR image of a pass
    QrImage {
        id: u64,

        #[arg(long)]
        out: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<DashboardConfig> {
    let mut cfg = if cli.config.exists() {
        DashboardConfig::load(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?
    } else {
        info!("No config file found, using defaults");
        DashboardConfig::default()
    };

    if let Some(host) = &cli.host {
        cfg.device_host = host.clone();
    }
    if let Some(port) = cli.port {
        cfg.data_port = port;
    }
    Ok(cfg)
}

/// Validate a typed knock sequence. Six data units are completed with the
/// terminator, as the interactive collector does.
fn knock_sequence(raw: &str) -> Result<String> {
    let input = MorseInput::from_sequence(raw)?;
    if !input.is_complete() {
        bail!(
            "Knock sequence has {} of {} data units",
            input.unit_count(),
            morse::DATA_UNITS
        );
    }
    if morse::parse_units(raw)?.len() == morse::DATA_UNITS {
        return Ok(format!("{} {}", raw.trim_end(), MorseUnit::Short.as_str()));
    }
    Ok(raw.to_string())
}

fn describe(pass: &Pass) -> String {
    let mut line = format!(
        "{:>4}  {:<24} {:<14} {}",
        pass.id,
        pass.name,
        pass.pass_type.as_str(),
        format_timestamp(pass.expiry_time)
    );
    match &pass.credential {
        Credential::Morse(morse) => {
            line.push_str(&format!(
                "  knock {}  binary {}",
                morse.knock_password, morse.binary_password
            ))
        }
        Credential::Qr {
            password: Some(password),
            ..
        } => line.push_str(&format!("  token {}", password)),
        _ => {}
    }
    line
}

fn print_passes(dashboard: &Dashboard, method: Method) {
    println!("Active {} passes", method.display_name());
    for pass in dashboard.sorted_active(method) {
        println!("{}", describe(&pass));
    }
    if let Some(pass) = dashboard.nearest_expiring(method) {
        println!(
            "Next to expire: {} at {}",
            pass.name,
            format_timestamp(pass.expiry_time)
        );
    }

    println!();
    println!("Invalid {} passes", method.display_name());
    for pass in dashboard.sorted_invalid(method) {
        println!(
            "{}  {} {}",
            describe(&pass),
            pass.invalid_status().as_str(),
            format_timestamp(pass.status_time())
        );
    }
}

fn write_image(out: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(out, bytes).with_context(|| format!("Failed to write {}", out.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    let state = Dashboard::from_config(&cfg)?.into_shared();
    let coordinator = SyncCoordinator::new(HttpRemote::from_config(&cfg)?, state.clone());

    match cli.command {
        Commands::List {
            method,
            sort,
            invalid_sort,
            desc,
            invalid_desc,
        } => {
            coordinator.load(method).await?;
            if sort.is_some() || desc {
                let field = sort.unwrap_or(ActiveSortField::Name);
                dispatch(&state, DashboardEvent::SortActive(field))?;
                if (lock(&state)?.active_sort().direction == SortDirection::Descending) != desc {
                    dispatch(&state, DashboardEvent::SortActive(field))?;
                }
            }
            if invalid_sort.is_some() || invalid_desc {
                let field = invalid_sort.unwrap_or(InvalidSortField::StatusTime);
                dispatch(&state, DashboardEvent::SortInvalid(field))?;
                if (lock(&state)?.invalid_sort().direction == SortDirection::Descending)
                    != invalid_desc
                {
                    dispatch(&state, DashboardEvent::SortInvalid(field))?;
                }
            }
            print_passes(&*lock(&state)?, method);
        }
        Commands::Create {
            method,
            name,
            pass_type,
            expires,
            morse: sequence,
            generate,
        } => {
            coordinator.load(method).await?;

            let mut draft = PassDraft::new(name, doorpass_core::timestamp::now());
            draft.pass_type = pass_type;
            if let Some(expires) = expires {
                draft.expiry_time = parse_timestamp(&expires)?;
            }
            draft.morse_sequence = match (sequence, generate) {
                (Some(sequence), _) => Some(knock_sequence(&sequence)?),
                (None, true) => Some(morse::generate()),
                (None, false) => None,
            };

            let pass = coordinator.create(method, draft).await?;
            println!("Created {} pass", method.display_name());
            println!("{}", describe(&pass));
        }
        Commands::Edit {
            method,
            id,
            name,
            pass_type,
            expires,
            morse: sequence,
        } => {
            coordinator.load(method).await?;

            let mut pass = match lock(&state)?.store(method).find_active(id) {
                Some(pass) => pass.clone(),
                None => bail!("No active {} pass with id {}", method, id),
            };
            if let Some(name) = name {
                pass.name = name;
            }
            if let Some(pass_type) = pass_type {
                pass.pass_type = pass_type;
            }
            if let Some(expires) = expires {
                pass.expiry_time = parse_timestamp(&expires)?;
            }
            if let Some(sequence) = sequence {
                if method != Method::Morse {
                    bail!("Knock sequences only apply to Morse passes");
                }
                let sequence = knock_sequence(&sequence)?;
                pass.credential = Credential::Morse(MorseCredential::from_sequence(&sequence)?);
            }

            coordinator.update(method, pass).await?;
            println!("Updated {} pass {}", method.display_name(), id);
        }
        Commands::Delete { method, id } => {
            coordinator.load(method).await?;
            coordinator.delete(method, id).await?;
            println!("Deleted {} pass {}", method.display_name(), id);
        }
        Commands::Encode { sequence } => {
            let encoded = morse::encode(&sequence)?;
            println!("binary: {}", encoded.binary);
            println!("knock:  {}", encoded.knock);
        }
        Commands::Generate => {
            let sequence = morse::generate();
            let encoded = morse::encode(&sequence)?;
            println!("sequence: {}", sequence);
            println!("binary:   {}", encoded.binary);
        }
        Commands::Knock {
            gaps_ms,
            threshold_ms,
        } => {
            coordinator.load(Method::Morse).await?;

            let silences: Vec<Duration> = gaps_ms.into_iter().map(Duration::from_millis).collect();
            let decoded = morse::decode_intervals(&silences, Duration::from_millis(threshold_ms));
            println!("decoded: {}", decoded);

            let dashboard = lock(&state)?;
            let matching: Vec<&Pass> = dashboard
                .store(Method::Morse)
                .active()
                .iter()
                .filter(|pass| {
                    pass.morse()
                        .is_some_and(|m| morse::matches_binary(&m.binary_password, &decoded))
                })
                .collect();
            if matching.is_empty() {
                println!("No active Morse pass matches");
            }
            for pass in matching {
                println!("{}", describe(pass));
            }
        }
        Commands::QrImage { id, out } => {
            let bytes = coordinator.qr_image(id).await?;
            write_image(&out, &bytes)?;
            println!("Wrote {} bytes to {}", bytes.len(), out.display());
        }
    }

    Ok(())
}
