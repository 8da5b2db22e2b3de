use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use url::Url;

use gantry_client_core::auth::AuthError;
use gantry_client_core::config::Config;
use gantry_client_core::console::Console;
use gantry_client_core::mutate::Mutation;
use gantry_client_core::resources::{EventFilter, SeverityFilter};
use gantry_client_core::telemetry::{self, LogConfig, LogLevel};
use gantry_proto::{
    EventRecord, RedundancySettings, Severity, StressSettings, TimeSyncOffsets,
};

#[derive(Parser, Debug)]
#[command(name = "gantry", about = "Operational console for a TRDP train-data simulator")]
struct Cli {
    /// Base URL of the simulator API
    #[arg(long, env = "GANTRY_BASE_URL")]
    base_url: Option<Url>,

    /// Account to authenticate as; prompts for the password if none is given
    #[arg(long, short = 'u', env = "GANTRY_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "GANTRY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the authenticated session, if any
    Session,
    /// Clear the server-side session
    Logout,
    /// Update the stored UI theme preference
    Theme { theme: String },
    /// Poll every dashboard resource and print rolling summaries
    Watch {
        /// Stop after this many seconds (0 = until interrupted)
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Cyclic (PD) telegram sessions
    Pd {
        #[command(subcommand)]
        command: PdCommand,
    },
    /// On-demand (MD) request/response sessions
    Md {
        #[command(subcommand)]
        command: MdCommand,
    },
    /// Dataset contents and element editing
    Dataset {
        #[command(subcommand)]
        command: DatasetCommand,
    },
    /// Multicast interface membership
    Mcast {
        #[command(subcommand)]
        command: McastCommand,
    },
    /// Simulation control knobs
    Sim {
        #[command(subcommand)]
        command: SimCommand,
    },
    /// Time synchronization state and timestamp conversion
    Time {
        #[command(subcommand)]
        command: TimeCommand,
    },
    /// Dump the loaded device configuration tree
    ConfigDetail,
    /// List recent diagnostics events
    Events {
        #[arg(long)]
        severity: Option<Severity>,
        /// Inclusive lower bound on the event timestamp (ms)
        #[arg(long)]
        since_ms: Option<i64>,
        #[arg(long, default_value_t = 50)]
        max: usize,
    },
    /// Tail the simulator log
    Log {
        #[arg(long, default_value_t = 200)]
        max: usize,
    },
}

#[derive(Subcommand, Debug)]
enum PdCommand {
    Status,
    Enable { com_id: u32 },
    Disable { com_id: u32 },
}

#[derive(Subcommand, Debug)]
enum MdCommand {
    /// Create and send an MD request for a ComId
    Request { com_id: u32 },
    Status { session_id: u32 },
}

#[derive(Subcommand, Debug)]
enum DatasetCommand {
    Show {
        data_set_id: u32,
    },
    /// Set one element's raw bytes (comma-separated, e.g. "1,2,255")
    Set {
        data_set_id: u32,
        element: usize,
        raw: String,
    },
    Clear {
        data_set_id: u32,
        element: usize,
    },
    ClearAll {
        data_set_id: u32,
    },
    Lock {
        data_set_id: u32,
    },
    Unlock {
        data_set_id: u32,
    },
}

#[derive(Subcommand, Debug)]
enum McastCommand {
    Status,
    Join {
        interface: String,
        group: String,
        #[arg(long)]
        nic: Option<String>,
    },
    Leave {
        interface: String,
        group: String,
    },
}

#[derive(Subcommand, Debug)]
enum SimCommand {
    State,
    Stress {
        #[arg(long)]
        enabled: bool,
        #[arg(long, default_value_t = 0)]
        pd_cycle_us: u64,
        #[arg(long, default_value_t = 0)]
        pd_burst: u32,
        #[arg(long, default_value_t = 0)]
        md_burst: u32,
        #[arg(long, default_value_t = 1000)]
        md_interval_us: u64,
    },
    Redundancy {
        #[arg(long)]
        force_switch: bool,
        #[arg(long)]
        bus_failure: bool,
        #[arg(long, default_value_t = 0)]
        failed_channel: u32,
    },
    Register {
        name: String,
        path: String,
    },
    Activate {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum TimeCommand {
    Sync,
    Offsets {
        #[arg(long, default_value_t = 0)]
        ntp_offset_us: i64,
        #[arg(long, default_value_t = 0)]
        ptp_offset_us: i64,
    },
    Convert {
        seconds: u64,
        #[arg(long, default_value_t = 0)]
        nanoseconds: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    telemetry::init(&LogConfig {
        level: cli.log_level,
        file: cli.log_file.clone(),
    })?;

    let mut config = Config::from_env();
    if let Some(base_url) = cli.base_url.clone() {
        config = config.with_base_url(base_url);
    }
    let console = Console::new(&config)?;

    authenticate(&console, &cli).await?;
    run(&console, cli.command).await
}

/// Logs in when credentials were given, otherwise probes for a cookie
/// session. The session credential lives in this process's cookie jar, so
/// mutating commands need `--username` (or the env vars).
async fn authenticate(console: &Console, cli: &Cli) -> anyhow::Result<()> {
    if let Some(username) = cli.username.as_deref() {
        let password = match cli.password.clone() {
            Some(password) => password,
            None => rpassword::prompt_password(format!("password for {username}: "))
                .context("failed to read password")?,
        };
        match console.session().login(username, &password).await {
            Ok(identity) => {
                eprintln!("signed in as {} ({})", identity.username, identity.role);
                Ok(())
            }
            Err(AuthError::Rejected(message)) => bail!("login rejected: {message}"),
            Err(err) => Err(err.into()),
        }
    } else {
        console.session().probe().await?;
        Ok(())
    }
}

async fn run(console: &Console, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Session => match console.session().current_identity() {
            Some(identity) => print_json(&identity),
            None => {
                eprintln!("unauthenticated");
                std::process::exit(1);
            }
        },
        Command::Logout => {
            console.logout().await?;
            eprintln!("signed out");
        }
        Command::Theme { theme } => {
            let confirmed = console.session().update_theme(&theme).await?;
            eprintln!("theme set to {confirmed}");
        }
        Command::Watch { seconds } => watch(console, seconds).await?,
        Command::Pd { command } => match command {
            PdCommand::Status => {
                let rows: Vec<gantry_proto::PdSummary> =
                    console.api().get("/api/pd/status").await?;
                print_json(&rows);
            }
            PdCommand::Enable { com_id } => {
                let echo = console
                    .perform(Mutation::TogglePd {
                        com_id,
                        enabled: true,
                    })
                    .await?;
                print_json(&echo);
            }
            PdCommand::Disable { com_id } => {
                let echo = console
                    .perform(Mutation::TogglePd {
                        com_id,
                        enabled: false,
                    })
                    .await?;
                print_json(&echo);
            }
        },
        Command::Md { command } => match command {
            MdCommand::Request { com_id } => {
                let status = console.perform(Mutation::SendMdRequest { com_id }).await?;
                print_json(&status);
            }
            MdCommand::Status { session_id } => {
                let status: gantry_proto::MdSessionStatus = console
                    .api()
                    .get(&format!("/api/md/session/{session_id}"))
                    .await?;
                if status.is_empty() {
                    bail!("no such MD session: {session_id}");
                }
                print_json(&status);
            }
        },
        Command::Dataset { command } => run_dataset(console, command).await?,
        Command::Mcast { command } => match command {
            McastCommand::Status => {
                let rows: Vec<gantry_proto::MulticastMembership> =
                    console.api().get("/api/network/multicast").await?;
                print_json(&rows);
            }
            McastCommand::Join {
                interface,
                group,
                nic,
            } => {
                let echo = console
                    .perform(Mutation::JoinMulticast {
                        interface,
                        group,
                        nic,
                    })
                    .await?;
                print_json(&echo);
            }
            McastCommand::Leave { interface, group } => {
                let echo = console
                    .perform(Mutation::LeaveMulticast { interface, group })
                    .await?;
                print_json(&echo);
            }
        },
        Command::Sim { command } => match command {
            SimCommand::State => {
                let state: gantry_proto::SimulationState =
                    console.api().get("/api/sim/state").await?;
                print_json(&state);
            }
            SimCommand::Stress {
                enabled,
                pd_cycle_us,
                pd_burst,
                md_burst,
                md_interval_us,
            } => {
                let echo = console
                    .perform(Mutation::ApplyStress(StressSettings {
                        enabled,
                        pd_cycle_us,
                        pd_burst,
                        md_burst,
                        md_interval_us,
                    }))
                    .await?;
                print_json(&echo);
            }
            SimCommand::Redundancy {
                force_switch,
                bus_failure,
                failed_channel,
            } => {
                let echo = console
                    .perform(Mutation::ApplyRedundancy(RedundancySettings {
                        force_switch,
                        bus_failure,
                        failed_channel,
                    }))
                    .await?;
                print_json(&echo);
            }
            SimCommand::Register { name, path } => {
                let echo = console
                    .perform(Mutation::RegisterInstance { name, path })
                    .await?;
                print_json(&echo);
            }
            SimCommand::Activate { name } => {
                let echo = console.perform(Mutation::ActivateInstance { name }).await?;
                print_json(&echo);
            }
        },
        Command::Time { command } => match command {
            TimeCommand::Sync => {
                let state: gantry_proto::TimeSyncStatus =
                    console.api().get("/api/time/sync").await?;
                print_json(&state);
            }
            TimeCommand::Offsets {
                ntp_offset_us,
                ptp_offset_us,
            } => {
                let echo = console
                    .perform(Mutation::ApplyTimeOffsets(TimeSyncOffsets {
                        ntp_offset_us,
                        ptp_offset_us,
                    }))
                    .await?;
                print_json(&echo);
            }
            TimeCommand::Convert {
                seconds,
                nanoseconds,
            } => {
                let converted: gantry_proto::TimeConvertResponse = console
                    .api()
                    .post(
                        "/api/time/convert",
                        &gantry_proto::TimeConvertRequest {
                            seconds,
                            nanoseconds,
                        },
                    )
                    .await?;
                print_json(&converted);
            }
        },
        Command::ConfigDetail => {
            let detail: gantry_proto::ConfigDetail =
                console.api().get("/api/config/detail").await?;
            print_json(&detail);
        }
        Command::Events {
            severity,
            since_ms,
            max,
        } => {
            let events: Vec<EventRecord> = console
                .api()
                .get(&format!("/api/diag/events?max={max}"))
                .await?;
            let filter = EventFilter {
                severity: severity.map(SeverityFilter::Only).unwrap_or_default(),
                since_ms,
            };
            for event in filter.apply(&events) {
                println!(
                    "{} [{}] {}: {}",
                    event.timestamp_ms, event.severity, event.component, event.message
                );
            }
        }
        Command::Log { max } => {
            let text = console
                .api()
                .get_text(&format!("/api/diag/log/export?max={max}"))
                .await?;
            print!("{text}");
        }
    }
    Ok(())
}

async fn run_dataset(console: &Console, command: DatasetCommand) -> anyhow::Result<()> {
    match command {
        DatasetCommand::Show { data_set_id } => {
            let snapshot: gantry_proto::DatasetSnapshot = console
                .api()
                .get(&format!("/api/datasets/{data_set_id}"))
                .await?;
            print_json(&snapshot);
        }
        DatasetCommand::Set {
            data_set_id,
            element,
            raw,
        } => {
            // Syntactic parsing only; the server validates length and range
            // and its rejection is surfaced verbatim.
            let raw: Vec<u8> = raw
                .split(',')
                .map(|part| part.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .context("raw bytes must be comma-separated u8 values")?;
            let echo = console
                .perform(Mutation::SetDatasetElement {
                    data_set_id,
                    element,
                    raw,
                })
                .await?;
            print_json(&echo);
        }
        DatasetCommand::Clear {
            data_set_id,
            element,
        } => {
            let echo = console
                .perform(Mutation::ClearDatasetElement {
                    data_set_id,
                    element,
                })
                .await?;
            print_json(&echo);
        }
        DatasetCommand::ClearAll { data_set_id } => {
            let echo = console
                .perform(Mutation::ClearDataset { data_set_id })
                .await?;
            print_json(&echo);
        }
        DatasetCommand::Lock { data_set_id } => {
            let echo = console
                .perform(Mutation::LockDataset {
                    data_set_id,
                    locked: true,
                })
                .await?;
            print_json(&echo);
        }
        DatasetCommand::Unlock { data_set_id } => {
            let echo = console
                .perform(Mutation::LockDataset {
                    data_set_id,
                    locked: false,
                })
                .await?;
            print_json(&echo);
        }
    }
    Ok(())
}

async fn watch(console: &Console, seconds: u64) -> anyhow::Result<()> {
    console.start_polling()?;

    let deadline = (seconds > 0).then(|| tokio::time::Instant::now() + Duration::from_secs(seconds));
    loop {
        let tick = tokio::time::sleep(Duration::from_secs(2));
        tokio::select! {
            _ = tick => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        print_summary(console);

        if let Some(deadline) = deadline {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
        }
    }

    console.stop_polling();
    Ok(())
}

fn print_summary(console: &Console) {
    if let Some(snapshot) = console.overview.snapshot() {
        let config = &snapshot.value.config;
        println!(
            "overview: host={} pd={} md={} datasets={}",
            config.host_name, config.pd_telegrams, config.md_telegrams, config.data_sets
        );
    } else if let Some(error) = console.overview.error() {
        println!("overview: error: {error}");
    }

    let pd_counts = console.pd.with_snapshot(|rows| {
        rows.map(|rows| (rows.len(), rows.iter().filter(|row| row.enabled).count()))
    });
    if let Some((total, enabled)) = pd_counts {
        println!("pd: {total} telegrams ({enabled} enabled)");
    } else if let Some(error) = console.pd.error() {
        println!("pd: error: {error}");
    }

    if let Some(snapshot) = console.events.snapshot() {
        if let Some(latest) = snapshot.value.first() {
            println!(
                "events: {} buffered, latest [{}] {}",
                snapshot.value.len(),
                latest.severity,
                latest.message
            );
        }
    } else if let Some(error) = console.events.error() {
        println!("events: error: {error}");
    }

    if let Some(snapshot) = console.metrics.snapshot() {
        let dead: Vec<&str> = snapshot
            .value
            .threads
            .iter()
            .filter(|(_, alive)| !**alive)
            .map(|(name, _)| name.as_str())
            .collect();
        if dead.is_empty() {
            println!("threads: all running");
        } else {
            println!("threads: DOWN {}", dead.join(", "));
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to render response: {err}"),
    }
}
