use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leaven_ipc::{Command, IpcError, Preset, PresetSummary, Response, Snapshot};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "leavenctl")]
#[command(about = "Control the leaven fermentation timer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the current stage
    Start,
    /// Pause the countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Reset the current stage, or the whole run with --all
    Reset {
        #[arg(short, long)]
        all: bool,
    },
    /// Move on to the next stage
    Next,
    /// Show timer status
    Status,
    /// List available presets
    Presets,
    /// Load a preset by id
    Select { id: String },
    /// Manage custom presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// Add or update a custom preset from a TOML file
    Add { file: PathBuf },
    /// Remove a custom preset
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Start => Command::Start,
        Commands::Pause => Command::Pause,
        Commands::Resume => Command::Resume,
        Commands::Reset { all: false } => Command::ResetStage,
        Commands::Reset { all: true } => Command::ResetAll,
        Commands::Next => Command::NextStage,
        Commands::Status => Command::Status,
        Commands::Presets => Command::ListPresets,
        Commands::Select { id } => Command::SelectPreset { id },
        Commands::Preset {
            action: PresetAction::Add { file },
        } => Command::SavePreset {
            preset: read_preset(&file)?,
        },
        Commands::Preset {
            action: PresetAction::Remove { id },
        } => Command::DeletePreset { id },
    };

    match send_command(command).await? {
        Response::Ok => println!("OK"),
        Response::Status(snapshot) => print_status(&snapshot),
        Response::Presets(presets) => print_presets(&presets),
        Response::Error(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn read_preset(path: &Path) -> Result<Preset> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read preset file {:?}", path))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse preset file {:?}", path))
}

async fn send_command(cmd: Command) -> Result<Response, IpcError> {
    let mut stream = match UnixStream::connect(leaven_ipc::socket_path()).await {
        Ok(stream) => stream,
        Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
            return Err(IpcError::ConnectionRefused)
        }
        Err(e) => return Err(e.into()),
    };

    let mut json = serde_json::to_string(&cmd)?;
    json.push('\n');
    stream.write_all(json.as_bytes()).await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Err(IpcError::EmptyResponse);
    }

    Ok(serde_json::from_slice(&buf)?)
}

fn format_time(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

fn print_status(s: &Snapshot) {
    println!("Preset:    {}", s.sequence_name);
    println!("State:     {}", s.status.label());
    match (s.current_index, &s.stage_name) {
        (Some(i), Some(name)) => println!("Stage:     {}/{} {}", i + 1, s.stage_count, name),
        _ => println!("Stage:     -"),
    }
    println!(
        "Remaining: {} of {}",
        format_time(s.remaining_secs),
        format_time(s.stage_duration_secs)
    );
    println!(
        "Progress:  {:.0}% stage, {:.0}% total",
        s.stage_progress * 100.0,
        s.total_progress * 100.0
    );
}

fn print_presets(presets: &[PresetSummary]) {
    for p in presets {
        let marker = if p.selected { ">" } else { " " };
        let custom = if p.is_custom { " ★" } else { "" };
        println!(
            "{} {} {:<20} {:<28} {} stages, {}h{:02}m{}",
            marker,
            p.emoji,
            p.id,
            p.name,
            p.stage_count,
            p.total_minutes / 60,
            p.total_minutes % 60,
            custom
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_are_clock_style() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(90), "01:30");
        assert_eq!(format_time(3 * 3600 + 5), "3:00:05");
    }

    #[test]
    fn preset_files_use_minutes() {
        let preset: Preset = toml::from_str(
            r#"
            name = "Overnight rye"

            [[stages]]
            id = "first_rise"
            name = "Bulk"
            duration_minutes = 720

            [[stages]]
            id = "bake"
            name = "Bake"
            duration_minutes = 45
            "#,
        )
        .unwrap();
        assert!(preset.id.is_empty());
        assert_eq!(preset.stages[0].duration_secs, 720 * 60);
        assert_eq!(preset.stages.len(), 2);
    }

    #[test]
    fn reset_flag_picks_command() {
        let cli = Cli::try_parse_from(["leavenctl", "reset", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::Reset { all: true }));
        let cli = Cli::try_parse_from(["leavenctl", "preset", "remove", "custom-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Preset { action: PresetAction::Remove { .. } }
        ));
    }
}
