use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;
use prism_core::{
    ConfigManager, ConsoleCommand, ConsoleEvent, CueId, CuelistId, LightingConsole, Settings,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

mod demo;

/// Realtime lighting playback with sACN output.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(about = "Prism lighting playback engine")]
struct Args {
    /// Settings file (default: ~/.prism/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show file to load instead of the demo show
    #[arg(long)]
    show: Option<PathBuf>,

    /// Local IPv4 address to send sACN from
    #[arg(long, value_parser = parse_ip)]
    interface: Option<Ipv4Addr>,

    /// sACN priority (0-200)
    #[arg(long)]
    priority: Option<u8>,

    /// Render ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Render without sending anything
    #[arg(long, default_value = "false")]
    no_output: bool,
}

fn parse_ip(s: &str) -> Result<Ipv4Addr, String> {
    s.parse().map_err(|e| format!("Invalid IPv4 address: {}", e))
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".prism")
        .join("config.json")
}

/// Command line flags win over the settings file. Nothing here is written back.
fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(show) = &args.show {
        settings.show_file = Some(show.clone());
    }
    if let Some(interface) = args.interface {
        settings.sacn_interface = Some(interface.to_string());
    }
    if let Some(priority) = args.priority {
        settings.sacn_priority = priority;
    }
    if let Some(tick_rate) = args.tick_rate {
        settings.tick_rate_hz = tick_rate;
    }
    if args.no_output {
        settings.sacn_enabled = false;
    }
}

/// `go 1`, `back 1`, `goto 1 3`, `release 1`, `skip 1`, `priority 150`, `rate 30`, `save`, `quit`
fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, anyhow::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, rest)) = words.split_first() else {
        return Ok(None);
    };

    let number = |idx: usize| -> Result<u32, anyhow::Error> {
        let word = rest
            .get(idx)
            .ok_or_else(|| anyhow::anyhow!("{}: missing argument", verb))?;
        word.parse()
            .map_err(|e| anyhow::anyhow!("{}: bad number {:?}: {}", verb, word, e))
    };
    let cuelist = || number(0).map(CuelistId);

    let command = match verb {
        "go" => ConsoleCommand::Go {
            cuelist: cuelist()?,
        },
        "back" => ConsoleCommand::Back {
            cuelist: cuelist()?,
        },
        "goto" => ConsoleCommand::GoToCue {
            cuelist: cuelist()?,
            cue: CueId(number(1)?),
        },
        "release" => ConsoleCommand::Release {
            cuelist: cuelist()?,
        },
        "skip" => ConsoleCommand::SkipFade {
            cuelist: cuelist()?,
        },
        "priority" => ConsoleCommand::SetSacnPriority {
            priority: u8::try_from(number(0)?)?,
        },
        "rate" => {
            let word = rest
                .first()
                .ok_or_else(|| anyhow::anyhow!("rate: missing argument"))?;
            ConsoleCommand::SetTickRate {
                rate: word
                    .parse()
                    .map_err(|e| anyhow::anyhow!("rate: bad number {:?}: {}", word, e))?,
            }
        }
        "save" => ConsoleCommand::SaveShow,
        "quit" | "exit" => ConsoleCommand::Shutdown,
        _ => anyhow::bail!("Unknown command {:?}", verb),
    };
    Ok(Some(command))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config_manager =
        ConfigManager::new(Some(args.config.clone().unwrap_or_else(default_config_path)));
    let mut settings = config_manager.load()?;
    apply_overrides(&mut settings, &args);
    ConfigManager::validate_settings(&settings)
        .map_err(|errors| anyhow::anyhow!("Invalid settings: {}", errors.join(", ")))?;

    let network_config = ConfigManager::network_config(&settings)?;
    log::info!("sACN output: {}", network_config.describe());

    let show_file = settings.show_file.clone();
    let mut console = LightingConsole::with_show(demo::demo_show()?, settings, network_config)?;
    if let Some(path) = show_file {
        let name = console.load_show(&path)?;
        log::info!("Loaded show \"{}\"", name);
    } else {
        log::info!("No show file given, running the demo show");
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let console_handle = tokio::spawn(console.run_with_channels(command_rx, event_tx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                let _ = command_tx.send(ConsoleCommand::Shutdown);
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match parse_command(&line) {
                        Ok(Some(command)) => {
                            let _ = command_tx.send(command);
                        }
                        Ok(None) => {}
                        Err(e) => log::warn!("{}", e),
                    },
                    // Keep running headless once input is gone
                    Ok(None) | Err(_) => stdin_open = false,
                }
            }

            event = event_rx.recv() => {
                match event {
                    Some(ConsoleEvent::ShutdownComplete) | None => break,
                    Some(ConsoleEvent::Error { message }) => log::error!("{}", message),
                    Some(event) => log::info!("{:?}", event),
                }
            }
        }
    }

    console_handle.await??;
    Ok(())
}
