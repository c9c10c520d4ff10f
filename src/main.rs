use anyhow::{Context, Result, bail};
use crossbeam::channel;
use rhythm_detective::audio::open_tone_sink;
use rhythm_detective::game::{ChannelListener, CompletionEvent, CompletionNotifier, JsonLinesListener};
use rhythm_detective::ui::TerminalUI;
use rhythm_detective::{GameConfig, Session};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

fn print_help() {
    println!("Rhythm Detective - copy the beat, solve the rhythm mystery");
    println!();
    println!("USAGE:");
    println!("    rhythm-detective [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help          Print this help message");
    println!("    --debug             Write debug logging to debug.log");
    println!("    --mute              Play without sound");
    println!("    --config <path>     Load settings from a TOML file");
    println!("    --events <path>     Append the completion result to a JSON lines file");
    println!();
    println!("CONTROLS:");
    println!("    Enter  Start the mission");
    println!("    C / ←  Clap");
    println!("    S / →  Stamp");
    println!("    R      Reset your input");
    println!("    P      Play the pattern again");
    println!("    M      Simon Says mode (after 3 patterns)");
    println!("    F      Complete the activity (after all 5 patterns)");
    println!("    Q      Quit");
    println!();
    println!("EXAMPLES:");
    println!("    rhythm-detective                          # Start with default settings");
    println!("    rhythm-detective --mute --debug           # Silent, with debug logging");
    println!("    rhythm-detective --events results.jsonl   # Record the final result");
}

struct CliArgs {
    debug: bool,
    mute: bool,
    config_path: Option<PathBuf>,
    events_path: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut cli = CliArgs {
        debug: false,
        mute: false,
        config_path: None,
        events_path: None,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" => cli.debug = true,
            "--mute" => cli.mute = true,
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                cli.config_path = Some(PathBuf::from(path));
            }
            "--events" => {
                let path = iter.next().context("--events needs a path")?;
                cli.events_path = Some(PathBuf::from(path));
            }
            other => bail!("unknown argument: {} (try --help)", other),
        }
    }

    Ok(cli)
}

fn init_logging() -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .context("opening debug.log")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rhythm_detective=debug".into()),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_help();
        return Ok(());
    }

    let cli = parse_args(&args)?;

    if cli.debug {
        init_logging()?;
        println!("Starting Rhythm Detective in DEBUG mode...");
    } else {
        println!("Starting Rhythm Detective...");
    }

    let config = match &cli.config_path {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };

    let (tones, output_device_name) =
        open_tone_sink(config.audio.enabled && !cli.mute, config.tones.volume);

    // The UI hears about completion through the channel; a host file is optional
    let (completion_sender, completion_receiver) = channel::unbounded::<CompletionEvent>();
    let mut notifier = CompletionNotifier::new().with_listener(ChannelListener::new(completion_sender));

    if let Some(path) = cli.events_path.or(config.completion.events_path.clone()) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening events file {}", path.display()))?;
        notifier.register(JsonLinesListener::new(file));
    }

    let session = Session::new(&config, tones, notifier);

    let mut ui = TerminalUI::new(session, completion_receiver, output_device_name.as_deref())
        .map_err(|e| anyhow::anyhow!("UI creation failed: {}", e))?;
    ui.run()
        .map_err(|e| anyhow::anyhow!("UI run failed: {}", e))?;
    drop(ui);

    println!("Rhythm Detective stopped.");
    Ok(())
}
