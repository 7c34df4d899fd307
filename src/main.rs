use clap::Parser;
use colored::*;
use crossbeam_channel::{bounded, select};
use env_logger::{Builder, Env, Target};
use log::info;
use searchables::cli::{Cli, Commands};
use searchables::config::{Config, LoggingConfig};
use searchables::{
    ChannelAnnouncer, EntryKey, Result, SearchManagerService, SearchableEntry, SearchablesError,
    manifest_service,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    setup_logging(&cli, &config.logging)?;

    let dir = cli
        .dir
        .clone()
        .or_else(|| config.service.manifest_dir.clone())
        .ok_or_else(|| {
            SearchablesError::Config(
                "no manifest directory, pass --dir or set service.manifest_dir".to_string(),
            )
        })?;

    if let Commands::Watch {
        debounce_ms: Some(ms),
    } = &cli.command
    {
        config.service.debounce_ms = *ms;
    }

    let announcer = Arc::new(ChannelAnnouncer::new());
    let service = manifest_service(&dir, &config.service, announcer.clone());
    info!("Using manifest directory {}", dir.display());

    match &cli.command {
        Commands::List { global, web } => {
            let entries = service.list_entries(|entry| {
                (!*global || entry.include_in_global_search) && (!*web || entry.handles_web_search)
            })?;
            if entries.is_empty() {
                println!("{}", "No searchables found".yellow());
            }
            for entry in &entries {
                print_entry(entry);
            }
            println!("\n{} {}", "Summary:".green(), entries.len());
        }
        Commands::Show { key } => {
            let key: EntryKey = key.parse()?;
            match service.get_entry_by_key(Some(&key))? {
                Some(entry) => print_entry(&entry),
                None => println!("{} {}", key, "not found".yellow()),
            }
        }
        Commands::Default { set } => {
            if let Some(key) = set {
                service.set_default_entry(&key.parse()?)?;
            }
            match service.get_default_entry()? {
                Some(entry) => print_entry(&entry),
                None => println!("{}", "No default searchable".yellow()),
            }
        }
        Commands::Watch { .. } => watch(&service, &announcer)?,
    }

    service.shutdown()
}

fn watch(service: &SearchManagerService, announcer: &ChannelAnnouncer) -> Result<()> {
    let changes = announcer.listen();
    let (stop_tx, stop_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| SearchablesError::Other(e.to_string()))?;

    service.ensure_initialized()?;
    println!(
        "{} {} searchables, waiting for changes (debounce {:?}, Ctrl-C to stop)",
        "Watching:".green(),
        service.list_entries(|_| true)?.len(),
        service.debounce()
    );

    loop {
        let stop = select! {
            recv(changes) -> announcement => match announcement {
                Ok(announcement) => {
                    println!(
                        "[{}] {} ({} entries)",
                        chrono::Local::now().format("%H:%M:%S"),
                        announcement.to_string().cyan(),
                        service.list_entries(|_| true)?.len()
                    );
                    false
                }
                Err(_) => true,
            },
            recv(stop_rx) -> _ => true,
        };
        if stop {
            break;
        }
    }

    println!("{}", service.metrics().gather()?);
    Ok(())
}

fn print_entry(entry: &SearchableEntry) {
    let mut flags = Vec::new();
    if entry.include_in_global_search {
        flags.push("global");
    }
    if entry.handles_web_search {
        flags.push("web");
    }
    if entry.voice_search {
        flags.push("voice");
    }
    println!(
        "{}  {}  [{}]",
        entry.key.to_string().bold(),
        entry.label,
        flags.join(",")
    );
    if let Some(authority) = &entry.suggest_authority {
        println!("    suggest: {}", authority);
    }
}

fn setup_logging(cli: &Cli, logging: &LoggingConfig) -> Result<()> {
    let level = if cli.verbose { "debug" } else { logging.level.as_str() };
    let mut builder = Builder::from_env(Env::default().default_filter_or(level));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    let log_path: Option<PathBuf> = cli.log.clone().or_else(|| logging.file.clone());
    if let Some(log_path) = log_path {
        if let Some(parent_dir) = log_path.parent()
            && !parent_dir.as_os_str().is_empty()
            && !parent_dir.exists()
        {
            fs::create_dir_all(parent_dir)?;
        }
        let log_file = fs::File::create(&log_path)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| SearchablesError::Other(e.to_string()))?;
    Ok(())
}
