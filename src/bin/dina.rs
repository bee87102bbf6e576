#[macro_use]
extern crate log;

use std::{env, fs::File, process};

use anyhow::{Context, Result};
use simplelog::{LevelFilter, SimpleLogger, WriteLogger};

use dina::{Config, ProcessSpawner, WindowManager, XcbConnection};

fn init_logging() -> Result<()> {
    let level = env::var("DINA_LOG")
        .ok()
        .and_then(|l| l.parse().ok())
        .unwrap_or(LevelFilter::Info);
    match env::var_os("DINA_LOG_FILE") {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("cannot open log file {}", path.to_string_lossy()))?;
            WriteLogger::init(level, simplelog::Config::default(), file)?
        }
        None => SimpleLogger::init(level, simplelog::Config::default())?,
    }
    Ok(())
}

fn run() -> Result<()> {
    init_logging()?;

    let spawner = ProcessSpawner::new()?;
    let conn = XcbConnection::new()?;
    let mut wm = WindowManager::new(&conn, &spawner, Config::default())?;
    wm.setup()?;
    let result = wm.run();
    wm.cleanup();
    info!("dina exiting");
    result
}

fn main() {
    let mut args = env::args().skip(1);
    match (args.next(), args.next()) {
        (None, _) => {}
        (Some(flag), None) if flag == "-v" => {
            println!("dina-{}", env!("CARGO_PKG_VERSION"));
            return;
        }
        _ => {
            eprintln!("usage: dina [-v]");
            process::exit(1);
        }
    }

    if let Err(e) = run() {
        eprintln!("dina: {:#}", e);
        process::exit(1);
    }
}
