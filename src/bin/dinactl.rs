use std::{env, process};

use anyhow::{anyhow, Context, Result};
use simplelog::{LevelFilter, SimpleLogger};

use dina::ipc::IpcClient;

fn run() -> Result<String> {
    let level = env::var("DINA_LOG")
        .ok()
        .and_then(|l| l.parse().ok())
        .unwrap_or(LevelFilter::Warn);
    SimpleLogger::init(level, simplelog::Config::default())?;

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return Err(anyhow!(
            "usage: dinactl <bindkey|unbindkey|mode|list_bindings|quit> [args...]"
        ));
    }

    let ipc = IpcClient::new().context("Failed to init ipc client")?;
    ipc.send_command(&args.join(" "))
        .context("Failed to send command to wm")?;
    ipc.get_reply()
}

fn main() {
    match run() {
        Ok(reply) => println!("{}", reply.trim_end()),
        Err(e) => {
            eprintln!("dinactl: {:#}", e);
            process::exit(1);
        }
    }
}
