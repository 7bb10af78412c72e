use selka::config::Config;
use std::{env, process};

#[tokio::main]
async fn main() {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "selka".to_owned());
    let config_path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("Usage: {} CONFIG_FILE", program);
            process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            log::error!("Failed to read {}: {}", config_path, err);
            process::exit(1);
        }
    };

    if let Err(err) = selka::net::run(config, config_path).await {
        log::error!("Fatal: {}", err);
        process::exit(1);
    }
}
