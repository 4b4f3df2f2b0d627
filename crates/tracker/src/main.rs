use std::net::TcpListener;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

use clap::{Arg, Command};
use swarm_core::helpers::read_tracker_line;
use swarm_tracker::entities::Registry;
use swarm_tracker::{serve, LOGGER};

fn create_command() -> Command {
    Command::new("swarm-tracker")
        .about("Swarm coordinator: users, groups, file placement, seeders")
        .arg(
            Arg::new("TRACKERS_FILE")
                .help("File listing tracker endpoints, one ip:port per line")
                .required(true)
                .value_name("PATH"),
        )
        .arg(
            Arg::new("ORDINAL")
                .help("1-based line of TRACKERS_FILE holding this tracker's endpoint")
                .required(true)
                .value_name("N"),
        )
}

fn main() {
    let matches = create_command().try_get_matches().unwrap_or_else(|e| {
        let _ = e.print();
        process::exit(1);
    });

    let trackers_file = PathBuf::from(matches.get_one::<String>("TRACKERS_FILE").unwrap());
    let ordinal: usize = match matches.get_one::<String>("ORDINAL").unwrap().parse() {
        Ok(n) => n,
        Err(_) => {
            LOGGER.error("tracker ordinal must be a number");
            process::exit(1);
        }
    };

    let addr = match read_tracker_line(&trackers_file, ordinal) {
        Ok(addr) => addr,
        Err(e) => {
            LOGGER.error(format!("cannot resolve own endpoint: {}", e));
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(addr) {
        Ok(listener) => listener,
        Err(e) => {
            LOGGER.error(format!("cannot bind {}: {}", addr, e));
            process::exit(1);
        }
    };
    LOGGER.info(format!("listening on {}", addr));

    let registry = Arc::new(Mutex::new(Registry::new()));
    if let Err(e) = serve(listener, registry) {
        LOGGER.error(e);
        process::exit(1);
    }
}
