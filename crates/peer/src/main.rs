use std::io::{self, BufRead, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;

use clap::{Arg, Command};
use swarm_core::helpers::{parse_endpoint, read_tracker_line};
use swarm_peer::entities::FileMap;
use swarm_peer::session::{print_help, Session};
use swarm_peer::tracker_link::TrackerLink;
use swarm_peer::{service, LOGGER};

fn create_command() -> Command {
    Command::new("swarm-peer")
        .about("Swarm peer: serves pieces and downloads files in parallel")
        .arg(
            Arg::new("LISTEN_ADDR")
                .help("ip:port this peer's piece server binds")
                .required(true)
                .value_name("IP:PORT"),
        )
        .arg(
            Arg::new("TRACKERS_FILE")
                .help("File whose first line is the coordinator endpoint")
                .required(true)
                .value_name("PATH"),
        )
}

fn main() {
    let matches = create_command().try_get_matches().unwrap_or_else(|e| {
        let _ = e.print();
        process::exit(1);
    });

    let listen_addr = match parse_endpoint(matches.get_one::<String>("LISTEN_ADDR").unwrap()) {
        Ok(addr) => addr,
        Err(e) => {
            LOGGER.error(e);
            process::exit(1);
        }
    };
    let trackers_file = PathBuf::from(matches.get_one::<String>("TRACKERS_FILE").unwrap());
    let tracker_addr = match read_tracker_line(&trackers_file, 1) {
        Ok(addr) => addr,
        Err(e) => {
            LOGGER.error(format!("cannot resolve tracker endpoint: {}", e));
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(listen_addr) {
        Ok(listener) => listener,
        Err(e) => {
            LOGGER.error(format!("cannot bind {}: {}", listen_addr, e));
            process::exit(1);
        }
    };
    LOGGER.info(format!(
        "piece server on {}, tracker at {}",
        listen_addr, tracker_addr
    ));

    let files: Arc<Mutex<FileMap>> = Arc::new(Mutex::new(FileMap::new()));
    let running = Arc::new(AtomicBool::new(true));

    let service_files = files.clone();
    let service_running = running.clone();
    let service_thread = thread::spawn(move || {
        if let Err(e) = service::serve_peers(listener, service_files, service_running) {
            LOGGER.error(format!("piece server stopped: {}", e));
        }
    });

    let mut session = Session::new(
        TrackerLink::new(tracker_addr),
        files,
        listen_addr,
        running.clone(),
    );

    print_help();
    let mut stdin = io::stdin().lock();
    loop {
        print!("{}", session.prompt());
        let _ = io::stdout().flush();

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            // End of input behaves like quit.
            Ok(0) => {
                session.handle_line("quit");
                break;
            }
            Ok(_) => {
                if !session.handle_line(input.trim()) {
                    break;
                }
            }
            Err(e) => {
                LOGGER.error(e);
                session.handle_line("quit");
                break;
            }
        }
    }

    // Outstanding transfers drain on their own threads; the accept loop has
    // already been woken and exits.
    let _ = service_thread.join();
    LOGGER.info("goodbye");
}
