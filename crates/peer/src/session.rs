use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use swarm_core::helpers::{base_name, parse_endpoint, piece_count};

use crate::entities::{FileMap, LocalFileInfo};
use crate::tracker_link::TrackerLink;
use crate::{scheduler, service, LOGGER};

/// The interactive façade over the coordinator's command surface. Most
/// lines are forwarded verbatim and the answer printed; `login`,
/// `upload_file` and `download_file` get local treatment, and `help`,
/// `quit`, `show_downloads` never leave the process.
pub struct Session {
    tracker: TrackerLink,
    files: Arc<Mutex<FileMap>>,
    peer_service_addr: SocketAddr,
    running: Arc<AtomicBool>,
    logged_in: Option<String>,
}

impl Session {
    pub fn new(
        tracker: TrackerLink,
        files: Arc<Mutex<FileMap>>,
        peer_service_addr: SocketAddr,
        running: Arc<AtomicBool>,
    ) -> Self {
        Session {
            tracker,
            files,
            peer_service_addr,
            running,
            logged_in: None,
        }
    }

    pub fn prompt(&self) -> String {
        match &self.logged_in {
            Some(user) => format!("[{}]> ", user),
            None => String::from("> "),
        }
    }

    /// Handle one input line. Returns false once the session should end.
    pub fn handle_line(&mut self, input: &str) -> bool {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return true;
        }

        match args[0] {
            "help" => {
                print_help();
                true
            }
            "show_downloads" => {
                self.show_downloads();
                true
            }
            "quit" => {
                if self.logged_in.is_some() {
                    let _ = self.tracker.send("logout");
                }
                self.shutdown();
                false
            }
            "login" => {
                // The tracker needs to know where our piece server listens.
                let message = format!("{} {}", input.trim(), self.peer_service_addr.port());
                if let Some(response) = self.forward(&message) {
                    if response.starts_with("SUCCESS") && args.len() >= 2 {
                        self.logged_in = Some(args[1].to_string());
                    }
                }
                true
            }
            "logout" => {
                if let Some(response) = self.forward(input) {
                    if response.starts_with("SUCCESS") {
                        self.logged_in = None;
                    }
                }
                true
            }
            "upload_file" => {
                self.upload(&args);
                true
            }
            "download_file" => {
                self.download(&args);
                true
            }
            _ => {
                self.forward(input);
                true
            }
        }
    }

    /// Send a command line to the tracker and print whatever comes back.
    fn forward(&mut self, message: &str) -> Option<String> {
        match self.tracker.send(message) {
            Ok(response) => {
                println!("{}", response);
                Some(response)
            }
            Err(e) => {
                LOGGER.error(format!("tracker unreachable: {}", e));
                None
            }
        }
    }

    /// Stat the file, install it locally with every piece present, then
    /// tell the tracker about it with size and piece count attached.
    fn upload(&mut self, args: &[&str]) {
        if args.len() < 3 {
            println!("ERROR: Usage: upload_file <filepath> <group_id>");
            return;
        }
        let filepath = args[1];
        let group_id = args[2];

        let file_size = match std::fs::metadata(filepath) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                println!("ERROR: File not found: {}", filepath);
                return;
            }
        };
        let num_pieces = piece_count(file_size);
        let filename = base_name(filepath).to_string();

        {
            let mut files = self.files.lock().unwrap();
            files.entry(group_id.to_string()).or_default().insert(
                filename,
                LocalFileInfo::complete(PathBuf::from(filepath), file_size),
            );
        }

        self.forward(&format!(
            "upload_file {} {} {} {}",
            filepath, group_id, file_size, num_pieces
        ));
    }

    /// Ask the tracker for sources, fan the pieces out across them, and
    /// re-register as a seeder once the copy is whole.
    fn download(&mut self, args: &[&str]) {
        if args.len() < 4 {
            println!("ERROR: Usage: download_file <group_id> <filename> <dest_path>");
            return;
        }
        let group_id = args[1];
        let filename = args[2];
        let dest = args[3];

        let response = match self
            .tracker
            .send(&format!("download_file {} {}", group_id, filename))
        {
            Ok(response) => response,
            Err(e) => {
                LOGGER.error(format!("tracker unreachable: {}", e));
                return;
            }
        };
        if !response.starts_with("PEERS:") {
            println!("{}", response);
            return;
        }
        let Some((candidates, file_size, num_pieces)) = parse_peers_response(&response) else {
            println!("ERROR: Malformed tracker response");
            return;
        };
        if candidates.is_empty() && num_pieces > 0 {
            println!("ERROR: No peers available");
            return;
        }

        match scheduler::download_file(
            group_id,
            filename,
            Path::new(dest),
            &candidates,
            file_size,
            num_pieces,
        ) {
            Ok(done) => {
                let complete = done.iter().all(|bit| *bit);
                if complete || done.iter().any(|bit| *bit) {
                    // Record honestly which pieces made it, so the piece
                    // server only offers what is really on disk.
                    let mut files = self.files.lock().unwrap();
                    files.entry(group_id.to_string()).or_default().insert(
                        filename.to_string(),
                        LocalFileInfo::with_pieces(PathBuf::from(dest), file_size, done.clone()),
                    );
                }
                if complete {
                    match self
                        .tracker
                        .send(&format!("update_seeder {} {}", group_id, filename))
                    {
                        Ok(reply) => LOGGER.debug(format!("update_seeder -> {}", reply)),
                        Err(e) => LOGGER.error(format!("update_seeder failed: {}", e)),
                    }
                    println!("SUCCESS: File downloaded to {}", dest);
                } else {
                    let missing = done.iter().filter(|bit| !**bit).count();
                    println!("ERROR: Download incomplete, {} pieces missing", missing);
                }
            }
            Err(e) => {
                println!("ERROR: Download failed: {}", e);
            }
        }
    }

    fn show_downloads(&self) {
        let files = self.files.lock().unwrap();
        println!("\n=== LOCAL FILES ===");
        for (group_id, group_files) in files.iter() {
            println!("Group: {}", group_id);
            for (filename, info) in group_files {
                let held = info.bit_vector.iter().filter(|bit| **bit).count();
                println!(
                    "  - {} ({} bytes, {}/{} pieces)",
                    filename, info.file_size, held, info.num_pieces
                );
            }
        }
        println!("==================\n");
    }

    /// Stop the piece server too: clear the flag, then dial the listener so
    /// its accept returns right away.
    fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        service::wake_acceptor(self.peer_service_addr);
    }
}

/// Parse `PEERS: ip:port ... SIZE:<n> PIECES:<n>`. Tokens that look like
/// neither an endpoint nor a size are skipped.
pub fn parse_peers_response(response: &str) -> Option<(Vec<SocketAddr>, u64, u32)> {
    let mut peers = Vec::new();
    let mut file_size: Option<u64> = None;
    let mut num_pieces: Option<u32> = None;

    for token in response.split_whitespace() {
        if token == "PEERS:" {
            continue;
        } else if let Some(rest) = token.strip_prefix("SIZE:") {
            file_size = rest.parse().ok();
        } else if let Some(rest) = token.strip_prefix("PIECES:") {
            num_pieces = rest.parse().ok();
        } else if let Ok(addr) = parse_endpoint(token) {
            peers.push(addr);
        }
    }
    Some((peers, file_size?, num_pieces?))
}

pub fn print_help() {
    println!("\n========== AVAILABLE COMMANDS ==========");
    println!("create_user <user_id> <password>         - Register new user");
    println!("login <user_id> <password>               - Login");
    println!("logout                                   - Logout");
    println!("create_group <group_id>                  - Create a new group");
    println!("join_group <group_id>                    - Request to join group");
    println!("leave_group <group_id>                   - Leave a group");
    println!("list_groups                              - List all groups");
    println!("list_requests <group_id>                 - List pending requests (owner)");
    println!("accept_request <group_id> <user_id>      - Accept join request (owner)");
    println!("upload_file <filepath> <group_id>        - Share file with group");
    println!("list_files <group_id>                    - List files in group");
    println!("download_file <group_id> <filename> <dest> - Download file");
    println!("show_downloads                           - Show local files");
    println!("help                                     - Show this help");
    println!("quit                                     - Exit client");
    println!("=========================================\n");
}
