use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use swarm_core::utils::Logger;

pub mod entities;

use entities::{Command, Registry};

pub static LOGGER: Logger = Logger::verbose("Tracker");

/// Serve one client connection until it closes or sends `quit`.
///
/// The acting user is resolved per command from the connection's source
/// address plus the peer-service port the most recent `login` on this
/// connection advertised. Dropping the connection does not log anyone out,
/// a peer can re-dial and carry on with its session.
pub fn handle_connection(stream: TcpStream, registry: Arc<Mutex<Registry>>) -> io::Result<()> {
    let peer_ip = stream.peer_addr()?.ip().to_string();
    LOGGER.info(format!("client connected from {}", peer_ip));

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut advertised_port: Option<u16> = None;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            LOGGER.info(format!("client {} disconnected", peer_ip));
            break;
        }
        let request = line.trim();
        LOGGER.debug(format!("{} -> {}", peer_ip, request));

        let command = match Command::parse(request) {
            Ok(command) => command,
            Err(response) => {
                writer.write_all(response.as_bytes())?;
                continue;
            }
        };
        if let Command::Login { port, .. } = &command {
            advertised_port = Some(*port);
        }

        let mut registry = registry.lock().unwrap();
        let caller = registry.find_user_by_address(&peer_ip, advertised_port);
        let caller = caller.as_deref();

        let response = match command {
            Command::CreateUser { user_id, password } => {
                registry.create_user(&user_id, &password)
            }
            Command::Login {
                user_id,
                password,
                port,
            } => registry.login(&user_id, &password, &peer_ip, port),
            Command::Logout => registry.logout(caller),
            Command::CreateGroup { group_id } => registry.create_group(caller, &group_id),
            Command::JoinGroup { group_id } => registry.join_group(caller, &group_id),
            Command::LeaveGroup { group_id } => registry.leave_group(caller, &group_id),
            Command::ListGroups => registry.list_groups(caller),
            Command::ListRequests { group_id } => registry.list_requests(caller, &group_id),
            Command::AcceptRequest { group_id, user_id } => {
                registry.accept_request(caller, &group_id, &user_id)
            }
            Command::UploadFile {
                filepath,
                group_id,
                file_size,
                num_pieces,
            } => registry.upload_file(caller, &filepath, &group_id, file_size, num_pieces),
            Command::ListFiles { group_id } => registry.list_files(caller, &group_id),
            Command::DownloadFile { group_id, filename } => {
                registry.download_file(caller, &group_id, &filename)
            }
            Command::UpdateSeeder { group_id, filename } => {
                registry.update_seeder(caller, &group_id, &filename)
            }
            Command::Quit => {
                if caller.is_some() {
                    registry.logout(caller);
                }
                drop(registry);
                writer.write_all(b"BYE")?;
                LOGGER.info(format!("client {} quit", peer_ip));
                return Ok(());
            }
        };
        drop(registry);

        writer.write_all(response.as_bytes())?;
    }

    Ok(())
}

/// Accept loop. One thread per client, all of them sharing the registry
/// behind a single mutex.
pub fn serve(listener: TcpListener, registry: Arc<Mutex<Registry>>) -> io::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let registry = registry.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, registry) {
                        LOGGER.error(format!("client handler failed: {}", e));
                    }
                });
            }
            Err(e) => {
                LOGGER.error(e);
            }
        }
    }
    Ok(())
}

//////////////////
/// TESTS
/////////////////


#[cfg(test)] //Functional tests
mod func_tests {
    use std::io::Read;
    use std::net::SocketAddr;

    use swarm_config::{BUFFER_SIZE, LOCALHOST};
    use swarm_core::helpers::create_buffer;

    use super::*;

    fn start_tracker() -> SocketAddr {
        let listener = TcpListener::bind((LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        let registry = Arc::new(Mutex::new(Registry::new()));
        thread::spawn(move || {
            serve(listener, registry).unwrap();
        });
        addr
    }

    fn send(stream: &mut TcpStream, request: &str) -> String {
        stream
            .write_all(format!("{}\n", request).as_bytes())
            .unwrap();
        let mut buf = create_buffer(BUFFER_SIZE);
        let size = stream.read(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..size]).into_owned()
    }

    #[test]
    fn test_register_login_and_list_over_socket() {
        let addr = start_tracker();
        let mut stream = TcpStream::connect(addr).unwrap();

        assert_eq!(
            send(&mut stream, "create_user carol pw"),
            "SUCCESS: User registered successfully"
        );
        assert_eq!(
            send(&mut stream, "login carol pw 7001"),
            "SUCCESS: Login successful"
        );
        assert_eq!(
            send(&mut stream, "create_group demo"),
            "SUCCESS: Group created successfully"
        );
        assert_eq!(
            send(&mut stream, "list_groups"),
            "GROUPS:\ndemo (Owner: carol, Members: 1)\n"
        );
    }

    #[test]
    fn test_session_survives_reconnect() {
        let addr = start_tracker();

        let mut first = TcpStream::connect(addr).unwrap();
        send(&mut first, "create_user dave pw");
        assert_eq!(send(&mut first, "login dave pw 7002"), "SUCCESS: Login successful");
        drop(first);

        // A fresh connection from the same address finds the session again,
        // no re-login needed.
        let mut second = TcpStream::connect(addr).unwrap();
        assert_eq!(send(&mut second, "list_groups"), "No groups available");
        assert_eq!(
            send(&mut second, "login dave pw 7002"),
            "ERROR: User already logged in"
        );
    }

    #[test]
    fn test_quit_replies_bye_and_logs_out() {
        let addr = start_tracker();

        let mut stream = TcpStream::connect(addr).unwrap();
        send(&mut stream, "create_user erin pw");
        send(&mut stream, "login erin pw 7003");
        assert_eq!(send(&mut stream, "quit"), "BYE");
        drop(stream);

        let mut next = TcpStream::connect(addr).unwrap();
        assert_eq!(send(&mut next, "list_groups"), "ERROR: Please login first");
    }

    #[test]
    fn test_malformed_commands_keep_session_alive() {
        let addr = start_tracker();
        let mut stream = TcpStream::connect(addr).unwrap();

        assert_eq!(send(&mut stream, "nonsense"), "ERROR: Unknown command");
        assert_eq!(
            send(&mut stream, "create_user onlyname"),
            "ERROR: Usage: create_user <user_id> <password>"
        );
        assert_eq!(
            send(&mut stream, "create_user frank pw"),
            "SUCCESS: User registered successfully"
        );
    }
}
