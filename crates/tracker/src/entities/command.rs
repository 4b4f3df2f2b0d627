#[derive(Debug, PartialEq)]
/// One parsed request line on the coordinator command surface.
pub enum Command {
    CreateUser {
        user_id: String,
        password: String,
    },
    Login {
        user_id: String,
        password: String,
        port: u16,
    },
    Logout,
    CreateGroup {
        group_id: String,
    },
    JoinGroup {
        group_id: String,
    },
    LeaveGroup {
        group_id: String,
    },
    ListGroups,
    ListRequests {
        group_id: String,
    },
    AcceptRequest {
        group_id: String,
        user_id: String,
    },
    UploadFile {
        filepath: String,
        group_id: String,
        file_size: u64,
        num_pieces: u32,
    },
    ListFiles {
        group_id: String,
    },
    DownloadFile {
        group_id: String,
        filename: String,
    },
    UpdateSeeder {
        group_id: String,
        filename: String,
    },
    Quit,
}

impl Command {
    /// Parse one request line. The Err side carries the exact response text
    /// to send back, usage lines included.
    pub fn parse(line: &str) -> Result<Command, String> {
        let args: Vec<&str> = line.split_whitespace().collect();
        if args.is_empty() {
            return Err(String::from("ERROR: Empty command"));
        }

        match args[0] {
            "create_user" => {
                if args.len() < 3 {
                    return Err(String::from("ERROR: Usage: create_user <user_id> <password>"));
                }
                Ok(Command::CreateUser {
                    user_id: args[1].to_string(),
                    password: args[2].to_string(),
                })
            }
            "login" => {
                // The peer appends its peer-service port before forwarding,
                // so the port never shows up in the usage line.
                let usage = || String::from("ERROR: Usage: login <user_id> <password>");
                if args.len() < 4 {
                    return Err(usage());
                }
                let port: u16 = args[3].parse().map_err(|_| usage())?;
                Ok(Command::Login {
                    user_id: args[1].to_string(),
                    password: args[2].to_string(),
                    port,
                })
            }
            "logout" => Ok(Command::Logout),
            "create_group" => {
                if args.len() < 2 {
                    return Err(String::from("ERROR: Usage: create_group <group_id>"));
                }
                Ok(Command::CreateGroup {
                    group_id: args[1].to_string(),
                })
            }
            "join_group" => {
                if args.len() < 2 {
                    return Err(String::from("ERROR: Usage: join_group <group_id>"));
                }
                Ok(Command::JoinGroup {
                    group_id: args[1].to_string(),
                })
            }
            "leave_group" => {
                if args.len() < 2 {
                    return Err(String::from("ERROR: Usage: leave_group <group_id>"));
                }
                Ok(Command::LeaveGroup {
                    group_id: args[1].to_string(),
                })
            }
            "list_groups" => Ok(Command::ListGroups),
            "list_requests" => {
                if args.len() < 2 {
                    return Err(String::from("ERROR: Usage: list_requests <group_id>"));
                }
                Ok(Command::ListRequests {
                    group_id: args[1].to_string(),
                })
            }
            "accept_request" => {
                if args.len() < 3 {
                    return Err(String::from(
                        "ERROR: Usage: accept_request <group_id> <user_id>",
                    ));
                }
                Ok(Command::AcceptRequest {
                    group_id: args[1].to_string(),
                    user_id: args[2].to_string(),
                })
            }
            "upload_file" => {
                let usage = || {
                    String::from(
                        "ERROR: Usage: upload_file <filepath> <group_id> <file_size> <num_pieces>",
                    )
                };
                if args.len() < 5 {
                    return Err(usage());
                }
                let file_size: u64 = args[3].parse().map_err(|_| usage())?;
                let num_pieces: u32 = args[4].parse().map_err(|_| usage())?;
                Ok(Command::UploadFile {
                    filepath: args[1].to_string(),
                    group_id: args[2].to_string(),
                    file_size,
                    num_pieces,
                })
            }
            "list_files" => {
                if args.len() < 2 {
                    return Err(String::from("ERROR: Usage: list_files <group_id>"));
                }
                Ok(Command::ListFiles {
                    group_id: args[1].to_string(),
                })
            }
            "download_file" => {
                if args.len() < 3 {
                    return Err(String::from(
                        "ERROR: Usage: download_file <group_id> <filename>",
                    ));
                }
                Ok(Command::DownloadFile {
                    group_id: args[1].to_string(),
                    filename: args[2].to_string(),
                })
            }
            "update_seeder" => {
                if args.len() < 3 {
                    return Err(String::from(
                        "ERROR: Usage: update_seeder <group_id> <filename>",
                    ));
                }
                Ok(Command::UpdateSeeder {
                    group_id: args[1].to_string(),
                    filename: args[2].to_string(),
                })
            }
            "quit" => Ok(Command::Quit),
            _ => Err(String::from("ERROR: Unknown command")),
        }
    }
}
