use std::collections::BTreeMap;

#[derive(Debug, Default)]
/// One registered user. The record persists for the process lifetime;
/// session state toggles with login and logout.
pub struct UserInfo {
    pub password: String,
    /// Source address recorded at login, empty while logged out.
    pub ip: String,
    /// Peer-service port advertised by the login command.
    pub port: u16,
    pub is_active: bool,
    // group_id -> files this user has published there
    pub group_files: BTreeMap<String, Vec<String>>,
}

impl UserInfo {
    pub fn new(password: String) -> Self {
        UserInfo {
            password,
            ..Default::default()
        }
    }
}
