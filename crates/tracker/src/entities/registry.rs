use std::collections::{BTreeMap, BTreeSet};

use swarm_core::helpers::base_name;

use crate::entities::{FileMetadata, GroupInfo, UserInfo};

#[derive(Debug, Default)]
/// Central registry of users, groups, file placement, and seeders. The
/// connection handler keeps the whole thing behind one mutex, so every
/// command runs as a critical section.
pub struct Registry {
    users: BTreeMap<String, UserInfo>,
    groups: BTreeMap<String, GroupInfo>,
    // group_id -> filename -> metadata
    file_metadata: BTreeMap<String, BTreeMap<String, FileMetadata>>,
    // group_id -> filename -> users advertised as holding content
    file_seeders: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Resolve the acting user from the connection's source address and the
    /// peer-service port advertised on this connection. Without a port (a
    /// fresh connection that has not carried a login) the first active user
    /// behind the address wins, which keeps a session alive across a
    /// reconnect. Two users behind one address cannot coexist.
    pub fn find_user_by_address(&self, ip: &str, advertised_port: Option<u16>) -> Option<String> {
        self.users
            .iter()
            .find(|(_, user)| {
                user.is_active
                    && user.ip == ip
                    && advertised_port.map_or(true, |port| user.port == port)
            })
            .map(|(user_id, _)| user_id.clone())
    }

    pub fn create_user(&mut self, user_id: &str, password: &str) -> String {
        if self.users.contains_key(user_id) {
            return String::from("ERROR: User already exists");
        }
        self.users
            .insert(user_id.to_string(), UserInfo::new(password.to_string()));
        String::from("SUCCESS: User registered successfully")
    }

    pub fn login(&mut self, user_id: &str, password: &str, ip: &str, port: u16) -> String {
        let Some(user) = self.users.get_mut(user_id) else {
            return String::from("ERROR: User does not exist");
        };
        if user.password != password {
            return String::from("ERROR: Invalid password");
        }
        if user.is_active {
            return String::from("ERROR: User already logged in");
        }
        user.is_active = true;
        user.ip = ip.to_string();
        user.port = port;
        String::from("SUCCESS: Login successful")
    }

    /// Clears the session. Seeder sets keep the user; download-source
    /// selection filters on the active flag instead.
    pub fn logout(&mut self, caller: Option<&str>) -> String {
        let Some(user) = caller.and_then(|id| self.users.get_mut(id)) else {
            return String::from("ERROR: User not found");
        };
        user.is_active = false;
        user.ip.clear();
        user.port = 0;
        String::from("SUCCESS: Logged out successfully")
    }

    pub fn create_group(&mut self, caller: Option<&str>, group_id: &str) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        if self.groups.contains_key(group_id) {
            return String::from("ERROR: Group already exists");
        }
        self.groups
            .insert(group_id.to_string(), GroupInfo::new(user_id.to_string()));
        String::from("SUCCESS: Group created successfully")
    }

    pub fn join_group(&mut self, caller: Option<&str>, group_id: &str) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        let Some(group) = self.groups.get_mut(group_id) else {
            return String::from("ERROR: Group does not exist");
        };
        if group.is_member(user_id) {
            return String::from("ERROR: Already a member of this group");
        }
        if group.is_pending(user_id) {
            return String::from("ERROR: Join request already pending");
        }
        group.pending_requests.push(user_id.to_string());
        String::from("SUCCESS: Join request sent")
    }

    pub fn leave_group(&mut self, caller: Option<&str>, group_id: &str) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        let Some(group) = self.groups.get_mut(group_id) else {
            return String::from("ERROR: Group does not exist");
        };
        let Some(pos) = group.members.iter().position(|m| m == user_id) else {
            return String::from("ERROR: Not a member of this group");
        };
        if group.owner == user_id {
            return String::from("ERROR: Owner cannot leave the group. Transfer ownership first.");
        }
        group.members.remove(pos);

        // Withdraw everything the user published into this group.
        if let Some(user) = self.users.get_mut(user_id) {
            if let Some(published) = user.group_files.remove(group_id) {
                if let Some(seeders) = self.file_seeders.get_mut(group_id) {
                    for filename in &published {
                        if let Some(holders) = seeders.get_mut(filename) {
                            holders.remove(user_id);
                        }
                    }
                }
            }
        }
        String::from("SUCCESS: Left group successfully")
    }

    pub fn list_groups(&self, caller: Option<&str>) -> String {
        if caller.is_none() {
            return String::from("ERROR: Please login first");
        }
        if self.groups.is_empty() {
            return String::from("No groups available");
        }
        let mut result = String::from("GROUPS:\n");
        for (group_id, group) in &self.groups {
            result.push_str(&format!(
                "{} (Owner: {}, Members: {})\n",
                group_id,
                group.owner,
                group.members.len()
            ));
        }
        result
    }

    pub fn list_requests(&self, caller: Option<&str>, group_id: &str) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        let Some(group) = self.groups.get(group_id) else {
            return String::from("ERROR: Group does not exist");
        };
        if group.owner != user_id {
            return String::from("ERROR: Only group owner can view requests");
        }
        if group.pending_requests.is_empty() {
            return String::from("No pending requests");
        }
        let mut result = String::from("PENDING REQUESTS:\n");
        for user in &group.pending_requests {
            result.push_str(user);
            result.push('\n');
        }
        result
    }

    pub fn accept_request(
        &mut self,
        caller: Option<&str>,
        group_id: &str,
        request_user: &str,
    ) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        let Some(group) = self.groups.get_mut(group_id) else {
            return String::from("ERROR: Group does not exist");
        };
        if group.owner != user_id {
            return String::from("ERROR: Only group owner can accept requests");
        }
        let Some(pos) = group.pending_requests.iter().position(|r| r == request_user) else {
            return String::from("ERROR: No pending request from this user");
        };
        // One atomic move keeps pending and members disjoint.
        group.pending_requests.remove(pos);
        group.members.push(request_user.to_string());
        String::from("SUCCESS: User added to group")
    }

    pub fn upload_file(
        &mut self,
        caller: Option<&str>,
        filepath: &str,
        group_id: &str,
        file_size: u64,
        num_pieces: u32,
    ) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        match self.groups.get(group_id) {
            Some(group) if group.is_member(user_id) => {}
            Some(_) => return String::from("ERROR: Not a member of this group"),
            None => return String::from("ERROR: Group does not exist"),
        }
        let filename = base_name(filepath).to_string();

        self.file_metadata
            .entry(group_id.to_string())
            .or_default()
            .insert(
                filename.clone(),
                FileMetadata::new(filename.clone(), file_size, num_pieces),
            );

        let group = self.groups.get_mut(group_id).unwrap();
        if !group.files.contains(&filename) {
            group.files.push(filename.clone());
        }

        self.file_seeders
            .entry(group_id.to_string())
            .or_default()
            .entry(filename.clone())
            .or_default()
            .insert(user_id.to_string());

        if let Some(user) = self.users.get_mut(user_id) {
            let published = user.group_files.entry(group_id.to_string()).or_default();
            if !published.contains(&filename) {
                published.push(filename);
            }
        }
        String::from("SUCCESS: File uploaded successfully")
    }

    pub fn list_files(&self, caller: Option<&str>, group_id: &str) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        let Some(group) = self.groups.get(group_id) else {
            return String::from("ERROR: Group does not exist");
        };
        if !group.is_member(user_id) {
            return String::from("ERROR: Not a member of this group");
        }
        if group.files.is_empty() {
            return String::from("No files in this group");
        }
        let metadata = self.file_metadata.get(group_id);
        let mut result = String::from("FILES:\n");
        for filename in &group.files {
            result.push_str(filename);
            if let Some(meta) = metadata.and_then(|m| m.get(filename)) {
                result.push_str(&format!(" ({} bytes)", meta.file_size));
            }
            result.push('\n');
        }
        result
    }

    pub fn download_file(&self, caller: Option<&str>, group_id: &str, filename: &str) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        let Some(group) = self.groups.get(group_id) else {
            return String::from("ERROR: Group does not exist");
        };
        if !group.is_member(user_id) {
            return String::from("ERROR: Not a member of this group");
        }
        let Some(meta) = self
            .file_metadata
            .get(group_id)
            .and_then(|m| m.get(filename))
        else {
            return String::from("ERROR: File not found in group");
        };
        let Some(seeders) = self.file_seeders.get(group_id).and_then(|s| s.get(filename)) else {
            return String::from("ERROR: File not found in group");
        };

        // Only active seeders become sources, and the caller never serves
        // itself.
        let mut result = String::from("PEERS:");
        let mut found_active = false;
        for seeder in seeders {
            if seeder == user_id {
                continue;
            }
            if let Some(user) = self.users.get(seeder) {
                if user.is_active {
                    found_active = true;
                    result.push_str(&format!(" {}:{}", user.ip, user.port));
                }
            }
        }
        if !found_active {
            return String::from("ERROR: No active seeders available");
        }
        result.push_str(&format!(" SIZE:{} PIECES:{}", meta.file_size, meta.num_pieces));
        result
    }

    /// Re-registers the caller as a seeder after a completed download. The
    /// caller must be a logged-in member and the file must already be
    /// registered in the group.
    pub fn update_seeder(&mut self, caller: Option<&str>, group_id: &str, filename: &str) -> String {
        let Some(user_id) = caller else {
            return String::from("ERROR: Please login first");
        };
        match self.groups.get(group_id) {
            Some(group) if group.is_member(user_id) => {}
            Some(_) => return String::from("ERROR: Not a member of this group"),
            None => return String::from("ERROR: Group does not exist"),
        }
        if self
            .file_metadata
            .get(group_id)
            .and_then(|m| m.get(filename))
            .is_none()
        {
            return String::from("ERROR: File not found in group");
        }

        self.file_seeders
            .entry(group_id.to_string())
            .or_default()
            .entry(filename.to_string())
            .or_default()
            .insert(user_id.to_string());

        if let Some(user) = self.users.get_mut(user_id) {
            let published = user.group_files.entry(group_id.to_string()).or_default();
            if !published.iter().any(|f| f == filename) {
                published.push(filename.to_string());
            }
        }
        String::from("SUCCESS: Seeder updated")
    }

    pub fn user(&self, user_id: &str) -> Option<&UserInfo> {
        self.users.get(user_id)
    }

    pub fn group(&self, group_id: &str) -> Option<&GroupInfo> {
        self.groups.get(group_id)
    }

    pub fn metadata(&self, group_id: &str, filename: &str) -> Option<&FileMetadata> {
        self.file_metadata
            .get(group_id)
            .and_then(|m| m.get(filename))
    }

    pub fn seeders(&self, group_id: &str, filename: &str) -> Option<&BTreeSet<String>> {
        self.file_seeders.get(group_id).and_then(|s| s.get(filename))
    }
}
