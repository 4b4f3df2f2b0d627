#[derive(Debug)]
/// One group. The owner is always a member, and the pending list never
/// overlaps the member list.
pub struct GroupInfo {
    pub owner: String,
    /// Members in join order, owner first.
    pub members: Vec<String>,
    /// Catalog of file names published into the group, in upload order.
    pub files: Vec<String>,
    /// Users waiting for the owner to accept them.
    pub pending_requests: Vec<String>,
}

impl GroupInfo {
    pub fn new(owner: String) -> Self {
        GroupInfo {
            members: vec![owner.clone()],
            owner,
            files: Vec::new(),
            pending_requests: Vec::new(),
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    pub fn is_pending(&self, user_id: &str) -> bool {
        self.pending_requests.iter().any(|r| r == user_id)
    }
}
