use dashmap::DashSet;

/// Members of one owner that are waiting to be processed.
///
/// Inserts are atomic per member; draining removes members one by one so a
/// member inserted mid-drain is either taken now or left for the next drain.
pub struct MemberSet {
    owner: String,
    members: DashSet<String>,
}

impl MemberSet {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            members: DashSet::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns `false` if the member was already present.
    pub fn insert(&self, member: &str) -> bool {
        self.members.insert(member.to_owned())
    }

    /// Empties the set, returning the members this call removed.
    pub fn drain(&self) -> Vec<String> {
        let pending: Vec<String> = self.members.iter().map(|m| m.key().clone()).collect();
        pending
            .into_iter()
            .filter(|member| self.members.remove(member).is_some())
            .collect()
    }

    /// Current members without removing them, or `None` when empty.
    pub fn snapshot(&self) -> Option<Vec<String>> {
        let members: Vec<String> = self.members.iter().map(|m| m.key().clone()).collect();
        if members.is_empty() {
            None
        } else {
            Some(members)
        }
    }
}
