use tokio::sync::mpsc::Sender;

use exam_protocol::ExamMsg;

// Per-connection record held in a registry slot: the outbound
// message channel plus identity and authentication state.
// The username is set exactly once, when authentication succeeds;
// the authenticated flag only ever goes false -> true.
pub struct Session {
    outbox: Sender<ExamMsg>,
    username: Option<String>,
    authenticated: bool,
}

impl Session {
    pub fn new(outbox: Sender<ExamMsg>) -> Self {
        Session {
            outbox,
            username: None,
            authenticated: false,
        }
    }

    pub fn authenticate(&mut self, username: String) {
        debug_assert!(!self.authenticated, "session authenticated twice");
        self.username = Some(username);
        self.authenticated = true;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn outbox(&self) -> Sender<ExamMsg> {
        self.outbox.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn starts_unauthenticated_and_anonymous() {
        let (tx, _rx) = mpsc::channel(1);
        let session = Session::new(tx);
        assert!(!session.is_authenticated());
        assert!(session.username().is_none());
    }

    #[test]
    fn authentication_sets_identity() {
        let (tx, _rx) = mpsc::channel(1);
        let mut session = Session::new(tx);
        session.authenticate("student3".to_string());
        assert!(session.is_authenticated());
        assert_eq!(session.username(), Some("student3"));
    }
}
