use payd_auth::SessionIdentity;

/// Verified session for the current request.
///
/// Inserted by the session middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    identity: SessionIdentity,
}

impl SessionContext {
    pub fn new(identity: SessionIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn role(&self) -> &str {
        self.identity.role()
    }
}
