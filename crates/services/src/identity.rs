use training_core::model::UserId;

/// Identity snapshot as reported by the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub is_authenticated: bool,
}

/// Seam to the host's authentication layer.
///
/// Session/cookie handling lives outside this library; the services only ever
/// ask "who is the user right now, and are they authenticated".
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> CurrentUser;
}

/// Fixed identity for embedding and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user: CurrentUser,
}

impl StaticIdentity {
    #[must_use]
    pub fn authenticated(id: UserId) -> Self {
        Self {
            user: CurrentUser {
                id,
                is_authenticated: true,
            },
        }
    }

    #[must_use]
    pub fn anonymous(id: UserId) -> Self {
        Self {
            user: CurrentUser {
                id,
                is_authenticated: false,
            },
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> CurrentUser {
        self.user.clone()
    }
}
