use std::sync::Arc;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub id: Arc<str>,
    pub display_name: Option<Arc<str>>,
}

impl Identity {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<Arc<str>>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Who is acting right now, as last reported by the identity provider.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum IdentityState {
    #[default]
    NoIdentity,
    HasIdentity(Identity),
}

impl IdentityState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::NoIdentity => None,
            Self::HasIdentity(identity) => Some(identity),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.identity().map(|identity| &*identity.id)
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::HasIdentity(_))
    }
}

impl From<Option<Identity>> for IdentityState {
    fn from(identity: Option<Identity>) -> Self {
        identity.map_or(Self::NoIdentity, Self::HasIdentity)
    }
}

impl From<Identity> for IdentityState {
    fn from(identity: Identity) -> Self {
        Self::HasIdentity(identity)
    }
}
