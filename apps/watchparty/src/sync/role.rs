use watchparty_proto::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Controller,
    #[default]
    Viewer,
}

/// Derives the local role from the authority's controller id. The role is
/// never stored: it is recomputed from the two identities on every read, so
/// it cannot go stale across a controller update.
#[derive(Debug, Default, Clone)]
pub struct RoleManager {
    local: Option<SessionId>,
    controller: Option<SessionId>,
}

impl RoleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self) -> Role {
        match (&self.local, &self.controller) {
            (Some(local), Some(controller)) if local == controller => Role::Controller,
            _ => Role::Viewer,
        }
    }

    pub fn is_controller(&self) -> bool {
        self.role() == Role::Controller
    }

    pub fn local_identity(&self) -> Option<&SessionId> {
        self.local.as_ref()
    }

    pub fn controller_id(&self) -> Option<&SessionId> {
        self.controller.as_ref()
    }

    pub fn assign_identity(&mut self, sid: SessionId) -> Role {
        self.local = Some(sid);
        self.role()
    }

    /// Records the latest controller id. Returns whether anything observable
    /// (controller id or derived role) changed.
    pub fn update_controller_id(&mut self, controller: Option<SessionId>) -> bool {
        let before = (self.role(), self.controller.clone());
        self.controller = controller;
        before != (self.role(), self.controller.clone())
    }

    /// Never assume control without a live connection.
    pub fn reset(&mut self) {
        self.local = None;
        self.controller = None;
    }
}
