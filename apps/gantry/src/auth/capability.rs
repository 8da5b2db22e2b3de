use std::collections::HashMap;
use std::fmt;

use gantry_proto::Role;

/// Every mutating action the console can issue. Reads are gated only by
/// being authenticated at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    TogglePdTelegram,
    SendMdRequest,
    EditDataset,
    LockDataset,
    JoinMulticast,
    LeaveMulticast,
    AdjustStress,
    AdjustRedundancy,
    AdjustTimeOffsets,
    RegisterInstance,
    ActivateInstance,
    RaiseDiagnosticEvent,
    UpdateTheme,
}

impl Action {
    pub const ALL: &'static [Action] = &[
        Action::TogglePdTelegram,
        Action::SendMdRequest,
        Action::EditDataset,
        Action::LockDataset,
        Action::JoinMulticast,
        Action::LeaveMulticast,
        Action::AdjustStress,
        Action::AdjustRedundancy,
        Action::AdjustTimeOffsets,
        Action::RegisterInstance,
        Action::ActivateInstance,
        Action::RaiseDiagnosticEvent,
        Action::UpdateTheme,
    ];

    /// Minimum role the server enforces for this action.
    pub fn required_role(self) -> Role {
        match self {
            Action::UpdateTheme => Role::Viewer,
            _ => Role::Developer,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::TogglePdTelegram => "toggle-pd-telegram",
            Action::SendMdRequest => "send-md-request",
            Action::EditDataset => "edit-dataset",
            Action::LockDataset => "lock-dataset",
            Action::JoinMulticast => "join-multicast",
            Action::LeaveMulticast => "leave-multicast",
            Action::AdjustStress => "adjust-stress",
            Action::AdjustRedundancy => "adjust-redundancy",
            Action::AdjustTimeOffsets => "adjust-time-offsets",
            Action::RegisterInstance => "register-instance",
            Action::ActivateInstance => "activate-instance",
            Action::RaiseDiagnosticEvent => "raise-diagnostic-event",
            Action::UpdateTheme => "update-theme",
        };
        f.write_str(s)
    }
}

/// Per-action capability table, computed once per identity change so call
/// sites never re-derive the role hierarchy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySet {
    granted: HashMap<Action, bool>,
}

impl CapabilitySet {
    /// Table for an authenticated role, or the empty (deny-all) table for an
    /// unauthenticated session.
    pub fn for_role(role: Option<Role>) -> Self {
        let granted = Action::ALL
            .iter()
            .map(|&action| {
                let allowed = role
                    .map(|r| r.satisfies(action.required_role()))
                    .unwrap_or(false);
                (action, allowed)
            })
            .collect();
        Self { granted }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.granted.get(&action).copied().unwrap_or(false)
    }
}
