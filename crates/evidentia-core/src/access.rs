//! # Access Control Table
//!
//! Roles and capabilities are closed enums. [`can_perform`] is pure: it
//! never touches state and never writes audit entries. The operation it
//! gates does that.
//!
//! | Role                | Grants                                                  |
//! |---------------------|---------------------------------------------------------|
//! | `admin`             | every capability                                        |
//! | `compliance_officer`| everything except users, billing, and integrations      |
//! | `viewer`            | view capabilities plus report generation                |

use crate::domain::wire_enum;

wire_enum! {
    /// Role carried in the identity token's `role` claim.
    pub enum Role ("role") {
        /// Full control of the tenant.
        Admin => "admin",
        /// Manages requirements and evidence.
        ComplianceOfficer => "compliance_officer",
        /// Read-only member.
        Viewer => "viewer",
    }
}

wire_enum! {
    /// A named permission checked before an operation runs.
    pub enum Capability ("capability") {
        /// Read the dashboard, organization profile, and member list.
        ViewDashboard => "view_dashboard",
        /// Read requirements and templates.
        ViewRequirements => "view_requirements",
        /// Read evidence and issue download URLs.
        ViewEvidence => "view_evidence",
        /// Read and export the audit trail.
        ViewAuditLog => "view_audit_log",
        /// Request and download reports.
        GenerateReports => "generate_reports",
        /// Activate, update, and deactivate requirements.
        ManageRequirements => "manage_requirements",
        /// Upload, update, and delete evidence.
        ManageEvidence => "manage_evidence",
        /// Edit the organization profile.
        ManageOrganization => "manage_organization",
        /// Invite, re-role, and deactivate users.
        ManageUsers => "manage_users",
        /// Change or cancel the subscription.
        ManageBilling => "manage_billing",
        /// Connect and disconnect capture integrations.
        ManageIntegrations => "manage_integrations",
    }
}

impl Capability {
    /// Whether the capability only reads state.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::ViewDashboard
                | Self::ViewRequirements
                | Self::ViewEvidence
                | Self::ViewAuditLog
        )
    }
}

impl Role {
    /// Whether this role may perform the capability.
    pub fn allows(&self, capability: Capability) -> bool {
        can_perform(*self, capability)
    }

    /// Every capability the role holds.
    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| self.allows(*c))
            .collect()
    }
}

/// The access table.
pub fn can_perform(role: Role, capability: Capability) -> bool {
    match role {
        Role::Admin => true,
        Role::ComplianceOfficer => !matches!(
            capability,
            Capability::ManageUsers | Capability::ManageBilling | Capability::ManageIntegrations
        ),
        Role::Viewer => capability.is_read_only() || capability == Capability::GenerateReports,
    }
}
