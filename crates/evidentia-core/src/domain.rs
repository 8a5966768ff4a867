//! # Domain Vocabularies
//!
//! Every enumerated value that crosses the wire or lands in storage is
//! defined here exactly once. Wire names are snake_case strings except where
//! the product uses another form (employee bands such as `"1-10"`).

use crate::error::ValidationError;

/// Declare a closed vocabulary with a fixed wire form.
///
/// Generates the enum with serde renames, an `ALL` slice, `as_str`,
/// `parse`, `Display`, and `FromStr`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant, )+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }

            /// Parse the wire representation.
            pub fn parse(value: &str) -> Result<Self, $crate::error::ValidationError> {
                match value {
                    $( $wire => Ok(Self::$variant), )+
                    other => Err($crate::error::ValidationError::UnknownValue {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Industry an organization operates in.
    pub enum Industry ("industry") {
        /// Banks, broker-dealers, advisers.
        FinancialServices => "financial_services",
        /// Carriers, agencies, and producers.
        Insurance => "insurance",
        /// Covered entities and business associates.
        Healthcare => "healthcare",
        /// Anything else.
        Other => "other",
    }
}

wire_enum! {
    /// Headcount band declared at registration.
    pub enum EmployeeBand ("employee band") {
        /// One to ten employees.
        OneToTen => "1-10",
        /// Eleven to twenty-five employees.
        ElevenToTwentyFive => "11-25",
        /// Twenty-six to fifty employees.
        TwentySixToFifty => "26-50",
        /// More than fifty employees.
        FiftyOnePlus => "51+",
    }
}

wire_enum! {
    /// Regulatory regime a tenant reports under. Selects the template catalog
    /// slice the tenant can browse.
    pub enum RegulatoryFramework ("regulatory framework") {
        /// SEC-registered investment adviser.
        SecRia => "sec_ria",
        /// FINRA member firm.
        Finra => "finra",
        /// State insurance department oversight.
        StateInsurance => "state_insurance",
        /// HIPAA privacy and security rules.
        Hipaa => "hipaa",
    }
}

wire_enum! {
    /// Functional area a requirement belongs to.
    pub enum RequirementCategory ("requirement category") {
        /// Training and attestations by staff.
        EmployeeTraining => "employee_training",
        /// Written policies and their review.
        PolicyManagement => "policy_management",
        /// Access reviews and entitlements.
        AccessControls => "access_controls",
        /// Books-and-records retention.
        Recordkeeping => "recordkeeping",
        /// Registrations and licenses.
        Licensing => "licensing",
        /// Customer disclosures and complaints.
        ConsumerProtection => "consumer_protection",
        /// Conduct and sales practices.
        BusinessPractices => "business_practices",
        /// Privacy and information security.
        PrivacySecurity => "privacy_security",
        /// Risk assessments.
        RiskManagement => "risk_management",
        /// HIPAA business associate oversight.
        BusinessAssociates => "business_associates",
        /// HIPAA patient rights.
        PatientRights => "patient_rights",
    }
}

wire_enum! {
    /// How often a requirement recurs.
    pub enum Frequency ("frequency") {
        /// Once a year.
        Annual => "annual",
        /// Every quarter.
        Quarterly => "quarterly",
        /// Every month.
        Monthly => "monthly",
        /// Continuous obligation without a fixed due date.
        Ongoing => "ongoing",
        /// A single occurrence.
        OneTime => "one_time",
    }
}

wire_enum! {
    /// Channel a piece of evidence arrived through.
    pub enum EvidenceSource ("evidence source") {
        /// Uploaded through a pre-signed URL.
        ManualUpload => "manual_upload",
        /// Captured from Gmail.
        Gmail => "gmail",
        /// Captured from Google Drive.
        GoogleDrive => "google_drive",
        /// Captured from Google Calendar.
        GoogleCalendar => "google_calendar",
        /// Captured from Exchange.
        Exchange => "exchange",
        /// Captured from OneDrive.
        OneDrive => "onedrive",
        /// Captured from Slack.
        Slack => "slack",
    }
}

wire_enum! {
    /// Verb recorded on every audit trail entry.
    pub enum AuditAction ("audit action") {
        /// A user signed in.
        Login => "login",
        /// A user signed out.
        Logout => "logout",
        /// A user was invited or created.
        UserCreated => "user_created",
        /// A user's profile or role changed.
        UserUpdated => "user_updated",
        /// A user was deactivated.
        UserDeleted => "user_deleted",
        /// A tenant was registered.
        OrganizationCreated => "organization_created",
        /// Tenant profile changed.
        OrganizationUpdated => "organization_updated",
        /// A requirement was activated from a template.
        RequirementActivated => "requirement_activated",
        /// A requirement's mutable fields changed.
        RequirementUpdated => "requirement_updated",
        /// A requirement was deactivated.
        RequirementDeactivated => "requirement_deactivated",
        /// Evidence upload was completed.
        EvidenceCreated => "evidence_created",
        /// Evidence metadata or associations changed.
        EvidenceUpdated => "evidence_updated",
        /// Evidence was soft-deleted.
        EvidenceDeleted => "evidence_deleted",
        /// Evidence was read.
        EvidenceViewed => "evidence_viewed",
        /// A download URL was issued for evidence.
        EvidenceDownloaded => "evidence_downloaded",
        /// A report was requested.
        ReportGenerated => "report_generated",
        /// An integration was connected.
        IntegrationConnected => "integration_connected",
        /// An integration was disconnected.
        IntegrationDisconnected => "integration_disconnected",
        /// Subscription tier or cancellation changed.
        SubscriptionUpdated => "subscription_updated",
        /// Billing instrument changed.
        PaymentMethodUpdated => "payment_method_updated",
    }
}

wire_enum! {
    /// Kind of resource an audit entry refers to.
    pub enum ResourceType ("resource type") {
        /// Tenant root.
        Organization => "organization",
        /// Tenant member.
        User => "user",
        /// Pending invitation.
        Invitation => "invitation",
        /// Activated requirement.
        Requirement => "requirement",
        /// Evidence item.
        Evidence => "evidence",
        /// Generated report.
        Report => "report",
        /// Billing subscription.
        Subscription => "subscription",
    }
}

wire_enum! {
    /// Billing tier. Determines the seat limit and list price.
    pub enum SubscriptionTier ("subscription tier") {
        /// Entry tier assigned at registration.
        Starter => "starter",
        /// Mid tier.
        Professional => "professional",
        /// Top tier.
        Business => "business",
    }
}

impl SubscriptionTier {
    /// Maximum number of active users the tier allows.
    pub fn max_users(&self) -> u32 {
        match self {
            Self::Starter => 10,
            Self::Professional => 25,
            Self::Business => 50,
        }
    }

    /// Monthly list price in US dollars.
    pub fn monthly_price(&self) -> f64 {
        match self {
            Self::Starter => 149.00,
            Self::Professional => 349.00,
            Self::Business => 699.00,
        }
    }

    /// The tier every new tenant starts on.
    pub fn lowest() -> Self {
        Self::Starter
    }
}

impl Default for SubscriptionTier {
    fn default() -> Self {
        Self::lowest()
    }
}

/// Reject a value unless it belongs to the vocabulary. Used by request DTOs
/// that accept optional raw strings from query parameters.
pub fn parse_optional<T, F>(value: Option<&str>, parse: F) -> Result<Option<T>, ValidationError>
where
    F: Fn(&str) -> Result<T, ValidationError>,
{
    value.filter(|v| !v.is_empty()).map(parse).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_band_uses_range_wire_names() {
        assert_eq!(EmployeeBand::OneToTen.as_str(), "1-10");
        assert_eq!(EmployeeBand::parse("51+").unwrap(), EmployeeBand::FiftyOnePlus);
        let json = serde_json::to_string(&EmployeeBand::ElevenToTwentyFive).unwrap();
        assert_eq!(json, "\"11-25\"");
    }

    #[test]
    fn framework_parse_rejects_unknown() {
        let err = RegulatoryFramework::parse("sox").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownValue {
                kind: "regulatory framework",
                value: "sox".into()
            }
        );
    }

    #[test]
    fn every_audit_action_round_trips_through_its_wire_name() {
        for action in AuditAction::ALL {
            assert_eq!(AuditAction::parse(action.as_str()).unwrap(), *action);
        }
        assert_eq!(AuditAction::ALL.len(), 20);
    }

    #[test]
    fn serde_matches_as_str() {
        for source in EvidenceSource::ALL {
            let json = serde_json::to_string(source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.as_str()));
        }
    }

    #[test]
    fn tier_table() {
        assert_eq!(SubscriptionTier::Starter.max_users(), 10);
        assert_eq!(SubscriptionTier::Professional.max_users(), 25);
        assert_eq!(SubscriptionTier::Business.max_users(), 50);
        assert_eq!(SubscriptionTier::Professional.monthly_price(), 349.00);
        assert_eq!(SubscriptionTier::default(), SubscriptionTier::Starter);
    }

    #[test]
    fn tiers_order_by_capacity() {
        let mut tiers = SubscriptionTier::ALL.to_vec();
        tiers.sort();
        let caps: Vec<u32> = tiers.iter().map(|t| t.max_users()).collect();
        assert_eq!(caps, vec![10, 25, 50]);
    }

    #[test]
    fn parse_optional_skips_empty() {
        assert_eq!(parse_optional(Some(""), Frequency::parse).unwrap(), None);
        assert_eq!(parse_optional(None, Frequency::parse).unwrap(), None);
        assert_eq!(
            parse_optional(Some("monthly"), Frequency::parse).unwrap(),
            Some(Frequency::Monthly)
        );
        assert!(parse_optional(Some("weekly"), Frequency::parse).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Wire name and serde form of one vocabulary value agree and parse back.
    macro_rules! assert_wire_round_trip {
        ($ty:ty, $value:expr) => {{
            let value: $ty = $value;
            prop_assert_eq!(<$ty>::parse(value.as_str()).ok(), Some(value));
            let json = serde_json::to_string(&value).unwrap();
            prop_assert_eq!(&json, &format!("\"{}\"", value.as_str()));
            prop_assert_eq!(serde_json::from_str::<$ty>(&json).unwrap(), value);
        }};
    }

    /// Arbitrary input parses only to the value whose wire name it is.
    macro_rules! assert_parse_is_exact {
        ($ty:ty, $input:expr) => {{
            match <$ty>::parse($input) {
                Ok(value) => prop_assert_eq!(value.as_str(), $input),
                Err(ValidationError::UnknownValue { value, .. }) => {
                    prop_assert_eq!(value.as_str(), $input);
                    prop_assert!(<$ty>::ALL.iter().all(|v| v.as_str() != $input));
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }};
    }

    proptest! {
        #[test]
        fn audit_actions_round_trip(action in prop::sample::select(AuditAction::ALL)) {
            assert_wire_round_trip!(AuditAction, action);
        }

        #[test]
        fn frameworks_and_categories_round_trip(
            framework in prop::sample::select(RegulatoryFramework::ALL),
            category in prop::sample::select(RequirementCategory::ALL),
            frequency in prop::sample::select(Frequency::ALL),
        ) {
            assert_wire_round_trip!(RegulatoryFramework, framework);
            assert_wire_round_trip!(RequirementCategory, category);
            assert_wire_round_trip!(Frequency, frequency);
        }

        #[test]
        fn tenant_vocabularies_round_trip(
            industry in prop::sample::select(Industry::ALL),
            band in prop::sample::select(EmployeeBand::ALL),
            tier in prop::sample::select(SubscriptionTier::ALL),
            resource in prop::sample::select(ResourceType::ALL),
            source in prop::sample::select(EvidenceSource::ALL),
        ) {
            assert_wire_round_trip!(Industry, industry);
            assert_wire_round_trip!(EmployeeBand, band);
            assert_wire_round_trip!(SubscriptionTier, tier);
            assert_wire_round_trip!(ResourceType, resource);
            assert_wire_round_trip!(EvidenceSource, source);
        }

        #[test]
        fn parse_accepts_only_exact_wire_names(input in "[a-z_+0-9-]{0,24}") {
            assert_parse_is_exact!(AuditAction, input.as_str());
            assert_parse_is_exact!(Frequency, input.as_str());
            assert_parse_is_exact!(EmployeeBand, input.as_str());
        }

        #[test]
        fn parse_optional_treats_empty_as_absent(input in "[a-z_]{0,12}") {
            let parsed = parse_optional(Some(input.as_str()), Frequency::parse);
            if input.is_empty() {
                prop_assert_eq!(parsed, Ok(None));
            } else {
                prop_assert_eq!(parsed.ok().flatten(), Frequency::parse(&input).ok());
            }
        }
    }
}
