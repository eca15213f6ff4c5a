// [libs/domain/vendor-adapters/src/profile.rs]
use ehr_domain_models::Vendor;
use std::time::Duration;

/// The US Core resource types every vendor is expected to expose
///; each vendor profile may extend this set.
pub const US_CORE_BASELINE: &[&str] = &[
    "Patient",
    "Observation",
    "Condition",
    "MedicationRequest",
    "AllergyIntolerance",
    "Immunization",
    "Procedure",
    "DocumentReference",
];

#[derive(Debug, Clone)]
pub struct VendorProfile {
    pub vendor: Vendor,
    pub extra_resource_types: &'static [&'static str],
    pub min_request_interval: Duration,
    pub max_vendor_concurrency: usize,
    pub supports_bulk_export: bool,
}

impl VendorProfile {
    pub fn for_vendor(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Epic => Self {
                vendor,
                extra_resource_types: &["CarePlan", "Encounter", "DiagnosticReport"],
                min_request_interval: Duration::from_millis(100),
                max_vendor_concurrency: 8,
                supports_bulk_export: true,
            },
            Vendor::Cerner => Self {
                vendor,
                extra_resource_types: &["Encounter", "CareTeam"],
                min_request_interval: Duration::from_millis(120),
                max_vendor_concurrency: 8,
                supports_bulk_export: true,
            },
            Vendor::Meditech => Self {
                vendor,
                extra_resource_types: &["Encounter"],
                min_request_interval: Duration::from_millis(180),
                max_vendor_concurrency: 4,
                supports_bulk_export: true,
            },
            Vendor::Allscripts => Self {
                vendor,
                extra_resource_types: &["Goal", "ServiceRequest"],
                min_request_interval: Duration::from_millis(150),
                max_vendor_concurrency: 6,
                supports_bulk_export: false,
            },
            Vendor::Athena => Self {
                vendor,
                extra_resource_types: &["Appointment"],
                min_request_interval: Duration::from_millis(200),
                max_vendor_concurrency: 4,
                supports_bulk_export: false,
            },
            Vendor::Eclinicalworks => Self {
                vendor,
                extra_resource_types: &["FamilyMemberHistory"],
                min_request_interval: Duration::from_millis(200),
                max_vendor_concurrency: 4,
                supports_bulk_export: false,
            },
            Vendor::Nextgen => Self {
                vendor,
                extra_resource_types: &["Coverage"],
                min_request_interval: Duration::from_millis(180),
                max_vendor_concurrency: 4,
                supports_bulk_export: false,
            },
        }
    }

    pub fn supported_resource_types(&self) -> Vec<&'static str> {
        US_CORE_BASELINE.iter().copied().chain(self.extra_resource_types.iter().copied()).collect()
    }
}
