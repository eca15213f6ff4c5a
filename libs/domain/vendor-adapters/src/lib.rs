// [libs/domain/vendor-adapters/src/lib.rs]
/*!
 * Uniform FHIR vendor contract: one struct per EHR vendor,
 * sharing rate-limited HTTP transport, the `EnsureFresh`-then-retry
 * contract, and lazy Bundle pagination, behind a single
 * `VendorFhirAdapter` trait the sync orchestrator and bulk export runner
 * depend on instead of a concrete vendor.
 */

pub mod adapter;
pub mod bulk;
pub mod errors;
pub mod pagination;
pub mod profile;
pub mod token;

pub use adapter::{
    build_adapter_registry, AllscriptsAdapter, AthenaAdapter, CernerAdapter, EclinicalworksAdapter, EpicAdapter,
    GenericAdapter, MeditechAdapter, NdjsonLineStream, NextgenAdapter, ResourceStream, VendorFhirAdapter,
};
pub use bulk::{BulkExportManifest, BulkExportScope, ManifestFile, PollOutcome};
pub use errors::AdapterError;
pub use profile::{VendorProfile, US_CORE_BASELINE};
pub use token::TokenSource;

#[cfg(test)]
mod tests {
    use super::*;
    use ehr_domain_models::Vendor;

    #[test]
    fn profile_extends_baseline_resource_types_per_vendor() {
        let epic = VendorProfile::for_vendor(Vendor::Epic);
        let types = epic.supported_resource_types();
        assert!(types.contains(&"Patient"));
        assert!(types.contains(&"CarePlan"));
    }

    #[test]
    fn only_vendors_marked_in_profile_support_bulk_export() {
        assert!(VendorProfile::for_vendor(Vendor::Epic).supports_bulk_export);
        assert!(!VendorProfile::for_vendor(Vendor::Athena).supports_bulk_export);
    }
}



