// [libs/domain/models/src/vendor.rs]
//! The seven EHR vendor tags recognized across the core.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Epic,
    Cerner,
    Allscripts,
    Athena,
    Eclinicalworks,
    Nextgen,
    Meditech,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Vendor::Epic => "epic",
            Vendor::Cerner => "cerner",
                Vendor::Allscripts => "allscripts",
            Vendor::Athena => "athena",
            Vendor::Eclinicalworks => "eclinicalworks",
            Vendor::Nextgen => "nextgen",
            Vendor::Meditech => "meditech",
        };
        write!(f, "{tag}")
    }
}

impl std::str::FromStr for Vendor {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "epic" => Ok(Vendor::Epic),
            "cerner" => Ok(Vendor::Cerner),
                "allscripts" => Ok(Vendor::Allscripts),
            "athena" => Ok(Vendor::Athena),
            "eclinicalworks" => Ok(Vendor::Eclinicalworks),
            "nextgen" => Ok(Vendor::Nextgen),
            "meditech" => Ok(Vendor::Meditech),
            other => Err(format!("UNKNOWN_VENDOR_TAG: {other}")),
        }
    }
}



