//! Admin and operational status types
//!
//! Admin status is what the operator intends (`Operational`, `OutOfService`,
//! ...), operational status is what the infrastructure reports (`Available`,
//! `Charging`, `Offline`, ...).

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! status_type {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        /// Case-insensitive; unrecognized text maps to `Unknown`.
        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .unwrap_or(Self::Unknown)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from(s.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::from(s))
            }
        }
    };
}

status_type!(
    /// Admin status of an EVSE.
    EvseAdminStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        OutOfService,
        Operational,
        InternalUse,
        Deleted,
    }
);

status_type!(
    /// Operational status of an EVSE.
    EvseStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        Available,
        Reserved,
        Charging,
        Offline,
        OutOfService,
        Error,
        Removed,
    }
);

status_type!(
    /// Admin status of a charging station.
    ChargingStationAdminStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        OutOfService,
        Operational,
        InternalUse,
        Deleted,
    }
);

status_type!(
    /// Operational status of a charging station.
    ChargingStationStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        Available,
        Offline,
        OutOfService,
        Error,
        Removed,
    }
);

status_type!(
    /// Admin status of a charging pool.
    ChargingPoolAdminStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        OutOfService,
        Operational,
        InternalUse,
        Deleted,
    }
);

status_type!(
    /// Operational status of a charging pool.
    ChargingPoolStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        Available,
        Offline,
        OutOfService,
        Error,
        Removed,
    }
);

status_type!(
    /// Admin status of a charging station operator.
    OperatorAdminStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        OutOfService,
        Operational,
        InternalUse,
        Deleted,
    }
);

status_type!(
    /// Operational status of a charging station operator.
    OperatorStatus {
        Unspecified,
        Unknown,
        Available,
        Offline,
        OutOfService,
        Error,
    }
);

status_type!(
    /// Admin status of an e-mobility provider.
    ProviderAdminStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        OutOfService,
        Operational,
        InternalUse,
        Deleted,
    }
);

status_type!(
    /// Operational status of an e-mobility provider.
    ProviderStatus {
        Unspecified,
        Unknown,
        Available,
        Offline,
        OutOfService,
        Error,
    }
);

status_type!(
    /// Admin status of a roaming network.
    RoamingNetworkAdminStatus {
        Unspecified,
        Unknown,
        Planned,
        InDeployment,
        OutOfService,
        Operational,
        InternalUse,
        Deleted,
    }
);

status_type!(
    /// Operational status of a roaming network.
    RoamingNetworkStatus {
        Unspecified,
        Unknown,
        Available,
        Offline,
        OutOfService,
        Error,
    }
);

status_type!(
    /// Status of an e-mobility account (contract).
    AccountStatus {
        Unspecified,
        Unknown,
        Active,
        Blocked,
        Expired,
    }
);
