use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Kind of event recorded in the ledger.
///
/// The string form is what the mirror stores in its `data_type` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Anchor entry; exactly one per ledger, at index 0.
    Genesis,
    /// A new student was admitted.
    Admission,
    /// An admitted student's details changed.
    AdmissionUpdate,
    /// A fee payment was taken.
    FeePayment,
    /// A hostel room was allocated.
    HostelAllocation,
    /// A hostel allocation was released.
    HostelDeallocation,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 6] = [
        Self::Genesis,
        Self::Admission,
        Self::AdmissionUpdate,
        Self::FeePayment,
        Self::HostelAllocation,
        Self::HostelDeallocation,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Genesis => "genesis",
            Self::Admission => "admission",
            Self::AdmissionUpdate => "admission_update",
            Self::FeePayment => "fee_payment",
            Self::HostelAllocation => "hostel_allocation",
            Self::HostelDeallocation => "hostel_deallocation",
        }
    }

    /// Kinds that business operations may record. Genesis is reserved.
    pub fn is_business(&self) -> bool {
        !matches!(self, Self::Genesis)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| TypeError::UnknownEventKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form_roundtrips() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn serde_matches_display() {
        for kind in EventKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        assert_eq!(
            "library_fine".parse::<EventKind>(),
            Err(TypeError::UnknownEventKind("library_fine".into()))
        );
    }

    #[test]
    fn genesis_is_not_a_business_kind() {
        assert!(!EventKind::Genesis.is_business());
        assert!(EventKind::FeePayment.is_business());
    }
}
