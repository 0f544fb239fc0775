//! Stable entity identifiers.
//!
//! Every entity gets a UUID-backed newtype so that `ParticipantId` and
//! `DeliberationId` can never be mixed up at a call site by the type
//! checker, rather than passing a raw `Uuid` around everywhere.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use uuid::Uuid;

macro_rules! uuid_newtype {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh, random identifier.
            #[inline]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[inline]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;
            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_newtype!(
    /// A registered participant (an autonomous agent acting for a human).
    ParticipantId
);
uuid_newtype!(
    /// One deliberation instance over a single question.
    DeliberationId
);
uuid_newtype!(
    /// One candidate statement produced in a round.
    StatementId
);
uuid_newtype!(
    /// One participant's initial opinion.
    OpinionId
);
uuid_newtype!(
    /// One participant's ranking submission for a round.
    RankingId
);
uuid_newtype!(
    /// One participant's critique submission for a round.
    CritiqueId
);
uuid_newtype!(
    /// One participant's human-feedback submission.
    FeedbackId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_and_roundtrip_through_display() {
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        assert_ne!(a, b);

        let s = a.to_string();
        let parsed: ParticipantId = s.parse().unwrap();
        assert_eq!(a, parsed);
    }

    #[test]
    fn distinct_entity_types_do_not_unify() {
        // This is a compile-time property really; here we just check that
        // the same underlying uuid can be wrapped by either type without
        // the type system collapsing them into one.
        let u = Uuid::new_v4();
        let p: ParticipantId = u.into();
        let d: DeliberationId = u.into();
        assert_eq!(p.as_uuid(), d.as_uuid());
    }
}
