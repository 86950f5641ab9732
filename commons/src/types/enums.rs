//! Closed vocabularies shared by services: statuses, priorities and roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A string that names no variant of the requested vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// Vocabulary being parsed, e.g. `status`.
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
}

/// Defines a lowercase string enum with `ALL`, `as_str`, `is_valid`,
/// `Display` and `FromStr`. Serde derives use the same wire names.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$variant_meta:meta])* $variant:ident => $wire:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$variant_meta])* $variant,)+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Wire name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            /// Whether `raw` names a variant exactly.
            #[must_use]
            pub fn is_valid(raw: &str) -> bool {
                raw.parse::<Self>().is_ok()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: raw.to_owned(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Lifecycle state of a record.
    Status, "status" {
        Active => "active",
        Inactive => "inactive",
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
        Completed => "completed",
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
}

string_enum! {
    /// Urgency of a task or ticket.
    Priority, "priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

string_enum! {
    /// Coarse user role, as carried in token claims.
    Role, "role" {
        Admin => "admin",
        User => "user",
        Moderator => "moderator",
        Guest => "guest",
        Owner => "owner",
        Member => "member",
        Viewer => "viewer",
        Editor => "editor",
    }
}

string_enum! {
    /// Action a role may be granted.
    Permission, "permission" {
        Read => "read",
        Write => "write",
        Delete => "delete",
        Admin => "admin",
        Create => "create",
        Update => "update",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("active", true)]
    #[case("archived", true)]
    #[case("Active", false)]
    #[case("deleted", false)]
    #[case("", false)]
    fn status_validity(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(Status::is_valid(raw), valid);
    }

    #[rstest]
    fn every_variant_round_trips_through_its_wire_name() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>(), Ok(*status));
        }
        for priority in Priority::ALL {
            assert_eq!(priority.to_string().parse::<Priority>(), Ok(*priority));
        }
        assert_eq!(Role::ALL.len(), 8);
        assert_eq!(Permission::ALL.len(), 6);
    }

    #[rstest]
    fn unknown_values_name_the_vocabulary() {
        let err = "superuser".parse::<Role>().expect_err("unknown role");
        assert_eq!(err.kind, "role");
        assert_eq!(err.to_string(), "unknown role 'superuser'");
    }

    #[rstest]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&Priority::Critical).expect("serialise");
        assert_eq!(json, "\"critical\"");
        let role: Role = serde_json::from_str("\"moderator\"").expect("deserialise");
        assert_eq!(role, Role::Moderator);
        assert!(serde_json::from_str::<Status>("\"gone\"").is_err());
    }
}
