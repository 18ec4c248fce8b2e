//! Closed label sets shared by requirements, scope checks and change requests.
//!
//! All of them serialize as lowercase strings (`"core"`, `"high"`, ...).

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire label
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::LabelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == needle)
                    .ok_or_else(|| $crate::LabelError {
                        kind: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }
    };
}

label_enum! {
    /// Importance tier of a requirement
    RequirementScope {
        /// Must ship
        Core => "core",
        /// Non-functional or constraint-driven
        Extended => "extended",
        /// Nice to have / future
        Optional => "optional",
    }
}

label_enum! {
    /// Priority of a requirement or change request
    Priority {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

label_enum! {
    /// Estimated impact of a change request
    Impact {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

label_enum! {
    /// Risk attached to a scope verdict or a project
    RiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

label_enum! {
    /// Task operation that triggered a scope check
    TaskOperation {
        Add => "add",
        Update => "update",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Default for Impact {
    fn default() -> Self {
        Impact::Medium
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

/// Unknown label value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct LabelError {
    /// Label set name
    pub kind: &'static str,
    /// Rejected input
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("CORE".parse::<RequirementScope>().unwrap(), RequirementScope::Core);
        assert_eq!(" update ".parse::<TaskOperation>().unwrap(), TaskOperation::Update);
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert_eq!(err.kind, "Priority");
    }

    #[test]
    fn risk_levels_order_low_to_high() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn labels_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"high\"");
        assert_eq!(
            serde_json::from_str::<RequirementScope>("\"optional\"").unwrap(),
            RequirementScope::Optional
        );
    }
}
