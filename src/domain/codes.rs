use serde::{Serialize, Serializer};

/// Declares a closed set of stored codes with their Italian display labels.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => ($code:literal, $label:literal),)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value.trim() {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn choices() -> Vec<Choice> {
                Self::ALL
                    .iter()
                    .map(|value| Choice {
                        value: value.as_str(),
                        label: value.label(),
                    })
                    .collect()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
}

coded_enum! {
    pub enum TaskStatus {
        Scheduled => ("scheduled", "Programmato"),
        InProgress => ("in_progress", "In corso"),
        Done => ("done", "Chiuso"),
        Cancelled => ("cancelled", "Annullato"),
    }
}

coded_enum! {
    pub enum AssetStatus {
        Active => ("active", "Attivo"),
        OutOfService => ("out_of_service", "Fuori servizio"),
        Disposed => ("disposed", "Dismesso"),
    }
}

coded_enum! {
    pub enum PlanFrequency {
        Weekly => ("weekly", "Settimanale"),
        Monthly => ("monthly", "Mensile"),
        Quarterly => ("quarterly", "Trimestrale"),
        Yearly => ("yearly", "Annuale"),
    }
}

coded_enum! {
    pub enum ItemType {
        YesNo => ("yesno", "SI/NO"),
        Number => ("number", "Numero"),
        Text => ("text", "Testo"),
        Photo => ("photo", "Foto"),
    }
}

impl TaskStatus {
    /// Scheduled and in-progress tasks count as open work.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Scheduled | Self::InProgress)
    }
}

/// Leniently maps submitted codes, falling back to `default` for anything unknown.
pub fn parse_or<T, F>(value: Option<&str>, parse: F, default: T) -> T
where
    F: Fn(&str) -> Option<T>,
{
    value.and_then(parse).unwrap_or(default)
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoiceSets {
    pub task_status: Vec<Choice>,
    pub asset_status: Vec<Choice>,
    pub plan_frequency: Vec<Choice>,
    pub item_type: Vec<Choice>,
}

pub fn all_choices() -> ChoiceSets {
    ChoiceSets {
        task_status: TaskStatus::choices(),
        asset_status: AssetStatus::choices(),
        plan_frequency: PlanFrequency::choices(),
        item_type: ItemType::choices(),
    }
}
