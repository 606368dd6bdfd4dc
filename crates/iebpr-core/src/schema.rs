//! Field registries for the two randomized-initialization schemas.
//!
//! Each schema is a closed set of named slots generated from one table, so field lookup is a
//! match on the slot name rather than a runtime attribute probe. The state and trait
//! registries must not share a name; that is checked at compile time below.

use crate::distribution::DistributionSpec;
use serde::{Deserialize, Serialize};

/// A randomized-initialization config that a template can be resolved into.
pub trait RandConfigSchema: Default {
    type Field: Copy + std::fmt::Debug;

    const SCHEMA_NAME: &'static str;

    /// Look up a slot by its template name.
    fn field(name: &str) -> Option<Self::Field>;

    fn set(&mut self, field: Self::Field, spec: DistributionSpec);
}

macro_rules! define_rand_config {
    (
        $(#[$meta:meta])*
        $config:ident, $field:ident {
            $( $slot:ident => $variant:ident ),* $(,)?
        }
    ) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $field {
            $($variant),*
        }

        impl $field {
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            pub const NAMES: &'static [&'static str] = &[$(stringify!($slot)),*];

            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($slot)),*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($slot) => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $field {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default, deny_unknown_fields)]
        pub struct $config {
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $slot: Option<DistributionSpec>,
            )*
        }

        impl $config {
            pub fn get(&self, field: $field) -> Option<&DistributionSpec> {
                match field {
                    $($field::$variant => self.$slot.as_ref()),*
                }
            }

            /// Configured slots in registry order.
            pub fn iter(&self) -> impl Iterator<Item = ($field, &DistributionSpec)> + '_ {
                $field::ALL
                    .iter()
                    .filter_map(move |&field| self.get(field).map(|spec| (field, spec)))
            }

            pub fn len(&self) -> usize {
                self.iter().count()
            }

            pub fn is_empty(&self) -> bool {
                self.iter().next().is_none()
            }
        }

        impl RandConfigSchema for $config {
            type Field = $field;

            const SCHEMA_NAME: &'static str = stringify!($config);

            fn field(name: &str) -> Option<Self::Field> {
                $field::from_name(name)
            }

            fn set(&mut self, field: Self::Field, spec: DistributionSpec) {
                match field {
                    $($field::$variant => self.$slot = Some(spec)),*
                }
            }
        }
    };
}

define_rand_config! {
    /// Initial agent state. `split_biomass` is sampled but not recorded in snapshots.
    StateRandConfig, StateField {
        biomass => Biomass,
        rela_count => RelaCount,
        split_biomass => SplitBiomass,
        glycogen => Glycogen,
        pha => Pha,
        polyp => Polyp,
    }
}

define_rand_config! {
    /// Per-agent kinetic traits: rates, regulation coefficients, then boolean switches.
    TraitRandConfig, TraitField {
        mu => Mu,
        q_glycogen => QGlycogen,
        q_pha => QPha,
        q_polyp => QPolyp,
        m_aerobic => MAerobic,
        m_anaerobic => MAnaerobic,
        b_aerobic => BAerobic,
        b_anaerobic => BAnaerobic,
        b_glycogen => BGlycogen,
        b_pha => BPha,
        b_polyp => BPolyp,
        x_glycogen_min => XGlycogenMin,
        x_glycogen_max => XGlycogenMax,
        x_pha_min => XPhaMin,
        x_pha_max => XPhaMax,
        x_polyp_min => XPolypMin,
        x_polyp_max => XPolypMax,
        k_hac => KHac,
        k_op => KOp,
        k_op_polyp => KOpPolyp,
        k_glycogen => KGlycogen,
        k_pha => KPha,
        k_polyp => KPolyp,
        ki_glycogen => KiGlycogen,
        ki_pha => KiPha,
        ki_polyp => KiPolyp,
        y_h => YH,
        y_glycogen_pha => YGlycogenPha,
        y_polyp_pha => YPolypPha,
        y_pha_hac => YPhaHac,
        y_prel => YPrel,
        i_bmp => IBmp,
        enable_tca => EnableTca,
        maint_polyp_first => MaintPolypFirst,
    }
}

impl TraitField {
    /// Traits the engine reads as 0/1 switches.
    pub const fn is_bool(self) -> bool {
        matches!(self, Self::EnableTca | Self::MaintPolypFirst)
    }
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

const fn registries_disjoint(left: &[&str], right: &[&str]) -> bool {
    let mut i = 0;
    while i < left.len() {
        let mut j = 0;
        while j < right.len() {
            if str_eq(left[i], right[j]) {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    registries_disjoint(StateField::NAMES, TraitField::NAMES),
    "state and trait registries must not share field names"
);
