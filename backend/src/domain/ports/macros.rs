//! Port error enums with snake-case constructors.
//!
//! Each variant carries at most one `String` detail field. Its constructor
//! takes `impl Into<String>`, so adapters can pass `&str`, `String`, or
//! identifiers that implement `Display` via `to_string()`.

macro_rules! define_port_error {
    (@ctor $name:ident $variant:ident) => {
        ::paste::paste! {
            #[doc = concat!("Build [`", stringify!($name), "::", stringify!($variant), "`].")]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $name:ident $variant:ident $field:ident) => {
        ::paste::paste! {
            #[doc = concat!("Build [`", stringify!($name), "::", stringify!($variant), "`].")]
            pub fn [<$variant:snake>]($field: impl Into<String>) -> Self {
                Self::$variant {
                    $field: $field.into(),
                }
            }
        }
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $field:ident } )? => $message:literal
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( {
                    #[doc = "Detail supplied by the adapter."]
                    $field: String
                } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $name $variant $( $field )?);
            )*
        }
    };
}

pub(crate) use define_port_error;
