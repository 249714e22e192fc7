// Declarative field-number mappings for protocol messages and enums.

/// Define a message struct together with its `Decode` and `Encode` impls.
///
/// ```
/// hangwire_common::pblite_message! {
///     pub struct Example {
///         1 => name: Option<String>,
///         3 => tags: Vec<String>,
///     }
/// }
/// ```
///
/// Every field type must implement `Default`; use `Option<_>` for singular
/// fields and `Vec<_>` for repeated ones.
#[macro_export]
macro_rules! pblite_message {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $number:literal => $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl $crate::pblite::Decode for $name {
            #[allow(unused_variables)]
            fn decode(
                decoder: &mut $crate::pblite::Decoder<'_>,
            ) -> ::std::result::Result<Self, $crate::pblite::DecodeError> {
                let container = decoder.keyed()?;
                Ok(Self {
                    $( $field: container.decode::<$ty>($number)?, )*
                })
            }
        }

        impl $crate::pblite::Encode for $name {
            fn encode(&self) -> $crate::wire::WireValue {
                #[allow(unused_mut)]
                let mut writer = $crate::pblite::PositionalWriter::new();
                $( writer.field($number, &self.$field); )*
                writer.finish()
            }
        }
    };
}

/// Define a protocol enum carried as an integer.
///
/// Values outside the listed variants decode to `Unrecognized(value)` so a
/// newer server never breaks an older client.
#[macro_export]
macro_rules! pblite_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $value:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )+
            Unrecognized(i64),
        }

        impl $name {
            pub fn from_wire(value: i64) -> Self {
                match value {
                    $( $value => Self::$variant, )+
                    other => Self::Unrecognized(other),
                }
            }

            pub fn wire_value(self) -> i64 {
                match self {
                    $( Self::$variant => $value, )+
                    Self::Unrecognized(other) => other,
                }
            }
        }

        impl $crate::pblite::Decode for $name {
            fn decode(
                decoder: &mut $crate::pblite::Decoder<'_>,
            ) -> ::std::result::Result<Self, $crate::pblite::DecodeError> {
                decoder.single_value()?.decode_integer::<i64>().map(Self::from_wire)
            }
        }

        impl $crate::pblite::Encode for $name {
            fn encode(&self) -> $crate::wire::WireValue {
                $crate::wire::WireValue::int(self.wire_value())
            }
        }
    };
}
