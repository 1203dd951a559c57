/*++

Licensed under the Apache-2.0 license.

File Name:

    macros.rs

Abstract:

    Macros used by the project

--*/

/// Declares a C-like enum decoded from a packed integer code.
///
/// Every code that does not match a listed variant decodes to the trailing
/// `$invalid` variant, so register and descriptor fields can be converted with
/// `From` without failing. Use `value()` to go back to the raw code.
#[macro_export]
macro_rules! emu_enum {
    (
        $(#[$($enum_attrs:tt)*])*
        $vis:vis $enum_name:ident;
        $type:ty;
        {
            $(
                $(#[$($attrs:tt)*])*
                $name:ident = $value:literal,
            )*
        };
        $invalid:ident
    ) => {
        $(#[$($enum_attrs)*])*
        $vis enum $enum_name {
            $(
                $(#[$($attrs)*])*
                $name = $value,
            )*
            $invalid
        }

        impl $enum_name {
            /// Raw code of the variant, `None` for the invalid variant.
            #[allow(dead_code)]
            pub fn value(self) -> Option<$type> {
                match self {
                    $($enum_name::$name => Some($value),)*
                    $enum_name::$invalid => None,
                }
            }

            #[allow(dead_code)]
            pub fn is_valid(self) -> bool {
                !matches!(self, $enum_name::$invalid)
            }
        }

        impl From<$type> for $enum_name {
            fn from(val: $type) -> $enum_name {
                match val {
                    $($value => $enum_name::$name,)*
                    _ => $enum_name::$invalid,
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                match self {
                    $($enum_name::$name => write!(f, stringify!($name)),)*
                    _ => write!(f, stringify!($invalid)),
                }
            }
        }
    };
}
