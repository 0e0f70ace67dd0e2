//! Declarative helpers for closed code tables.

/// Defines the `ServiceCode` enum together with its wire value and its
/// canonical upper-case name, so the codec, the catalog and the command line
/// all read from one table.
macro_rules! define_service_codes {
    ($($variant:ident = ($name:literal, $code:literal)),* $(,)?) => {
        /// ECHONET Lite service code (ESV).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum ServiceCode {
            $($variant = $code),*
        }

        impl ServiceCode {
            /// Every known service code, in table order.
            pub const ALL: &'static [ServiceCode] = &[$(ServiceCode::$variant),*];

            pub fn from_u8(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(ServiceCode::$variant),)*
                    _ => None,
                }
            }

            /// Looks up a service code by its name (e.g. `GET_RES`).
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(ServiceCode::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(ServiceCode::$variant => $name),*
                }
            }

            pub fn code(self) -> u8 {
                self as u8
            }
        }

        impl std::fmt::Display for ServiceCode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}
