//! Macros for ergonomic machine construction.

/// Declare a fieldless state enum and implement [`State`](crate::core::State)
/// for it. Each variant's name is its identifier.
///
/// # Example
///
/// ```
/// use statechart::core::State;
/// use statechart::state_enum;
///
/// state_enum! {
///     pub enum FetchState {
///         Idle,
///         Loading,
///         Success,
///         Error,
///     }
/// }
///
/// assert_eq!(FetchState::Loading.name(), "Loading");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            Debug,
            serde::Serialize,
            serde::Deserialize
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}
