//! `define_port_error!`: declares a port's error enum together with its
//! snake_case constructors.
//!
//! Each variant becomes a `thiserror` variant with the given message, a
//! constructor named after the variant (`MissingPost` -> `missing_post`)
//! whose parameters accept anything `Into` the field type, and an arm of
//! `label()`, the stable variant name used in log fields.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            #[doc = "Build the `" $variant "` variant."]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@fields $variant [] [] $( $field : $ty, )*);
    };

    (@fields $variant:ident [$($params:tt)*] [$($inits:tt)*]) => {
        ::paste::paste! {
            #[doc = "Build the `" $variant "` variant."]
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@fields $variant:ident [$($params:tt)*] [$($inits:tt)*] $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @fields
            $variant
            [$($params)* $field: impl Into<$ty>,]
            [$($inits)* $field: $field.into(),]
            $($rest)*
        );
    };

    (@pattern $variant:ident) => { Self::$variant };
    (@pattern $variant:ident { $($field:ident : $ty:ty),* }) => { Self::$variant { .. } };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*

            /// Snake_case name of the variant, for structured log fields.
            pub fn label(&self) -> &'static str {
                ::paste::paste! {
                    match self {
                        $(
                            define_port_error!(@pattern $variant $( { $($field : $ty),* } )?)
                                => stringify!([<$variant:snake>]),
                        )*
                    }
                }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Constructor and label coverage for generated enums.
    use crate::domain::PostId;
    use rstest::rstest;

    define_port_error! {
        pub enum SamplePortError {
            Connection { message: String } => "connection failed: {message}",
            MissingPost { post_id: PostId } => "post {post_id} does not exist",
            Drifted { message: String, by: u32 } => "drifted by {by}: {message}",
            Closed => "store closed",
        }
    }

    fn post() -> PostId {
        PostId::new(5).expect("id")
    }

    #[rstest]
    fn string_fields_accept_str() {
        let err = SamplePortError::connection("refused");
        assert_eq!(err.to_string(), "connection failed: refused");
    }

    #[rstest]
    fn id_fields_keep_their_type() {
        assert_eq!(
            SamplePortError::missing_post(post()),
            SamplePortError::MissingPost { post_id: post() }
        );
    }

    #[rstest]
    #[case(SamplePortError::connection("x"), "connection")]
    #[case(SamplePortError::missing_post(post()), "missing_post")]
    #[case(SamplePortError::drifted("likes", 2_u32), "drifted")]
    #[case(SamplePortError::closed(), "closed")]
    fn labels_are_snake_case_variant_names(
        #[case] err: SamplePortError,
        #[case] expected: &str,
    ) {
        assert_eq!(err.label(), expected);
    }

    #[rstest]
    fn mixed_fields_render_in_order() {
        let err = SamplePortError::drifted("likes", 2_u32);
        assert_eq!(err.to_string(), "drifted by 2: likes");
    }
}
