macro_rules! into_ok {
    ($expr: expr) => {
        match $expr {
            ::std::result::Result::Ok(ok) => ok,
            ::std::result::Result::Err(e) => match e {},
        }
    };
}

/// Declares a struct with a `Drop` impl and an `into_destruct` method that moves its
/// fields out as a tuple, bypassing the usual "cannot move out of type implementing Drop" error.
macro_rules! into_non_drop {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident<$($gen:ident),*>
        where
            $($bound_ty:ident : $bound:path,)*
        {
            $($fvis:vis $field:ident : $ty:ty,)*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<$($gen),*>
        where
            $($bound_ty : $bound,)*
        {
            $($fvis $field : $ty,)*
        }

        impl<$($gen),*> $name<$($gen),*>
        where
            $($bound_ty : $bound,)*
        {
            #[allow(dead_code)]
            fn into_destruct(self) -> ($($ty,)*) {
                let this = ::std::mem::ManuallyDrop::new(self);
                unsafe {
                    ($(::std::ptr::read(&this.$field),)*)
                }
            }
        }
    };
}

/// Implements [`crate::engine::utils::ExtendLifetime`] for a lifetime-generic type so it can
/// be handed out through [`crate::engine::utils::PartialBorrower`].
macro_rules! extend_lifetime {
    ($name:ident) => {
        unsafe impl<'short, 'target> crate::engine::utils::ExtendLifetime<'target> for $name<'short> {
            type Extended = $name<'target>;

            unsafe fn extend_lifetime(self) -> Self::Extended {
                unsafe { ::std::mem::transmute(self) }
            }
        }
    };
}
